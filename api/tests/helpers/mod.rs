pub mod app;
pub mod ws;

#[allow(unused_imports)]
pub use app::make_test_app;
#[allow(unused_imports)]
pub use ws::{connect_ws, recv_server_json, send_client_json, spawn_server};
