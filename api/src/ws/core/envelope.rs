use crate::ws::core::event::Event;
use util::ws::{WebSocketManager, emit as emit_enveloped};

pub async fn emit<E>(ws: &WebSocketManager, ev: &E)
where
    E: Event,
{
    let channel = ev.channel().name();
    emit_enveloped(ws, &channel, E::NAME, ev.sender_id(), ev).await;
}
