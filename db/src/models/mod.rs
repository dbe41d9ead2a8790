pub mod chat_messages;
pub mod ticket_comments;
pub mod tickets;
pub mod user;
