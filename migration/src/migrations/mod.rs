pub mod m202507150001_create_users;
pub mod m202507150002_create_tickets;
pub mod m202507150003_create_ticket_comments;
pub mod m202507150004_create_chat_messages;
