pub mod chat;
pub mod note;
pub mod user;
