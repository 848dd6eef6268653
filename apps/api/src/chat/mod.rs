//! PLC group chat: an append-only message log per group, with the same
//! remote-first, local-fallback persistence as notes.

pub mod handlers;
pub mod models;
pub mod repository;
pub mod store;
