//! Inbox Sync: notification-driven mailbox synchronization with card
//! transaction extraction.

pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod routes;
pub mod sync;

pub use error::{Error, Result};
