//! Background jobs started by request handlers.
//!
//! Each job runs on a blocking thread via `tokio::task::spawn_blocking` and
//! publishes its progress through state the handlers can poll.

pub mod archive;
