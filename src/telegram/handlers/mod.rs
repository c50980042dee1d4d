//! Telegram bot handler tree configuration
//!
//! The dispatcher schema is built from [`HandlerDeps`] so integration tests
//! can drive the same handler tree as production code.

mod flow;
mod schema;
mod types;

pub use flow::process_request;
pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
