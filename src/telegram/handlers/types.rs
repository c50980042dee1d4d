//! Handler types and dependencies

use std::sync::Arc;

use teloxide::types::UserId;

use crate::context::AppContext;
use crate::telegram::session::PendingLinks;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub ctx: Arc<AppContext>,
    pub pending: PendingLinks,
    pub bot_username: Option<String>,
    pub bot_id: UserId,
}

impl HandlerDeps {
    pub fn new(ctx: Arc<AppContext>, bot_username: Option<String>, bot_id: UserId) -> Self {
        Self {
            ctx,
            pending: PendingLinks::new(),
            bot_username,
            bot_id,
        }
    }
}
