//! Links waiting for a format choice, keyed by the keyboard message that asks for it.
//!
//! Every link gets its own keyboard, so in a busy group each button press
//! downloads the link it was offered for. Unanswered keyboards expire.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use teloxide::types::{ChatId, MessageId};
use url::Url;

use crate::core::config;

#[derive(Debug, Clone)]
struct PendingLink {
    url: Url,
    created: Instant,
}

#[derive(Debug, Clone)]
pub struct PendingLinks {
    links: Arc<DashMap<(ChatId, MessageId), PendingLink>>,
    ttl: Duration,
}

impl Default for PendingLinks {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(config::download::PENDING_LINK_TTL_SECS))
    }
}

impl PendingLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            links: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Remembers `url` for the keyboard `keyboard` in `chat` and drops expired entries.
    pub fn insert(&self, chat: ChatId, keyboard: MessageId, url: Url) {
        self.prune_expired();
        self.links.insert(
            (chat, keyboard),
            PendingLink {
                url,
                created: Instant::now(),
            },
        );
    }

    pub fn peek(&self, chat: ChatId, keyboard: MessageId) -> Option<Url> {
        self.links
            .get(&(chat, keyboard))
            .filter(|entry| entry.created.elapsed() < self.ttl)
            .map(|entry| entry.url.clone())
    }

    pub fn take(&self, chat: ChatId, keyboard: MessageId) -> Option<Url> {
        self.links
            .remove(&(chat, keyboard))
            .filter(|(_, entry)| entry.created.elapsed() < self.ttl)
            .map(|(_, entry)| entry.url)
    }

    /// Forgets every keyboard of `chat`.
    pub fn clear_chat(&self, chat: ChatId) {
        self.links.retain(|(c, _), _| *c != chat);
    }

    pub fn prune_expired(&self) {
        self.links.retain(|_, entry| entry.created.elapsed() < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
