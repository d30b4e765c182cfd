//! The browsing context the agent runs inside. The core only needs to know
//! which host the page belongs to and whether it is currently foregrounded;
//! everything else about the page stays outside.

use std::sync::Arc;

use anyhow::Result;

#[cfg_attr(test, mockall::automock)]
pub trait PageContext: Send + 'static {
    fn hostname(&self) -> Arc<str>;

    /// Whether the page is foregrounded right now. Heartbeats are only
    /// attributed while this is true.
    fn is_visible(&mut self) -> Result<bool>;
}

/// A context that is always foregrounded, used when the agent runs in a
/// console for a single fixed host.
pub struct FixedPage {
    hostname: Arc<str>,
}

impl FixedPage {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

impl PageContext for FixedPage {
    fn hostname(&self) -> Arc<str> {
        self.hostname.clone()
    }

    fn is_visible(&mut self) -> Result<bool> {
        Ok(true)
    }
}
