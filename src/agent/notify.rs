//! Warning notification state machine. The controller owns the only
//! reference to a shown warning; the presenter is an injected side effect
//! that draws and removes it.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tracing::debug;

use crate::utils::clock::Clock;

/// How long a dismissed warning keeps fading before its handle is released.
const DISMISS_FADE: Duration = Duration::from_millis(300);

/// Token the presenter hands back for a warning it put on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationHandle(pub u64);

/// On-screen side of the warning. Owns rendering and the dismiss affordance;
/// the decision to show or hide stays with [NotificationController].
pub trait NotificationPresenter: Send + 'static {
    fn show(&mut self) -> Result<NotificationHandle>;

    /// Starts the fade-out. The warning is still on screen afterwards.
    fn begin_dismiss(&mut self, handle: NotificationHandle) -> Result<()>;

    /// Takes the warning off screen for good.
    fn remove(&mut self, handle: NotificationHandle) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationState {
    Hidden,
    Shown(NotificationHandle),
}

/// Cyclic `Hidden -> Shown -> Hidden` machine. There is no cooldown: once
/// the handle is released, the next over-budget check may show again.
pub struct NotificationController<P> {
    presenter: P,
    state: NotificationState,
    clock: Arc<dyn Clock>,
}

impl<P: NotificationPresenter> NotificationController<P> {
    pub fn new(presenter: P, clock: Arc<dyn Clock>) -> Self {
        Self {
            presenter,
            state: NotificationState::Hidden,
            clock,
        }
    }

    pub fn is_shown(&self) -> bool {
        matches!(self.state, NotificationState::Shown(_))
    }

    /// `Hidden -> Shown`. A no-op while a warning is already up, including
    /// one that is mid-fade.
    pub fn trigger_show(&mut self) -> Result<()> {
        if self.is_shown() {
            return Ok(());
        }

        let handle = self.presenter.show()?;
        debug!("Warning shown with handle {handle:?}");
        self.state = NotificationState::Shown(handle);
        Ok(())
    }

    /// `Shown -> Hidden`, driven by user dismissal. The handle stays held
    /// through the fade delay and is only released afterwards.
    pub async fn dismiss(&mut self) -> Result<()> {
        let NotificationState::Shown(handle) = self.state else {
            return Ok(());
        };

        self.presenter.begin_dismiss(handle)?;
        self.clock.sleep(DISMISS_FADE).await;
        self.presenter.remove(handle)?;
        self.state = NotificationState::Hidden;
        debug!("Warning {handle:?} dismissed");
        Ok(())
    }
}
