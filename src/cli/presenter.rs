use ansi_term::Colour::{Red, Yellow};
use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::agent::notify::{NotificationHandle, NotificationPresenter};

/// Console stand-in for the on-page warning banner. The dismiss affordance
/// is the Enter key, wired through [spawn_dismiss_listener].
pub struct TerminalPresenter {
    next_handle: u64,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self { next_handle: 0 }
    }
}

impl Default for TerminalPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationPresenter for TerminalPresenter {
    fn show(&mut self) -> Result<NotificationHandle> {
        self.next_handle += 1;
        println!(
            "{}",
            Red.bold().paint("Time budget for this domain is used up")
        );
        println!("{}", Yellow.paint("(press Enter to dismiss)"));
        Ok(NotificationHandle(self.next_handle))
    }

    fn begin_dismiss(&mut self, _handle: NotificationHandle) -> Result<()> {
        Ok(())
    }

    fn remove(&mut self, _handle: NotificationHandle) -> Result<()> {
        println!("Warning dismissed");
        Ok(())
    }
}

/// Forwards every line typed on stdin as one dismiss event. The task ends
/// with the process or when stdin closes.
pub fn spawn_dismiss_listener() -> mpsc::Receiver<()> {
    let (sender, receiver) = mpsc::channel(4);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            if sender.send(()).await.is_err() {
                break;
            }
        }
    });
    receiver
}
