//! Progress line drawn while the browser sign-in is pending.

use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;

const FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const FRAME_INTERVAL: Duration = Duration::from_millis(80);

/// Shows how long the redirect has been awaited out of the allowed time
pub struct Spinner {
    task: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Start drawing on stderr. Nothing is drawn when stderr is not a terminal.
    pub fn start(message: &str, deadline: Duration) -> Self {
        if !atty::is(atty::Stream::Stderr) {
            return Self { task: None };
        }

        let message = message.to_string();
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = interval(FRAME_INTERVAL);

            for frame in FRAMES.iter().cycle() {
                ticker.tick().await;
                let waited = format!(
                    "{}s of {}s",
                    started.elapsed().as_secs(),
                    deadline.as_secs()
                );
                eprint!(
                    "\r{} {} {}",
                    message.blue().bold(),
                    frame.cyan(),
                    waited.dimmed()
                );
                let _ = io::stderr().flush();
            }
        });

        Self { task: Some(task) }
    }

    /// Stop drawing and clear the line
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // The draw loop is gone once this resolves, so nothing repaints after the clear
            let _ = task.await;
            eprint!("\r\x1b[K");
            let _ = io::stderr().flush();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_returns_promptly() {
        let spinner = Spinner::start("Waiting for sign-in", Duration::from_secs(300));
        tokio::time::sleep(Duration::from_millis(200)).await;

        tokio::time::timeout(Duration::from_secs(1), spinner.stop())
            .await
            .unwrap();
    }
}
