//! Console rendition of the manual-retry gate.

use sloop_core::collaborators::{ResetAction, RestartNotifier};

use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use tokio::runtime::Handle;

type LineSource = Arc<dyn Fn() -> io::Result<String> + Send + Sync>;

pub const RETRY_PROMPT: &str =
    "The sloop backend keeps stopping. Press Enter to try again, or Ctrl+C to quit.";

/// Prints the retry prompt and waits for Enter on a blocking thread.
pub struct ConsoleRetryNotifier {
    input: LineSource,
    waiting: Arc<AtomicBool>,
}

impl Default for ConsoleRetryNotifier {
    fn default() -> Self {
        Self::with_input(read_stdin_line)
    }
}

impl ConsoleRetryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `input` instead of stdin to obtain the user's answer.
    pub fn with_input(input: impl Fn() -> io::Result<String> + Send + Sync + 'static) -> Self {
        Self {
            input: Arc::new(input),
            waiting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }
}

fn read_stdin_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

impl RestartNotifier for ConsoleRetryNotifier {
    fn show(&self, reset: ResetAction) {
        if self.waiting.swap(true, Ordering::SeqCst) {
            debug!("Retry prompt already showing");
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            error!("Cannot show retry prompt outside the async runtime");
            self.waiting.store(false, Ordering::SeqCst);
            return;
        };

        warn!("{RETRY_PROMPT}");
        println!("{RETRY_PROMPT}");

        let input = Arc::clone(&self.input);
        let waiting = Arc::clone(&self.waiting);
        runtime.spawn_blocking(move || {
            let answer = input();
            waiting.store(false, Ordering::SeqCst);
            match answer {
                Ok(line) if !line.is_empty() => {
                    info!("Retry requested from console");
                    reset.invoke();
                }
                Ok(_) => warn!("Console input closed, automatic restarts stay paused"),
                Err(e) => error!("Failed to read retry answer: {e}"),
            }
        });
    }
}
