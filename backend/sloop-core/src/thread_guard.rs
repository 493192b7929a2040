use std::thread::{self, ThreadId};

/// Remembers which thread is the host's UI thread so slow supervisory work can refuse to run on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadGuard {
    ui_thread: Option<ThreadId>,
}

impl ThreadGuard {
    /// Treats the calling thread as the UI thread.
    pub fn bind_current() -> Self {
        Self {
            ui_thread: Some(thread::current().id()),
        }
    }

    /// No UI thread; every check passes.
    pub fn unbound() -> Self {
        Self { ui_thread: None }
    }

    pub fn is_on_ui_thread(&self) -> bool {
        self.ui_thread == Some(thread::current().id())
    }
}
