//! Explicit logging context.
//!
//! Components never reach for a shared logger object. The orchestrator creates
//! one [`LogScope`] per run and hands it to every component it constructs;
//! per-comic work narrows it with [`LogScope::for_comic`]. All records still go
//! through the `log` facade, so the host decides where they end up.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LogScope {
    run_id: Arc<str>,
    comic: Option<Arc<str>>,
}

impl LogScope {
    /// Creates a scope for a new run with a short random id.
    pub fn new_run() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self::with_run_id(&id[..8])
    }

    pub fn with_run_id(run_id: &str) -> Self {
        Self {
            run_id: Arc::from(run_id),
            comic: None,
        }
    }

    /// Narrows the scope to one comic of the run.
    pub fn for_comic(&self, title: &str) -> Self {
        Self {
            run_id: Arc::clone(&self.run_id),
            comic: Some(Arc::from(title)),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn comic(&self) -> Option<&str> {
        self.comic.as_deref()
    }
}

impl Default for LogScope {
    fn default() -> Self {
        Self::with_run_id("-")
    }
}

impl fmt::Display for LogScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.comic {
            Some(comic) => write!(f, "[{}][{}]", self.run_id, comic),
            None => write!(f, "[{}]", self.run_id),
        }
    }
}
