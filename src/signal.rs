//! Build cancellation.
//!
//! A `CancelToken` is checked between bundle archival steps: already-written
//! archives stay valid (writes are atomic) and are reused by the next
//! incremental run, so interrupting a build is always safe at those points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Installs a Ctrl-C handler that flips the returned token.
pub fn install_ctrlc_handler() -> Result<CancelToken, ctrlc::Error> {
    let token = CancelToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_clear() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn test_cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
