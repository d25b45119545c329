//! Cancellation for long-running reads.
//!
//! An [`AbortController`] owns the flag; any number of [`AbortSignal`] clones
//! observe it through a `tokio::sync::watch` channel, polled between units of work.

use crate::{DocStateError, DocStateResult};
use tokio::sync::watch;

/// Owner side of a cancellation flag.
#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

/// Observer side of a cancellation flag.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal. Idempotent.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Fail with [`DocStateError::Aborted`] if the signal has fired.
    pub fn check(&self) -> DocStateResult<()> {
        if self.is_aborted() {
            Err(DocStateError::Aborted)
        } else {
            Ok(())
        }
    }
}

/// Check an optional signal.
pub fn check_aborted(signal: Option<&AbortSignal>) -> DocStateResult<()> {
    signal.map_or(Ok(()), AbortSignal::check)
}
