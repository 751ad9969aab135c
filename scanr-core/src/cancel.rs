//! Advisory cancellation shared between the acquisition and an interrupt handler.
//!
//! A [`CancelToken`] is created before the handshake and cloned into the
//! [`Session`](crate::session::Session), the device backend, and the
//! [`CancellationController`]. The controller runs on whatever context the
//! interrupt is delivered on, so everything here is a plain atomic load or
//! store: no locks, no allocation.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct Flags {
    open: AtomicBool,
    abort: AtomicBool,
}

/// Shared "handle is open" and "abort requested" state.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flags: Arc<Flags>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a device handle is currently open.
    pub fn is_open(&self) -> bool {
        self.flags.open.load(Ordering::SeqCst)
    }

    /// Whether an abort has been requested for the open handle.
    ///
    /// Backends poll this at chunk boundaries.
    pub fn is_abort_requested(&self) -> bool {
        self.flags.abort.load(Ordering::SeqCst)
    }

    /// Requests an abort if a handle is open. Returns `false` when there was
    /// nothing to cancel.
    pub fn request_abort(&self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.flags.abort.store(true, Ordering::SeqCst);
        true
    }

    pub(crate) fn mark_open(&self) {
        self.flags.open.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_closed(&self) {
        self.flags.open.store(false, Ordering::SeqCst);
    }
}

/// Reacts to an external interrupt by asking the open session to abort.
///
/// The controller itself does not register any signal handler; the front-end
/// does that (for example with `ctrlc`) and calls [`on_interrupt`] from it.
///
/// [`on_interrupt`]: CancellationController::on_interrupt
#[derive(Clone, Debug)]
pub struct CancellationController {
    token: CancelToken,
}

impl CancellationController {
    pub fn new(token: CancelToken) -> Self {
        Self { token }
    }

    /// Handler body. Returns `true` if an abort was requested, `false` if no
    /// handle was open.
    pub fn on_interrupt(&self) -> bool {
        self.token.request_abort()
    }
}
