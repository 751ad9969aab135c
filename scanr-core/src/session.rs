//! Ownership of the device handle from open to close.
use crate::backend::{Backend, DeviceHandle};
use crate::cancel::CancelToken;
use crate::error::{ScanError, Status};
use tracing::{debug, info};

/// Owns an initialised backend and at most one open device handle.
///
/// Dropping a `Session` closes the handle (if any) and shuts the backend
/// down, so every exit path, including early returns through `?`, releases
/// the device exactly once.
pub struct Session<B: Backend> {
    backend: B,
    handle: Option<B::Handle>,
    device: String,
    cancel: CancelToken,
    started: bool,
    shut_down: bool,
}

impl<B: Backend> Session<B> {
    /// Performs one-time backend setup.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Init`] if the backend cannot be reached. The
    /// backend's `exit` still runs once before the error is returned.
    pub fn initialize(mut backend: B, cancel: CancelToken) -> Result<Self, ScanError> {
        if let Err(status) = backend.init() {
            backend.exit();
            debug!(%status, "backend shut down after failed init");
            return Err(ScanError::Init(status));
        }
        debug!("backend initialised");

        Ok(Self {
            backend,
            handle: None,
            device: String::new(),
            cancel,
            started: false,
            shut_down: false,
        })
    }

    /// Opens `name`, or the first available device if `name` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Open`] if the device is unavailable, the name is
    /// unknown, or this session already holds an open handle.
    pub fn open(&mut self, name: &str) -> Result<(), ScanError> {
        if self.handle.is_some() {
            return Err(ScanError::Open(Status::DeviceBusy));
        }

        let handle = self
            .backend
            .open(name, self.cancel.clone())
            .map_err(ScanError::Open)?;

        self.handle = Some(handle);
        self.device = name.to_string();
        self.cancel.mark_open();
        info!(device = %self.display_name(), "device opened");
        Ok(())
    }

    /// Asks the device to stop the in-flight acquisition.
    ///
    /// Advisory: the device reports the abort on its next chunk boundary.
    /// Returns `false` (and does nothing) if no handle is open.
    pub fn abort(&self) -> bool {
        let requested = self.cancel.request_abort();
        if requested {
            debug!("abort requested");
        }
        requested
    }

    /// Releases the handle. No-op if nothing is open.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            // Flip the flag first so an interrupt racing with close sees no handle.
            self.cancel.mark_closed();
            handle.close();
            self.started = false;
            debug!(device = %self.display_name(), "device closed");
        }
    }

    /// Closes any open handle and releases backend-wide resources.
    pub fn shutdown(mut self) {
        self.finish();
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn handle(&self) -> Option<&B::Handle> {
        self.handle.as_ref()
    }

    pub(crate) fn handle_mut(&mut self) -> Option<&mut B::Handle> {
        self.handle.as_mut()
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    fn display_name(&self) -> &str {
        if self.device.is_empty() {
            "(default)"
        } else {
            &self.device
        }
    }

    fn finish(&mut self) {
        self.close();
        if !self.shut_down {
            self.shut_down = true;
            self.backend.exit();
            debug!("backend shut down");
        }
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RawParameters, ReadStatus};
    use crate::device::DeviceInfo;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counters {
        inits: u32,
        opens: u32,
        closes: u32,
        exits: u32,
    }

    struct Fake {
        counters: Rc<RefCell<Counters>>,
        fail_init: bool,
    }

    struct FakeHandle(Rc<RefCell<Counters>>);

    impl Backend for Fake {
        type Handle = FakeHandle;

        fn init(&mut self) -> Result<(), Status> {
            self.counters.borrow_mut().inits += 1;
            if self.fail_init {
                Err(Status::IoError)
            } else {
                Ok(())
            }
        }

        fn open(&mut self, name: &str, _cancel: CancelToken) -> Result<FakeHandle, Status> {
            if name == "missing" {
                return Err(Status::Inval);
            }
            self.counters.borrow_mut().opens += 1;
            Ok(FakeHandle(self.counters.clone()))
        }

        fn devices(&self) -> Vec<DeviceInfo> {
            Vec::new()
        }

        fn exit(&mut self) {
            self.counters.borrow_mut().exits += 1;
        }
    }

    impl DeviceHandle for FakeHandle {
        fn start(&mut self) -> Result<(), Status> {
            Ok(())
        }

        fn parameters(&self) -> Result<RawParameters, Status> {
            Ok(RawParameters::default())
        }

        fn read(&mut self, _buf: &mut [u8]) -> Result<ReadStatus, Status> {
            Ok(ReadStatus::Done(0))
        }

        fn close(&mut self) {
            self.0.borrow_mut().closes += 1;
        }
    }

    fn fake(fail_init: bool) -> (Fake, Rc<RefCell<Counters>>) {
        let counters = Rc::new(RefCell::new(Counters::default()));
        (
            Fake {
                counters: counters.clone(),
                fail_init,
            },
            counters,
        )
    }

    #[test]
    fn init_failure_is_reported_and_still_exits_once() {
        let (backend, counters) = fake(true);
        let err = Session::initialize(backend, CancelToken::new()).err();

        assert_eq!(err, Some(ScanError::Init(Status::IoError)));
        let counters = counters.borrow();
        assert_eq!(counters.inits, 1);
        assert_eq!(counters.opens, 0);
        assert_eq!(counters.exits, 1);
    }

    #[test]
    fn close_is_idempotent_and_drop_shuts_down_once() {
        let (backend, counters) = fake(false);
        let token = CancelToken::new();
        let mut session = Session::initialize(backend, token.clone()).unwrap();

        session.close();
        session.open("").unwrap();
        assert!(token.is_open());

        session.close();
        session.close();
        assert!(!token.is_open());
        drop(session);

        let counters = counters.borrow();
        assert_eq!(counters.opens, 1);
        assert_eq!(counters.closes, 1);
        assert_eq!(counters.exits, 1);
    }

    #[test]
    fn drop_closes_an_open_handle() {
        let (backend, counters) = fake(false);
        {
            let mut session = Session::initialize(backend, CancelToken::new()).unwrap();
            session.open("").unwrap();
        }
        assert_eq!(counters.borrow().closes, 1);
        assert_eq!(counters.borrow().exits, 1);
    }

    #[test]
    fn explicit_shutdown_does_not_exit_twice() {
        let (backend, counters) = fake(false);
        let mut session = Session::initialize(backend, CancelToken::new()).unwrap();
        session.open("scanner").unwrap();
        session.shutdown();

        assert_eq!(counters.borrow().closes, 1);
        assert_eq!(counters.borrow().exits, 1);
    }

    #[test]
    fn second_open_is_busy() {
        let (backend, _) = fake(false);
        let mut session = Session::initialize(backend, CancelToken::new()).unwrap();
        session.open("").unwrap();

        assert_eq!(session.open(""), Err(ScanError::Open(Status::DeviceBusy)));
    }

    #[test]
    fn failed_open_leaves_nothing_to_abort() {
        let (backend, counters) = fake(false);
        let token = CancelToken::new();
        let mut session = Session::initialize(backend, token.clone()).unwrap();

        assert_eq!(session.open("missing"), Err(ScanError::Open(Status::Inval)));
        assert!(!session.abort());
        assert!(!token.is_abort_requested());
        drop(session);
        assert_eq!(counters.borrow().closes, 0);
    }

    #[test]
    fn abort_sets_intent_while_open() {
        let (backend, _) = fake(false);
        let token = CancelToken::new();
        let mut session = Session::initialize(backend, token.clone()).unwrap();
        session.open("").unwrap();

        assert!(session.abort());
        assert!(token.is_abort_requested());
    }
}
