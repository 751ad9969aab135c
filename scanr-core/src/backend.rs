//! The seam between the acquisition logic and a device driver.
//!
//! A [`Backend`] is the driver-wide entry point: it is initialised once,
//! opens handles, and is shut down once. A [`DeviceHandle`] is one open
//! device. Everything above this module talks to drivers only through these
//! two traits, so a real scanner driver, the built-in
//! [`PatternBackend`](crate::pattern::PatternBackend) and test mocks are
//! interchangeable.
use crate::cancel::CancelToken;
use crate::device::DeviceInfo;
use crate::error::Status;

/// Geometry exactly as the device reports it, before validation.
///
/// Fields are signed because drivers may report garbage; the
/// [`negotiate`](crate::negotiate) module rejects non-positive values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawParameters {
    pub pixels_per_line: i32,
    pub lines: i32,
    /// Zero or negative means "not reported".
    pub bytes_per_line: i32,
    pub depth: i32,
}

/// Result of one successful device read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// `n` bytes were placed in the buffer and more may follow.
    Data(usize),
    /// The transfer completed normally; `n` trailing bytes were placed in
    /// the buffer (possibly zero).
    Done(usize),
}

/// A device driver.
pub trait Backend {
    type Handle: DeviceHandle;

    /// One-time driver setup.
    fn init(&mut self) -> Result<(), Status>;

    /// Opens a device by name. An empty name selects the first available
    /// device.
    ///
    /// The handle must report [`Status::Cancelled`] from its next read once
    /// `cancel` has an abort requested.
    fn open(&mut self, name: &str, cancel: CancelToken) -> Result<Self::Handle, Status>;

    /// Devices this backend can currently open.
    fn devices(&self) -> Vec<DeviceInfo>;

    /// Releases driver-wide resources.
    fn exit(&mut self);
}

/// One open device.
pub trait DeviceHandle {
    /// Starts producing data for the next transfer.
    fn start(&mut self) -> Result<(), Status>;

    /// Current acquisition geometry.
    fn parameters(&self) -> Result<RawParameters, Status>;

    /// Blocks until data is available, the transfer completes, or an error
    /// occurs. Never writes more than `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadStatus, Status>;

    /// Releases the handle. Called exactly once.
    fn close(&mut self);
}
