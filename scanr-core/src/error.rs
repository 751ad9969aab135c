//! Status codes reported by device backends and the error types built on them.
use std::fmt;
use std::io;
use std::path::PathBuf;

/// A status reported by a device backend.
///
/// Backends return one of these whenever an operation does not succeed. The
/// [`fmt::Display`] impl gives the human-readable description printed in
/// diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Good,
    Unsupported,
    Cancelled,
    DeviceBusy,
    Inval,
    Eof,
    Jammed,
    NoDocs,
    CoverOpen,
    IoError,
    NoMem,
    AccessDenied,
}

impl Status {
    /// The human-readable description of this status.
    pub fn description(self) -> &'static str {
        match self {
            Status::Good => "Success",
            Status::Unsupported => "Operation not supported",
            Status::Cancelled => "Operation was cancelled",
            Status::DeviceBusy => "Device busy",
            Status::Inval => "Invalid argument",
            Status::Eof => "End of file reached",
            Status::Jammed => "Document feeder jammed",
            Status::NoDocs => "Document feeder out of documents",
            Status::CoverOpen => "Scanner cover is open",
            Status::IoError => "Error during device I/O",
            Status::NoMem => "Out of memory",
            Status::AccessDenied => "Access to resource has been denied",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Why a parameter query was refused.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("acquisition has not been started")]
    NotStarted,
    #[error("{0}")]
    Device(Status),
    #[error("invalid geometry {width}x{height}")]
    InvalidGeometry { width: i32, height: i32 },
}

/// A handshake-phase failure.
///
/// Every variant is fatal to the acquisition: the device handle is closed
/// and the caller is expected to give up. Failures after the handshake are
/// not errors at this level; they are reported in
/// [`AcquisitionReport`](crate::acquire::AcquisitionReport).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("init: {0}")]
    Init(Status),
    #[error("open: {0}")]
    Open(Status),
    #[error("start: {0}")]
    Start(Status),
    #[error("get_parameters: {0}")]
    Parameters(#[from] ParameterError),
}

impl ScanError {
    /// Name of the handshake operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            ScanError::Init(_) => "init",
            ScanError::Open(_) => "open",
            ScanError::Start(_) => "start",
            ScanError::Parameters(_) => "get_parameters",
        }
    }
}

/// A failure of the output file. Never fatal to the acquisition.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("could not create '{}': {source}", .path.display())]
    Create { path: PathBuf, source: io::Error },
    #[error("could not write header to '{}': {source}", .path.display())]
    Header { path: PathBuf, source: io::Error },
    #[error("could not write to '{}': {written} of {expected} bytes written", .path.display())]
    ShortWrite {
        path: PathBuf,
        expected: usize,
        written: usize,
    },
    #[error("could not flush '{}': {source}", .path.display())]
    Flush { path: PathBuf, source: io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_errors_name_their_operation() {
        let err = ScanError::Open(Status::DeviceBusy);
        assert_eq!(err.operation(), "open");
        assert_eq!(err.to_string(), "open: Device busy");

        let err: ScanError = ParameterError::InvalidGeometry {
            width: 0,
            height: 50,
        }
        .into();
        assert_eq!(err.operation(), "get_parameters");
        assert_eq!(err.to_string(), "get_parameters: invalid geometry 0x50");
    }

    #[test]
    fn short_write_message_names_the_file() {
        let err = SinkError::ShortWrite {
            path: PathBuf::from("out.ppm"),
            expected: 4096,
            written: 100,
        };
        assert_eq!(
            err.to_string(),
            "could not write to 'out.ppm': 100 of 4096 bytes written"
        );
    }
}
