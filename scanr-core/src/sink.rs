//! The PPM output file.
//!
//! A [`Sink`] is opened once the geometry is known, receives every chunk the
//! device delivers, and is closed at the end of the transfer. The first
//! failed write removes the partial file and disables the sink for good; the
//! acquisition itself carries on so the device is drained to idle.
use crate::error::SinkError;
use crate::negotiate::AcquisitionParameters;
use std::fs::{self, File};
use std::io::{self, Write};
use std::mem;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What became of the output once the sink was closed.
#[derive(Debug)]
pub enum SinkReport {
    /// No destination was requested.
    NotRequested,
    /// The file was written completely.
    Written(PathBuf),
    /// The file could not be set up; nothing was kept.
    Unavailable(SinkError),
    /// A write failed mid-transfer and the partial file was removed.
    Removed(SinkError),
}

enum State {
    Active {
        path: PathBuf,
        writer: Box<dyn Write + Send>,
        written: u64,
    },
    Finished(SinkReport),
}

/// Destination for raster bytes.
pub struct Sink {
    state: State,
}

/// Returns the `P6` header for `params`.
pub fn header(params: &AcquisitionParameters) -> String {
    format!(
        "P6\n{} {} {}\n",
        params.width, params.height, params.max_value
    )
}

impl Sink {
    /// A sink that discards everything.
    pub fn none() -> Self {
        Self {
            state: State::Finished(SinkReport::NotRequested),
        }
    }

    /// Creates (or truncates) `path` and writes the header, if a path was
    /// given.
    ///
    /// Failure to create the file is not fatal: a warning is logged and the
    /// returned sink discards all data.
    pub fn open_if_requested(path: Option<&Path>, params: &AcquisitionParameters) -> Self {
        let Some(path) = path else {
            return Self::none();
        };

        match File::create(path) {
            Ok(file) => Self::from_writer(path, file, params),
            Err(source) => {
                let err = SinkError::Create {
                    path: path.to_path_buf(),
                    source,
                };
                warn!(%err, "output disabled");
                Self {
                    state: State::Finished(SinkReport::Unavailable(err)),
                }
            }
        }
    }

    /// Wraps a writer that is already backed by `path`.
    ///
    /// `path` is removed if the header or any later write fails.
    pub fn from_writer<W>(path: impl Into<PathBuf>, writer: W, params: &AcquisitionParameters) -> Self
    where
        W: Write + Send + 'static,
    {
        let path = path.into();
        let mut writer: Box<dyn Write + Send> = Box::new(writer);

        if let Err(source) = writer.write_all(header(params).as_bytes()) {
            drop(writer);
            remove_partial(&path);
            let err = SinkError::Header { path, source };
            warn!(%err, "output disabled");
            return Self {
                state: State::Finished(SinkReport::Unavailable(err)),
            };
        }

        debug!(path = %path.display(), "output header written");
        Self {
            state: State::Active {
                path,
                writer,
                written: 0,
            },
        }
    }

    /// Whether chunks are still being written.
    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    /// Appends `bytes` to the file.
    ///
    /// Does nothing unless the sink is active. If fewer bytes than requested
    /// end up written, the file is closed and deleted, the sink is disabled,
    /// and the error is returned. Later calls are no-ops.
    pub fn append_chunk(&mut self, bytes: &[u8]) -> Result<(), &SinkError> {
        let State::Active {
            writer, written, ..
        } = &mut self.state
        else {
            return Ok(());
        };

        let accepted = write_fully(writer.as_mut(), bytes);
        *written += accepted as u64;
        if accepted == bytes.len() {
            return Ok(());
        }

        let path = self.discard();
        self.fail(SinkError::ShortWrite {
            path,
            expected: bytes.len(),
            written: accepted,
        })
    }

    /// Flushes and closes the file if still active. Idempotent.
    pub fn close(&mut self) {
        let State::Active { writer, .. } = &mut self.state else {
            return;
        };

        if let Err(source) = writer.flush() {
            let path = self.discard();
            let _ = self.fail(SinkError::Flush { path, source });
            return;
        }

        if let State::Active { path, written, .. } =
            mem::replace(&mut self.state, State::Finished(SinkReport::NotRequested))
        {
            debug!(path = %path.display(), bytes = written, "output closed");
            self.state = State::Finished(SinkReport::Written(path));
        }
    }

    /// Closes the sink and reports what happened to the output.
    pub fn into_report(mut self) -> SinkReport {
        self.close();
        match self.state {
            State::Finished(report) => report,
            State::Active { path, .. } => SinkReport::Written(path),
        }
    }

    /// Drops the writer and deletes the file, returning its path.
    fn discard(&mut self) -> PathBuf {
        match mem::replace(&mut self.state, State::Finished(SinkReport::NotRequested)) {
            State::Active { path, writer, .. } => {
                drop(writer);
                remove_partial(&path);
                path
            }
            State::Finished(report) => {
                self.state = State::Finished(report);
                PathBuf::new()
            }
        }
    }

    fn fail(&mut self, err: SinkError) -> Result<(), &SinkError> {
        warn!(%err, "output file removed");
        self.state = State::Finished(SinkReport::Removed(err));
        match &self.state {
            State::Finished(SinkReport::Removed(err)) => Err(err),
            _ => Ok(()),
        }
    }
}

/// Writes as much of `bytes` as the writer accepts and returns the count.
fn write_fully(writer: &mut dyn Write, mut bytes: &[u8]) -> usize {
    let mut total = 0;
    while !bytes.is_empty() {
        match writer.write(bytes) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                bytes = &bytes[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, "write failed");
                break;
            }
        }
    }
    total
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial output"),
    }
}
