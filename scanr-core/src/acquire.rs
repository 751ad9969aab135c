//! Contains the end-to-end logic for scanning one image to a file.
use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::error::ScanError;
use crate::negotiate::{self, AcquisitionParameters};
use crate::reader::{ReadOutcome, StreamingReader};
use crate::session::Session;
use crate::sink::{Sink, SinkReport};
use std::path::Path;
use tracing::debug;

/// Summary of a scan whose handshake succeeded.
#[derive(Debug)]
pub struct AcquisitionReport {
    pub parameters: AcquisitionParameters,
    /// Bytes received from the device, whether or not they reached the file.
    pub bytes: u64,
    pub outcome: ReadOutcome,
    pub sink: SinkReport,
}

/// Scans one image from `device` and writes it to `output` as PPM.
///
/// This is the main entry point for an acquisition. It performs the handshake
/// (init, open, start, parameter query), streams the image into the output
/// file, and tears the device down again, reporting progress via callbacks.
///
/// # Arguments
///
/// * `backend` - The device driver to scan through.
/// * `device` - Device identifier; empty selects the first available device.
/// * `output` - Destination file, or `None` to discard the data.
/// * `cancel` - Shared token an interrupt handler can use to abort the scan.
/// * `on_parameters` - Closure called once with the negotiated geometry,
///   before any data is read.
/// * `on_progress` - Closure called with the running number of bytes
///   received.
///
/// # Errors
///
/// Only handshake failures are errors. A transfer that ends with a device
/// error (including cancellation) or an output file that had to be removed is
/// reported through the returned [`AcquisitionReport`].
pub fn run<B, F>(
    backend: B,
    device: &str,
    output: Option<&Path>,
    cancel: CancelToken,
    on_parameters: impl FnOnce(&AcquisitionParameters),
    on_progress: F,
) -> Result<AcquisitionReport, ScanError>
where
    B: Backend,
    F: FnMut(u64),
{
    run_with_sink(
        backend,
        device,
        cancel,
        |params| {
            on_parameters(params);
            Sink::open_if_requested(output, params)
        },
        on_progress,
    )
}

/// Like [`run`], but the caller builds the [`Sink`] from the negotiated
/// geometry.
pub fn run_with_sink<B, F>(
    backend: B,
    device: &str,
    cancel: CancelToken,
    open_sink: impl FnOnce(&AcquisitionParameters) -> Sink,
    on_progress: F,
) -> Result<AcquisitionReport, ScanError>
where
    B: Backend,
    F: FnMut(u64),
{
    // Dropping the session on any early return closes the device.
    let mut session = Session::initialize(backend, cancel)?;
    session.open(device)?;
    negotiate::begin_acquisition(&mut session)?;
    let parameters = negotiate::get_parameters(&session)?;

    let mut sink = open_sink(&parameters);
    let mut reader = StreamingReader::new();
    let outcome = reader.drain(&mut session, &mut sink, on_progress);
    let sink = sink.into_report();

    session.close();
    session.shutdown();
    debug!(bytes = reader.total_bytes(), ?outcome, "acquisition finished");

    Ok(AcquisitionReport {
        parameters,
        bytes: reader.total_bytes(),
        outcome,
        sink,
    })
}
