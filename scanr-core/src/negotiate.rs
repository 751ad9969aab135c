//! Starting an acquisition and pinning down its geometry.
use crate::backend::{Backend, DeviceHandle, RawParameters};
use crate::error::{ParameterError, ScanError, Status};
use crate::session::Session;
use tracing::debug;

/// Maximum sample value written to the output header. Fixed for 8-bit RGB.
pub const MAX_VALUE: u16 = 255;

/// Validated geometry of the transfer in progress.
///
/// Frozen once retrieved: the header is written from these values and they
/// are never re-queried mid-stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquisitionParameters {
    /// Pixels per line.
    pub width: u32,
    /// Number of lines.
    pub height: u32,
    pub bytes_per_line: u32,
    /// Bits per sample.
    pub depth: u32,
    pub max_value: u16,
}

impl AcquisitionParameters {
    /// Total raster bytes the device is expected to deliver.
    pub fn expected_bytes(&self) -> u64 {
        u64::from(self.bytes_per_line) * u64::from(self.height)
    }
}

impl TryFrom<RawParameters> for AcquisitionParameters {
    type Error = ParameterError;

    fn try_from(raw: RawParameters) -> Result<Self, Self::Error> {
        let invalid = ParameterError::InvalidGeometry {
            width: raw.pixels_per_line,
            height: raw.lines,
        };
        let (Ok(width), Ok(height)) = (u32::try_from(raw.pixels_per_line), u32::try_from(raw.lines))
        else {
            return Err(invalid);
        };
        if width == 0 || height == 0 {
            return Err(invalid);
        }

        let depth = u32::try_from(raw.depth).ok().filter(|&d| d > 0).unwrap_or(8);
        let bytes_per_line = u32::try_from(raw.bytes_per_line)
            .ok()
            .filter(|&b| b > 0)
            .unwrap_or_else(|| width.saturating_mul(3));

        Ok(Self {
            width,
            height,
            bytes_per_line,
            depth,
            max_value: MAX_VALUE,
        })
    }
}

/// Signals the device to start producing data.
///
/// # Errors
///
/// Returns [`ScanError::Start`] with the device status (busy, no documents,
/// jammed, I/O fault, ...), or with [`Status::Inval`] if no handle is open.
/// The session still owns the handle and closes it on drop.
pub fn begin_acquisition<B: Backend>(session: &mut Session<B>) -> Result<(), ScanError> {
    let handle = session
        .handle_mut()
        .ok_or(ScanError::Start(Status::Inval))?;
    handle.start().map_err(ScanError::Start)?;

    session.mark_started();
    debug!("acquisition started");
    Ok(())
}

/// Queries and validates the geometry of the started acquisition.
///
/// # Errors
///
/// Returns [`ParameterError::NotStarted`] before a successful
/// [`begin_acquisition`], [`ParameterError::Device`] if the query itself
/// fails, and [`ParameterError::InvalidGeometry`] for non-positive
/// dimensions.
pub fn get_parameters<B: Backend>(
    session: &Session<B>,
) -> Result<AcquisitionParameters, ParameterError> {
    let handle = match session.handle() {
        Some(handle) if session.is_started() => handle,
        _ => return Err(ParameterError::NotStarted),
    };

    let raw = handle.parameters().map_err(ParameterError::Device)?;
    let params = AcquisitionParameters::try_from(raw)?;
    debug!(
        width = params.width,
        height = params.height,
        bytes_per_line = params.bytes_per_line,
        "parameters negotiated"
    );
    Ok(params)
}
