//! A virtual scanner that produces an RGB test pattern.
//!
//! Useful for exercising the whole acquisition path without hardware: it
//! honours the same open, start, read and abort contract as a real driver.
use crate::backend::{Backend, DeviceHandle, RawParameters, ReadStatus};
use crate::cancel::CancelToken;
use crate::device::DeviceInfo;
use crate::error::Status;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// The only device name this backend answers to.
pub const DEVICE_NAME: &str = "pattern";

const BYTES_PER_PIXEL: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatternConfig {
    pub width: u32,
    pub height: u32,
    /// Pause before every chunk, to mimic a slow device.
    pub chunk_delay: Duration,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            width: 850,
            height: 1100,
            chunk_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct PatternBackend {
    config: PatternConfig,
    in_use: Arc<AtomicBool>,
}

impl PatternBackend {
    pub fn new(config: PatternConfig) -> Self {
        Self {
            config,
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Backend for PatternBackend {
    type Handle = PatternHandle;

    fn init(&mut self) -> Result<(), Status> {
        debug!(config = ?self.config, "pattern backend ready");
        Ok(())
    }

    fn open(&mut self, name: &str, cancel: CancelToken) -> Result<PatternHandle, Status> {
        if !name.is_empty() && name != DEVICE_NAME {
            return Err(Status::Inval);
        }
        if self.in_use.swap(true, Ordering::SeqCst) {
            return Err(Status::DeviceBusy);
        }

        Ok(PatternHandle {
            config: self.config,
            cancel,
            in_use: self.in_use.clone(),
            scanning: false,
            position: 0,
        })
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        vec![DeviceInfo {
            name: DEVICE_NAME.to_string(),
            vendor: "scanr".to_string(),
            model: "Test pattern".to_string(),
            kind: "virtual device".to_string(),
        }]
    }

    fn exit(&mut self) {}
}

#[derive(Debug)]
pub struct PatternHandle {
    config: PatternConfig,
    cancel: CancelToken,
    in_use: Arc<AtomicBool>,
    scanning: bool,
    position: u64,
}

impl PatternHandle {
    fn bytes_per_line(&self) -> u64 {
        u64::from(self.config.width) * u64::from(BYTES_PER_PIXEL)
    }

    fn total_bytes(&self) -> u64 {
        self.bytes_per_line() * u64::from(self.config.height)
    }

    /// Horizontal red ramp, vertical green ramp, blue checkerboard.
    fn sample(&self, offset: u64) -> u8 {
        let bpl = self.bytes_per_line();
        let y = offset / bpl;
        let x = (offset % bpl) / u64::from(BYTES_PER_PIXEL);
        let ramp = |v: u64, extent: u32| (v * 255 / u64::from(extent.max(2) - 1)) as u8;

        match offset % u64::from(BYTES_PER_PIXEL) {
            0 => ramp(x, self.config.width),
            1 => ramp(y, self.config.height),
            _ => {
                if (x / 16 + y / 16) % 2 == 0 {
                    0xff
                } else {
                    0x00
                }
            }
        }
    }
}

impl DeviceHandle for PatternHandle {
    fn start(&mut self) -> Result<(), Status> {
        if self.scanning || self.config.width == 0 || self.config.height == 0 {
            return Err(Status::Inval);
        }
        self.scanning = true;
        self.position = 0;
        Ok(())
    }

    fn parameters(&self) -> Result<RawParameters, Status> {
        let clamp = |v: u64| i32::try_from(v).unwrap_or(i32::MAX);
        Ok(RawParameters {
            pixels_per_line: clamp(self.config.width.into()),
            lines: clamp(self.config.height.into()),
            bytes_per_line: clamp(self.bytes_per_line()),
            depth: 8,
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<ReadStatus, Status> {
        if !self.scanning {
            return Err(Status::Inval);
        }
        if self.cancel.is_abort_requested() {
            self.scanning = false;
            return Err(Status::Cancelled);
        }
        if !self.config.chunk_delay.is_zero() {
            thread::sleep(self.config.chunk_delay);
        }

        let remaining = self.total_bytes() - self.position;
        let n = remaining.min(buf.len() as u64) as usize;
        for (i, byte) in buf[..n].iter_mut().enumerate() {
            *byte = self.sample(self.position + i as u64);
        }
        self.position += n as u64;

        if self.position == self.total_bytes() {
            self.scanning = false;
            Ok(ReadStatus::Done(n))
        } else {
            Ok(ReadStatus::Data(n))
        }
    }

    fn close(&mut self) {
        self.scanning = false;
        self.in_use.store(false, Ordering::SeqCst);
    }
}
