//! The core, UI-agnostic library for the `scanr` scanning utility.
//!
//! `scanr-core` drives one image acquisition from a scanner: it performs the
//! device handshake, negotiates the image geometry, streams the raster data in
//! bounded chunks into a PPM file, and tears the device down again on every
//! path, including user cancellation. Front-ends (like the `scanr` CLI) supply
//! the device driver, a cancellation token, and progress callbacks.
//!
//! The library is structured into several key modules:
//! - [`backend`]: The `Backend` / `DeviceHandle` traits a device driver implements.
//! - [`session`]: Ownership of the open device handle.
//! - [`negotiate`]: Starting the acquisition and validating its geometry.
//! - [`reader`]: The chunked streaming loop.
//! - [`sink`]: The PPM output file.
//! - [`cancel`]: Advisory cancellation shared with an interrupt handler.
//! - [`pattern`]: A virtual test-pattern scanner.
//!
//! The primary entry point is [`acquire::run`], which reports progress via
//! callbacks so the calling application can display it however it likes.
//!
//! ## Example: Scanning the Test Pattern with Progress Reporting
//!
//! ```rust,no_run
//! use scanr_core::acquire;
//! use scanr_core::cancel::{CancelToken, CancellationController};
//! use scanr_core::pattern::{PatternBackend, PatternConfig};
//! use std::path::Path;
//!
//! // Hand a controller to your interrupt handler; it aborts the open device.
//! let token = CancelToken::new();
//! let _controller = CancellationController::new(token.clone());
//!
//! let report = acquire::run(
//!     PatternBackend::new(PatternConfig::default()),
//!     "",
//!     Some(Path::new("scan.ppm")),
//!     token,
//!     |params| println!("image size: {}x{}", params.width, params.height),
//!     |bytes| println!("{} bytes received", bytes),
//! )?;
//!
//! println!("{} bytes of data received", report.bytes);
//! # Ok::<(), scanr_core::error::ScanError>(())
//! ```

pub mod acquire;
pub mod backend;
pub mod cancel;
pub mod device;
pub mod error;
pub mod negotiate;
pub mod pattern;
pub mod reader;
pub mod session;
pub mod sink;
