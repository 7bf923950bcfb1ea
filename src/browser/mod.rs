//! Headless browser automation for PDF export.
//!
//! # Module Structure
//!
//! - [`driver`] - Driver traits the converter talks to
//! - [`session`] - Puppeteer-backed driver running a Node.js helper
//! - [`puppeteer`] - Helper script, error mapping and availability checks
//! - [`process`] - Snapshot and reaping of leftover browser processes
//!
//! # Example
//!
//! ```no_run
//! use ppdf_lib::{normalize, ConversionRequest, Converter, PuppeteerDriver};
//!
//! # async fn example() -> ppdf_lib::Result<()> {
//! let converter = Converter::new(PuppeteerDriver::default());
//! let config = normalize(None, None)?;
//! let request = ConversionRequest {
//!     html: Some("<p>hi</p>".to_string()),
//!     ..ConversionRequest::default()
//! };
//! let pdf = converter.convert(&config, &request).await?;
//! assert!(pdf.starts_with(b"%PDF"));
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod process;
mod puppeteer;
mod session;

pub use driver::{Browser, BrowserDriver, Page};
pub use process::{
    default_process_group, reap, NoopProcessGroup, ProcessGroup, ProcessHandle, ReapReport,
};
#[cfg(target_os = "linux")]
pub use process::ProcfsProcessGroup;
pub use session::{DriverOptions, PuppeteerDriver, DEFAULT_CLOSE_TIMEOUT};
