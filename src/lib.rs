//! ppdf Library
//!
//! Converts HTML documents to PDF through a headless browser. Browser calls
//! are parameterized by a nested options tree written in a relaxed literal
//! notation, deep-merged over built-in defaults.
//!
//! # Module Overview
//!
//! - [`literal`] - Parser for the relaxed option literal notation
//! - [`value`] - The option tree the parser produces
//! - [`options`] - Per-operation argument extraction
//! - [`merge`] - Recursive overlay of option trees
//! - [`config`] - Option normalization and the TOML settings file
//! - [`convert`] - The conversion state machine and its cleanup
//! - [`browser`] - Driver traits, the Puppeteer helper and process reaping
//! - [`output`] - PDF delivery to a file or stdout
//! - [`mathjax`] - MathJax script substitution for input HTML
//!
//! # Example
//!
//! ```no_run
//! use ppdf_lib::{normalize, ConversionRequest, Converter, PuppeteerDriver};
//!
//! # async fn example() -> ppdf_lib::Result<()> {
//! let config = normalize(None, Some("{pdf={format='A4'}, waitFor=[500]}".into()))?;
//! let request = ConversionRequest {
//!     url: Some("https://example.com".to_string()),
//!     output: Some("example.pdf".into()),
//!     ..ConversionRequest::default()
//! };
//! Converter::new(PuppeteerDriver::default())
//!     .convert(&config, &request)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod config;
pub mod convert;
pub mod error;
pub mod literal;
pub mod mathjax;
pub mod merge;
pub mod options;
pub mod output;
pub mod value;

pub use browser::{
    Browser, BrowserDriver, DriverOptions, NoopProcessGroup, Page, ProcessGroup, PuppeteerDriver,
    DEFAULT_CLOSE_TIMEOUT,
};
pub use config::{normalize, Configuration, RawConfig, ReapTimeouts, Settings, DEFAULT_ARGS};
pub use convert::{navigation_url, resolve_mode, ConversionRequest, Converter, LoadMode};
pub use error::{PpdfError, Result};
pub use literal::{parse, LiteralError};
pub use mathjax::{replace_mathjax, DEFAULT_MATHJAX_URL};
pub use merge::{merge, merge_into};
pub use options::{extract, Operation, OperationArgs, OperationSpec};
pub use output::{pdf_data_uri, write_pdf};
pub use value::{Key, Map, Value};
