use thiserror::Error;
use url::ParseError;

use crate::literal::LiteralError;

#[derive(Debug, Error)]
pub enum PpdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid options literal: {0}")]
    Literal(#[from] LiteralError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("PDF export returned no data")]
    EmptyOutput,

    #[error("Conversion interrupted")]
    Interrupted,
}

impl PpdfError {
    pub fn driver(message: impl Into<String>) -> Self {
        PpdfError::Driver(message.into())
    }

    /// A short hint on how to fix the error.
    pub fn remediation(&self) -> &'static str {
        match self {
            PpdfError::Io(_) => "Check file paths/permissions.",
            PpdfError::InvalidUrl(_) => {
                "Pass an absolute URL (e.g., https://example.com) or the path of an existing file."
            }
            PpdfError::Serialization(_) => "Run with --verbose and inspect the driver exchange.",
            PpdfError::Literal(_) => {
                "Check --args/--upd syntax, e.g. \"{pdf={printBackground=True}, waitFor=[1000]}\"."
            }
            PpdfError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("puppeteer") {
                    "Install Puppeteer (e.g., `npm install puppeteer`) so that `require('puppeteer')` works."
                } else if lower.contains("not found on path") || lower.contains("node command") {
                    "Install Node.js and ensure the node binary is on PATH (or set node_command in --config)."
                } else if lower.contains("load mode") || lower.contains("no page") {
                    "Pass a page URL/path, or pipe HTML on stdin; --goto temp also needs --dir or --out."
                } else {
                    "Check flags, --args/--upd literals and the --config file."
                }
            }
            PpdfError::Driver(msg) => {
                if msg.to_ascii_lowercase().contains("timeout") {
                    "Increase goto/waitFor timeouts via --upd, e.g. \"{goto={timeout=200000}}\"."
                } else {
                    "Re-run with --verbose to see the browser driver log."
                }
            }
            PpdfError::EmptyOutput => {
                "The browser rendered nothing; check the page loads and the pdf options are valid."
            }
            PpdfError::Interrupted => "Browser resources were released; re-run to convert.",
        }
    }
}

pub type Result<T> = std::result::Result<T, PpdfError>;
