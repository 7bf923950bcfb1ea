//! Delivery of exported PDF bytes.

use std::fs;
use std::io::Write;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::Result;

/// Prefix of the inline payload printed when no output path is given.
pub const PDF_DATA_URI_PREFIX: &str = "data:application/pdf;base64,";

/// Encodes PDF bytes as a `data:` URI.
pub fn pdf_data_uri(bytes: &[u8]) -> String {
    format!("{PDF_DATA_URI_PREFIX}{}", STANDARD.encode(bytes))
}

/// Writes the PDF to `out`, or the data URI to `stdout` when no path is given.
///
/// The browser normally writes `out` itself through the `pdf` `path`
/// keyword; the file is only rewritten here when its contents differ from
/// the exported bytes, so a stale file from an earlier run never survives.
pub fn write_pdf(bytes: &[u8], out: Option<&Path>, stdout: &mut impl Write) -> Result<()> {
    match out {
        Some(path) if written_by_browser(path, bytes) => {
            debug!(path = %path.display(), "PDF already written by browser");
        }
        Some(path) => {
            fs::write(path, bytes)?;
            debug!(path = %path.display(), bytes = bytes.len(), "Wrote PDF");
        }
        None => {
            writeln!(stdout, "{}", pdf_data_uri(bytes))?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn written_by_browser(path: &Path, bytes: &[u8]) -> bool {
    fs::read(path).is_ok_and(|existing| existing == bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_is_base64_with_prefix() {
        assert_eq!(
            pdf_data_uri(b"%PDF-1.4"),
            "data:application/pdf;base64,JVBERi0xLjQ="
        );
    }

    #[test]
    fn without_path_prints_data_uri() {
        let mut stdout = Vec::new();
        write_pdf(b"%PDF", None, &mut stdout).unwrap();
        let printed = String::from_utf8(stdout).unwrap();
        assert_eq!(printed, "data:application/pdf;base64,JVBERg==\n");
    }

    #[test]
    fn missing_file_is_written_from_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let mut stdout = Vec::new();
        write_pdf(b"%PDF-fallback", Some(&path), &mut stdout).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-fallback");
        assert!(stdout.is_empty());
    }

    #[test]
    fn file_written_by_browser_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        fs::write(&path, b"%PDF-from-browser").unwrap();
        let modified = fs::metadata(&path).unwrap().modified().unwrap();
        write_pdf(b"%PDF-from-browser", Some(&path), &mut Vec::new()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-from-browser");
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn stale_file_from_earlier_run_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        fs::write(&path, b"%PDF-stale").unwrap();
        write_pdf(b"%PDF-fresh", Some(&path), &mut Vec::new()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-fresh");
    }
}
