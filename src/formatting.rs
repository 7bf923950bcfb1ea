use std::process::ExitCode;

use ppdf_lib::PpdfError;

/// Exit code for every fatal error.
pub const FATAL_EXIT_CODE: u8 = 2;

/// Exit code after Ctrl-C (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Format an error with its remediation hint.
pub fn format_error(err: &PpdfError) -> String {
    format!("Error: {err}\nHint: {}", err.remediation())
}

/// Render an error to stderr and return its exit code.
pub fn render_error(err: PpdfError) -> ExitCode {
    eprintln!("{}", format_error(&err));
    match err {
        PpdfError::Interrupted => ExitCode::from(INTERRUPTED_EXIT_CODE),
        _ => ExitCode::from(FATAL_EXIT_CODE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_includes_message_and_hint() {
        let rendered = format_error(&PpdfError::EmptyOutput);
        assert_eq!(
            rendered.lines().next(),
            Some("Error: PDF export returned no data")
        );
        assert!(rendered.contains("\nHint: The browser rendered nothing"));
    }

    #[test]
    fn render_error_returns_fatal_exit_code() {
        let code = render_error(PpdfError::Config("boom".to_string()));
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn interrupted_exits_like_sigint() {
        assert_eq!(render_error(PpdfError::Interrupted), ExitCode::from(130));
    }
}
