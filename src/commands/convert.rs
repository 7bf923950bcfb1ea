use std::io::{IsTerminal, Read};
use std::process::ExitCode;

use ppdf_lib::{
    normalize, replace_mathjax, write_pdf, ConversionRequest, Converter, DriverOptions, PpdfError,
    PuppeteerDriver,
};
use tracing::{debug, error, warn};

use crate::cli::Cli;
use crate::formatting::render_error;
use crate::settings::{load_settings, resolve_options};

/// Run the conversion command.
pub async fn run_convert(cli: Cli) -> ExitCode {
    match convert(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => render_error(err),
    }
}

async fn convert(cli: Cli) -> Result<(), PpdfError> {
    let settings = load_settings(cli.config.as_deref())?;
    let options = resolve_options(cli.args, cli.upd, &settings);
    let config = normalize(options.args, options.upd)?;
    debug!(%config, "Normalized browser options");

    let html = match &cli.page {
        Some(_) => {
            if cli.mathjax.is_some() {
                warn!("--mathjax only applies to HTML read from stdin; ignoring it");
            }
            None
        }
        None => read_stdin_html()?.map(|html| match &cli.mathjax {
            Some(url) => replace_mathjax(&html, url).into_owned(),
            None => html,
        }),
    };

    let request = ConversionRequest {
        url: cli.page,
        html,
        output: cli.out,
        dir: cli.dir,
        mode: cli.goto.map(Into::into),
    };
    let converter = Converter::new(PuppeteerDriver::new(DriverOptions::from(&settings)))
        .with_reap_timeouts(settings.reap)
        .with_close_timeout(settings.close_timeout);
    let pdf = converter
        .convert_until(&config, &request, interrupted())
        .await?;

    write_pdf(&pdf, request.output.as_deref(), &mut std::io::stdout().lock())
}

/// Completes on Ctrl-C. Never completes if the handler cannot be installed.
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("Received Ctrl-C, shutting down"),
        Err(err) => {
            error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

/// Reads HTML from stdin unless it is a terminal or empty.
fn read_stdin_html() -> Result<Option<String>, PpdfError> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut html = String::new();
    stdin.read_to_string(&mut html)?;
    if html.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(html))
}
