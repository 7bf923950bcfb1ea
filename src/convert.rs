//! HTML to PDF conversion through a headless browser.
//!
//! One call of [`Converter::convert`] picks a [`LoadMode`], launches the
//! browser, loads the content, runs the optional media/wait steps, exports
//! the PDF and then always releases what it acquired: the temp file, the
//! page, the browser and any processes left in the browser's process tree.
//! Only the first error of the conversion itself reaches the caller; teardown
//! errors are logged and dropped.
//!
//! [`Converter::convert_until`] also stops at an interrupt (Ctrl-C in the
//! binary) and releases everything before returning. A conversion future that
//! is dropped mid-flight releases what it can synchronously.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{
    default_process_group, reap, Browser, BrowserDriver, Page, ProcessGroup, ProcessHandle,
    DEFAULT_CLOSE_TIMEOUT,
};
use crate::config::{Configuration, ReapTimeouts};
use crate::options::{Operation, OperationArgs};
use crate::value::{Map, Value};
use crate::{PpdfError, Result};

/// Name of the HTML file written in `temp` mode.
pub const TEMP_FILE_NAME: &str = "__temp__.html";

/// How content gets into the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Navigate to the URL (local paths become `file://` URLs).
    Url,
    /// Inject the HTML into the page directly.
    SetContent,
    /// Write the HTML to a temp file and navigate to it.
    Temp,
    /// Navigate to a `data:text/html,` URL. Unreliable for some content.
    DataTextHtml,
}

impl LoadMode {
    pub const ALL: [LoadMode; 4] = [
        LoadMode::Url,
        LoadMode::SetContent,
        LoadMode::Temp,
        LoadMode::DataTextHtml,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LoadMode::Url => "url",
            LoadMode::SetContent => "setContent",
            LoadMode::Temp => "temp",
            LoadMode::DataTextHtml => "data-text-html",
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller inputs of one conversion.
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    /// Remote URL or local file path. Wins over `html` and over `goto.url`.
    pub url: Option<String>,
    /// Raw HTML source.
    pub html: Option<String>,
    /// Where the PDF is written; injected as the `pdf` `path` keyword.
    pub output: Option<PathBuf>,
    /// Directory for the `temp` mode file; defaults to the output's directory.
    pub dir: Option<PathBuf>,
    /// Preferred load mode. Falls back when it cannot be satisfied.
    pub mode: Option<LoadMode>,
}

impl ConversionRequest {
    fn temp_dir(&self) -> Option<PathBuf> {
        self.dir.clone().or_else(|| {
            self.output.as_deref().map(|out| match out.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            })
        })
    }
}

/// Resolved content source.
#[derive(Debug, Clone, PartialEq)]
enum Load<'a> {
    Url(Cow<'a, str>),
    SetContent(&'a str),
    Temp { html: &'a str, dir: PathBuf },
    DataTextHtml(&'a str),
}

impl Load<'_> {
    fn mode(&self) -> LoadMode {
        match self {
            Load::Url(_) => LoadMode::Url,
            Load::SetContent(_) => LoadMode::SetContent,
            Load::Temp { .. } => LoadMode::Temp,
            Load::DataTextHtml(_) => LoadMode::DataTextHtml,
        }
    }
}

fn resolve_load<'a>(
    url: Option<&'a str>,
    html: Option<&'a str>,
    hint: Option<LoadMode>,
    dir: Option<&Path>,
) -> Result<Load<'a>> {
    let candidate = |mode: LoadMode| -> Option<Load<'a>> {
        match mode {
            LoadMode::Url => url.map(|url| Load::Url(Cow::Borrowed(url))),
            LoadMode::SetContent => html.map(Load::SetContent),
            LoadMode::Temp => Some(Load::Temp {
                html: html?,
                dir: dir?.to_path_buf(),
            }),
            LoadMode::DataTextHtml => html.map(Load::DataTextHtml),
        }
    };

    if let Some(load) = hint.and_then(&candidate) {
        return Ok(load);
    }
    let fallback = candidate(LoadMode::Url).or_else(|| candidate(LoadMode::SetContent));
    match (fallback, hint) {
        (Some(load), Some(hint)) => {
            warn!(
                requested = %hint,
                using = %load.mode(),
                "Requested load mode cannot be satisfied with the given inputs"
            );
            Ok(load)
        }
        (Some(load), None) => Ok(load),
        (None, _) => Err(PpdfError::Config(format!(
            "No load mode applies: no page URL or HTML given (mode hint: {}, dir: {})",
            hint.map(LoadMode::as_str).unwrap_or("none"),
            if dir.is_some() { "set" } else { "unset" }
        ))),
    }
}

/// Picks the load mode for the given inputs.
///
/// A hint is honoured when its inputs are present (`temp` also needs a
/// directory). Otherwise `url` is used when a URL is given, then
/// `setContent` when HTML is given. Without either it is an error.
pub fn resolve_mode(
    url: Option<&str>,
    html: Option<&str>,
    hint: Option<LoadMode>,
    dir: Option<&Path>,
) -> Result<LoadMode> {
    resolve_load(url, html, hint, dir).map(|load| load.mode())
}

/// Existing local paths become `file://` URLs; anything else must be an
/// absolute URL.
pub fn navigation_url(target: &str) -> Result<String> {
    let path = Path::new(target);
    if path.exists() {
        return file_url(path);
    }
    Ok(Url::parse(target)?.into())
}

fn file_url(path: &Path) -> Result<String> {
    let absolute = path.canonicalize()?;
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|_| {
            PpdfError::Config(format!(
                "Cannot express {} as a file URL",
                absolute.display()
            ))
        })
}

/// HTML written to disk for the `temp` mode. Removed on drop as well, so an
/// abandoned conversion does not leave it behind.
#[derive(Debug)]
struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    fn write(dir: &Path, html: &str) -> Result<Self> {
        let path = dir.join(TEMP_FILE_NAME);
        fs::write(&path, html)?;
        debug!(path = %path.display(), "Wrote temp HTML");
        Ok(Self { path })
    }

    fn url(&self) -> Result<String> {
        file_url(&self.path)
    }

    fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed temp HTML"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "Failed to remove temp HTML"),
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.path.exists() {
            self.remove();
        }
    }
}

/// Everything a conversion acquired, released in order by
/// [`Resources::release`]. Whatever is still held on drop is released
/// without waiting: the temp file is removed, the driver handles are dropped
/// and tracked processes are killed.
struct Resources<'a> {
    group: &'a dyn ProcessGroup,
    reap_timeouts: ReapTimeouts,
    close_timeout: Duration,
    root: Option<u32>,
    temp: Option<TempArtifact>,
    page: Option<Box<dyn Page>>,
    browser: Option<Box<dyn Browser>>,
    processes: Vec<ProcessHandle>,
}

impl<'a> Resources<'a> {
    fn new(converter: &'a Converter) -> Self {
        Self {
            group: converter.processes.as_ref(),
            reap_timeouts: converter.reap_timeouts,
            close_timeout: converter.close_timeout,
            root: None,
            temp: None,
            page: None,
            browser: None,
            processes: Vec::new(),
        }
    }

    fn is_released(&self) -> bool {
        self.temp.is_none()
            && self.page.is_none()
            && self.browser.is_none()
            && self.processes.is_empty()
    }

    /// Launches the browser and opens one page, recording the browser's
    /// process tree after each step.
    async fn open(&mut self, driver: &dyn BrowserDriver, launch: &OperationArgs) -> Result<()> {
        self.root = self
            .browser
            .insert(driver.launch(launch).await?)
            .process_id();
        self.track();
        if let Some(browser) = self.browser.as_mut() {
            self.page = Some(browser.new_page().await?);
            self.track();
        }
        Ok(())
    }

    /// Adds processes now running under the browser's root to the tracked set.
    fn track(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        for process in self.group.snapshot(root) {
            if !self.processes.contains(&process) {
                self.processes.push(process);
            }
        }
    }

    async fn release(&mut self) {
        self.track();
        if let Some(temp) = self.temp.take() {
            temp.remove();
        }
        if let Some(mut page) = self.page.take() {
            match timeout(self.close_timeout, page.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!(error = %err, "Ignoring page close failure"),
                Err(_) => warn!(timeout = ?self.close_timeout, "Page close timed out"),
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(err) = browser.close().await {
                warn!(error = %err, "Browser close failed");
            }
        }
        if !self.processes.is_empty() {
            let report = reap(self.group, &self.processes, self.reap_timeouts).await;
            debug!(
                tracked = self.processes.len(),
                exited = report.exited,
                terminated = report.terminated,
                killed = report.killed,
                "Reaped browser processes"
            );
            self.processes.clear();
        }
    }
}

impl Drop for Resources<'_> {
    fn drop(&mut self) {
        if self.is_released() {
            return;
        }
        warn!("Conversion abandoned; releasing browser resources without waiting");
        self.track();
        // Dropping the handles removes the temp file and kills the helper.
        self.temp = None;
        self.page = None;
        self.browser = None;
        let group = self.group;
        for process in self.processes.drain(..) {
            if group.is_alive(&process) {
                if let Err(err) = group.kill(&process) {
                    warn!(pid = process.pid, error = %err, "Failed to kill process");
                }
            }
        }
    }
}

/// Runs conversions with one driver.
pub struct Converter {
    driver: Box<dyn BrowserDriver>,
    processes: Box<dyn ProcessGroup>,
    reap_timeouts: ReapTimeouts,
    close_timeout: Duration,
}

impl Converter {
    pub fn new(driver: impl BrowserDriver + 'static) -> Self {
        Self {
            driver: Box::new(driver),
            processes: default_process_group(),
            reap_timeouts: ReapTimeouts::default(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    pub fn with_process_group(mut self, group: impl ProcessGroup + 'static) -> Self {
        self.processes = Box::new(group);
        self
    }

    pub fn with_reap_timeouts(mut self, timeouts: ReapTimeouts) -> Self {
        self.reap_timeouts = timeouts;
        self
    }

    /// Upper bound for closing the page during cleanup.
    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    /// Converts one page and returns the PDF bytes.
    ///
    /// Inputs are checked before any browser resource is acquired. All
    /// resources are released before this returns, on every path.
    pub async fn convert(
        &self,
        config: &Configuration,
        request: &ConversionRequest,
    ) -> Result<Vec<u8>> {
        self.convert_until(config, request, std::future::pending())
            .await
    }

    /// Like [`Converter::convert`], but gives up with
    /// [`PpdfError::Interrupted`] once `interrupt` completes. Resources are
    /// released before this returns in that case too.
    pub async fn convert_until<F>(
        &self,
        config: &Configuration,
        request: &ConversionRequest,
        interrupt: F,
    ) -> Result<Vec<u8>>
    where
        F: Future<Output = ()>,
    {
        let url = request.url.as_deref().or_else(|| config.goto_url());
        let dir = request.temp_dir();
        let load = match resolve_load(url, request.html.as_deref(), request.mode, dir.as_deref())? {
            Load::Url(target) => Load::Url(Cow::Owned(navigation_url(&target)?)),
            load => load,
        };
        info!(mode = %load.mode(), "Converting page to PDF");

        let mut resources = Resources::new(self);
        let outcome = tokio::select! {
            outcome = self.run(config, request, load, &mut resources) => outcome,
            () = interrupt => {
                warn!("Conversion interrupted; releasing browser resources");
                Err(PpdfError::Interrupted)
            }
        };
        resources.release().await;
        outcome
    }

    async fn run(
        &self,
        config: &Configuration,
        request: &ConversionRequest,
        load: Load<'_>,
        resources: &mut Resources<'_>,
    ) -> Result<Vec<u8>> {
        let always = Value::Map(Map::new());

        let launch = config
            .args(Operation::Launch, Some(&always))
            .unwrap_or_default();
        resources.open(self.driver.as_ref(), &launch).await?;
        let Some(page) = resources.page.as_mut() else {
            return Err(PpdfError::driver("newPage failed: no page was opened"));
        };

        let mut goto = config
            .args(Operation::Goto, Some(&always))
            .unwrap_or_default();
        goto.keywords.remove("url");

        match load {
            Load::Url(target) => page.goto(&target, &goto).await?,
            Load::SetContent(html) => page.set_content(html).await?,
            Load::Temp { html, dir } => {
                let artifact = resources.temp.insert(TempArtifact::write(&dir, html)?);
                page.goto(&artifact.url()?, &goto).await?
            }
            Load::DataTextHtml(html) => {
                warn!("data-text-html load mode may break on pages containing '#' or '%'");
                page.goto(&format!("data:text/html,{html}"), &goto).await?
            }
        }

        if let Some(args) = config.args(Operation::EmulateMedia, None) {
            page.emulate_media(&args).await?;
        }
        if let Some(args) = config.args(Operation::WaitForNavigation, None) {
            page.wait_for_navigation(&args).await?;
        }
        if let Some(args) = config.args(Operation::WaitFor, None) {
            page.wait_for(&args).await?;
        }

        let mut pdf = OperationArgs {
            positional: Vec::new(),
            keywords: config
                .args(Operation::Pdf, Some(&always))
                .unwrap_or_default()
                .keywords,
        };
        if let Some(output) = &request.output {
            pdf.set_default_keyword("path", output.to_string_lossy().into_owned());
        }
        let bytes = page.pdf(&pdf).await?;
        if bytes.is_empty() {
            return Err(PpdfError::EmptyOutput);
        }
        info!(bytes = bytes.len(), "PDF exported");
        Ok(bytes)
    }
}
