//! Browser sessions backed by the Node.js Puppeteer helper.
//!
//! One helper process owns one browser. The [`Browser`] and its pages share
//! the helper's pipes behind a mutex; calls are strictly sequential.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::driver::{Browser, BrowserDriver, Page};
use super::puppeteer::{
    ensure_node_available, ensure_puppeteer_available, map_helper_error, map_spawn_error,
    PUPPETEER_HELPER_SCRIPT,
};
use crate::config::Settings;
use crate::options::OperationArgs;
use crate::{PpdfError, Result};

/// Default bound on the browser close sequence.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration options for the Puppeteer driver.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// The Node.js command to use (default: "node").
    pub node_command: String,
    /// Upper bound for closing the browser before the helper is killed.
    pub close_timeout: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl From<&Settings> for DriverOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            node_command: settings.node_command.clone(),
            close_timeout: settings.close_timeout,
        }
    }
}

/// Launches browsers through Puppeteer running under Node.js.
#[derive(Debug, Clone, Default)]
pub struct PuppeteerDriver {
    options: DriverOptions,
}

impl PuppeteerDriver {
    pub fn new(options: DriverOptions) -> Self {
        Self { options }
    }

    fn spawn_helper(&self) -> Result<Helper> {
        let mut cmd = Command::new(&self.options.node_command);
        cmd.arg("-e")
            .arg(PUPPETEER_HELPER_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| map_spawn_error(err, &self.options.node_command))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PpdfError::driver("Browser helper stdout unavailable"))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "ppdf::helper", "{line}");
                }
            });
        }

        Ok(Helper {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
        })
    }
}

#[async_trait]
impl BrowserDriver for PuppeteerDriver {
    async fn launch(&self, args: &OperationArgs) -> Result<Box<dyn Browser>> {
        // Fail fast if Node or Puppeteer is missing to avoid spawning the helper.
        ensure_node_available(&self.options.node_command).await?;
        ensure_puppeteer_available(&self.options.node_command).await?;

        let mut helper = self.spawn_helper()?;
        let launched = helper
            .call(
                "launch",
                None,
                args.positional_json(),
                args.keywords_json(),
            )
            .await;
        match launched {
            Ok(result) => {
                info!(
                    browser_pid = ?result.get("pid").and_then(serde_json::Value::as_u64),
                    "Browser launched"
                );
                Ok(Box::new(PuppeteerBrowser {
                    pid: helper.child.id(),
                    helper: Arc::new(Mutex::new(helper)),
                    close_timeout: self.options.close_timeout,
                }))
            }
            Err(err) => {
                helper.kill().await;
                Err(err)
            }
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    op: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u64>,
    args: Vec<serde_json::Value>,
    kwargs: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    status: String,
    #[serde(default)]
    result: serde_json::Value,
    message: Option<String>,
}

struct Helper {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl Helper {
    async fn call(
        &mut self,
        op: &str,
        page: Option<u64>,
        args: Vec<serde_json::Value>,
        kwargs: serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.next_id += 1;
        let id = self.next_id;
        let mut line = serde_json::to_string(&Request {
            id,
            op,
            page,
            args,
            kwargs,
        })?;
        line.push('\n');
        debug!(op, id, "Sending request to browser helper");

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| PpdfError::driver(format!("{op} failed: browser helper is closed")))?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| PpdfError::driver(format!("{op} failed: cannot reach browser helper: {e}")))?;
        stdin.flush().await?;

        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(PpdfError::driver(format!(
                    "{op} failed: browser helper exited unexpectedly"
                )));
            };
            let reply: Reply = match serde_json::from_str(&line) {
                Ok(reply) => reply,
                Err(_) => {
                    debug!(target: "ppdf::helper", "{line}");
                    continue;
                }
            };
            if reply.id != id {
                debug!(expected = id, got = reply.id, "Skipping stale helper reply");
                continue;
            }
            return match reply.status.as_str() {
                "ok" => Ok(reply.result),
                _ => Err(map_helper_error(
                    op,
                    reply.message.as_deref().unwrap_or("no additional details"),
                )),
            };
        }
    }

    /// Closes the browser, then lets the helper exit on stdin EOF.
    async fn shutdown(&mut self) -> Result<()> {
        self.call("close", None, Vec::new(), serde_json::Map::new())
            .await?;
        drop(self.stdin.take());
        let status = self.child.wait().await?;
        debug!(%status, "Browser helper exited");
        Ok(())
    }

    async fn kill(&mut self) {
        drop(self.stdin.take());
        if let Err(err) = self.child.kill().await {
            debug!(error = %err, "Browser helper already gone");
        }
    }
}

struct PuppeteerBrowser {
    /// The helper process; Chromium and its children run below it.
    pid: Option<u32>,
    helper: Arc<Mutex<Helper>>,
    close_timeout: Duration,
}

#[async_trait]
impl Browser for PuppeteerBrowser {
    fn process_id(&self) -> Option<u32> {
        self.pid
    }

    async fn new_page(&mut self) -> Result<Box<dyn Page>> {
        let result = self
            .helper
            .lock()
            .await
            .call("newPage", None, Vec::new(), serde_json::Map::new())
            .await?;
        let id = result
            .get("page")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| PpdfError::driver(format!("newPage returned no page id: {result}")))?;
        Ok(Box::new(PuppeteerPage {
            helper: Arc::clone(&self.helper),
            id,
            close_timeout: self.close_timeout,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        let mut helper = self.helper.lock().await;
        let outcome = timeout(self.close_timeout, helper.shutdown()).await;
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                helper.kill().await;
                Err(err)
            }
            Err(_) => {
                warn!(
                    "Browser close exceeded {:?}; killing helper",
                    self.close_timeout
                );
                helper.kill().await;
                Err(PpdfError::driver(format!(
                    "close failed: timed out after {:?}",
                    self.close_timeout
                )))
            }
        }
    }
}

struct PuppeteerPage {
    helper: Arc<Mutex<Helper>>,
    id: u64,
    close_timeout: Duration,
}

impl PuppeteerPage {
    async fn call(
        &self,
        op: &str,
        args: Vec<serde_json::Value>,
        kwargs: serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.helper
            .lock()
            .await
            .call(op, Some(self.id), args, kwargs)
            .await
    }

    async fn call_with(&self, op: &str, args: &OperationArgs) -> Result<serde_json::Value> {
        self.call(op, args.positional_json(), args.keywords_json())
            .await
    }
}

#[async_trait]
impl Page for PuppeteerPage {
    async fn goto(&mut self, url: &str, args: &OperationArgs) -> Result<()> {
        let mut positional = vec![serde_json::Value::String(url.to_string())];
        positional.extend(args.positional_json());
        self.call("goto", positional, args.keywords_json()).await?;
        Ok(())
    }

    async fn set_content(&mut self, html: &str) -> Result<()> {
        self.call(
            "setContent",
            vec![serde_json::Value::String(html.to_string())],
            serde_json::Map::new(),
        )
        .await?;
        Ok(())
    }

    async fn emulate_media(&mut self, args: &OperationArgs) -> Result<()> {
        self.call_with("emulateMedia", args).await?;
        Ok(())
    }

    async fn wait_for_navigation(&mut self, args: &OperationArgs) -> Result<()> {
        self.call_with("waitForNavigation", args).await?;
        Ok(())
    }

    async fn wait_for(&mut self, args: &OperationArgs) -> Result<()> {
        self.call_with("waitFor", args).await?;
        Ok(())
    }

    async fn pdf(&mut self, args: &OperationArgs) -> Result<Vec<u8>> {
        let result = self.call_with("pdf", args).await?;
        let encoded = result.as_str().unwrap_or_default();
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| PpdfError::driver(format!("pdf failed: undecodable payload: {e}")))
    }

    /// Bounded like the browser close; a helper stuck on it is killed.
    async fn close(&mut self) -> Result<()> {
        let outcome = timeout(
            self.close_timeout,
            self.call("closePage", Vec::new(), serde_json::Map::new()),
        )
        .await;
        match outcome {
            Ok(result) => result.map(|_| ()),
            Err(_) => {
                warn!(
                    "Page close exceeded {:?}; killing helper",
                    self.close_timeout
                );
                self.helper.lock().await.kill().await;
                Err(PpdfError::driver(format!(
                    "closePage failed: timed out after {:?}",
                    self.close_timeout
                )))
            }
        }
    }
}
