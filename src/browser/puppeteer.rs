//! Puppeteer integration through a Node.js helper process.
//!
//! This module contains the inline helper script, error mapping,
//! and availability checks for Node.js and Puppeteer.

use crate::{PpdfError, Result};
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Helper speaking JSON lines on stdin/stdout.
///
/// Each request is `{id, op, page?, args, kwargs}`; positional args are spread
/// and non-empty kwargs are appended as the trailing options object. Replies
/// are `{id, status, result?, message?}`. PDF data is returned base64 encoded.
pub(crate) const PUPPETEER_HELPER_SCRIPT: &str = r#"
const readline = require('readline');

let browser = null;
const pages = new Map();
let nextPage = 1;

function reply(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

function call(target, method, args, kwargs) {
  const params = Object.keys(kwargs).length ? [...args, kwargs] : args;
  return target[method](...params);
}

function sleep(ms) {
  return new Promise((resolve) => setTimeout(resolve, ms));
}

function pageById(id) {
  const page = pages.get(id);
  if (!page) {
    throw new Error(`unknown page ${id}`);
  }
  return page;
}

async function waitFor(page, args, kwargs) {
  if (typeof page.waitFor === 'function') {
    return call(page, 'waitFor', args, kwargs);
  }
  const [target, ...rest] = args;
  const options = Object.keys(kwargs).length ? [...rest, kwargs] : rest;
  if (typeof target === 'number') {
    return typeof page.waitForTimeout === 'function' ? page.waitForTimeout(target) : sleep(target);
  }
  if (typeof target === 'string') {
    const trimmed = target.trim();
    if (trimmed.startsWith('function') || trimmed.includes('=>')) {
      return page.waitForFunction(target, ...options);
    }
    if (trimmed.startsWith('//')) {
      return page.waitForSelector('xpath/' + trimmed, ...options);
    }
    return page.waitForSelector(target, ...options);
  }
  throw new Error('waitFor: unsupported argument ' + JSON.stringify(target));
}

function emulateMedia(page, args, kwargs) {
  const method = typeof page.emulateMedia === 'function' ? 'emulateMedia' : 'emulateMediaType';
  return call(page, method, args, kwargs);
}

async function handle(request) {
  const args = request.args || [];
  const kwargs = request.kwargs || {};
  switch (request.op) {
    case 'launch': {
      const puppeteer = require('puppeteer');
      browser = await call(puppeteer, 'launch', args, kwargs);
      const proc = browser.process();
      return { pid: proc ? proc.pid : null };
    }
    case 'newPage': {
      const page = await browser.newPage();
      const id = nextPage++;
      pages.set(id, page);
      return { page: id };
    }
    case 'goto':
    case 'setContent':
    case 'waitForNavigation':
      await call(pageById(request.page), request.op, args, kwargs);
      return null;
    case 'emulateMedia':
      await emulateMedia(pageById(request.page), args, kwargs);
      return null;
    case 'waitFor':
      await waitFor(pageById(request.page), args, kwargs);
      return null;
    case 'pdf': {
      const data = await call(pageById(request.page), 'pdf', args, kwargs);
      return Buffer.from(data || []).toString('base64');
    }
    case 'closePage': {
      const page = pageById(request.page);
      pages.delete(request.page);
      await page.close();
      return null;
    }
    case 'close':
      if (browser) {
        const current = browser;
        browser = null;
        await current.close();
      }
      return null;
    default:
      throw new Error(`unknown operation ${request.op}`);
  }
}

let queue = Promise.resolve();
const input = readline.createInterface({ input: process.stdin });

input.on('line', (line) => {
  queue = queue.then(async () => {
    let request;
    try {
      request = JSON.parse(line);
    } catch (err) {
      return;
    }
    try {
      const result = await handle(request);
      reply({ id: request.id, status: 'ok', result: result === undefined ? null : result });
    } catch (err) {
      const message = err && err.message ? err.message : String(err);
      reply({ id: request.id, status: 'error', message });
    }
  });
});

input.on('close', () => {
  queue.then(async () => {
    if (browser) {
      try {
        await browser.close();
      } catch (err) {
        // exiting anyway
      }
    }
    process.exit(0);
  });
});
"#;

/// Timeout for checking node/puppeteer availability.
pub(crate) const NODE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Script to check if Puppeteer is installed.
const PUPPETEER_CHECK_SCRIPT: &str = "require('puppeteer'); process.stdout.write('ok');";

const MISSING_PUPPETEER: &str = "cannot find module 'puppeteer'";

/// Maps a spawn error to an appropriate PpdfError.
pub(crate) fn map_spawn_error(err: io::Error, command: &str) -> PpdfError {
    if err.kind() == io::ErrorKind::NotFound {
        PpdfError::Config(format!(
            "Unable to spawn browser helper; '{}' was not found on PATH",
            command
        ))
    } else {
        PpdfError::Io(err)
    }
}

/// Maps an error reported by the helper for `op`.
pub(crate) fn map_helper_error(op: &str, message: &str) -> PpdfError {
    if message.to_ascii_lowercase().contains(MISSING_PUPPETEER) {
        return PpdfError::Config(
            "Puppeteer npm package is missing; install with `npm install puppeteer`.".to_string(),
        );
    }
    PpdfError::Driver(format!("{op} failed: {}", message.trim()))
}

/// Ensures Node.js is available on the system.
pub(crate) async fn ensure_node_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let status = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.status())
        .await
        .map_err(|_| {
            PpdfError::Config(format!(
                "Timed out checking node availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !status.success() {
        return Err(PpdfError::Config(format!(
            "Node command {:?} is not available (exit {})",
            node_command, status
        )));
    }

    Ok(())
}

/// Ensures the Puppeteer npm package can be required.
pub(crate) async fn ensure_puppeteer_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("-e")
        .arg(PUPPETEER_CHECK_SCRIPT)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.output())
        .await
        .map_err(|_| {
            PpdfError::Config(format!(
                "Timed out checking Puppeteer availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(map_helper_error("require('puppeteer')", &stderr));
    }

    Ok(())
}
