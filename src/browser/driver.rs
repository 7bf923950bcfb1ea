//! Driver seam between the converter and a concrete headless browser.
//!
//! Method names follow the Puppeteer page API the options are written for.

use async_trait::async_trait;

use crate::options::OperationArgs;
use crate::Result;

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Starts a browser with the `launch` operation's arguments.
    async fn launch(&self, args: &OperationArgs) -> Result<Box<dyn Browser>>;
}

#[async_trait]
pub trait Browser: Send {
    /// Root of the browser's process tree, when the driver knows it.
    fn process_id(&self) -> Option<u32> {
        None
    }

    async fn new_page(&mut self) -> Result<Box<dyn Page>>;
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Page: Send {
    async fn goto(&mut self, url: &str, args: &OperationArgs) -> Result<()>;
    async fn set_content(&mut self, html: &str) -> Result<()>;
    async fn emulate_media(&mut self, args: &OperationArgs) -> Result<()>;
    async fn wait_for_navigation(&mut self, args: &OperationArgs) -> Result<()>;
    async fn wait_for(&mut self, args: &OperationArgs) -> Result<()>;
    /// Renders the page; writes to the `path` keyword too when set.
    async fn pdf(&mut self, args: &OperationArgs) -> Result<Vec<u8>>;
    async fn close(&mut self) -> Result<()>;
}
