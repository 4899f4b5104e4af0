use async_trait::async_trait;
use serde_json::Value;

use crate::error::BrowserError;
use crate::keys::Key;

/// A cookie to install into the browser before navigating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

/// Sequential control over one browser tab.
///
/// Implementations are driven by a single task; calls are never issued
/// concurrently against the same session.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Soft reload of the current page.
    async fn refresh(&self) -> Result<(), BrowserError>;

    /// Runs `script` as a function body with `args` bound to `arguments`.
    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError>;

    /// Locates the first element matching `selector` and pointer-clicks it.
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Locates the first element matching `selector` and types `text` into it.
    async fn send_keys(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Presses and releases `key` on the focused element.
    async fn press_key(&self, key: Key) -> Result<(), BrowserError>;

    /// PNG bytes of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    async fn add_cookie(&self, cookie: &BrowserCookie) -> Result<(), BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}
