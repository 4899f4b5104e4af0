//! W3C WebDriver client over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, Method, Url};
use serde_json::{json, Value};

use crate::error::BrowserError;
use crate::keys::Key;
use crate::session::{BrowserCookie, BrowserSession};

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Settings for a new WebDriver session.
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub webdriver_url: String,
    pub user_agent: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Per-command HTTP timeout.
    pub command_timeout_secs: u64,
}

impl WebDriverConfig {
    #[must_use]
    pub fn new(webdriver_url: &str, user_agent: &str) -> Self {
        Self {
            webdriver_url: webdriver_url.to_owned(),
            user_agent: user_agent.to_owned(),
            headless: true,
            // Mobile-ish viewport; the story viewer renders full-height there.
            window_width: 430,
            window_height: 932,
            command_timeout_secs: 30,
        }
    }
}

/// One live WebDriver session. Dropping it does not end the remote session;
/// call [`BrowserSession::close`].
pub struct WebDriverSession {
    client: Client,
    base_url: Url,
    session_url: Url,
    session_id: String,
}

impl WebDriverSession {
    /// Opens a new Chrome session on the configured driver.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Transport`] if the driver is unreachable, or a
    /// protocol error if it refuses the capabilities.
    pub async fn connect(config: &WebDriverConfig) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.command_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let base = parse_base(&config.webdriver_url)?;
        let mut args = vec![
            format!("--user-agent={}", config.user_agent),
            format!("--window-size={},{}", config.window_width, config.window_height),
            "--disable-notifications".to_owned(),
            "--mute-audio".to_owned(),
        ];
        if config.headless {
            args.push("--headless=new".to_owned());
        }
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let url = join(&base, "session")?;
        let value = send(&client, Method::POST, url, Some(&capabilities), None).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Decode {
                what: "new session response",
                reason: "missing sessionId".to_owned(),
            })?
            .to_owned();

        let session_url = join(&base, &format!("session/{session_id}/"))?;
        tracing::info!(session_id = %session_id, "webdriver session created");

        Ok(Self {
            client,
            base_url: base,
            session_url,
            session_id,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        selector: Option<&str>,
    ) -> Result<Value, BrowserError> {
        let url = join(&self.session_url, path)?;
        send(&self.client, method, url, body, selector).await
    }

    async fn find_element(&self, selector: &str) -> Result<String, BrowserError> {
        let body = json!({ "using": "css selector", "value": selector });
        let value = self
            .command(Method::POST, "element", Some(&body), Some(selector))
            .await?;
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| BrowserError::NoSuchElement {
                selector: selector.to_owned(),
            })
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.command(Method::POST, "url", Some(&json!({ "url": url })), None)
            .await
            .map(drop)
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let value = self.command(Method::GET, "url", None, None).await?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| BrowserError::Decode {
                what: "current url",
                reason: format!("expected string, got {value}"),
            })
    }

    async fn refresh(&self) -> Result<(), BrowserError> {
        self.command(Method::POST, "refresh", Some(&json!({})), None)
            .await
            .map(drop)
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        let body = json!({ "script": script, "args": args });
        self.command(Method::POST, "execute/sync", Some(&body), None)
            .await
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self.find_element(selector).await?;
        self.command(
            Method::POST,
            &format!("element/{element}/click"),
            Some(&json!({})),
            Some(selector),
        )
        .await
        .map(drop)
    }

    async fn send_keys(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let element = self.find_element(selector).await?;
        self.command(
            Method::POST,
            &format!("element/{element}/value"),
            Some(&json!({ "text": text })),
            Some(selector),
        )
        .await
        .map(drop)
    }

    async fn press_key(&self, key: Key) -> Result<(), BrowserError> {
        let code = key.code_point().to_string();
        let body = json!({
            "actions": [{
                "type": "key",
                "id": "keyboard",
                "actions": [
                    { "type": "keyDown", "value": code },
                    { "type": "keyUp", "value": code }
                ]
            }]
        });
        self.command(Method::POST, "actions", Some(&body), None)
            .await
            .map(drop)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        let value = self.command(Method::GET, "screenshot", None, None).await?;
        let encoded = value.as_str().ok_or_else(|| BrowserError::Decode {
            what: "screenshot",
            reason: "expected base64 string".to_owned(),
        })?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| BrowserError::Decode {
                what: "screenshot",
                reason: e.to_string(),
            })
    }

    async fn add_cookie(&self, cookie: &BrowserCookie) -> Result<(), BrowserError> {
        let body = json!({
            "cookie": {
                "name": cookie.name,
                "value": cookie.value,
                "domain": cookie.domain,
                "path": "/",
                "secure": true,
                "httpOnly": true
            }
        });
        self.command(Method::POST, "cookie", Some(&body), None)
            .await
            .map(drop)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let url = join(&self.base_url, &format!("session/{}", self.session_id))?;
        send(&self.client, Method::DELETE, url, None, None).await?;
        tracing::info!(session_id = %self.session_id, "webdriver session closed");
        Ok(())
    }
}

fn parse_base(raw: &str) -> Result<Url, BrowserError> {
    Url::parse(&format!("{}/", raw.trim_end_matches('/'))).map_err(|e| BrowserError::Decode {
        what: "webdriver url",
        reason: e.to_string(),
    })
}

fn join(base: &Url, path: &str) -> Result<Url, BrowserError> {
    base.join(path).map_err(|e| BrowserError::Decode {
        what: "webdriver url",
        reason: e.to_string(),
    })
}

/// Sends one command and unwraps the W3C `{"value": ...}` envelope.
async fn send(
    client: &Client,
    method: Method,
    url: Url,
    body: Option<&Value>,
    selector: Option<&str>,
) -> Result<Value, BrowserError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(body);
    }
    let response = request.send().await?;
    let status = response.status();
    let envelope: Value = response.json().await.map_err(|e| BrowserError::Decode {
        what: "webdriver response",
        reason: e.to_string(),
    })?;
    let value = envelope.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        return Err(BrowserError::from_w3c(error, message, selector));
    }

    Ok(value)
}
