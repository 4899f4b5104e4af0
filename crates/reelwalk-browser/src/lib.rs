//! Browser control facade.
//!
//! The engine drives the story viewer through the [`BrowserSession`] trait:
//! navigate, locate-and-click by CSS selector, type, run scripts, press keys
//! and capture screenshots. [`WebDriverSession`] implements it against any
//! W3C WebDriver endpoint (chromedriver, geckodriver, a Selenium grid).
//!
//! Element handles are never exposed. Callers address elements by selector and
//! every action re-locates the element, so a re-render between selection and
//! activation surfaces as [`BrowserError::NoSuchElement`] or
//! [`BrowserError::StaleElement`] rather than acting on a detached node.

pub mod error;
pub mod keys;
pub mod session;
pub mod webdriver;

pub use error::BrowserError;
pub use keys::Key;
pub use session::{BrowserCookie, BrowserSession};
pub use webdriver::{WebDriverConfig, WebDriverSession};
