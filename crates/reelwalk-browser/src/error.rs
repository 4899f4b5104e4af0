use thiserror::Error;

/// Errors returned by a [`crate::BrowserSession`].
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("transport error talking to WebDriver: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("stale element reference for {selector}")]
    StaleElement { selector: String },

    #[error("no element matches {selector}")]
    NoSuchElement { selector: String },

    #[error("element {selector} is not interactable: {message}")]
    NotInteractable { selector: String, message: String },

    #[error("script error: {0}")]
    Script(String),

    #[error("browser session is gone: {0}")]
    SessionGone(String),

    #[error("WebDriver protocol error '{error}': {message}")]
    Protocol { error: String, message: String },

    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}

impl BrowserError {
    /// Whether the failure is a DOM race that a re-locate or script click may
    /// get past.
    #[must_use]
    pub fn is_element_race(&self) -> bool {
        matches!(
            self,
            BrowserError::StaleElement { .. }
                | BrowserError::NoSuchElement { .. }
                | BrowserError::NotInteractable { .. }
        )
    }

    /// Maps a W3C error code onto a typed variant.
    pub(crate) fn from_w3c(error: &str, message: String, selector: Option<&str>) -> Self {
        let selector = selector.unwrap_or("<none>").to_owned();
        match error {
            "stale element reference" => BrowserError::StaleElement { selector },
            "no such element" => BrowserError::NoSuchElement { selector },
            "element not interactable" | "element click intercepted" => {
                BrowserError::NotInteractable { selector, message }
            }
            "javascript error" | "script timeout" => BrowserError::Script(message),
            "invalid session id" | "no such window" | "session not created" => {
                BrowserError::SessionGone(message)
            }
            other => BrowserError::Protocol {
                error: other.to_owned(),
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn w3c_codes_map_to_variants() {
        assert!(matches!(
            BrowserError::from_w3c("stale element reference", String::new(), Some("a")),
            BrowserError::StaleElement { .. }
        ));
        assert!(matches!(
            BrowserError::from_w3c("element click intercepted", "overlay".into(), Some("a")),
            BrowserError::NotInteractable { .. }
        ));
        assert!(matches!(
            BrowserError::from_w3c("invalid session id", String::new(), None),
            BrowserError::SessionGone(_)
        ));
        assert!(matches!(
            BrowserError::from_w3c("unknown command", String::new(), None),
            BrowserError::Protocol { .. }
        ));
    }

    #[test]
    fn element_races_are_flagged() {
        assert!(BrowserError::NoSuchElement {
            selector: "x".into()
        }
        .is_element_race());
        assert!(!BrowserError::Script("boom".into()).is_element_race());
    }
}
