//! Diagnostic captures keyed by run and step.
//!
//! Every capture is logged. When a directory is configured, a screenshot and
//! a JSON details file are also written under `<dir>/<run_label>/`.
//! Capture failures are logged and swallowed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::Value;

use crate::dom::StoryDom;

pub struct Diagnostics {
    dir: Option<PathBuf>,
    run_label: String,
    seq: AtomicU32,
}

impl Diagnostics {
    #[must_use]
    pub fn new(dir: Option<PathBuf>, run_label: &str) -> Self {
        Self {
            dir,
            run_label: run_label.to_owned(),
            seq: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, "disabled")
    }

    #[must_use]
    pub fn run_label(&self) -> &str {
        &self.run_label
    }

    /// Number of captures taken so far.
    #[must_use]
    pub fn captures(&self) -> u32 {
        self.seq.load(Ordering::Relaxed)
    }

    pub async fn capture(&self, dom: &dyn StoryDom, step: &str, details: &Value) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(run = %self.run_label, seq, step, details = %details, "diagnostic capture");

        let Some(root) = &self.dir else {
            return;
        };
        let dir = root.join(&self.run_label);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            tracing::warn!(path = %dir.display(), error = %e, "cannot create diagnostics directory");
            return;
        }

        let stem = format!("{seq:03}-{step}");
        let json = serde_json::to_vec_pretty(details).unwrap_or_default();
        if let Err(e) = tokio::fs::write(dir.join(format!("{stem}.json")), json).await {
            tracing::warn!(step, error = %e, "failed to write diagnostic details");
        }

        match dom.screenshot().await {
            Ok(png) => {
                if let Err(e) = tokio::fs::write(dir.join(format!("{stem}.png")), png).await {
                    tracing::warn!(step, error = %e, "failed to write diagnostic screenshot");
                }
            }
            Err(e) => tracing::warn!(step, error = %e, "screenshot unavailable"),
        }
    }
}
