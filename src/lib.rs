//! Desktop explorer for a platform's auth, key-value, AI and file-picker capabilities.
//!
//! The window is thin. State lives in view-models that each own their cache and
//! reach the platform only through the capability traits in [`platform`]:
//!
//! - [`session_gate::SessionGate`] establishes the single signed-in identity.
//! - [`resource::RemoteResourceViewModel`] caches the key-value set and refreshes it after every write.
//! - [`chat::ChatSession`] keeps the append-only transcript.
//! - [`files::FileDialogs`] drives the open/save pickers.
//! - [`redaction::RedactionPolicy`] masks secret-looking values at render time.

pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod files;
pub mod platform;
pub mod redaction;
pub mod resource;
pub mod session_gate;
pub mod theme;

use app::ViewModels;
use config::AppConfig;
use error::Result;
use platform::Platform;
use std::sync::Arc;

/// Wires the view-models on top of a platform.
pub fn build_view_models(config: &AppConfig, platform: Platform) -> Result<ViewModels> {
    let gate = Arc::new(session_gate::SessionGate::new(platform.auth));
    Ok(ViewModels {
        resources: Arc::new(resource::RemoteResourceViewModel::new(
            Arc::clone(&gate),
            platform.kv,
        )),
        chat: Arc::new(chat::ChatSession::new(
            Arc::clone(&gate),
            platform.ai,
            config.ai.speech,
        )),
        files: Arc::new(files::FileDialogs::new(Arc::clone(&gate), platform.files)),
        redaction: redaction::RedactionPolicy::from_config(&config.redaction)?,
        gate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use serde_json::json;

    #[tokio::test]
    async fn memory_backend_runs_the_whole_flow() {
        let config = AppConfig {
            backend: Backend::Memory,
            username: Some("alice".to_string()),
            ..AppConfig::default()
        };
        let platform = Platform::from_config(&config).expect("memory platform builds");
        let models = build_view_models(&config, platform).expect("view-models build");

        let identity = models.gate.ensure_signed_in().await.expect("sign-in");
        assert_eq!(identity.username, "alice");

        models
            .resources
            .upsert("openai_api_key", json!("sk-abc123"))
            .await
            .expect("upsert");
        let listed = models.resources.list().await.expect("list");
        let shown = models.redaction.display_entry(&listed.entries[0]);
        assert!(shown.contains("sk-*"));
        assert!(!shown.contains("abc123"));
        assert_eq!(listed.get("openai_api_key"), Some(&json!("sk-abc123")));

        let outcome = models.chat.send("hi").await.expect("chat");
        assert_eq!(outcome.reply.content, "You said: hi");

        let opened = models.files.open().await.expect("open");
        assert_eq!(opened.name, "welcome.txt");
    }
}
