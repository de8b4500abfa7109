//! Capability interfaces of the external platform and the backends that provide them.
//!
//! The view-models only ever talk to the traits in this module. `local` wires the
//! traits to real services (native dialogs, a JSON file, an OpenAI-compatible API),
//! `memory` keeps everything in-process.

use crate::config::{AppConfig, Backend};
use crate::error::{ExplorerError, PlatformError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub mod audio;
pub mod desktop;
pub mod memory;
pub mod openai;
pub mod store;

pub type PlatformResult<T> = Result<T, PlatformError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub key: String,
    pub value: Value,
}

impl ResourceEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
}

/// Synthesized speech that can be played once.
#[async_trait]
pub trait PlayableAudio: Send {
    async fn play(self: Box<Self>) -> PlatformResult<()>;
}

/// A file chosen in the open picker.
#[async_trait]
pub trait PickedFile: Send + Sync {
    fn name(&self) -> &str;
    async fn read_text(&self) -> PlatformResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub name: String,
}

#[async_trait]
pub trait AuthCapability: Send + Sync {
    async fn is_signed_in(&self) -> bool;
    /// May show an interactive prompt and wait for the user indefinitely.
    async fn sign_in(&self) -> PlatformResult<Identity>;
    async fn get_user(&self) -> PlatformResult<Identity>;
    async fn sign_out(&self) -> PlatformResult<()>;
}

#[async_trait]
pub trait KeyValueCapability: Send + Sync {
    /// With `include_metadata == false` only keys are returned and values are null.
    async fn list(&self, include_metadata: bool) -> PlatformResult<Vec<ResourceEntry>>;
    async fn set(&self, key: &str, value: Value) -> PlatformResult<()>;
    async fn del(&self, key: &str) -> PlatformResult<()>;
}

#[async_trait]
pub trait AiCapability: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> PlatformResult<Reply>;
    async fn text_to_speech(&self, text: &str) -> PlatformResult<Box<dyn PlayableAudio>>;
}

#[async_trait]
pub trait FileCapability: Send + Sync {
    async fn show_open_file_picker(&self) -> PlatformResult<Box<dyn PickedFile>>;
    async fn show_save_file_picker(
        &self,
        content: &str,
        suggested_name: &str,
    ) -> PlatformResult<SavedFile>;
}

/// The four capability groups the application consumes.
#[derive(Clone)]
pub struct Platform {
    pub auth: Arc<dyn AuthCapability>,
    pub kv: Arc<dyn KeyValueCapability>,
    pub ai: Arc<dyn AiCapability>,
    pub files: Arc<dyn FileCapability>,
}

impl Platform {
    pub fn from_config(config: &AppConfig) -> Result<Self, ExplorerError> {
        let username = resolve_username(config);
        match config.backend {
            Backend::Memory => {
                info!(%username, "using in-memory platform");
                Ok(memory::platform(&username))
            }
            Backend::Local => {
                let kv_path = config.kv_path();
                info!(%username, kv_path = %kv_path.display(), "using local platform");
                let ai = openai::OpenAiClient::from_config(&config.ai)
                    .map_err(|err| ExplorerError::Config(err.to_string()))?;
                Ok(Self {
                    auth: Arc::new(desktop::DesktopAuth::new(username)),
                    kv: Arc::new(store::JsonFileStore::new(kv_path)),
                    ai: Arc::new(ai),
                    files: Arc::new(desktop::DesktopFiles),
                })
            }
        }
    }
}

fn resolve_username(config: &AppConfig) -> String {
    config
        .username
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "guest".to_string())
}
