//! In-process platform used by tests and by `backend = "memory"`.

use super::{
    AiCapability, AuthCapability, ChatMessage, FileCapability, Identity, KeyValueCapability,
    PickedFile, Platform, PlatformResult, PlayableAudio, Reply, ResourceEntry, Role, SavedFile,
};
use crate::error::PlatformError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn platform(username: &str) -> Platform {
    Platform {
        auth: Arc::new(MemoryAuth::new(username)),
        kv: Arc::new(MemoryKv::default()),
        ai: Arc::new(EchoAi),
        files: Arc::new(MemoryFiles::with_file(
            "welcome.txt",
            "Files opened here come from memory.",
        )),
    }
}

#[derive(Debug)]
pub struct MemoryAuth {
    username: String,
    signed_in: AtomicBool,
    deny: AtomicBool,
    prompts: AtomicUsize,
}

impl MemoryAuth {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            signed_in: AtomicBool::new(false),
            deny: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
        }
    }

    /// Makes the next prompts behave as if the user pressed cancel.
    pub fn deny_sign_in(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthCapability for MemoryAuth {
    async fn is_signed_in(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }

    async fn sign_in(&self) -> PlatformResult<Identity> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(PlatformError::Cancelled);
        }
        self.signed_in.store(true, Ordering::SeqCst);
        Ok(Identity::new(&self.username))
    }

    async fn get_user(&self) -> PlatformResult<Identity> {
        if !self.signed_in.load(Ordering::SeqCst) {
            return Err(PlatformError::Rejected("no active session".to_string()));
        }
        Ok(Identity::new(&self.username))
    }

    async fn sign_out(&self) -> PlatformResult<()> {
        self.signed_in.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Key-value store keeping insertion order, with call counters and an injectable list failure.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<Vec<ResourceEntry>>,
    fail_list: AtomicBool,
    list_calls: AtomicUsize,
    set_calls: AtomicUsize,
    del_calls: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvCalls {
    pub list: usize,
    pub set: usize,
    pub del: usize,
}

impl MemoryKv {
    pub fn fail_lists(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> KvCalls {
        KvCalls {
            list: self.list_calls.load(Ordering::SeqCst),
            set: self.set_calls.load(Ordering::SeqCst),
            del: self.del_calls.load(Ordering::SeqCst),
        }
    }

    pub fn stored(&self, key: &str) -> Option<Value> {
        lock(&self.entries)
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.clone())
    }
}

#[async_trait]
impl KeyValueCapability for MemoryKv {
    async fn list(&self, include_metadata: bool) -> PlatformResult<Vec<ResourceEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(PlatformError::Transport("list unavailable".to_string()));
        }
        let entries = lock(&self.entries);
        Ok(entries
            .iter()
            .map(|entry| ResourceEntry {
                key: entry.key.clone(),
                value: if include_metadata {
                    entry.value.clone()
                } else {
                    Value::Null
                },
            })
            .collect())
    }

    async fn set(&self, key: &str, value: Value) -> PlatformResult<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = lock(&self.entries);
        match entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.value = value,
            None => entries.push(ResourceEntry::new(key, value)),
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> PlatformResult<()> {
        self.del_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.entries).retain(|entry| entry.key != key);
        Ok(())
    }
}

/// Replies by echoing the latest user message. Speech is silent.
#[derive(Debug, Default)]
pub struct EchoAi;

#[async_trait]
impl AiCapability for EchoAi {
    async fn chat(&self, messages: &[ChatMessage]) -> PlatformResult<Reply> {
        let last = messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
            .unwrap_or_default();
        Ok(Reply {
            text: format!("You said: {last}"),
        })
    }

    async fn text_to_speech(&self, _text: &str) -> PlatformResult<Box<dyn PlayableAudio>> {
        Ok(Box::new(SilentAudio))
    }
}

#[derive(Debug, Default)]
pub struct SilentAudio;

#[async_trait]
impl PlayableAudio for SilentAudio {
    async fn play(self: Box<Self>) -> PlatformResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    name: String,
    content: String,
}

#[async_trait]
impl PickedFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_text(&self) -> PlatformResult<String> {
        Ok(self.content.clone())
    }
}

/// File pickers that serve one in-memory file and record saved content by name.
#[derive(Debug, Default)]
pub struct MemoryFiles {
    available: Mutex<Option<MemoryFile>>,
    saved: Mutex<Vec<(String, String)>>,
}

impl MemoryFiles {
    pub fn with_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            available: Mutex::new(Some(MemoryFile {
                name: name.into(),
                content: content.into(),
            })),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn saved(&self) -> Vec<(String, String)> {
        lock(&self.saved).clone()
    }
}

#[async_trait]
impl FileCapability for MemoryFiles {
    async fn show_open_file_picker(&self) -> PlatformResult<Box<dyn PickedFile>> {
        // No file to offer behaves like the user closing the picker.
        match lock(&self.available).clone() {
            Some(file) => Ok(Box::new(file)),
            None => Err(PlatformError::Cancelled),
        }
    }

    async fn show_save_file_picker(
        &self,
        content: &str,
        suggested_name: &str,
    ) -> PlatformResult<SavedFile> {
        lock(&self.saved).push((suggested_name.to_string(), content.to_string()));
        *lock(&self.available) = Some(MemoryFile {
            name: suggested_name.to_string(),
            content: content.to_string(),
        });
        Ok(SavedFile {
            name: suggested_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_overwrites_in_place() {
        let kv = MemoryKv::default();
        kv.set("a", json!("1")).await.expect("set should succeed");
        kv.set("b", json!("2")).await.expect("set should succeed");
        kv.set("a", json!("3")).await.expect("set should succeed");

        let entries = kv.list(true).await.expect("list should succeed");
        assert_eq!(
            entries,
            vec![ResourceEntry::new("a", "3"), ResourceEntry::new("b", "2")]
        );
        assert_eq!(kv.calls().set, 3);
    }

    #[tokio::test]
    async fn list_without_metadata_hides_values() {
        let kv = MemoryKv::default();
        kv.set("a", json!("1")).await.expect("set should succeed");
        let entries = kv.list(false).await.expect("list should succeed");
        assert_eq!(entries[0].value, Value::Null);
    }

    #[tokio::test]
    async fn echo_ai_repeats_latest_user_message() {
        let reply = EchoAi
            .chat(&[
                ChatMessage::new(Role::System, "guide"),
                ChatMessage::new(Role::User, "first"),
                ChatMessage::new(Role::Assistant, "You said: first"),
                ChatMessage::new(Role::User, "second"),
            ])
            .await
            .expect("echo should reply");
        assert_eq!(reply.text, "You said: second");
    }

    #[tokio::test]
    async fn saved_file_becomes_openable() {
        let files = MemoryFiles::default();
        assert_eq!(
            files.show_open_file_picker().await.err(),
            Some(PlatformError::Cancelled)
        );

        files
            .show_save_file_picker("body", "notes.txt")
            .await
            .expect("save should succeed");
        let picked = files
            .show_open_file_picker()
            .await
            .expect("saved file should be offered");
        assert_eq!(picked.name(), "notes.txt");
        assert_eq!(picked.read_text().await.expect("read should succeed"), "body");
    }
}
