use crate::error::{ExplorerError, PlatformError, Result};
use crate::platform::{AiCapability, ChatMessage, Role};
use crate::session_gate::SessionGate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Sent ahead of the transcript on every request.
pub const SYSTEM_GUIDANCE: &str = "A system message that guides the AI to respond appropriately";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl Message {
    fn now(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            timestamp: timestamp(),
        }
    }
}

fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs().to_string(),
        Err(_) => "0".to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub reply: Message,
    /// Speech is best effort; its failure never undoes the reply.
    pub speech_error: Option<String>,
}

/// Clears the in-flight flag however the send ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One linear conversation. Overlapping sends are rejected, not queued.
pub struct ChatSession {
    gate: Arc<SessionGate>,
    ai: Arc<dyn AiCapability>,
    transcript: RwLock<Vec<Message>>,
    in_flight: AtomicBool,
    speech: bool,
}

impl ChatSession {
    pub fn new(gate: Arc<SessionGate>, ai: Arc<dyn AiCapability>, speech: bool) -> Self {
        Self {
            gate,
            ai,
            transcript: RwLock::new(Vec::new()),
            in_flight: AtomicBool::new(false),
            speech,
        }
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.transcript
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn send(&self, user_text: &str) -> Result<SendOutcome> {
        if user_text.trim().is_empty() {
            return Err(ExplorerError::EmptyMessage);
        }
        self.gate.require()?;
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ExplorerError::SendInProgress);
        }
        let in_flight = InFlight(&self.in_flight);

        let request = {
            let mut transcript = self.transcript.write().unwrap_or_else(PoisonError::into_inner);
            transcript.push(Message::now(Role::User, user_text.to_string()));
            let mut request = Vec::with_capacity(transcript.len() + 1);
            request.push(ChatMessage::new(Role::System, SYSTEM_GUIDANCE));
            request.extend(
                transcript
                    .iter()
                    .map(|message| ChatMessage::new(message.role, message.content.clone())),
            );
            request
        };
        debug!(messages = request.len(), "sending chat request");

        let reply = self
            .ai
            .chat(&request)
            .await
            .map_err(|err| ExplorerError::FetchFailed(err.to_string()))?;
        let reply = Message::now(Role::Assistant, reply.text);
        self.transcript
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reply.clone());
        info!(chars = reply.content.len(), "assistant replied");
        drop(in_flight);

        let speech_error = if self.speech {
            self.speak(&reply.content).await.err().map(|err| {
                warn!(error = %err, "speech playback failed");
                err.to_string()
            })
        } else {
            None
        };

        Ok(SendOutcome {
            reply,
            speech_error,
        })
    }

    async fn speak(&self, text: &str) -> std::result::Result<(), PlatformError> {
        let audio = self.ai.text_to_speech(text).await?;
        audio.play().await
    }
}
