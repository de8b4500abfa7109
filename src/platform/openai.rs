//! Chat and speech over an OpenAI-compatible HTTP API.

use super::audio::DecodedAudio;
use super::{AiCapability, ChatMessage, PlatformResult, PlayableAudio, Reply};
use crate::config::AiConfig;
use crate::error::PlatformError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    speech_model: String,
    voice: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl OpenAiClient {
    pub fn from_config(config: &AiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            speech_model: config.speech_model.clone(),
            voice: config.voice.clone(),
        })
    }

    fn api_key(&self) -> PlatformResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            PlatformError::Unavailable("OPENAI_API_KEY is not configured".to_string())
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> PlatformResult<reqwest::Response> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "posting to AI endpoint");
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key()?)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, body))
    }
}

fn classify_failure(status: StatusCode, body: String) -> PlatformError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PlatformError::Rejected(format!("{status}: {body}"))
        }
        _ => PlatformError::Transport(format!("{status}: {body}")),
    }
}

fn extract_reply(response: ChatCompletionResponse) -> PlatformResult<Reply> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| Reply { text })
        .ok_or_else(|| PlatformError::Transport("response contained no message".to_string()))
}

#[async_trait]
impl AiCapability for OpenAiClient {
    async fn chat(&self, messages: &[ChatMessage]) -> PlatformResult<Reply> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
        };
        let response: ChatCompletionResponse = self
            .post("chat/completions", &request)
            .await?
            .json()
            .await?;
        extract_reply(response)
    }

    async fn text_to_speech(&self, text: &str) -> PlatformResult<Box<dyn PlayableAudio>> {
        let request = SpeechRequest {
            model: &self.speech_model,
            input: text,
            voice: &self.voice,
            response_format: "wav",
        };
        let bytes = self.post("audio/speech", &request).await?.bytes().await?;
        Ok(Box::new(DecodedAudio::new(bytes.to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Role;

    #[test]
    fn chat_request_uses_wire_role_names() {
        let messages = vec![
            ChatMessage::new(Role::System, "guide"),
            ChatMessage::new(Role::User, "hello"),
        ];
        let request = ChatCompletionRequest {
            model: "m",
            messages: &messages,
        };
        let json = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[test]
    fn reply_is_taken_from_first_choice() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"hi there"}}]}"#,
        )
        .expect("fixture should parse");
        assert_eq!(extract_reply(response).expect("reply").text, "hi there");
    }

    #[test]
    fn empty_choices_is_a_transport_error() {
        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[]}"#).expect("fixture should parse");
        assert!(matches!(
            extract_reply(response),
            Err(PlatformError::Transport(_))
        ));
    }

    #[test]
    fn auth_statuses_are_rejections() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "bad key".into()),
            PlatformError::Rejected(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_GATEWAY, String::new()),
            PlatformError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn missing_api_key_is_unavailable() {
        let client = OpenAiClient::from_config(&AiConfig::default()).expect("client should build");
        let err = client
            .chat(&[ChatMessage::new(Role::User, "hi")])
            .await
            .expect_err("chat without a key should fail");
        assert!(matches!(err, PlatformError::Unavailable(_)));
    }
}
