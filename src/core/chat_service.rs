// core/chat_service.rs
use pulldown_cmark::{html, Event, Options, Parser};
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::{ChatConversation, NewChatConversation, User};
use crate::infrastructure::database::Store;
use crate::infrastructure::error::{AppError, AppResult};
use crate::utils::config::Config;
use crate::utils::helpers::truncate_string;

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 0.9;

pub const EMPTY_MESSAGE: &str = "Please enter a message.";

const SYSTEM_PROMPT: &str = "You are DermaGenie, an intelligent AI assistant specializing in skin care and dermatology education.

Your role:
- Provide accurate, helpful information about skin conditions
- Explain skin care routines and best practices
- Offer guidance on when to see a dermatologist
- Answer questions about skin cancer prevention
- Educate users about various skin conditions

Important guidelines:
- Always emphasize that you're an educational tool, not a replacement for professional medical advice
- Encourage users to consult dermatologists for diagnosis and treatment
- Use clear, easy-to-understand language
- Format your responses with:
  * **Bold** for important terms
  * *Italic* for emphasis
  * Bullet points for lists
  * Numbered lists for steps
  * Headings (##) for sections
- Be empathetic and supportive
- Provide actionable advice when appropriate
- Include disclaimers when discussing medical conditions

Remember: You're here to educate and guide, not diagnose or prescribe treatment.";

pub const QUICK_SUGGESTIONS: [&str; 8] = [
    "What are the early signs of skin cancer?",
    "How can I protect my skin from sun damage?",
    "What's the difference between a mole and melanoma?",
    "How often should I check my skin for changes?",
    "What are the best ingredients for anti-aging?",
    "How do I treat acne naturally?",
    "What causes dry skin and how to fix it?",
    "When should I see a dermatologist?",
];

/// Échec côté assistant, renvoyé au client sans faire échouer la requête
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat API key is not configured")]
    NotConfigured,
    #[error("chat API rejected the credentials")]
    Authentication,
    #[error("chat API rate limit exceeded")]
    RateLimit,
    #[error("chat API error: {0}")]
    Api(String),
    #[error("chat request failed: {0}")]
    Unknown(String),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::NotConfigured => "not_configured",
            ChatError::Authentication => "authentication_error",
            ChatError::RateLimit => "rate_limit",
            ChatError::Api(_) => "api_error",
            ChatError::Unknown(_) => "unknown_error",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ChatError::NotConfigured => {
                "The assistant is not configured. Please set CHAT_API_KEY.".to_string()
            }
            ChatError::Authentication => {
                "🔑 Invalid API key. Please check the assistant API key configuration.".to_string()
            }
            ChatError::RateLimit => "⏱️ Rate limit exceeded. Please wait a few minutes and try again.".to_string(),
            ChatError::Api(detail) => format!(
                "⚠️ Assistant API error: {}\n\nPlease check your internet connection and the service status.",
                detail
            ),
            ChatError::Unknown(detail) => format!(
                "❌ An error occurred: {}\n\nPlease try again or contact support if the issue persists.",
                detail
            ),
        }
    }
}

/// Réponse renvoyée au client
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChatReply {
    fn answered(formatted_html: String, tokens_used: i32) -> Self {
        Self {
            success: true,
            formatted_html: Some(formatted_html),
            tokens_used: Some(tokens_used),
            error: None,
            message: None,
        }
    }

    fn failed(error: &ChatError) -> Self {
        Self {
            success: false,
            formatted_html: None,
            tokens_used: None,
            error: Some(error.code()),
            message: Some(error.user_message()),
        }
    }

    fn empty_message() -> Self {
        Self {
            success: false,
            formatted_html: None,
            tokens_used: None,
            error: None,
            message: Some(EMPTY_MESSAGE.to_string()),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionContent,
}

#[derive(Deserialize)]
struct CompletionContent {
    content: String,
}

#[derive(Deserialize)]
struct CompletionUsage {
    total_tokens: i32,
}

struct Completion {
    text: String,
    tokens_used: i32,
    model: String,
}

/// Client de l'assistant (API compatible OpenAI `chat/completions`)
pub struct ChatService {
    store: Arc<dyn Store>,
    http_client: HttpClient,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl ChatService {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.chat_timeout_seconds))
            .build()
            .map_err(|e| AppError::ConfigurationError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            store,
            http_client,
            api_key: config.chat_api_key.clone(),
            base_url: config.chat_api_base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Pose une question à l'assistant et archive l'échange
    pub async fn ask(&self, user: &User, message: &str) -> AppResult<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(ChatReply::empty_message());
        }

        let completion = match self.complete(message).await {
            Ok(completion) => completion,
            Err(error) => {
                warn!(user_id = %user.id, code = error.code(), "⚠️ Assistant indisponible: {}", error);
                return Ok(ChatReply::failed(&error));
            }
        };

        let saved = self
            .store
            .save_conversation(NewChatConversation {
                user_id: user.id,
                user_message: message.to_string(),
                ai_response: completion.text.clone(),
                tokens_used: completion.tokens_used,
                model: completion.model.clone(),
            })
            .await;
        if let Err(e) = saved {
            warn!(user_id = %user.id, "⚠️ Conversation non archivée: {}", e);
        }

        info!(
            user_id = %user.id,
            tokens = completion.tokens_used,
            question = %truncate_string(message, 80),
            "💬 Réponse de l'assistant"
        );
        Ok(ChatReply::answered(
            format_markdown(&completion.text),
            completion.tokens_used,
        ))
    }

    pub async fn history(&self, user: &User, limit: i64) -> AppResult<Vec<ChatConversation>> {
        self.store.list_conversations(user.id, limit).await
    }

    async fn complete(&self, message: &str) -> Result<Completion, ChatError> {
        let api_key = self.api_key.as_deref().ok_or(ChatError::NotConfigured)?;

        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                CompletionMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                CompletionMessage {
                    role: "user",
                    content: message,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Unknown(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Err(ChatError::Authentication),
            StatusCode::TOO_MANY_REQUESTS => return Err(ChatError::RateLimit),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ChatError::Api(format!("HTTP {}: {}", status.as_u16(), body)));
            }
            _ => {}
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Api(format!("invalid response: {}", e)))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ChatError::Api("response contained no choices".to_string()))?;

        Ok(Completion {
            text,
            tokens_used: completion.usage.map(|u| u.total_tokens).unwrap_or(0),
            model: completion.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

/// Markdown -> HTML (tableaux, barré, sauts de ligne conservés)
pub fn format_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(text, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut output = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewUser;
    use crate::infrastructure::database::{ChatRepository, MemoryStore, UserRepository};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(base_url: &str, api_key: Option<&str>) -> (Arc<MemoryStore>, ChatService, User) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(NewUser {
                username: "pat".to_string(),
                email: "pat@example.com".to_string(),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap();
        let config = Config {
            chat_api_key: api_key.map(str::to_string),
            chat_api_base_url: base_url.to_string(),
            ..Config::default()
        };
        let service = ChatService::new(store.clone(), &config).unwrap();
        (store, service, user)
    }

    #[tokio::test]
    async fn successful_reply_is_formatted_and_archived() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "sonar",
                "max_tokens": 1000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "sonar",
                "choices": [{"message": {"role": "assistant", "content": "## Sun safety\n\n- Use **SPF 30**"}}],
                "usage": {"total_tokens": 42}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (store, service, user) = setup(&server.uri(), Some("test-key")).await;
        let reply = service.ask(&user, "  How do I protect my skin?  ").await.unwrap();

        assert!(reply.success);
        assert_eq!(reply.tokens_used, Some(42));
        let html = reply.formatted_html.unwrap();
        assert!(html.contains("<h2>Sun safety</h2>"));
        assert!(html.contains("<strong>SPF 30</strong>"));

        let history = store.list_conversations(user.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_message, "How do I protect my skin?");
        assert_eq!(history[0].tokens_used, 42);
    }

    #[tokio::test]
    async fn upstream_statuses_map_to_error_codes() {
        for (status, code) in [(401, "authentication_error"), (429, "rate_limit"), (500, "api_error")] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let (store, service, user) = setup(&server.uri(), Some("k")).await;
            let reply = service.ask(&user, "hello").await.unwrap();
            assert!(!reply.success);
            assert_eq!(reply.error, Some(code));
            assert!(store.list_conversations(user.id, 10).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn missing_key_and_empty_message() {
        let (_store, service, user) = setup("http://127.0.0.1:9", None).await;

        let reply = service.ask(&user, "   ").await.unwrap();
        assert_eq!(reply.message.as_deref(), Some(EMPTY_MESSAGE));
        assert_eq!(reply.error, None);

        let reply = service.ask(&user, "hello").await.unwrap();
        assert_eq!(reply.error, Some("not_configured"));
    }

    #[tokio::test]
    async fn transport_failure_is_unknown_error() {
        let (_store, service, user) = setup("http://127.0.0.1:9", Some("k")).await;
        let reply = service.ask(&user, "hello").await.unwrap();
        assert_eq!(reply.error, Some("unknown_error"));
    }

    #[test]
    fn markdown_tables_and_strikethrough() {
        let html = format_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~\nline");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>old</del>"));
        assert!(html.contains("<br />"));
    }
}
