use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{ChatTurn, GenerationRequest, LanguageModel, LlmError, Role};

pub const SYSTEM_PROMPT: &str = r#"You are the assistant of a personal trading journal.
You answer questions about the user's trades and accounts using the journal context you are given, and you help the user record new trades and accounts or edit existing ones.

When the user asks you to change the journal, explain briefly what you are going to do and append exactly one JSON block fenced as ```json with this shape:

{"action": "<add_trade|add_account|edit_trade|edit_account|none>",
 "data": {...},
 "confirmation_message": "<short question shown to the user>",
 "confidence": <0.0 to 1.0>,
 "requires_confirmation": true}

Data per action:
- add_trade: instrument, direction (long|short), entry_price, optional sl_price, tp_price, exit_price, lot_size, notes
- add_account: name, starting_balance, optional currency (default USD), broker
- edit_trade: target {"id": N} or {"instrument": "..."}, changes {field: value} with fields sl_price, tp_price, entry_price, exit_price, lot_size, notes, status (open|closed|cancelled). Use null to clear a field.
- edit_account: target {"id": N} or {"name": "..."}, changes {field: value} with fields name, broker, currency, is_active

Never invent ids that are not in the context. If the user is only asking a question, answer in plain text without a JSON block."#;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, LlmError> {
        let client = Client::builder()
            .user_agent("trading_journal_bot/0.1.0")
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn messages(request: &GenerationRequest) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(request.history.len() + 3);
        messages.push(ChatTurn {
            role: Role::System,
            content: SYSTEM_PROMPT.to_string(),
        });
        if !request.context.trim().is_empty() {
            messages.push(ChatTurn {
                role: Role::System,
                content: format!("Journal context:\n{}", request.context),
            });
        }
        messages.extend(request.history.iter().cloned());
        messages.push(ChatTurn::user(request.message.as_str()));
        messages
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages: Self::messages(&request),
            temperature: 0.3,
        };

        debug!(
            "Requesting completion for user {} ({} history turns)",
            request.user_id,
            request.history.len()
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let body = resp.text().await?;
            error!("Model API request failed with {}: {}", code, body);
            return Err(LlmError::Status { code, body });
        }

        let completion = resp.json::<CompletionResponse>().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}
