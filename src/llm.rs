use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::LlmConfig;
use crate::document::{DetailPage, SCHEMA_VERSION};
use crate::models::SellerInput;
use crate::validation::CategoryKey;

const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Upper bound for any upstream text we keep in errors or logs.
pub const MAX_ERROR_CHARS: usize = 500;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LlmError {
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("LLM transport error: {0}")]
    Transport(String),
    #[error("LLM returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("LLM response is not valid JSON: {0}")]
    Parse(String),
    #[error("LLM reported failure: {0}")]
    Declared(String),
}

/// Seller input plus the blocking errors of the previous attempt, if any.
#[derive(Debug, Clone)]
pub struct CopyRequest {
    pub seller: SellerInput,
    pub category: CategoryKey,
    pub feedback: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CopyDraft {
    pub document: DetailPage,
    pub elapsed_ms: u64,
}

#[async_trait]
pub trait CopyGenerator: Send + Sync {
    /// Checked before a generation row exists so misconfiguration never leaves one behind.
    fn ensure_configured(&self) -> Result<(), LlmError> {
        Ok(())
    }

    async fn generate_copy(&self, request: &CopyRequest) -> Result<CopyDraft, LlmError>;
}

pub struct AnthropicCopyClient {
    http: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl AnthropicCopyClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.api_key.as_deref().filter(|k| !k.is_empty()).ok_or(LlmError::MissingConfig("ANTHROPIC_API_KEY"))
    }
}

#[async_trait]
impl CopyGenerator for AnthropicCopyClient {
    fn ensure_configured(&self) -> Result<(), LlmError> {
        self.api_key().map(|_| ())
    }

    async fn generate_copy(&self, request: &CopyRequest) -> Result<CopyDraft, LlmError> {
        let api_key = self.api_key()?;
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.5,
            system: build_system_prompt(request.category),
            messages: vec![Message { role: "user", content: build_user_prompt(request) }],
        };

        info!(
            "🧠 Requesting copy for '{}' (category={}, feedback_items={})",
            request.seller.product_title,
            request.category,
            request.feedback.len()
        );
        let started = Instant::now();

        let response = self.http
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(truncate(&e.to_string(), MAX_ERROR_CHARS)))?;

        let status = response.status();
        let response_text = response.text().await
            .map_err(|e| LlmError::Transport(truncate(&e.to_string(), MAX_ERROR_CHARS)))?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            let body = truncate(&response_text, MAX_ERROR_CHARS);
            error!("❌ LLM API error {}: {}", status, body);
            return Err(LlmError::Http { status: status.as_u16(), body });
        }

        let parsed: MessagesResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("❌ Unexpected LLM envelope: {}", truncate(&response_text, MAX_ERROR_CHARS));
            LlmError::Parse(format!("envelope: {e}"))
        })?;
        let raw = parsed.text();

        let document = parse_document(&raw).map_err(|e| {
            warn!("⚠️ Unusable LLM output ({}): {}", e, truncate(&raw, MAX_ERROR_CHARS));
            e
        })?;

        info!("✅ Copy generated in {}ms", elapsed_ms);
        Ok(CopyDraft { document, elapsed_ms })
    }
}

// --- Prompting ---

fn build_system_prompt(category: CategoryKey) -> String {
    let mut prompt = format!(
        "You are a Korean e-commerce detail page copywriter. Return exactly one JSON object that \
         follows detail page schema v{SCHEMA_VERSION}: schema_version, platform, style, language, \
         category_key, section_toggles, seller_overrides, product_images, hero, problem, benefits, \
         details, selection_reasons, specs, how_to, faq, cta, compliance, visual_hints. \
         No prose, no markdown, no code fences. Respect every field's character limit. \
         Never emit placeholders such as {{{{...}}}}, [TBD] or [TODO]. Never generate social_proof; \
         write exactly three selection_reasons instead. Avoid medical claims and absolute superlatives."
    );
    if category == CategoryKey::Electronics {
        prompt.push_str(
            "\n\nCategory preset (electronics): pair every spec with an everyday translation, \
             enable specs.comparison without naming brands or models, keep hero and cta free of \
             imperative hooks, and end the last detail block on the felt result.",
        );
    }
    prompt
}

pub fn build_user_prompt(request: &CopyRequest) -> String {
    let seller = &request.seller;
    let mut prompt = format!(
        "Create the detail page JSON for this product.\n\nProduct: {}\nPlatform: {}\nStyle: {}\nCategory: {}",
        seller.product_title, seller.platform, seller.design_style, request.category
    );

    if !seller.image_urls.is_empty() {
        prompt.push_str(&format!(
            "\n\n{} product photos provided. Reference them in product_images with alt text:",
            seller.image_urls.len()
        ));
        for (i, url) in seller.image_urls.iter().enumerate() {
            prompt.push_str(&format!("\n  {i}: {url}"));
        }
    }
    if !seller.must_include.is_empty() {
        prompt.push_str("\n\nMust include:");
        for item in &seller.must_include {
            prompt.push_str(&format!("\n  - {item}"));
        }
    }
    if !seller.must_avoid.is_empty() {
        prompt.push_str("\n\nNever use these expressions:");
        for item in &seller.must_avoid {
            prompt.push_str(&format!("\n  - {item}"));
        }
    }
    if let Some(info) = seller.additional_info.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!("\n\nAdditional product information:\n{info}"));
    }
    if !request.feedback.is_empty() {
        prompt.push_str("\n\nYour previous answer failed validation. Fix exactly these issues and keep everything else:");
        for issue in &request.feedback {
            prompt.push_str(&format!("\n  - {issue}"));
        }
    }

    prompt.push_str(&format!(
        "\n\nSet category_key to \"{}\". Output JSON only.",
        request.category
    ));
    prompt
}

// --- Response parsing ---

/// Pull a JSON value out of model output that may be wrapped in code fences
/// or surrounded by prose.
pub fn extract_json(raw: &str) -> Result<Value, LlmError> {
    let cleaned = strip_code_fences(raw.trim());
    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok(value);
    }

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str::<Value>(&cleaned[start..=end])
            .map_err(|e| LlmError::Parse(truncate(&format!("{e}: {cleaned}"), MAX_ERROR_CHARS))),
        _ => Err(LlmError::Parse(truncate(&format!("no JSON object found: {cleaned}"), MAX_ERROR_CHARS))),
    }
}

fn strip_code_fences(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else { return s };
    let rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    rest.strip_suffix("```").unwrap_or(rest).trim_end()
}

pub fn parse_document(raw: &str) -> Result<DetailPage, LlmError> {
    let value = extract_json(raw)?;
    let Value::Object(object) = value else {
        return Err(LlmError::Parse("expected a JSON object".to_string()));
    };

    let declared_failure = object
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("failed") || s.eq_ignore_ascii_case("error"));
    if declared_failure {
        let reason = object
            .get("error")
            .or_else(|| object.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("no reason given");
        return Err(LlmError::Declared(truncate(reason, MAX_ERROR_CHARS)));
    }

    DetailPage::from_model_output(object)
        .map_err(|e| LlmError::Parse(truncate(&e.to_string(), MAX_ERROR_CHARS)))
}

pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect()
    }
}
