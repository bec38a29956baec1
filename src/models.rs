use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use std::fmt;
use std::str::FromStr;

use crate::document::DetailPage;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Coupang,
    Naver,
    Shopify,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Coupang => "coupang",
            Platform::Naver => "naver",
            Platform::Shopify => "shopify",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coupang" => Ok(Platform::Coupang),
            "naver" => Ok(Platform::Naver),
            "shopify" => Ok(Platform::Shopify),
            other => Err(format!("unsupported platform: {other}")),
        }
    }
}

/// Lifecycle of a generation. `Complete` and `Failed` are absorbing.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Generating,
    Rendering,
    Complete,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Complete | GenerationStatus::Failed)
    }

    pub fn can_transition_to(&self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (Generating, Rendering) | (Generating, Failed) | (Rendering, Complete) | (Rendering, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Generating => "generating",
            GenerationStatus::Rendering => "rendering",
            GenerationStatus::Complete => "complete",
            GenerationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of what the seller asked for, stored on the generation row.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SellerInput {
    pub product_title: String,
    pub platform: Platform,
    pub category: String,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub design_style: String,
    #[serde(default)]
    pub must_include: Vec<String>,
    #[serde(default)]
    pub must_avoid: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Generation {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub seller_input: SellerInput,
    pub status: GenerationStatus,
    pub generated_json: Option<DetailPage>,
    pub error_message: Option<String>,
    pub llm_time_ms: Option<u64>,
    pub render_time_ms: Option<u64>,
    pub zip_url: Option<String>,
    pub edits_remaining: u32,
    pub feedback_submitted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGeneration {
    pub owner_id: Option<Uuid>,
    pub seller_input: SellerInput,
}

/// Partial update of a generation row; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct GenerationPatch {
    pub status: Option<GenerationStatus>,
    pub seller_input: Option<SellerInput>,
    pub generated_json: Option<DetailPage>,
    pub error_message: Option<String>,
    pub llm_time_ms: Option<u64>,
    pub render_time_ms: Option<u64>,
    pub zip_url: Option<String>,
    pub edits_remaining: Option<u32>,
    pub feedback_submitted: Option<bool>,
}

impl GenerationPatch {
    pub fn status(status: GenerationStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { status: Some(GenerationStatus::Failed), error_message: Some(message.into()), ..Default::default() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenerationAsset {
    pub id: Uuid,
    pub generation_id: Uuid,
    pub slide_id: String,
    pub image_url: String,
    pub width: u32,
    pub height: u32,
    pub file_size_kb: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAsset {
    pub generation_id: Uuid,
    pub slide_id: String,
    pub image_url: String,
    pub width: u32,
    pub height: u32,
    pub file_size_kb: u64,
}

/// Everything an edit or replace commits in one store operation.
#[derive(Debug, Clone)]
pub struct SlideReplacement {
    pub generation_id: Uuid,
    pub asset_id: Uuid,
    pub image_url: String,
    pub document: DetailPage,
    pub seller_image_urls: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Feedback {
    pub generation_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub weak_cuts: Vec<String>,
    #[serde(default)]
    pub upload_intent: Option<String>,
    #[serde(default)]
    pub paid_intent: Option<String>,
    #[serde(default)]
    pub improvement_areas: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

// --- HTTP request bodies ---

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GenerateRequest {
    #[serde(default)]
    pub product_title: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub design_style: Option<String>,
    #[serde(default)]
    pub must_include: Vec<String>,
    #[serde(default)]
    pub must_avoid: Vec<String>,
}

/// A seller photo received with the generate request.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: bytes::Bytes,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tweak {
    Shorter,
    Direct,
    Premium,
}

impl Tweak {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tweak::Shorter => "shorter",
            Tweak::Direct => "direct",
            Tweak::Premium => "premium",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TextEdit {
    pub path: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EditCutRequest {
    #[serde(default)]
    pub generation_id: Option<Uuid>,
    #[serde(default)]
    pub slide_id: Option<String>,
    #[serde(default)]
    pub full_json_update: Option<DetailPage>,
    #[serde(default)]
    pub edits: Vec<TextEdit>,
    #[serde(default)]
    pub edited_text: Option<String>,
    #[serde(default)]
    pub tweak: Option<Tweak>,
}

// --- Pipeline outcomes ---

#[derive(Debug, Serialize, Clone)]
pub struct GenerationOutcome {
    pub generation_id: Uuid,
    pub status: GenerationStatus,
    pub total_time_ms: u64,
    pub attempts: u32,
    pub edits_remaining: u32,
    pub zip_url: Option<String>,
    pub zip_pending: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct SlideUpdate {
    pub generation_id: Uuid,
    pub slide_id: String,
    pub image_url: String,
    pub edits_remaining: u32,
}

#[derive(Debug, Serialize, Clone)]
pub struct GenerationView {
    pub generation: Generation,
    pub assets: Vec<GenerationAsset>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_machine_only_moves_forward() {
        use GenerationStatus::*;
        assert!(Generating.can_transition_to(Rendering));
        assert!(Generating.can_transition_to(Failed));
        assert!(Rendering.can_transition_to(Complete));
        assert!(Rendering.can_transition_to(Failed));
        assert!(!Generating.can_transition_to(Complete));
        for terminal in [Complete, Failed] {
            assert!(terminal.is_terminal());
            for next in [Generating, Rendering, Complete, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("Coupang".parse::<Platform>().unwrap(), Platform::Coupang);
        assert_eq!(" naver ".parse::<Platform>().unwrap(), Platform::Naver);
        assert!("amazon".parse::<Platform>().is_err());
    }
}
