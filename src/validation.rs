//! Content rules for generated copy. Pure functions only: the same document
//! and category always yield the same report.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{DetailPage, SCHEMA_VERSION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKey {
    Electronics,
    Food,
    Beauty,
    Fashion,
    Living,
    General,
}

const ELECTRONICS_KEYWORDS: &[&str] = &[
    "아이패드", "ipad", "태블릿", "노트북", "맥북", "키보드", "마우스", "충전기", "보조배터리",
    "이어폰", "헤드폰", "스피커", "모니터", "케이블", "허브", "ssd", "hdd", "램", "ram",
    "선풍기", "서큘레이터", "청소기", "공기청정기", "제습기", "가습기", "가전", "전자",
    "스마트", "블루투스", "와이파이", "wifi", "usb", "usbc", "type-c", "타입c",
    "냉장고", "에어컨", "세탁기", "건조기", "전자레인지", "로봇청소기",
];

impl CategoryKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKey::Electronics => "electronics",
            CategoryKey::Food => "food",
            CategoryKey::Beauty => "beauty",
            CategoryKey::Fashion => "fashion",
            CategoryKey::Living => "living",
            CategoryKey::General => "general",
        }
    }

    /// How many LLM attempts the validation gate allows for this category.
    pub fn max_attempts(&self) -> u32 {
        match self {
            CategoryKey::Electronics => 2,
            _ => 1,
        }
    }

    /// Electronics is detected from any of the seller's text; other buckets
    /// only from the explicit category. Anything unrecognised is `General`.
    pub fn infer(category: Option<&str>, product_title: &str, notes: Option<&str>) -> Self {
        let haystack = format!(
            "{} {} {}",
            category.unwrap_or_default(),
            product_title,
            notes.unwrap_or_default()
        )
        .to_lowercase();
        if ELECTRONICS_KEYWORDS.iter().any(|k| haystack.contains(k)) {
            return CategoryKey::Electronics;
        }

        let category = category.unwrap_or_default().trim().to_lowercase();
        if category.is_empty() {
            return CategoryKey::General;
        }
        let matches = |words: &[&str]| words.iter().any(|w| category.contains(w));
        if matches(&["electronics", "전자", "가전"]) {
            CategoryKey::Electronics
        } else if matches(&["food", "식품", "음식"]) {
            CategoryKey::Food
        } else if matches(&["beauty", "뷰티", "화장품"]) {
            CategoryKey::Beauty
        } else if matches(&["fashion", "패션", "의류"]) {
            CategoryKey::Fashion
        } else if matches(&["living", "리빙", "생활"]) {
            CategoryKey::Living
        } else {
            CategoryKey::General
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PROHIBITED_PHRASES: &[&str] = &[
    "치료", "완치", "의학적 효능", "100% 보장", "100% 효과", "세계 최초", "업계 최고", "무조건", "부작용 없",
];

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{.*?\}\}|\[placeholder\]|\[TBD\]|\[TODO\]").expect("valid regex"));
static NOW_IMPERATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"이제\s*(바로|곧|당장)?\s*(하세요|해보세요|사용하세요|확인하세요)").expect("valid regex")
});
static IMPERATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(하세요|해보세요|바로\s*하세요)").expect("valid regex"));
static BRAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(삼성|애플|lg|샤오미|sony|소니|갤럭시|아이폰|맥북)").expect("valid regex")
});

const IMPERATIVE_LIMIT: usize = 6;

pub fn validate(doc: &DetailPage, category: CategoryKey) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_structure(doc, &mut errors, &mut warnings);

    let all_text = serde_json::to_string(doc).unwrap_or_default();
    if PLACEHOLDER.is_match(&all_text) {
        errors.push("placeholder found".to_string());
    }

    // seller_overrides legitimately quotes the phrases the seller wants avoided
    let content_text = {
        let mut content = doc.clone();
        content.seller_overrides = None;
        serde_json::to_string(&content).unwrap_or_default()
    };
    for phrase in PROHIBITED_PHRASES {
        if content_text.contains(phrase) {
            errors.push(format!("prohibited phrase: \"{phrase}\""));
        }
    }

    check_lengths(doc, &mut errors);
    check_list_sizes(doc, &mut warnings);
    check_tone(&content_text, &mut warnings);
    check_qualitative_fields(doc, &mut warnings);

    let electronics = category == CategoryKey::Electronics
        || doc.category_key.as_deref() == Some(CategoryKey::Electronics.as_str());
    if electronics {
        check_electronics(doc, &mut warnings);
    }

    ValidationReport { valid: errors.is_empty(), errors, warnings }
}

fn check_structure(doc: &DetailPage, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    errors.extend(doc.malformed.iter().cloned());

    match doc.schema_version.as_deref() {
        None => errors.push("missing required field: schema_version".to_string()),
        Some(SCHEMA_VERSION) => {}
        Some(other) => errors.push(format!("schema_version must be {SCHEMA_VERSION} (got {other})")),
    }
    if doc.platform.is_none() {
        errors.push("missing required field: platform".to_string());
    }

    let required = [
        ("hero", doc.hero.is_some()),
        ("problem", doc.problem.is_some()),
        ("benefits", doc.benefits.is_some()),
        ("details", doc.details.is_some()),
        ("specs", doc.specs.is_some()),
        ("cta", doc.cta.is_some()),
    ];
    for (name, present) in required {
        if !present {
            errors.push(format!("missing required field: {name}"));
        }
    }

    let recommended = [
        ("selection_reasons", doc.selection_reasons.is_some()),
        ("category_key", doc.category_key.as_deref().is_some_and(|c| !c.is_empty())),
        ("section_toggles", doc.section_toggles.is_some()),
    ];
    for (name, present) in recommended {
        if !present {
            warnings.push(format!("missing recommended field: {name}"));
        }
    }

    if doc.social_proof.is_some() {
        warnings.push("social_proof generated; replace with selection_reasons".to_string());
    }
}

fn check_lengths(doc: &DetailPage, errors: &mut Vec<String>) {
    let mut bounds: Vec<(String, &str, usize)> = Vec::new();

    if let Some(hero) = &doc.hero {
        bounds.push(("hero.product_title".into(), &hero.product_title, 40));
        bounds.push(("hero.hook_line".into(), &hero.hook_line, 60));
        bounds.push(("hero.sub_hook".into(), &hero.sub_hook, 80));
        if let Some(badge) = &hero.badge {
            bounds.push(("hero.badge".into(), badge, 20));
        }
    }
    if let Some(problem) = &doc.problem {
        bounds.push(("problem.headline".into(), &problem.headline, 30));
        bounds.push(("problem.bridge".into(), &problem.bridge, 60));
    }
    if let Some(benefits) = &doc.benefits {
        for (i, item) in benefits.items.iter().enumerate() {
            bounds.push((format!("benefits.items.{i}.title"), &item.title, 15));
            bounds.push((format!("benefits.items.{i}.description"), &item.description, 40));
        }
    }
    if let Some(details) = &doc.details {
        for (i, block) in details.blocks.iter().enumerate() {
            bounds.push((format!("details.blocks.{i}.headline"), &block.headline, 30));
            bounds.push((format!("details.blocks.{i}.body"), &block.body, 150));
        }
    }
    if let Some(cta) = &doc.cta {
        bounds.push(("cta.headline".into(), &cta.headline, 30));
        bounds.push(("cta.sub_text".into(), &cta.sub_text, 60));
    }

    for (field, value, max) in bounds {
        let len = value.chars().count();
        if len > max {
            errors.push(format!("length exceeded: {field} ({len}>{max})"));
        }
    }
}

fn check_list_sizes(doc: &DetailPage, warnings: &mut Vec<String>) {
    let mut sized = |field: &str, len: usize, min: usize, max: usize| {
        if len < min || len > max {
            let expected = if min == max { format!("{min}") } else { format!("{min}-{max}") };
            warnings.push(format!("{field}: expected {expected} items (got {len})"));
        }
    };

    if let Some(problem) = &doc.problem {
        sized("problem.pain_points", problem.pain_points.len(), 3, 4);
    }
    if let Some(benefits) = &doc.benefits {
        sized("benefits.items", benefits.items.len(), 3, 5);
    }
    if let Some(details) = &doc.details {
        sized("details.blocks", details.blocks.len(), 2, 4);
    }
    if let Some(specs) = &doc.specs {
        sized("specs.rows", specs.rows.len(), 4, 10);
    }
    if let Some(faq) = &doc.faq {
        sized("faq.items", faq.items.len(), 3, 5);
    }
    if let Some(how_to) = &doc.how_to {
        sized("how_to.steps", how_to.steps.len(), 3, 5);
    }
    if let Some(cta) = &doc.cta {
        sized("cta.trust_badges", cta.trust_badges.len(), 2, 4);
    }
    if let Some(reasons) = &doc.selection_reasons {
        sized("selection_reasons.items", reasons.items.len(), 3, 3);
    }
}

fn check_tone(content_text: &str, warnings: &mut Vec<String>) {
    let now_hits = NOW_IMPERATIVE.find_iter(content_text).count();
    let imperative_hits = IMPERATIVE.find_iter(content_text).count();
    if now_hits >= 1 {
        warnings.push(format!("imperative hook (\"이제 ...하세요\") detected: {now_hits} times"));
    }
    if imperative_hits >= IMPERATIVE_LIMIT {
        warnings.push(format!("too many imperative endings: {imperative_hits} times"));
    }
}

fn check_qualitative_fields(doc: &DetailPage, warnings: &mut Vec<String>) {
    let has_digit = |s: &str| s.chars().any(|c| c.is_ascii_digit());

    if let Some(reasons) = &doc.selection_reasons {
        for (i, reason) in reasons.items.iter().enumerate() {
            if has_digit(&reason.title) {
                warnings.push(format!("numeric value in qualitative field: selection_reasons.items.{i}.title"));
            }
        }
    }
    if let Some(cta) = &doc.cta {
        if has_digit(&cta.headline) {
            warnings.push("numeric value in qualitative field: cta.headline".to_string());
        }
    }
}

fn check_electronics(doc: &DetailPage, warnings: &mut Vec<String>) {
    let comparison = doc.specs.as_ref().and_then(|s| s.comparison.as_ref());
    if !comparison.is_some_and(|c| c.enabled) {
        warnings.push("electronics: specs.comparison.enabled=true recommended".to_string());
    }
    if let Some(comparison) = comparison {
        let text = serde_json::to_string(&comparison.items).unwrap_or_default();
        if BRAND.is_match(&text) {
            warnings.push("electronics: brand name in comparison table; use generic wording".to_string());
        }
    }
}
