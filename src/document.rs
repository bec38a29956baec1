//! Typed detail-page copy document produced by the LLM and consumed by the
//! render service.
//!
//! Every section is optional at the type level so that a document missing a
//! required section still parses and the validator can name what is missing.
//! Keys the model adds beyond this schema are kept in `extra` and written
//! back unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use thiserror::Error;

use crate::models::Platform;

pub const SCHEMA_VERSION: &str = "5.2";

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct DetailPage {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub schema_version: Option<String>,
    #[serde(default, deserialize_with = "lenient::platform")]
    pub platform: Option<Platform>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub style: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub category_key: Option<String>,
    pub section_toggles: Option<SectionToggles>,
    pub seller_overrides: Option<SellerOverrides>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_images: Vec<ProductImage>,
    pub hero: Option<Hero>,
    pub problem: Option<Problem>,
    pub benefits: Option<Benefits>,
    pub details: Option<Details>,
    pub selection_reasons: Option<SelectionReasons>,
    pub specs: Option<Specs>,
    pub how_to: Option<HowTo>,
    pub faq: Option<Faq>,
    pub cta: Option<Cta>,
    pub compliance: Option<Compliance>,
    pub visual_hints: Option<VisualHints>,
    pub social_proof: Option<Value>,
    /// Slide id to the seller photo that replaced its original reference image.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub replaced_images: BTreeMap<String, String>,
    /// Fields set aside by [`DetailPage::from_model_output`] because their
    /// shape did not fit the schema, with the decode error for each.
    #[serde(skip)]
    pub malformed: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetailPage {
    /// Decodes a model-produced object field by field. A field whose shape
    /// cannot be coerced is dropped and listed in `malformed` so the
    /// validator reports it instead of the whole draft failing to parse.
    pub fn from_model_output(mut object: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut malformed = Vec::new();
        let keys: Vec<String> = object.keys().cloned().collect();
        for key in keys {
            let Some(value) = object.get(&key) else { continue };
            let single = Map::from_iter([(key.clone(), value.clone())]);
            if let Err(e) = serde_json::from_value::<DetailPage>(Value::Object(single)) {
                object.remove(&key);
                malformed.push(format!("malformed field: {key} ({e})"));
            }
        }

        let mut doc: DetailPage = serde_json::from_value(Value::Object(object))?;
        doc.malformed = malformed;
        Ok(doc)
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SectionToggles {
    #[serde(deserialize_with = "lenient::opt_flag")]
    pub problem: Option<bool>,
    #[serde(deserialize_with = "lenient::opt_flag")]
    pub selection_reasons: Option<bool>,
    #[serde(deserialize_with = "lenient::opt_flag")]
    pub how_to: Option<bool>,
    #[serde(deserialize_with = "lenient::opt_flag")]
    pub faq: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SellerOverrides {
    #[serde(deserialize_with = "lenient::texts")]
    pub must_include: Vec<String>,
    #[serde(deserialize_with = "lenient::texts")]
    pub must_avoid: Vec<String>,
    #[serde(deserialize_with = "lenient::texts")]
    pub compliance_notes: Vec<String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ProductImage {
    #[serde(deserialize_with = "lenient::text")]
    pub url: String,
    #[serde(deserialize_with = "lenient::text")]
    pub alt: String,
    #[serde(deserialize_with = "lenient::opt_number")]
    pub priority: Option<i64>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Hero {
    #[serde(deserialize_with = "lenient::text")]
    pub product_title: String,
    #[serde(deserialize_with = "lenient::text")]
    pub hook_line: String,
    #[serde(deserialize_with = "lenient::text")]
    pub sub_hook: String,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub badge: Option<String>,
    #[serde(deserialize_with = "lenient::opt_number")]
    pub primary_image_index: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct IconText {
    #[serde(deserialize_with = "lenient::text")]
    pub icon: String,
    #[serde(deserialize_with = "lenient::text")]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Problem {
    #[serde(deserialize_with = "lenient::text")]
    pub headline: String,
    pub pain_points: Vec<IconText>,
    #[serde(deserialize_with = "lenient::text")]
    pub bridge: String,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Benefit {
    #[serde(deserialize_with = "lenient::text")]
    pub icon: String,
    #[serde(deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub highlight_value: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Benefits {
    #[serde(deserialize_with = "lenient::text")]
    pub section_title: String,
    pub items: Vec<Benefit>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DetailBlock {
    #[serde(deserialize_with = "lenient::text")]
    pub slide_label: String,
    #[serde(deserialize_with = "lenient::text")]
    pub headline: String,
    #[serde(deserialize_with = "lenient::text")]
    pub body: String,
    #[serde(deserialize_with = "lenient::opt_number")]
    pub image_index: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub bg_tone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Details {
    pub blocks: Vec<DetailBlock>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Reason {
    #[serde(deserialize_with = "lenient::text")]
    pub icon: String,
    #[serde(deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(deserialize_with = "lenient::text")]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SelectionReasons {
    #[serde(deserialize_with = "lenient::text")]
    pub headline: String,
    pub items: Vec<Reason>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SpecRow {
    #[serde(deserialize_with = "lenient::text")]
    pub label: String,
    #[serde(deserialize_with = "lenient::text")]
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ComparisonItem {
    #[serde(deserialize_with = "lenient::text")]
    pub label: String,
    #[serde(deserialize_with = "lenient::text")]
    pub ours: String,
    #[serde(deserialize_with = "lenient::text")]
    pub others: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Comparison {
    #[serde(deserialize_with = "lenient::flag")]
    pub enabled: bool,
    pub items: Vec<ComparisonItem>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Specs {
    #[serde(deserialize_with = "lenient::text")]
    pub section_title: String,
    pub rows: Vec<SpecRow>,
    pub comparison: Option<Comparison>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct HowToStep {
    #[serde(deserialize_with = "lenient::opt_number")]
    pub step_number: Option<u32>,
    #[serde(deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct HowTo {
    #[serde(deserialize_with = "lenient::text")]
    pub section_title: String,
    pub steps: Vec<HowToStep>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct FaqItem {
    #[serde(deserialize_with = "lenient::text")]
    pub question: String,
    #[serde(deserialize_with = "lenient::text")]
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Faq {
    #[serde(deserialize_with = "lenient::text")]
    pub section_title: String,
    pub items: Vec<FaqItem>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TrustBadge {
    #[serde(deserialize_with = "lenient::text")]
    pub icon: String,
    #[serde(deserialize_with = "lenient::text")]
    pub label: String,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Cta {
    #[serde(deserialize_with = "lenient::text")]
    pub headline: String,
    #[serde(deserialize_with = "lenient::text")]
    pub sub_text: String,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub urgency: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub bonus: Option<String>,
    pub trust_badges: Vec<TrustBadge>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Compliance {
    #[serde(deserialize_with = "lenient::texts")]
    pub legal_notices: Vec<String>,
    #[serde(deserialize_with = "lenient::opt_flag")]
    pub prohibited_claims_check: Option<bool>,
    #[serde(deserialize_with = "lenient::opt_flag")]
    pub platform_policy_check: Option<bool>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct VisualHints {
    #[serde(deserialize_with = "lenient::opt_text")]
    pub color_accent: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub mood: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub image_style_note: Option<String>,
}

/// Scalar coercions for model output: numbers and booleans where text is
/// expected, numeric strings where numbers are, any-case platform names.
mod lenient {
    use std::str::FromStr;

    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use crate::models::Platform;

    fn kind(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        }
    }

    fn scalar_text(value: Value) -> Result<Option<String>, String> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(format!("expected text, found {}", kind(&other))),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        scalar_text(Value::deserialize(d)?).map(Option::unwrap_or_default).map_err(D::Error::custom)
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        scalar_text(Value::deserialize(d)?).map_err(D::Error::custom)
    }

    /// A list of text, or a single scalar taken as a one-item list.
    pub fn texts<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let items = match Value::deserialize(d)? {
            Value::Array(items) => items,
            Value::Null => return Ok(Vec::new()),
            single => vec![single],
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if let Some(s) = scalar_text(item).map_err(D::Error::custom)? {
                out.push(s);
            }
        }
        Ok(out)
    }

    pub fn opt_number<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr + DeserializeOwned,
    {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected a number, found \"{s}\""))),
            other => T::deserialize(other).map(Some).map_err(D::Error::custom),
        }
    }

    fn scalar_flag(value: Value) -> Result<Option<bool>, String> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Some(true)),
                "false" | "no" | "0" | "" => Ok(Some(false)),
                _ => Err(format!("expected a boolean, found \"{s}\"")),
            },
            Value::Number(n) => Ok(Some(n.as_f64().is_some_and(|n| n != 0.0))),
            other => Err(format!("expected a boolean, found {}", kind(&other))),
        }
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        scalar_flag(Value::deserialize(d)?).map(Option::unwrap_or_default).map_err(D::Error::custom)
    }

    pub fn opt_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        scalar_flag(Value::deserialize(d)?).map_err(D::Error::custom)
    }

    pub fn platform<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Platform>, D::Error> {
        match scalar_text(Value::deserialize(d)?).map_err(D::Error::custom)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => s.parse().map(Some).map_err(D::Error::custom),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("unknown editable field: {0}")]
    UnknownField(String),
    #[error("document has no {0} section")]
    MissingSection(&'static str),
    #[error("{field}: index {index} out of range (len {len})")]
    IndexOutOfRange { field: String, index: usize, len: usize },
}

/// Every text field an editor is allowed to change, addressed by its dotted
/// path (`hero.hook_line`, `faq.items.2.answer`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    HeroProductTitle,
    HeroHookLine,
    HeroSubHook,
    HeroBadge,
    ProblemHeadline,
    ProblemBridge,
    PainPoint(usize),
    BenefitsTitle,
    BenefitTitle(usize),
    BenefitDescription(usize),
    DetailLabel(usize),
    DetailHeadline(usize),
    DetailBody(usize),
    ReasonsHeadline,
    ReasonTitle(usize),
    ReasonText(usize),
    SpecsTitle,
    SpecValue(usize),
    HowToTitle,
    HowToStepDescription(usize),
    FaqTitle,
    FaqQuestion(usize),
    FaqAnswer(usize),
    CtaHeadline,
    CtaSubText,
    CtaUrgency,
    CtaBonus,
}

impl TextField {
    pub fn parse(path: &str) -> Result<Self, DocumentError> {
        let unknown = || DocumentError::UnknownField(path.to_string());
        let segments: Vec<&str> = path.trim().split('.').collect();
        let index = |s: &str| s.parse::<usize>().map_err(|_| unknown());

        let field = match segments.as_slice() {
            ["hero", "product_title"] => TextField::HeroProductTitle,
            ["hero", "hook_line"] => TextField::HeroHookLine,
            ["hero", "sub_hook"] => TextField::HeroSubHook,
            ["hero", "badge"] => TextField::HeroBadge,
            ["problem", "headline"] => TextField::ProblemHeadline,
            ["problem", "bridge"] => TextField::ProblemBridge,
            ["problem", "pain_points", i, "text"] => TextField::PainPoint(index(i)?),
            ["benefits", "section_title"] => TextField::BenefitsTitle,
            ["benefits", "items", i, "title"] => TextField::BenefitTitle(index(i)?),
            ["benefits", "items", i, "description"] => TextField::BenefitDescription(index(i)?),
            ["details", "blocks", i, "slide_label"] => TextField::DetailLabel(index(i)?),
            ["details", "blocks", i, "headline"] => TextField::DetailHeadline(index(i)?),
            ["details", "blocks", i, "body"] => TextField::DetailBody(index(i)?),
            ["selection_reasons", "headline"] => TextField::ReasonsHeadline,
            ["selection_reasons", "items", i, "title"] => TextField::ReasonTitle(index(i)?),
            ["selection_reasons", "items", i, "text"] => TextField::ReasonText(index(i)?),
            ["specs", "section_title"] => TextField::SpecsTitle,
            ["specs", "rows", i, "value"] => TextField::SpecValue(index(i)?),
            ["how_to", "section_title"] => TextField::HowToTitle,
            ["how_to", "steps", i, "description"] => TextField::HowToStepDescription(index(i)?),
            ["faq", "section_title"] => TextField::FaqTitle,
            ["faq", "items", i, "question"] => TextField::FaqQuestion(index(i)?),
            ["faq", "items", i, "answer"] => TextField::FaqAnswer(index(i)?),
            ["cta", "headline"] => TextField::CtaHeadline,
            ["cta", "sub_text"] => TextField::CtaSubText,
            ["cta", "urgency"] => TextField::CtaUrgency,
            ["cta", "bonus"] => TextField::CtaBonus,
            _ => return Err(unknown()),
        };
        Ok(field)
    }

    /// The headline-like field a plain-text edit of a whole slide lands on.
    pub fn primary_for_slide(slide_id: &str) -> Option<Self> {
        match slide_id {
            "hero" => Some(TextField::HeroHookLine),
            "problem" | "problem-benefits" => Some(TextField::ProblemHeadline),
            "benefits" => Some(TextField::BenefitsTitle),
            "details" => Some(TextField::DetailHeadline(0)),
            "reasons-specs" | "selection_reasons" => Some(TextField::ReasonsHeadline),
            "specs" => Some(TextField::SpecsTitle),
            "faq" => Some(TextField::FaqTitle),
            "cta" => Some(TextField::CtaHeadline),
            other => other
                .strip_prefix("details-")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .map(|n| TextField::DetailHeadline(n - 1)),
        }
    }

    pub fn get<'a>(&self, doc: &'a DetailPage) -> Option<&'a str> {
        use TextField::*;
        let s: &String = match *self {
            HeroProductTitle => &doc.hero.as_ref()?.product_title,
            HeroHookLine => &doc.hero.as_ref()?.hook_line,
            HeroSubHook => &doc.hero.as_ref()?.sub_hook,
            HeroBadge => doc.hero.as_ref()?.badge.as_ref()?,
            ProblemHeadline => &doc.problem.as_ref()?.headline,
            ProblemBridge => &doc.problem.as_ref()?.bridge,
            PainPoint(i) => &doc.problem.as_ref()?.pain_points.get(i)?.text,
            BenefitsTitle => &doc.benefits.as_ref()?.section_title,
            BenefitTitle(i) => &doc.benefits.as_ref()?.items.get(i)?.title,
            BenefitDescription(i) => &doc.benefits.as_ref()?.items.get(i)?.description,
            DetailLabel(i) => &doc.details.as_ref()?.blocks.get(i)?.slide_label,
            DetailHeadline(i) => &doc.details.as_ref()?.blocks.get(i)?.headline,
            DetailBody(i) => &doc.details.as_ref()?.blocks.get(i)?.body,
            ReasonsHeadline => &doc.selection_reasons.as_ref()?.headline,
            ReasonTitle(i) => &doc.selection_reasons.as_ref()?.items.get(i)?.title,
            ReasonText(i) => &doc.selection_reasons.as_ref()?.items.get(i)?.text,
            SpecsTitle => &doc.specs.as_ref()?.section_title,
            SpecValue(i) => &doc.specs.as_ref()?.rows.get(i)?.value,
            HowToTitle => &doc.how_to.as_ref()?.section_title,
            HowToStepDescription(i) => &doc.how_to.as_ref()?.steps.get(i)?.description,
            FaqTitle => &doc.faq.as_ref()?.section_title,
            FaqQuestion(i) => &doc.faq.as_ref()?.items.get(i)?.question,
            FaqAnswer(i) => &doc.faq.as_ref()?.items.get(i)?.answer,
            CtaHeadline => &doc.cta.as_ref()?.headline,
            CtaSubText => &doc.cta.as_ref()?.sub_text,
            CtaUrgency => doc.cta.as_ref()?.urgency.as_ref()?,
            CtaBonus => doc.cta.as_ref()?.bonus.as_ref()?,
        };
        Some(s.as_str())
    }

    pub fn set(&self, doc: &mut DetailPage, value: impl Into<String>) -> Result<(), DocumentError> {
        *self.slot(doc)? = value.into();
        Ok(())
    }

    fn slot<'a>(&self, doc: &'a mut DetailPage) -> Result<&'a mut String, DocumentError> {
        use TextField::*;
        let field = self.to_string();
        let at = move |index: usize, len: usize| DocumentError::IndexOutOfRange { field: field.clone(), index, len };

        macro_rules! section {
            ($name:ident) => {
                doc.$name.as_mut().ok_or(DocumentError::MissingSection(stringify!($name)))?
            };
        }
        macro_rules! item {
            ($list:expr, $i:expr) => {{
                let list = $list;
                let len = list.len();
                list.get_mut($i).ok_or_else(|| at($i, len))?
            }};
        }

        let slot = match *self {
            HeroProductTitle => &mut section!(hero).product_title,
            HeroHookLine => &mut section!(hero).hook_line,
            HeroSubHook => &mut section!(hero).sub_hook,
            HeroBadge => section!(hero).badge.get_or_insert_with(String::new),
            ProblemHeadline => &mut section!(problem).headline,
            ProblemBridge => &mut section!(problem).bridge,
            PainPoint(i) => &mut item!(&mut section!(problem).pain_points, i).text,
            BenefitsTitle => &mut section!(benefits).section_title,
            BenefitTitle(i) => &mut item!(&mut section!(benefits).items, i).title,
            BenefitDescription(i) => &mut item!(&mut section!(benefits).items, i).description,
            DetailLabel(i) => &mut item!(&mut section!(details).blocks, i).slide_label,
            DetailHeadline(i) => &mut item!(&mut section!(details).blocks, i).headline,
            DetailBody(i) => &mut item!(&mut section!(details).blocks, i).body,
            ReasonsHeadline => &mut section!(selection_reasons).headline,
            ReasonTitle(i) => &mut item!(&mut section!(selection_reasons).items, i).title,
            ReasonText(i) => &mut item!(&mut section!(selection_reasons).items, i).text,
            SpecsTitle => &mut section!(specs).section_title,
            SpecValue(i) => &mut item!(&mut section!(specs).rows, i).value,
            HowToTitle => &mut section!(how_to).section_title,
            HowToStepDescription(i) => &mut item!(&mut section!(how_to).steps, i).description,
            FaqTitle => &mut section!(faq).section_title,
            FaqQuestion(i) => &mut item!(&mut section!(faq).items, i).question,
            FaqAnswer(i) => &mut item!(&mut section!(faq).items, i).answer,
            CtaHeadline => &mut section!(cta).headline,
            CtaSubText => &mut section!(cta).sub_text,
            CtaUrgency => section!(cta).urgency.get_or_insert_with(String::new),
            CtaBonus => section!(cta).bonus.get_or_insert_with(String::new),
        };
        Ok(slot)
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TextField::*;
        match self {
            HeroProductTitle => write!(f, "hero.product_title"),
            HeroHookLine => write!(f, "hero.hook_line"),
            HeroSubHook => write!(f, "hero.sub_hook"),
            HeroBadge => write!(f, "hero.badge"),
            ProblemHeadline => write!(f, "problem.headline"),
            ProblemBridge => write!(f, "problem.bridge"),
            PainPoint(i) => write!(f, "problem.pain_points.{i}.text"),
            BenefitsTitle => write!(f, "benefits.section_title"),
            BenefitTitle(i) => write!(f, "benefits.items.{i}.title"),
            BenefitDescription(i) => write!(f, "benefits.items.{i}.description"),
            DetailLabel(i) => write!(f, "details.blocks.{i}.slide_label"),
            DetailHeadline(i) => write!(f, "details.blocks.{i}.headline"),
            DetailBody(i) => write!(f, "details.blocks.{i}.body"),
            ReasonsHeadline => write!(f, "selection_reasons.headline"),
            ReasonTitle(i) => write!(f, "selection_reasons.items.{i}.title"),
            ReasonText(i) => write!(f, "selection_reasons.items.{i}.text"),
            SpecsTitle => write!(f, "specs.section_title"),
            SpecValue(i) => write!(f, "specs.rows.{i}.value"),
            HowToTitle => write!(f, "how_to.section_title"),
            HowToStepDescription(i) => write!(f, "how_to.steps.{i}.description"),
            FaqTitle => write!(f, "faq.section_title"),
            FaqQuestion(i) => write!(f, "faq.items.{i}.question"),
            FaqAnswer(i) => write!(f, "faq.items.{i}.answer"),
            CtaHeadline => write!(f, "cta.headline"),
            CtaSubText => write!(f, "cta.sub_text"),
            CtaUrgency => write!(f, "cta.urgency"),
            CtaBonus => write!(f, "cta.bonus"),
        }
    }
}
