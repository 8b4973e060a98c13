//! Brochure data carried into an export: generated copy, contact details and
//! the request handed to a template.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Template used when a request does not name one
pub const DEFAULT_TEMPLATE: &str = "basic";

/// Brand colour used when a request does not carry one
pub const DEFAULT_BRAND_COLOR: &str = "#3b82f6";

/// Generated marketing copy for one brochure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrochureContent {
    pub hero_title: String,
    pub hero_subtitle: String,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub cta: String,
    #[serde(default)]
    pub contact: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub title: String,
    pub description: String,
}

/// Ways to reach the business; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl ContactDetails {
    /// The website with a scheme, if one was given
    pub fn website_url(&self) -> Option<String> {
        self.website
            .as_deref()
            .map(normalize_url)
            .filter(|u| !u.is_empty())
    }
}

/// Everything a template needs to produce the brochure markup.
///
/// Passed by value; the export never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub content: BrochureContent,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default = "default_brand_color")]
    pub brand_color: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub contact_details: ContactDetails,
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_brand_color() -> String {
    DEFAULT_BRAND_COLOR.to_string()
}

impl ExportRequest {
    pub fn new(content: BrochureContent) -> Self {
        Self {
            content,
            template: default_template(),
            brand_color: default_brand_color(),
            logo_url: None,
            images: Vec::new(),
            contact_details: ContactDetails::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidContent(format!("Failed to parse export request: {}", e)))
    }
}

/// Add `https://` to a URL that has no scheme.
///
/// Whitespace is trimmed, `http://` and `https://` URLs are kept as-is,
/// protocol-relative `//host` URLs get `https:`, and an empty input stays empty.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        format!("https://{}", url)
    }
}

/// The business brief a content generator works from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefParams {
    pub company: String,
    pub industry: String,
    pub audience: String,
    pub purpose: String,
    pub brief: String,
}

impl BriefParams {
    /// Every field is required
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("company", &self.company),
            ("industry", &self.industry),
            ("audience", &self.audience),
            ("purpose", &self.purpose),
            ("brief", &self.brief),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| *k)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidContent(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Instruction text asking a language model for [`BrochureContent`] JSON
    pub fn prompt(&self) -> String {
        PROMPT_TEMPLATE
            .replace("{{COMPANY}}", &self.company)
            .replace("{{INDUSTRY}}", &self.industry)
            .replace("{{AUDIENCE}}", &self.audience)
            .replace("{{PURPOSE}}", &self.purpose)
            .replace("{{BRIEF}}", &self.brief)
    }
}

const PROMPT_TEMPLATE: &str = r#"You are an expert marketing copywriter.
Generate brochure content in structured JSON.

Business:
{{COMPANY}}

Industry:
{{INDUSTRY}}

Target Audience:
{{AUDIENCE}}

Purpose:
{{PURPOSE}}

Brief:
{{BRIEF}}

Return JSON only (no markdown, no code blocks):
{
  "hero_title": "",
  "hero_subtitle": "",
  "features": [{"title": "", "description": ""}],
  "about": "",
  "cta": "",
  "contact": ""
}"#;

/// Parse a content generator's raw reply.
///
/// A surrounding Markdown code fence (with or without a `json` tag) is
/// stripped. The payload must carry a non-empty `hero_title` and
/// `hero_subtitle` and a `features` array.
pub fn parse_generated_content(text: &str) -> Result<BrochureContent> {
    let body = strip_code_fence(text.trim());
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::InvalidContent(format!("reply is not JSON: {}", e)))?;

    let non_empty = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| !s.is_empty())
    };
    if !non_empty("hero_title") || !non_empty("hero_subtitle") {
        return Err(Error::InvalidContent("hero_title and hero_subtitle are required".into()));
    }
    if !value.get("features").is_some_and(|f| f.is_array()) {
        return Err(Error::InvalidContent("features must be an array".into()));
    }

    serde_json::from_value(value).map_err(|e| Error::InvalidContent(e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.strip_suffix('\n').unwrap_or(rest)
}
