//! Gemini `generateContent` wire types and the detection response schema.

use serde::{Deserialize, Serialize};

/// Gemini API request.
#[derive(Debug, Serialize)]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub(crate) struct Content {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
pub(crate) struct InlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
    /// Base64-encoded bytes
    pub data: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    pub response_mime_type: &'static str,
    pub temperature: f32,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if any.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// OCR text as either a single string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawText {
    One(String),
    Many(Vec<String>),
}

impl RawText {
    pub fn into_tokens(self) -> Vec<String> {
        let tokens = match self {
            RawText::One(s) => vec![s],
            RawText::Many(v) => v,
        };
        tokens
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// One item as reported by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDetection {
    #[serde(alias = "label")]
    pub name: String,

    /// `[y_min, x_min, y_max, x_max]` on a 0-1000 scale
    #[serde(default)]
    pub box_2d: Option<Vec<f64>>,

    #[serde(default)]
    pub brand: Option<String>,

    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub size: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default, alias = "ocr_text")]
    pub text: Option<RawText>,
}

/// An entry in the returned list: a full object or a bare name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawItem {
    Detailed(RawDetection),
    Bare(String),
}

/// Accepted top-level response shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawResponse {
    List(Vec<RawItem>),
    Wrapped {
        #[serde(alias = "objects")]
        items: Vec<RawItem>,
    },
}

impl RawResponse {
    pub fn into_items(self) -> Vec<RawItem> {
        match self {
            RawResponse::List(items) => items,
            RawResponse::Wrapped { items } => items,
        }
    }
}
