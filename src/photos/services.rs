use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::PhotoConfig;
use crate::error::AppError;
use crate::meals::units::Unit;
use crate::nutrients::Nutrients;
use crate::photos::dto::PhotoFood;
use crate::state::AppState;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const PROMPT: &str = r#"You are a nutritionist looking at a photo of a meal.
Identify every food visible on the plate. For each one give:
- name: specific food name in Brazilian Portuguese
- quantity: estimated amount in grams
- unit: always "g"
- calories, protein, carbs, fat: TOTAL values for that quantity (not per 100 g)
Use TACO or USDA reference values.
Answer with JSON only, no markdown:
{"foods": [{"name": "string", "quantity": 0, "unit": "g", "calories": 0, "protein": 0, "carbs": 0, "fat": 0}]}"#;

#[async_trait]
pub trait PhotoAnalyzer: Send + Sync {
    async fn analyze(&self, image: &str) -> Result<Vec<PhotoFood>, AppError>;
}

/// Used when no API key is configured.
pub struct DisabledAnalyzer;

#[async_trait]
impl PhotoAnalyzer for DisabledAnalyzer {
    async fn analyze(&self, _image: &str) -> Result<Vec<PhotoFood>, AppError> {
        Err(AppError::ExternalService("photo analysis is not configured".into()))
    }
}

pub struct GeminiAnalyzer {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiAnalyzer {
    pub fn new(api_key: String, model: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build photo analysis http client")?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }
}

pub fn analyzer_from_config(cfg: &PhotoConfig) -> anyhow::Result<Arc<dyn PhotoAnalyzer>> {
    match &cfg.api_key {
        Some(key) => Ok(Arc::new(GeminiAnalyzer::new(
            key.clone(),
            cfg.model.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )?)),
        None => {
            warn!("GEMINI_API_KEY not set, photo analysis disabled");
            Ok(Arc::new(DisabledAnalyzer))
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// `(mime type, base64 payload)`; bare base64 is taken as JPEG.
pub fn split_data_url(image: &str) -> (&str, &str) {
    if let Some(rest) = image.strip_prefix("data:") {
        if let Some((mime, data)) = rest.split_once(";base64,") {
            return (mime, data);
        }
    }
    ("image/jpeg", image)
}

#[async_trait]
impl PhotoAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, image: &str) -> Result<Vec<PhotoFood>, AppError> {
        let (mime_type, data) = split_data_url(image.trim());
        let url = format!(
            "{GEMINI_BASE_URL}/v1beta/models/{}:generateContent",
            self.model
        );
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": PROMPT },
                    { "inline_data": { "mime_type": mime_type, "data": data } }
                ]
            }]
        });

        let res = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("photo analysis request: {e}")))?;
        if !res.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "photo analysis returned {}",
                res.status()
            )));
        }

        let answer: GenerateResponse = res
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("photo analysis body: {e}")))?;
        let text: String = answer
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();
        parse_analysis(&text)
    }
}

#[derive(Debug, Deserialize)]
struct Analysis {
    #[serde(default, alias = "alimentos")]
    foods: Vec<RawFood>,
}

#[derive(Debug, Deserialize)]
struct RawFood {
    #[serde(alias = "nome")]
    name: String,
    #[serde(alias = "quantidade")]
    quantity: f64,
    #[serde(default = "default_unit", alias = "unidade")]
    unit: String,
    #[serde(default, alias = "calorias")]
    calories: f64,
    #[serde(default, alias = "proteinas")]
    protein: f64,
    #[serde(default, alias = "carboidratos")]
    carbs: f64,
    #[serde(default, alias = "gorduras")]
    fat: f64,
}

fn default_unit() -> String {
    "g".into()
}

fn strip_fences(text: &str) -> &str {
    let mut s = text.trim();
    s = s.strip_prefix("```json").unwrap_or(s);
    s = s.strip_prefix("```").unwrap_or(s);
    s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}

/// Parses the model's answer. Entries without a name, a positive quantity or
/// a known unit are dropped.
pub fn parse_analysis(text: &str) -> Result<Vec<PhotoFood>, AppError> {
    let analysis: Analysis = serde_json::from_str(strip_fences(text))
        .map_err(|e| AppError::ExternalService(format!("unreadable photo analysis: {e}")))?;

    let foods = analysis
        .foods
        .into_iter()
        .filter_map(|raw| {
            let name = raw.name.trim().to_string();
            if name.is_empty() || !(raw.quantity > 0.0) {
                return None;
            }
            let unit = match raw.unit.parse::<Unit>() {
                Ok(unit) => unit,
                Err(_) => {
                    debug!(unit = %raw.unit, %name, "dropping food with unknown unit");
                    return None;
                }
            };
            Some(PhotoFood {
                name,
                quantity: raw.quantity,
                unit,
                totals: Nutrients::new(
                    raw.calories.max(0.0),
                    raw.protein.max(0.0),
                    raw.carbs.max(0.0),
                    raw.fat.max(0.0),
                ),
            })
        })
        .collect();
    Ok(foods)
}

/// Photo analysis never fails the caller: any upstream problem reads as
/// "nothing recognised".
pub async fn analyze_photo(state: &AppState, image: &str) -> Result<Vec<PhotoFood>, AppError> {
    if image.trim().is_empty() {
        return Err(AppError::validation("image is required"));
    }
    match state.photos.analyze(image).await {
        Ok(foods) => {
            debug!(recognised = foods.len(), "photo analysed");
            Ok(foods)
        }
        Err(e) => {
            warn!(error = %e, "photo analysis degraded to no results");
            Ok(Vec::new())
        }
    }
}
