use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::AppError;
use crate::nutrients::{round1, Nutrients};

/// External catalog hit, already per 100 g / 100 ml.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalFood {
    pub external_id: Option<String>,
    pub name: String,
    pub per_reference: Nutrients,
}

#[async_trait]
pub trait FoodCatalog: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<ExternalFood>, AppError>;
}

pub struct OpenFoodFactsClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("duofit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build food search http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_id")]
    underscore_id: Option<String>,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    nutriments: HashMap<String, Value>,
}

/// OpenFoodFacts mixes numbers and numeric strings.
fn number(map: &HashMap<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Products without a positive kcal/100g value are dropped.
fn normalize(product: Product) -> Option<ExternalFood> {
    let calories = number(&product.nutriments, "energy-kcal_100g").filter(|c| *c > 0.0)?;
    let name = product
        .product_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Unnamed food".to_string());

    Some(ExternalFood {
        external_id: product.id.or(product.underscore_id),
        name,
        per_reference: Nutrients {
            calories: calories.round(),
            protein: round1(number(&product.nutriments, "proteins_100g").unwrap_or(0.0)),
            carbs: round1(number(&product.nutriments, "carbohydrates_100g").unwrap_or(0.0)),
            fat: round1(number(&product.nutriments, "fat_100g").unwrap_or(0.0)),
        },
    })
}

#[async_trait]
impl FoodCatalog for OpenFoodFactsClient {
    async fn search(&self, query: &str) -> Result<Vec<ExternalFood>, AppError> {
        let url = format!("{}/cgi/search.pl", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("search_terms", query),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", "30"),
                ("cc", "br"),
                ("lc", "pt"),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("food search request: {e}")))?;

        if !res.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "food search returned {}",
                res.status()
            )));
        }

        let body: SearchResponse = res
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("food search body: {e}")))?;

        let total = body.products.len();
        let foods: Vec<ExternalFood> = body.products.into_iter().filter_map(normalize).collect();
        debug!(query, total, kept = foods.len(), "food search answered");
        Ok(foods)
    }
}
