use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::{AppError, AppResult};
use crate::foods::cache::SearchCache;
use crate::foods::dto::CreateFoodRequest;
use crate::foods::external::{ExternalFood, FoodCatalog, OpenFoodFactsClient};
use crate::foods::repo_types::{FoodCandidate, FoodItem, FoodOrigin, NewFood};
use crate::nutrients::Nutrients;
use crate::state::AppState;

const MIN_QUERY_LEN: usize = 2;
const LOCAL_LIMIT: i64 = 10;
const RESULT_LIMIT: usize = 15;

/// Source of synthetic ids for foods that are not persisted yet: -1, -2, ...
#[derive(Debug, Default)]
pub struct TransientIds(AtomicI64);

impl TransientIds {
    pub fn next(&self) -> i64 {
        self.0.fetch_sub(1, Ordering::Relaxed) - 1
    }
}

/// External half of food lookup: an optional catalog behind a result cache.
pub struct FoodSearch {
    catalog: Option<Arc<dyn FoodCatalog>>,
    cache: SearchCache,
}

impl FoodSearch {
    pub fn new(catalog: Option<Arc<dyn FoodCatalog>>, cache: SearchCache) -> Self {
        Self { catalog, cache }
    }

    pub fn from_config(cfg: &SearchConfig) -> anyhow::Result<Self> {
        let cache = SearchCache::new(cfg.cache_size, Duration::from_secs(cfg.cache_ttl_secs));
        if cfg.disabled {
            info!("external food search disabled");
            return Ok(Self::new(None, cache));
        }
        let client = OpenFoodFactsClient::new(&cfg.base_url, Duration::from_secs(cfg.timeout_secs))?;
        Ok(Self::new(Some(Arc::new(client)), cache))
    }

    /// Never fails: upstream errors are logged and read as "no results".
    pub async fn lookup(&self, query: &str) -> Vec<ExternalFood> {
        let Some(catalog) = &self.catalog else {
            return Vec::new();
        };
        let key = SearchCache::key(query);
        if let Some(hit) = self.cache.get(&key).await {
            debug!(query, hits = hit.len(), "food search cache hit");
            return hit;
        }
        match catalog.search(query).await {
            Ok(foods) => {
                self.cache.insert(key, foods.clone()).await;
                foods
            }
            Err(e) => {
                warn!(query, error = %e, "external food search degraded to local results");
                Vec::new()
            }
        }
    }
}

/// Persists a catalog entry. Missing nutrient values default to zero.
pub async fn create_food(state: &AppState, req: CreateFoodRequest) -> AppResult<FoodItem> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("food name is required"));
    }
    let per_reference = Nutrients {
        calories: req.calories.unwrap_or(0.0),
        protein: req.protein.unwrap_or(0.0),
        carbs: req.carbs.unwrap_or(0.0),
        fat: req.fat.unwrap_or(0.0),
    };
    let food = state
        .store
        .create_food(NewFood {
            name,
            per_reference,
        })
        .await?;
    info!(food_id = food.id, name = %food.name, "food created");
    Ok(food)
}

/// Food-shaped value that only becomes a row when a meal using it is saved.
pub fn create_transient(state: &AppState, name: &str, per_reference: Nutrients) -> FoodItem {
    FoodItem {
        id: state.transient_ids.next(),
        name: name.trim().to_string(),
        per_reference,
    }
}

pub fn relevance(name: &str, query: &str) -> u8 {
    let name = name.trim().to_lowercase();
    let query = query.trim().to_lowercase();

    if name == query {
        return 100;
    }
    if name.starts_with(&query) {
        return 80;
    }
    if name.split_whitespace().next() == Some(query.as_str()) {
        return 70;
    }
    if name.contains(&query) {
        if name.chars().count() < query.chars().count() + 15 {
            return 60;
        }
        return 30;
    }
    10
}

/// Dedups by lower-cased name keeping the first (local) candidate, then
/// orders local first and by relevance, capped at the result limit.
pub fn merge_candidates(
    local: Vec<FoodCandidate>,
    external: Vec<FoodCandidate>,
    query: &str,
) -> Vec<FoodCandidate> {
    let mut seen = HashSet::new();
    let mut merged: Vec<FoodCandidate> = local
        .into_iter()
        .chain(external)
        .filter(|c| seen.insert(c.food.name.to_lowercase()))
        .collect();

    // stable: equal scores keep their arrival order
    merged.sort_by_key(|c| {
        (
            c.origin != FoodOrigin::Local,
            std::cmp::Reverse(relevance(&c.food.name, query)),
        )
    });
    merged.truncate(RESULT_LIMIT);
    merged
}

/// Local catalog plus the external catalog, merged and ranked.
pub async fn search_foods(state: &AppState, query: &str) -> AppResult<Vec<FoodCandidate>> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_LEN {
        return Ok(Vec::new());
    }

    let local: Vec<FoodCandidate> = state
        .store
        .search_foods(query, LOCAL_LIMIT)
        .await?
        .into_iter()
        .map(|food| FoodCandidate {
            origin: FoodOrigin::Local,
            external_id: None,
            food,
        })
        .collect();

    let external: Vec<FoodCandidate> = state
        .food_search
        .lookup(query)
        .await
        .into_iter()
        .map(|ext| FoodCandidate {
            origin: FoodOrigin::OpenFoodFacts,
            food: create_transient(state, &ext.name, ext.per_reference),
            external_id: ext.external_id,
        })
        .collect();

    Ok(merge_candidates(local, external, query))
}
