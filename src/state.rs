use std::sync::Arc;

use crate::calendar::Calendar;
use crate::config::AppConfig;
use crate::foods::services::{FoodSearch, TransientIds};
use crate::photos::services::{analyzer_from_config, PhotoAnalyzer};
use crate::store::{PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub calendar: Calendar,
    pub food_search: Arc<FoodSearch>,
    pub photos: Arc<dyn PhotoAnalyzer>,
    pub transient_ids: Arc<TransientIds>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pg = PgStore::connect(&config.database_url).await?;

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(pg.pool()).await {
            tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
        }

        let food_search = Arc::new(FoodSearch::from_config(&config.search)?);
        let photos = analyzer_from_config(&config.photo)?;

        Ok(Self::from_parts(Arc::new(pg), config, food_search, photos))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        food_search: Arc<FoodSearch>,
        photos: Arc<dyn PhotoAnalyzer>,
    ) -> Self {
        Self {
            store,
            calendar: Calendar::system(config.civil_offset),
            config,
            food_search,
            photos,
            transient_ids: Arc::new(TransientIds::default()),
        }
    }

    /// In-memory state: no database, no outbound calls.
    #[cfg(test)]
    pub fn fake() -> Self {
        use std::time::Duration;

        use crate::foods::cache::SearchCache;
        use crate::photos::services::DisabledAnalyzer;
        use crate::store::MemoryStore;

        Self::from_parts(
            Arc::new(MemoryStore::default()),
            Arc::new(AppConfig::for_tests()),
            Arc::new(FoodSearch::new(None, SearchCache::new(16, Duration::from_secs(60)))),
            Arc::new(DisabledAnalyzer),
        )
    }

    #[cfg(test)]
    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Swaps the config and re-applies its civil offset to the calendar,
    /// keeping whatever clock the calendar already runs on.
    #[cfg(test)]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.calendar = self.calendar.with_offset(config.civil_offset);
        self.config = Arc::new(config);
        self
    }

    #[cfg(test)]
    pub fn with_food_search(mut self, search: FoodSearch) -> Self {
        self.food_search = Arc::new(search);
        self
    }

    #[cfg(test)]
    pub fn with_photos(mut self, photos: Arc<dyn PhotoAnalyzer>) -> Self {
        self.photos = photos;
        self
    }
}
