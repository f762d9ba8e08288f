use crate::config::AppConfig;
use crate::events::Changefeed;
use crate::nutrition::NutritionEnricher;
use crate::store::{FamilyStore, MemoryStore, PgStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FamilyStore>,
    pub config: Arc<AppConfig>,
    pub nutrition: NutritionEnricher,
    pub changes: Changefeed,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await?;

                // Run migrations if present
                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgStore::new(db)) as Arc<dyn FamilyStore>
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory store");
                Arc::new(MemoryStore::new()) as Arc<dyn FamilyStore>
            }
        };

        let nutrition = NutritionEnricher::from_config(&config.nutrition);
        tracing::info!(
            usda = config.nutrition.usda_api_key.is_some(),
            gemini = config.nutrition.gemini_api_key.is_some(),
            "nutrition enrichment configured"
        );

        Ok(Self::from_parts(store, config, nutrition))
    }

    pub fn from_parts(
        store: Arc<dyn FamilyStore>,
        config: Arc<AppConfig>,
        nutrition: NutritionEnricher,
    ) -> Self {
        Self {
            store,
            config,
            nutrition,
            changes: Changefeed::new(),
        }
    }
}

#[cfg(test)]
impl AppState {
    /// In-memory state with enrichment disabled.
    pub fn fake() -> Self {
        Self::fake_with(NutritionEnricher::default())
    }

    pub fn fake_with(nutrition: NutritionEnricher) -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            nutrition: Default::default(),
        });
        Self::from_parts(Arc::new(MemoryStore::new()), config, nutrition)
    }
}
