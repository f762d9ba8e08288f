use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Keys and endpoints for the two enrichment collaborators.
/// A missing key disables the corresponding stage.
#[derive(Debug, Clone, Deserialize)]
pub struct NutritionConfig {
    pub usda_api_key: Option<String>,
    pub usda_base_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
}

impl Default for NutritionConfig {
    fn default() -> Self {
        Self {
            usda_api_key: None,
            usda_base_url: "https://api.nal.usda.gov/fdc/v1".into(),
            gemini_api_key: None,
            gemini_model: "gemini-flash-latest".into(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub nutrition: NutritionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = non_empty_var("DATABASE_URL");
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "familymeals".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "familymeals-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };

        let defaults = NutritionConfig::default();
        let nutrition = NutritionConfig {
            usda_api_key: non_empty_var("USDA_API_KEY"),
            usda_base_url: non_empty_var("USDA_BASE_URL").unwrap_or(defaults.usda_base_url),
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            gemini_model: non_empty_var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: non_empty_var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
        };

        Ok(Self {
            database_url,
            jwt,
            nutrition,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
