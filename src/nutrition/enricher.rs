use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{EnrichedMeal, FoodCandidate, FoodDatabase, TextModel, CANDIDATE_PAGE_SIZE};
use crate::config::NutritionConfig;
use crate::meals::repo_types::Nutrition;
use crate::nutrition::{GeminiClient, UsdaClient};

/// Attempts after the first one before the model stage gives up.
pub const MAX_MODEL_RETRIES: usize = 3;
/// Upper bound on serialized candidate context placed into the prompt.
pub const CONTEXT_CHAR_BUDGET: usize = 5000;
const DEFAULT_PREP_TIME: i32 = 15;

/// Resolves a free-text meal name into [`EnrichedMeal`] data.
///
/// A `None` collaborator means its API key is not configured. Every failure
/// is absorbed: callers only ever see `Some(data)` or `None`.
#[derive(Clone, Default)]
pub struct NutritionEnricher {
    foods: Option<Arc<dyn FoodDatabase>>,
    model: Option<Arc<dyn TextModel>>,
}

impl NutritionEnricher {
    pub fn new(foods: Option<Arc<dyn FoodDatabase>>, model: Option<Arc<dyn TextModel>>) -> Self {
        Self { foods, model }
    }

    pub fn from_config(cfg: &NutritionConfig) -> Self {
        let foods = cfg.usda_api_key.as_ref().map(|key| {
            Arc::new(UsdaClient::new(key.clone(), cfg.usda_base_url.clone()))
                as Arc<dyn FoodDatabase>
        });
        let model = cfg.gemini_api_key.as_ref().map(|key| {
            Arc::new(GeminiClient::new(
                key.clone(),
                cfg.gemini_model.clone(),
                cfg.gemini_base_url.clone(),
            )) as Arc<dyn TextModel>
        });
        Self { foods, model }
    }

    /// Baseline lookup, then model refinement, then manual extraction from
    /// the first candidate. Without a food database key nothing is tried.
    #[instrument(skip(self))]
    pub async fn search_food(&self, query: &str) -> Option<EnrichedMeal> {
        let Some(foods) = &self.foods else {
            debug!("food database not configured; skipping enrichment");
            return None;
        };

        let candidates = match foods.search(query, CANDIDATE_PAGE_SIZE).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "baseline lookup failed");
                return self.refine_with_model(query, &[]).await;
            }
        };

        if let Some(refined) = self.refine_with_model(query, &candidates).await {
            return Some(refined);
        }

        let first = candidates.first()?;
        info!(fdc_id = first.fdc_id, "falling back to manual nutrient extraction");
        Some(extract_manual_nutrition(first))
    }

    async fn refine_with_model(
        &self,
        query: &str,
        candidates: &[FoodCandidate],
    ) -> Option<EnrichedMeal> {
        let model = self.model.as_ref()?;
        let context = candidate_context(candidates);

        for attempt in 0..=MAX_MODEL_RETRIES {
            let prompt = build_prompt(query, &context, attempt);
            let text = match model.generate(&prompt).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(attempt, error = %e, "model call failed");
                    continue;
                }
            };
            match parse_model_output(&text) {
                Some(enriched) => {
                    debug!(attempt, "model output accepted");
                    return Some(enriched);
                }
                None => warn!(attempt, "model output rejected"),
            }
        }
        warn!(attempts = MAX_MODEL_RETRIES + 1, "model refinement exhausted");
        None
    }
}

/// Candidates serialized for the prompt, cut at the character budget.
fn candidate_context(candidates: &[FoodCandidate]) -> String {
    let json = serde_json::to_string(candidates).unwrap_or_else(|_| "[]".into());
    json.chars().take(CONTEXT_CHAR_BUDGET).collect()
}

pub(crate) fn build_prompt(query: &str, context: &str, attempt: usize) -> String {
    let base = format!(
        r#"User wants nutrition for: "{query}".

Context Data (from USDA Database):
{context}...

TASK:
Estimate the nutrition for ONE STANDARD SERVING of "{query}".
- Use the USDA data as a baseline for ingredients if relevant.
- If the USDA data is incomplete (e.g. the user asked for a combined dish but the data only covers one part), YOU MUST ESTIMATE the missing components to provide a complete count.
- If the USDA data is irrelevant, rely on your general knowledge for "{query}".

RETURN ONLY JSON. NO MARKDOWN. NO COMMENTS.
Format:
{{
    "calories": number,
    "protein": number,
    "carbs": number,
    "fats": number,
    "prepTime": number,
    "description": "string",
    "tags": ["string"],
    "ingredients": ["string"]
}}
"#
    );

    if attempt == 0 {
        return base;
    }
    format!("{base}\nCRITICAL INSTRUCTION: STICK TO THE FORMAT. PRODUCED JSON ONLY.\n")
}

/// Accepts model text only if, once code fences are stripped, it is a JSON
/// object with a numeric `calories` field.
pub(crate) fn parse_model_output(text: &str) -> Option<EnrichedMeal> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let parsed: Value = serde_json::from_str(cleaned.trim()).ok()?;
    let calories = parsed.get("calories")?.as_f64()?;

    let number = |key: &str| parsed.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    let strings = |key: &str| -> Vec<String> {
        parsed
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    let prep_time = match number("prepTime").round() as i32 {
        0 => DEFAULT_PREP_TIME,
        minutes => minutes,
    };

    Some(EnrichedMeal {
        nutrition: Nutrition {
            calories,
            protein: number("protein"),
            carbs: number("carbs"),
            fats: number("fats"),
        },
        prep_time,
        description: parsed
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        tags: strings("tags"),
        ingredients: strings("ingredients"),
    })
}

/// Reads macros straight off a candidate's nutrient list by
/// case-insensitive substring match; missing nutrients are zero.
pub fn extract_manual_nutrition(food: &FoodCandidate) -> EnrichedMeal {
    let nutrient = |name: &str| {
        let needle = name.to_lowercase();
        food.food_nutrients
            .iter()
            .find(|n| n.nutrient_name.to_lowercase().contains(&needle))
            .and_then(|n| n.value)
            .unwrap_or(0.0)
    };

    EnrichedMeal {
        nutrition: Nutrition {
            calories: nutrient("Energy"),
            protein: nutrient("Protein"),
            carbs: nutrient("Carbohydrate"),
            fats: nutrient("Total lipid (fat)"),
        },
        prep_time: 0,
        description: food.description.clone(),
        tags: Vec::new(),
        ingredients: Vec::new(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::nutrition::FoodNutrient;

    pub(crate) struct CannedFoods {
        pub result: Result<Vec<FoodCandidate>, String>,
        pub calls: AtomicUsize,
    }

    impl CannedFoods {
        pub(crate) fn ok(foods: Vec<FoodCandidate>) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(foods),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                result: Err("HTTP 500".into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl FoodDatabase for CannedFoods {
        async fn search(&self, _q: &str, _n: u32) -> anyhow::Result<Vec<FoodCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(anyhow::Error::msg)
        }
    }

    /// Replays scripted replies; repeats the last one once the script runs out.
    pub(crate) struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            };
            reply
                .unwrap_or_else(|| Err("no reply scripted".into()))
                .map_err(anyhow::Error::msg)
        }
    }

    fn apple() -> FoodCandidate {
        FoodCandidate {
            fdc_id: 1,
            description: "Apple".into(),
            food_nutrients: vec![],
        }
    }

    fn sample_candidate() -> FoodCandidate {
        FoodCandidate {
            fdc_id: 42,
            description: "Pancakes, plain".into(),
            food_nutrients: vec![
                FoodNutrient { nutrient_name: "Energy".into(), value: Some(100.0) },
                FoodNutrient { nutrient_name: "Protein".into(), value: Some(10.0) },
                FoodNutrient { nutrient_name: "Carbohydrate, by difference".into(), value: Some(20.0) },
                FoodNutrient { nutrient_name: "Total lipid (fat)".into(), value: Some(5.0) },
            ],
        }
    }

    const APPLE_JSON: &str = r#"{"calories":95,"protein":0.5,"carbs":25,"fats":0.3,"prepTime":5,"description":"Fresh Apple","tags":["Healthy"]}"#;

    fn enricher(
        foods: Option<Arc<dyn FoodDatabase>>,
        model: Option<Arc<dyn TextModel>>,
    ) -> NutritionEnricher {
        NutritionEnricher::new(foods, model)
    }

    #[test]
    fn manual_extraction_maps_nutrient_names() {
        let food = FoodCandidate {
            fdc_id: 7,
            description: "Test food".into(),
            food_nutrients: vec![
                FoodNutrient { nutrient_name: "Energy".into(), value: Some(100.0) },
                FoodNutrient { nutrient_name: "Protein".into(), value: Some(10.0) },
                FoodNutrient { nutrient_name: "Carbohydrate".into(), value: Some(20.0) },
                FoodNutrient { nutrient_name: "Total lipid (fat)".into(), value: Some(5.0) },
            ],
        };
        let out = extract_manual_nutrition(&food);
        assert_eq!(
            out.nutrition,
            Nutrition { calories: 100.0, protein: 10.0, carbs: 20.0, fats: 5.0 }
        );
        assert_eq!(out.prep_time, 0);
        assert_eq!(out.description, "Test food");
        assert!(out.tags.is_empty());
        assert!(out.ingredients.is_empty());
    }

    #[test]
    fn manual_extraction_defaults_missing_to_zero() {
        let out = extract_manual_nutrition(&apple());
        assert_eq!(out.nutrition, Nutrition::default());
    }

    #[test]
    fn parse_strips_code_fences() {
        let text = format!("```json\n{APPLE_JSON}\n```");
        let out = parse_model_output(&text).unwrap();
        assert_eq!(out.nutrition.calories, 95.0);
        assert_eq!(out.prep_time, 5);
        assert_eq!(out.tags, vec!["Healthy".to_string()]);
        assert!(out.ingredients.is_empty());
    }

    #[test]
    fn parse_rejects_non_numeric_calories() {
        assert!(parse_model_output(r#"{"calories":"95"}"#).is_none());
        assert!(parse_model_output(r#"{"protein":3}"#).is_none());
        assert!(parse_model_output("Sure! Here is your JSON").is_none());
    }

    #[test]
    fn parse_defaults_prep_time() {
        let out = parse_model_output(r#"{"calories":10,"prepTime":0}"#).unwrap();
        assert_eq!(out.prep_time, 15);
        assert_eq!(out.description, "");
    }

    #[test]
    fn prompt_reinforces_on_retry() {
        let first = build_prompt("Idli Sambar", "[]", 0);
        let retry = build_prompt("Idli Sambar", "[]", 1);
        assert!(first.contains("ONE STANDARD SERVING of \"Idli Sambar\""));
        assert!(!first.contains("CRITICAL INSTRUCTION"));
        assert!(retry.starts_with(&first));
        assert!(retry.contains("CRITICAL INSTRUCTION"));
    }

    #[test]
    fn context_is_truncated_to_budget() {
        let many: Vec<FoodCandidate> = (0..200)
            .map(|i| FoodCandidate {
                fdc_id: i,
                description: "A rather long food description for padding".into(),
                food_nutrients: vec![],
            })
            .collect();
        assert_eq!(candidate_context(&many).chars().count(), CONTEXT_CHAR_BUDGET);
    }

    #[tokio::test]
    async fn absent_without_food_key_even_with_model() {
        let model = ScriptedModel::new(vec![Ok(APPLE_JSON)]);
        let e = enricher(None, Some(model.clone()));
        assert!(e.search_food("Apple").await.is_none());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn model_result_wins_when_valid() {
        let foods = CannedFoods::ok(vec![apple()]);
        let model = ScriptedModel::new(vec![Ok(APPLE_JSON)]);
        let out = enricher(Some(foods), Some(model.clone()))
            .search_food("Apple")
            .await
            .unwrap();
        assert_eq!(out.description, "Fresh Apple");
        assert_eq!(out.nutrition.calories, 95.0);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn manual_fallback_without_model_key() {
        let foods = CannedFoods::ok(vec![sample_candidate(), apple()]);
        let out = enricher(Some(foods), None).search_food("pancakes").await.unwrap();
        assert_eq!(out.description, "Pancakes, plain");
        assert_eq!(out.nutrition.calories, 100.0);
        assert_eq!(out.nutrition.carbs, 20.0);
    }

    #[tokio::test]
    async fn retries_stop_after_four_attempts_then_fall_back() {
        let foods = CannedFoods::ok(vec![sample_candidate()]);
        let model = ScriptedModel::new(vec![Ok("not json at all")]);
        let out = enricher(Some(foods), Some(model.clone()))
            .search_food("pancakes")
            .await
            .unwrap();
        assert_eq!(model.calls(), MAX_MODEL_RETRIES + 1);
        assert_eq!(out.description, "Pancakes, plain");
    }

    #[tokio::test]
    async fn missing_calories_counts_as_failed_attempt() {
        let foods = CannedFoods::ok(vec![]);
        let model = ScriptedModel::new(vec![Ok(r#"{"protein":1}"#)]);
        let out = enricher(Some(foods), Some(model.clone()))
            .search_food("mystery")
            .await;
        assert!(out.is_none());
        assert_eq!(model.calls(), 4);
    }

    #[tokio::test]
    async fn recovers_on_later_attempt() {
        let foods = CannedFoods::ok(vec![]);
        let model = ScriptedModel::new(vec![Err("503"), Ok("garbage"), Ok(APPLE_JSON)]);
        let out = enricher(Some(foods), Some(model.clone()))
            .search_food("Apple")
            .await
            .unwrap();
        assert_eq!(out.nutrition.calories, 95.0);
        assert_eq!(model.calls(), 3);
        let prompts = model.prompts.lock().unwrap();
        assert!(!prompts[0].contains("CRITICAL INSTRUCTION"));
        assert!(prompts[1].contains("CRITICAL INSTRUCTION"));
    }

    #[tokio::test]
    async fn baseline_failure_falls_through_to_model_with_empty_context() {
        let foods = CannedFoods::failing();
        let model = ScriptedModel::new(vec![Ok(APPLE_JSON)]);
        let out = enricher(Some(foods.clone()), Some(model.clone()))
            .search_food("Apple")
            .await
            .unwrap();
        assert_eq!(out.description, "Fresh Apple");
        assert_eq!(foods.calls.load(Ordering::SeqCst), 1);
        assert!(model.prompts.lock().unwrap()[0].contains("[]..."));
    }

    #[tokio::test]
    async fn baseline_failure_without_model_is_absent() {
        let out = enricher(Some(CannedFoods::failing()), None)
            .search_food("Apple")
            .await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn no_candidates_and_no_model_is_absent() {
        let out = enricher(Some(CannedFoods::ok(vec![])), None)
            .search_food("Apple")
            .await;
        assert!(out.is_none());
    }
}
