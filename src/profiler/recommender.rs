//! Recommendation generation, batched or as sequential single sentences

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::clients::ResilientModel;
use crate::error::{ProfilerError, Result};
use crate::profiler::prompts;
use crate::profiler::types::{RecommendationSet, dedup_preserving_order};
use crate::utils::json::decode_model_json;
use crate::utils::text::flatten_line;

pub const SEQUENTIAL_COUNT: usize = 3;
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Inserted when one sequential step fails
pub const PLACEHOLDER_RECOMMENDATION: &str = "No recommendation available.";

/// Returned when a batch request yields nothing usable
pub const FALLBACK_RECOMMENDATION: &str =
    "Consult a healthcare professional for personalised advice.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendStrategy {
    #[default]
    Sequential,
    Batch,
}

impl FromStr for RecommendStrategy {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(RecommendStrategy::Sequential),
            "batch" => Ok(RecommendStrategy::Batch),
            other => Err(ProfilerError::config(format!(
                "unknown recommend strategy '{}' (expected sequential|batch)",
                other
            ))),
        }
    }
}

pub async fn get_recommendations(
    strategy: RecommendStrategy,
    model: &ResilientModel,
    risk_level: &str,
    factors: &[String],
) -> RecommendationSet {
    let recommendations = match strategy {
        RecommendStrategy::Sequential => sequential(model, risk_level, factors).await,
        RecommendStrategy::Batch => batch(model, risk_level, factors).await,
    };
    RecommendationSet::new(risk_level, factors.to_vec(), recommendations)
}

/// Exactly `SEQUENTIAL_COUNT` steps; each prompt lists the accepted outputs so far.
/// A failed step contributes the placeholder once; repeats are never inserted.
async fn sequential(model: &ResilientModel, risk_level: &str, factors: &[String]) -> Vec<String> {
    let mut recommendations: Vec<String> = Vec::with_capacity(SEQUENTIAL_COUNT);
    for step in 1..=SEQUENTIAL_COUNT {
        let prompt = prompts::recommendation_step_prompt(risk_level, factors, &recommendations);
        let candidate = match model.generate_text(prompt).await {
            Ok(generation) => flatten_line(&generation.text),
            Err(e) => {
                tracing::error!("Error generating recommendation {}: {}", step, e);
                PLACEHOLDER_RECOMMENDATION.to_string()
            }
        };
        if candidate.is_empty() {
            tracing::warn!("Recommendation {} was empty, skipping", step);
            continue;
        }
        if recommendations.contains(&candidate) {
            tracing::warn!("Recommendation {} repeated an earlier one, skipping", step);
            continue;
        }
        recommendations.push(candidate);
    }
    recommendations
}

async fn batch(model: &ResilientModel, risk_level: &str, factors: &[String]) -> Vec<String> {
    let prompt = prompts::recommendations_batch_prompt(risk_level, factors);
    let parsed = match model.generate_text(prompt).await {
        Ok(generation) => decode_model_json::<Value>(&generation.text).map(|v| batch_from_value(&v)),
        Err(e) => Err(e),
    };
    match parsed {
        Ok(recs) if !recs.is_empty() => recs,
        Ok(_) => {
            tracing::warn!("Batch recommendations were empty, using fallback");
            vec![FALLBACK_RECOMMENDATION.to_string()]
        }
        Err(e) => {
            tracing::error!("Batch recommendation generation failed: {}", e);
            vec![FALLBACK_RECOMMENDATION.to_string()]
        }
    }
}

/// Accept a JSON array of strings, or an object wrapping one under `recommendations`
pub fn batch_from_value(value: &Value) -> Vec<String> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("recommendations")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[][..],
    };
    let cleaned = items
        .iter()
        .filter_map(Value::as_str)
        .map(flatten_line)
        .filter(|s| !s.is_empty());
    let mut recs = dedup_preserving_order(cleaned);
    recs.truncate(MAX_RECOMMENDATIONS);
    recs
}
