//! Risk factor extraction. Failure anywhere yields an empty set, never an error.

use serde_json::Value;

use crate::clients::ResilientModel;
use crate::error::{ProfilerError, Result};
use crate::profiler::prompts;
use crate::profiler::types::{DEFAULT_FACTOR_CONFIDENCE, Factor, FactorSet};
use crate::utils::json::decode_model_json;

pub async fn extract_factors(model: &ResilientModel, text: &str) -> FactorSet {
    match try_extract(model, text).await {
        Ok(set) => {
            tracing::info!("Extracted {} risk factors", set.factors.len());
            set
        }
        Err(ProfilerError::NoJsonFound) => {
            tracing::error!("No valid JSON found in the factor extraction response");
            FactorSet::default()
        }
        Err(e) => {
            tracing::error!("Factor extraction failed: {}", e);
            FactorSet::default()
        }
    }
}

/// Serialize posted answers into the text the extractor analyzes
pub fn answers_to_text(answers: &Value) -> String {
    serde_json::to_string_pretty(answers).unwrap_or_else(|_| answers.to_string())
}

async fn try_extract(model: &ResilientModel, text: &str) -> Result<FactorSet> {
    let generation = model.generate_text(prompts::factors_prompt(text)).await?;
    let value: Value = decode_model_json(&generation.text)?;
    Ok(factor_set_from_value(&value))
}

/// Read `{"factors": [...], "confidence"?}` or a bare array; skip entries that are not factors
pub fn factor_set_from_value(value: &Value) -> FactorSet {
    let (items, confidence) = match value {
        Value::Array(items) => (items.as_slice(), None),
        Value::Object(map) => (
            map.get("factors")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            map.get("confidence").and_then(Value::as_f64),
        ),
        _ => (&[][..], None),
    };

    let factors = items
        .iter()
        .filter_map(|item| serde_json::from_value::<Factor>(item.clone()).ok())
        .filter(|f| !f.factor.trim().is_empty())
        .collect();

    FactorSet {
        factors,
        confidence: confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_FACTOR_CONFIDENCE),
    }
}
