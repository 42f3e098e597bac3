//! Risk classification: a fixed keyword table, or delegation to the model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::clients::ResilientModel;
use crate::error::{ProfilerError, Result};
use crate::profiler::prompts;
use crate::profiler::types::{Factor, RiskLevel, RiskProfile, dedup_preserving_order};
use crate::utils::json::decode_model_json;

/// Lowercase substrings and their weights. Scanned in order; first hit wins.
pub const FACTOR_WEIGHTS: [(&str, f64); 12] = [
    ("smoking", 30.0),
    ("high sugar diet", 25.0),
    ("poor diet", 20.0),
    ("low exercise", 20.0),
    ("sedentary lifestyle", 20.0),
    ("obesity", 25.0),
    ("high blood pressure", 25.0),
    ("high cholesterol", 20.0),
    ("diabetes", 30.0),
    ("alcohol", 15.0),
    ("stress", 15.0),
    ("sleep deprivation", 15.0),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskStrategy {
    #[default]
    Heuristic,
    Model,
}

impl FromStr for RiskStrategy {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(RiskStrategy::Heuristic),
            "model" => Ok(RiskStrategy::Model),
            other => Err(ProfilerError::config(format!(
                "unknown risk strategy '{}' (expected heuristic|model)",
                other
            ))),
        }
    }
}

pub async fn classify_risk(
    strategy: RiskStrategy,
    model: &ResilientModel,
    factors: &[Factor],
) -> RiskProfile {
    match strategy {
        RiskStrategy::Heuristic => classify_heuristic(factors),
        RiskStrategy::Model => classify_with_model(model, factors).await,
    }
}

pub fn classify_heuristic(factors: &[Factor]) -> RiskProfile {
    if factors.is_empty() {
        return RiskProfile::empty();
    }

    let mut raw = 0.0;
    let mut rationale = Vec::new();
    for item in factors {
        let name = item.factor.trim().to_lowercase();
        if let Some((_, weight)) = FACTOR_WEIGHTS.iter().find(|(key, _)| name.contains(key)) {
            raw += weight * item.confidence;
            rationale.push(item.factor.clone());
        }
    }

    let score = (raw.round() as i32).clamp(0, 100);
    RiskProfile {
        risk_level: RiskLevel::from_score(score),
        score,
        rationale: dedup_preserving_order(rationale),
    }
}

/// Ask the model for the profile. Any failure returns `RiskProfile::error`
/// as a value; this stage never escalates.
pub async fn classify_with_model(model: &ResilientModel, factors: &[Factor]) -> RiskProfile {
    if factors.is_empty() {
        return RiskProfile::empty();
    }
    match try_classify(model, factors).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!("Model risk classification failed: {}", e);
            RiskProfile::error(format!("Risk classification failed: {}", e))
        }
    }
}

async fn try_classify(model: &ResilientModel, factors: &[Factor]) -> Result<RiskProfile> {
    let generation = model.generate_text(prompts::risk_prompt(factors)).await?;
    let value: Value = decode_model_json(&generation.text)?;
    profile_from_value(&value)
}

/// Validate that `risk_level`, `score` and `rationale` are all present and well-typed
pub fn profile_from_value(value: &Value) -> Result<RiskProfile> {
    let missing: Vec<&str> = ["risk_level", "score", "rationale"]
        .into_iter()
        .filter(|k| value.get(k).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ProfilerError::MalformedJson {
            message: format!("missing keys: {}", missing.join(", ")),
        });
    }

    let risk_level: RiskLevel = value["risk_level"]
        .as_str()
        .ok_or_else(|| malformed("risk_level is not a string"))?
        .parse()?;
    if risk_level == RiskLevel::Error {
        return Err(malformed("model reported an error level"));
    }

    let score = value["score"]
        .as_f64()
        .or_else(|| value["score"].as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| malformed("score is not a number"))?;
    let score = (score.round() as i32).clamp(0, 100);

    let rationale = value["rationale"]
        .as_array()
        .ok_or_else(|| malformed("rationale is not a list"))?
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            other => other
                .get("factor")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect::<Vec<_>>();

    Ok(RiskProfile {
        risk_level,
        score,
        rationale: dedup_preserving_order(rationale),
    })
}

fn malformed(message: &str) -> ProfilerError {
    ProfilerError::MalformedJson {
        message: message.to_string(),
    }
}
