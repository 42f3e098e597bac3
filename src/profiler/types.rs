//! Request-scoped value objects passed between the pipeline stages

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::clients::ImagePart;
use crate::error::ProfilerError;

/// Confidence assigned to a factor the model named without a score
pub const DEFAULT_FACTOR_CONFIDENCE: f64 = 0.88;

/// Confidence reported for answers built from the key:value line
pub const ANSWERS_CONFIDENCE: f64 = 0.95;

/// Closed set of survey fields, in reporting order
pub const SURVEY_FIELDS: [&str; 4] = ["age", "smoker", "exercise", "diet"];

/// Raw survey submission: free text plus an optional image
#[derive(Debug, Clone, Default)]
pub struct RawInput {
    pub text: String,
    pub image: Option<ImagePart>,
}

impl RawInput {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image.as_ref().is_none_or(|i| i.data.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyAnswers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoker: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diet: Option<String>,
}

impl SurveyAnswers {
    pub fn has(&self, field: &str) -> bool {
        match field {
            "age" => self.age.is_some(),
            "smoker" => self.smoker.is_some(),
            "exercise" => self.exercise.is_some(),
            "diet" => self.diet.is_some(),
            _ => false,
        }
    }

    pub fn populated(&self) -> usize {
        SURVEY_FIELDS.iter().filter(|f| self.has(f)).count()
    }

    pub fn missing_fields(&self) -> Vec<String> {
        SURVEY_FIELDS
            .iter()
            .filter(|f| !self.has(f))
            .map(|f| f.to_string())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAnswers {
    pub answers: SurveyAnswers,
    pub missing_fields: Vec<String>,
    pub confidence: f64,
}

/// Result of distilling text into survey answers
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Complete(NormalizedAnswers),
    Incomplete { reason: String },
}

/// A named risk factor with confidence in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FactorRepr")]
pub struct Factor {
    pub factor: String,
    pub confidence: f64,
}

impl Factor {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            DEFAULT_FACTOR_CONFIDENCE
        };
        Self {
            factor: name.into(),
            confidence,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_FACTOR_CONFIDENCE)
    }
}

/// Models and clients send either bare names or objects keyed `factor`/`name`
#[derive(Deserialize)]
#[serde(untagged)]
enum FactorRepr {
    Name(String),
    Object {
        #[serde(alias = "name")]
        factor: String,
        #[serde(default)]
        confidence: Option<serde_json::Value>,
    },
}

impl From<FactorRepr> for Factor {
    fn from(repr: FactorRepr) -> Self {
        match repr {
            FactorRepr::Name(name) => Factor::named(name),
            FactorRepr::Object { factor, confidence } => {
                let confidence = confidence.as_ref().and_then(confidence_value);
                Factor::new(factor, confidence.unwrap_or(DEFAULT_FACTOR_CONFIDENCE))
            }
        }
    }
}

/// Numbers or numeric strings; anything else falls back to the default
fn confidence_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Ordered factors plus the overall extraction confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSet {
    #[serde(default)]
    pub factors: Vec<Factor>,
    #[serde(default = "default_set_confidence")]
    pub confidence: f64,
}

fn default_set_confidence() -> f64 {
    DEFAULT_FACTOR_CONFIDENCE
}

impl Default for FactorSet {
    fn default() -> Self {
        Self {
            factors: Vec::new(),
            confidence: DEFAULT_FACTOR_CONFIDENCE,
        }
    }
}

impl FactorSet {
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.factors.iter().map(|f| f.factor.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    /// Model-delegated classification could not produce a valid profile
    Error,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Error => "error",
        }
    }

    pub fn from_score(score: i32) -> Self {
        if score > 65 {
            RiskLevel::High
        } else if score > 35 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" | "moderate" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "error" => Ok(RiskLevel::Error),
            other => Err(ProfilerError::MalformedJson {
                message: format!("unknown risk level '{}'", other),
            }),
        }
    }
}

impl Serialize for RiskLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub risk_level: RiskLevel,
    pub score: i32,
    pub rationale: Vec<String>,
}

impl RiskProfile {
    pub fn empty() -> Self {
        Self {
            risk_level: RiskLevel::Low,
            score: 0,
            rationale: Vec::new(),
        }
    }

    /// The error value returned in place of a profile; callers must check `is_error`.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::Error,
            score: -1,
            rationale: vec![reason.into()],
        }
    }

    pub fn is_error(&self) -> bool {
        self.risk_level == RiskLevel::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub risk_level: String,
    pub factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub status: StageStatus,
}

impl RecommendationSet {
    pub fn new(risk_level: impl Into<String>, factors: Vec<String>, recommendations: Vec<String>) -> Self {
        let status = if recommendations.is_empty() {
            StageStatus::Error
        } else {
            StageStatus::Ok
        };
        Self {
            risk_level: risk_level.into(),
            factors,
            recommendations,
            status,
        }
    }
}

/// Keep the first occurrence of each string
pub fn dedup_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
