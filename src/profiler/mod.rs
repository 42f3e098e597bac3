//! Four-stage survey pipeline: parse, extract factors, classify risk, recommend.
//!
//! Stages are stateless; `Profiler` only carries the shared model handle and the
//! strategy choices, and is built once at startup.

pub mod factors;
pub mod parser;
pub mod prompts;
pub mod recommender;
pub mod risk;
pub mod types;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clients::{GenerativeModel, ResilientModel};
use crate::config::Config;
use crate::error::{ProfilerError, Result};

pub use recommender::RecommendStrategy;
pub use risk::RiskStrategy;
pub use types::{
    Factor, FactorSet, NormalizedAnswers, ParseOutcome, RawInput, RecommendationSet, RiskLevel,
    RiskProfile, StageStatus, SurveyAnswers,
};

pub const NO_INPUT_REASON: &str = "No text or valid image was provided.";

/// Combined text fed to the answer parser, plus the parse result
#[derive(Debug, Clone)]
pub struct ParsedInput {
    pub extracted_text: String,
    pub outcome: ParseOutcome,
}

/// Merged result of all four stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub extracted_text: String,
    pub answers: SurveyAnswers,
    pub missing_fields: Vec<String>,
    pub factors: Vec<Factor>,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub score: i32,
    pub rationale: Vec<String>,
    pub recommendations: Vec<String>,
    pub status: StageStatus,
}

#[derive(Clone)]
pub struct Profiler {
    model: ResilientModel,
    risk_strategy: RiskStrategy,
    recommend_strategy: RecommendStrategy,
}

impl Profiler {
    pub fn new(model: ResilientModel) -> Self {
        Self {
            model,
            risk_strategy: RiskStrategy::default(),
            recommend_strategy: RecommendStrategy::default(),
        }
    }

    pub fn from_config(config: &Config, capability: Arc<dyn GenerativeModel>) -> Self {
        Self::new(ResilientModel::new(capability, config.call_policy()))
            .with_risk_strategy(config.pipeline.risk_strategy)
            .with_recommend_strategy(config.pipeline.recommend_strategy)
    }

    pub fn with_risk_strategy(mut self, strategy: RiskStrategy) -> Self {
        self.risk_strategy = strategy;
        self
    }

    pub fn with_recommend_strategy(mut self, strategy: RecommendStrategy) -> Self {
        self.recommend_strategy = strategy;
        self
    }

    pub fn model(&self) -> &ResilientModel {
        &self.model
    }

    /// Stage 1. Empty input fails fast with `InputMissing`; image OCR failure
    /// falls back to the typed text.
    pub async fn parse(&self, input: RawInput) -> Result<ParsedInput> {
        if input.is_empty() {
            return Err(ProfilerError::input_missing(NO_INPUT_REASON));
        }
        let image_text = match input.image {
            Some(image) if !image.data.is_empty() => {
                parser::parse_image_part(&self.model, image).await
            }
            _ => String::new(),
        };
        let extracted_text = parser::combine_input(&input.text, &image_text);
        if extracted_text.is_empty() {
            return Err(ProfilerError::input_missing(NO_INPUT_REASON));
        }
        let outcome = parser::parse_text_to_answers(&self.model, &extracted_text).await?;
        Ok(ParsedInput {
            extracted_text,
            outcome,
        })
    }

    /// Stage 2
    pub async fn extract_factors(&self, text: &str) -> FactorSet {
        factors::extract_factors(&self.model, text).await
    }

    /// Stage 3
    pub async fn classify(&self, factors: &[Factor]) -> RiskProfile {
        risk::classify_risk(self.risk_strategy, &self.model, factors).await
    }

    /// Stage 4
    pub async fn recommend(&self, risk_level: &str, factors: &[String]) -> RecommendationSet {
        recommender::get_recommendations(self.recommend_strategy, &self.model, risk_level, factors)
            .await
    }

    /// All four stages in sequence. An error risk profile ends the run with
    /// no recommendations and `status: error`.
    pub async fn analyze(&self, input: RawInput) -> Result<AnalysisReport> {
        let parsed = self.parse(input).await?;
        let normalized = match parsed.outcome {
            ParseOutcome::Complete(normalized) => normalized,
            ParseOutcome::Incomplete { reason } => {
                return Err(ProfilerError::InputMissing { reason });
            }
        };

        let answers_value = serde_json::to_value(&normalized.answers)?;
        let factor_set = self
            .extract_factors(&factors::answers_to_text(&answers_value))
            .await;
        let profile = self.classify(&factor_set.factors).await;
        let recs = if profile.is_error() {
            tracing::warn!("Risk classification returned an error profile, skipping recommendations");
            RecommendationSet::new(profile.risk_level.as_str(), factor_set.names(), Vec::new())
        } else {
            self.recommend(profile.risk_level.as_str(), &factor_set.names())
                .await
        };

        Ok(AnalysisReport {
            extracted_text: parsed.extracted_text,
            answers: normalized.answers,
            missing_fields: normalized.missing_fields,
            factors: factor_set.factors,
            confidence: factor_set.confidence,
            risk_level: profile.risk_level,
            score: profile.score,
            rationale: profile.rationale,
            recommendations: recs.recommendations,
            status: recs.status,
        })
    }
}
