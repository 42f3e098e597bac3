mod common;

use std::path::Path;
use std::sync::Arc;

use common::{FailingModel, ScriptedModel, SurveyModel, prompt_fingerprint, resilient};
use health_profiler::ProfilerError;
use health_profiler::clients::{GenerativeModel, ImagePart, ModelError, ModelPrompt};
use health_profiler::profiler::parser::{INCOMPLETE_REASON, parse_image, parse_text_to_answers};
use health_profiler::profiler::recommender::{
    FALLBACK_RECOMMENDATION, PLACEHOLDER_RECOMMENDATION, SEQUENTIAL_COUNT,
};
use health_profiler::profiler::risk::{classify_heuristic, classify_with_model};
use health_profiler::profiler::{
    Factor, ParseOutcome, Profiler, RawInput, RecommendStrategy, RiskLevel, RiskStrategy,
    StageStatus,
};

#[tokio::test]
async fn answer_line_with_three_fields_is_complete() {
    let model = resilient(Arc::new(ScriptedModel::replying(&[
        "age:42;smoker:true;exercise:rarely",
    ])));
    let outcome = parse_text_to_answers(&model, "I'm 42, I smoke, rarely exercise")
        .await
        .unwrap();
    let ParseOutcome::Complete(normalized) = outcome else {
        panic!("expected complete answers");
    };
    assert_eq!(normalized.answers.age, Some(42));
    assert_eq!(normalized.answers.smoker, Some(true));
    assert_eq!(normalized.answers.exercise.as_deref(), Some("rarely"));
    assert_eq!(normalized.missing_fields, vec!["diet"]);
}

#[tokio::test]
async fn answers_on_separate_lines_are_complete() {
    let model = resilient(Arc::new(ScriptedModel::replying(&[
        "```\nage:42\nsmoker:true\nexercise:rarely\n```",
    ])));
    let outcome = parse_text_to_answers(&model, "42, smoker, rarely exercises")
        .await
        .unwrap();
    let ParseOutcome::Complete(normalized) = outcome else {
        panic!("expected complete answers");
    };
    assert_eq!(normalized.answers.age, Some(42));
    assert_eq!(normalized.answers.smoker, Some(true));
    assert_eq!(normalized.answers.exercise.as_deref(), Some("rarely"));
    assert_eq!(normalized.missing_fields, vec!["diet"]);
}

#[tokio::test]
async fn answer_line_with_one_field_is_incomplete() {
    let model = resilient(Arc::new(ScriptedModel::replying(&["age:42"])));
    let outcome = parse_text_to_answers(&model, "42").await.unwrap();
    assert_eq!(
        outcome,
        ParseOutcome::Incomplete {
            reason: INCOMPLETE_REASON.to_string()
        }
    );
}

#[tokio::test]
async fn answer_parsing_escalates_when_model_is_down() {
    let model = resilient(Arc::new(FailingModel));
    let err = parse_text_to_answers(&model, "age 42").await.unwrap_err();
    assert!(matches!(err, ProfilerError::CapabilityUnavailable { .. }));
}

#[tokio::test]
async fn empty_input_fails_fast_without_calling_model() {
    let stub = Arc::new(ScriptedModel::default());
    let profiler = Profiler::new(resilient(stub.clone()));
    let err = profiler.parse(RawInput::default()).await.unwrap_err();
    assert!(matches!(err, ProfilerError::InputMissing { .. }));
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn failed_image_ocr_degrades_to_text() {
    let stub = Arc::new(ScriptedModel::new(vec![
        // three failed OCR attempts
        Err(ModelError::EmptyResponse),
        Err(ModelError::EmptyResponse),
        Err(ModelError::EmptyResponse),
        Ok("age:30;diet:balanced".into()),
    ]));
    let profiler = Profiler::new(resilient(stub.clone()));
    let parsed = profiler
        .parse(RawInput {
            text: "age 30, balanced diet".into(),
            image: Some(ImagePart {
                mime_type: "image/png".into(),
                data: vec![1, 2, 3],
            }),
        })
        .await
        .unwrap();
    assert_eq!(parsed.extracted_text, "age 30, balanced diet");
    assert!(matches!(parsed.outcome, ParseOutcome::Complete(_)));
    assert!(stub.prompts()[0].image.is_some());
}

#[tokio::test]
async fn unreadable_image_path_yields_empty_text() {
    let stub = Arc::new(ScriptedModel::default());
    let model = resilient(stub.clone());
    let text = parse_image(&model, Path::new("/nonexistent/survey.png")).await;
    assert_eq!(text, "");
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn image_text_is_appended_to_typed_text() {
    let profiler = Profiler::new(resilient(Arc::new(SurveyModel::default())));
    let parsed = profiler
        .parse(RawInput {
            text: "age 50".into(),
            image: Some(ImagePart {
                mime_type: "image/jpeg".into(),
                data: vec![9],
            }),
        })
        .await
        .unwrap();
    assert_eq!(parsed.extracted_text, "age 50 exercise: rarely");
}

#[tokio::test]
async fn factors_are_extracted_from_wrapped_json() {
    let model = resilient(Arc::new(ScriptedModel::replying(&[
        "Here you go:\n```json\n{\"factors\": [{\"factor\": \"Smoking\", \"confidence\": 0.9}, \"Stress\"]}\n```",
    ])));
    let set = health_profiler::profiler::factors::extract_factors(&model, "{}").await;
    assert_eq!(set.factors[0], Factor::new("Smoking", 0.9));
    assert_eq!(set.factors[1], Factor::new("Stress", 0.88));
}

#[tokio::test]
async fn factor_failures_yield_empty_set() {
    for reply in ["no json at all", "{\"factors\": [unterminated"] {
        let model = resilient(Arc::new(ScriptedModel::replying(&[reply])));
        let set = health_profiler::profiler::factors::extract_factors(&model, "{}").await;
        assert!(set.is_empty(), "reply {:?} should give no factors", reply);
    }
    let model = resilient(Arc::new(FailingModel));
    assert!(
        health_profiler::profiler::factors::extract_factors(&model, "{}")
            .await
            .is_empty()
    );
}

#[test]
fn heuristic_score_is_monotonic_in_confidence_and_clamped() {
    let names = [
        "Smoking",
        "High Sugar Diet",
        "Obesity",
        "Diabetes",
        "Stress",
        "Unrelated hobby",
    ];
    for target in 0..names.len() {
        let mut previous = -1;
        for step in 0..=20 {
            let confidence = step as f64 / 20.0;
            let factors: Vec<Factor> = names
                .iter()
                .enumerate()
                .map(|(i, n)| Factor::new(*n, if i == target { confidence } else { 0.9 }))
                .collect();
            let profile = classify_heuristic(&factors);
            assert!((0..=100).contains(&profile.score));
            assert!(profile.score >= previous, "score dropped for {}", names[target]);
            previous = profile.score;
        }
    }
}

#[test]
fn heuristic_empty_is_low_zero() {
    let profile = classify_heuristic(&[]);
    assert_eq!(profile.risk_level, RiskLevel::Low);
    assert_eq!(profile.score, 0);
    assert!(profile.rationale.is_empty());
}

#[tokio::test]
async fn model_classifier_returns_error_profile_on_bad_output() {
    let factors = vec![Factor::named("Smoking")];
    for reply in [
        r#"{"risk_level": "High", "score": 80}"#,
        r#"{"risk_level": "Catastrophic", "score": 80, "rationale": []}"#,
        "I cannot help with that",
    ] {
        let model = resilient(Arc::new(ScriptedModel::replying(&[reply])));
        let profile = classify_with_model(&model, &factors).await;
        assert!(profile.is_error(), "reply {:?}", reply);
        assert_eq!(profile.score, -1);
        assert_eq!(profile.rationale.len(), 1);
    }

    let model = resilient(Arc::new(FailingModel));
    assert!(classify_with_model(&model, &factors).await.is_error());
}

#[tokio::test]
async fn model_classifier_accepts_valid_profile() {
    let profiler = Profiler::new(resilient(Arc::new(SurveyModel::default())))
        .with_risk_strategy(RiskStrategy::Model);
    let profile = profiler.classify(&[Factor::named("smoking")]).await;
    assert_eq!(profile.risk_level, RiskLevel::High);
    assert_eq!(profile.score, 80);
    assert_eq!(profile.rationale, vec!["smoking"]);
}

#[tokio::test]
async fn sequential_recommendations_are_distinct_and_prompted_with_history() {
    let stub = Arc::new(PromptRecorder::default());
    let profiler = Profiler::new(resilient(stub.clone()));
    let set = profiler
        .recommend("High", &["smoking".to_string(), "stress".to_string()])
        .await;

    assert_eq!(set.recommendations.len(), SEQUENTIAL_COUNT);
    let mut unique = set.recommendations.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), set.recommendations.len());
    assert_eq!(set.status, StageStatus::Ok);
    assert_eq!(set.risk_level, "High");
    assert_eq!(set.factors, vec!["smoking", "stress"]);

    let prompts = stub.prompts.lock().unwrap().clone();
    assert!(prompts[0].contains("previous recommendations: None."));
    assert!(prompts[2].contains(&set.recommendations[0]));
    assert!(prompts[2].contains(&set.recommendations[1]));
}

#[tokio::test]
async fn sequential_failures_insert_placeholder_once() {
    let profiler = Profiler::new(resilient(Arc::new(FailingModel)));
    let set = profiler.recommend("Low", &[]).await;
    assert_eq!(set.recommendations, vec![PLACEHOLDER_RECOMMENDATION]);
    assert_eq!(set.status, StageStatus::Ok);
}

#[tokio::test]
async fn batch_recommendations_fall_back_on_garbage() {
    let profiler = Profiler::new(resilient(Arc::new(ScriptedModel::replying(&[
        "Sorry, here are some thoughts without structure.",
    ]))))
    .with_recommend_strategy(RecommendStrategy::Batch);
    let set = profiler.recommend("Medium", &["obesity".into()]).await;
    assert_eq!(set.recommendations, vec![FALLBACK_RECOMMENDATION]);

    let profiler = Profiler::new(resilient(Arc::new(SurveyModel::default())))
        .with_recommend_strategy(RecommendStrategy::Batch);
    let set = profiler.recommend("Medium", &["obesity".into()]).await;
    assert_eq!(set.recommendations, vec!["Quit smoking.", "Walk daily.", "Cut sugar."]);
}

#[tokio::test]
async fn analyze_runs_all_stages() {
    let profiler = Profiler::new(resilient(Arc::new(SurveyModel::default())));
    let report = profiler
        .analyze(RawInput {
            text: "age:50, smoker:true, high sugar diet".into(),
            image: None,
        })
        .await
        .unwrap();

    assert_eq!(report.answers.age, Some(50));
    assert_eq!(report.missing_fields, vec!["exercise"]);
    assert_eq!(report.factors, vec![Factor::new("smoking", 1.0)]);
    // smoking alone scores 30 * 1.0, below the Medium threshold of 35
    assert_eq!(report.score, 30);
    assert_eq!(report.risk_level, RiskLevel::Low);
    assert_eq!(report.rationale, vec!["smoking"]);
    assert!(!report.recommendations.is_empty());
    assert_eq!(report.status, StageStatus::Ok);
}

#[tokio::test]
async fn analyze_rejects_sparse_answers() {
    let profiler = Profiler::new(resilient(Arc::new(SurveyModel {
        answer_line: "age:50".into(),
        ..Default::default()
    })));
    let err = profiler
        .analyze(RawInput {
            text: "I am fifty".into(),
            image: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ProfilerError::InputMissing { ref reason } if reason == INCOMPLETE_REASON));
}

/// Prompt-sensitive stub that remembers every prompt
#[derive(Default)]
struct PromptRecorder {
    prompts: std::sync::Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl GenerativeModel for PromptRecorder {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.text.clone());
        Ok(prompt_fingerprint(&prompt.text))
    }
}

#[tokio::test]
async fn analyze_skips_recommendations_after_failed_classification() {
    let stub = Arc::new(ScriptedModel::replying(&[
        "age:50;smoker:true",
        r#"{"factors": ["smoking"]}"#,
        "I am unable to assess risk.",
    ]));
    let profiler = Profiler::new(resilient(stub.clone())).with_risk_strategy(RiskStrategy::Model);
    let report = profiler
        .analyze(RawInput {
            text: "50, smoker".into(),
            image: None,
        })
        .await
        .unwrap();

    assert_eq!(report.risk_level, RiskLevel::Error);
    assert_eq!(report.score, -1);
    assert!(report.recommendations.is_empty());
    assert_eq!(report.status, StageStatus::Error);
    assert_eq!(stub.calls(), 3);
}
