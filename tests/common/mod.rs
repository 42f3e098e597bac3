//! Stub generative models shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use health_profiler::clients::{CallPolicy, GenerativeModel, ModelError, ModelPrompt, ResilientModel};

/// Policy with no backoff so failure paths run instantly on a real clock
pub fn fast_policy() -> CallPolicy {
    CallPolicy {
        retries: 3,
        timeout: Duration::from_secs(5),
        backoff: Duration::ZERO,
    }
}

pub fn resilient(model: Arc<dyn GenerativeModel>) -> ResilientModel {
    ResilientModel::new(model, fast_policy())
}

/// Replays a fixed script of responses, then fails
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    prompts: Mutex<Vec<ModelPrompt>>,
    calls: AtomicU32,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<String, ModelError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<ModelPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Http("script exhausted".into())))
    }
}

/// Never answers; every attempt hits the timeout
#[derive(Default)]
pub struct HangingModel {
    calls: AtomicU32,
}

impl HangingModel {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeModel for HangingModel {
    async fn generate(&self, _prompt: &ModelPrompt) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        unreachable!()
    }
}

/// Always fails immediately
pub struct FailingModel;

#[async_trait]
impl GenerativeModel for FailingModel {
    async fn generate(&self, _prompt: &ModelPrompt) -> Result<String, ModelError> {
        Err(ModelError::Api {
            status: 503,
            body: "unavailable".into(),
        })
    }
}

/// Deterministic output that changes whenever the prompt changes
pub fn prompt_fingerprint(prompt: &str) -> String {
    let mut hasher = DefaultHasher::new();
    prompt.hash(&mut hasher);
    format!("Recommendation {:016x}.", hasher.finish())
}

/// Answers each stage's prompt the way a well-behaved model would
pub struct SurveyModel {
    pub answer_line: String,
    pub factors_json: String,
    pub image_text: String,
}

impl Default for SurveyModel {
    fn default() -> Self {
        Self {
            answer_line: "age:50;smoker:true;diet:high sugar".into(),
            factors_json: r#"{"factors":[{"factor":"smoking","confidence":1.0}]}"#.into(),
            image_text: "exercise: rarely".into(),
        }
    }
}

#[async_trait]
impl GenerativeModel for SurveyModel {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, ModelError> {
        let text = &prompt.text;
        if prompt.image.is_some() {
            Ok(self.image_text.clone())
        } else if text.contains("semicolon-separated") {
            Ok(self.answer_line.clone())
        } else if text.contains("identify potential risk factors") {
            Ok(format!("Sure! Here it is:\n```json\n{}\n```", self.factors_json))
        } else if text.contains("Generate 1 short") {
            Ok(prompt_fingerprint(text))
        } else if text.contains("JSON array of strings") {
            Ok(r#"["Quit smoking.", "Walk daily.", "Cut sugar."]"#.into())
        } else if text.contains("\"risk_level\"") {
            Ok(r#"{"risk_level": "high", "score": 80, "rationale": ["smoking"]}"#.into())
        } else {
            Err(ModelError::EmptyResponse)
        }
    }
}

/// In-memory sink for formatted log output
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Subscriber writing plain-text events into this capture
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let sink = self.clone();
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish()
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
