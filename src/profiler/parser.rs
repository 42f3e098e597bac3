//! Input normalization: image OCR and text-to-answers distillation

use std::path::Path;

use crate::clients::{ImagePart, ModelPrompt, ResilientModel};
use crate::error::Result;
use crate::profiler::prompts;
use crate::profiler::types::{ANSWERS_CONFIDENCE, NormalizedAnswers, ParseOutcome, SurveyAnswers};
use crate::utils::text::{flatten_line, strip_code_fences};

/// Minimum populated fields before answers are accepted
pub const MIN_POPULATED_FIELDS: usize = 2;

pub const INCOMPLETE_REASON: &str = ">50% fields missing";

const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

pub fn is_allowed_image(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Wrap uploaded bytes as an image part, or `None` for disallowed or empty uploads
pub fn image_part_from_upload(filename: &str, data: Vec<u8>) -> Option<ImagePart> {
    if data.is_empty() || !is_allowed_image(filename) {
        return None;
    }
    let mime_type = mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Some(ImagePart { mime_type, data })
}

/// OCR a survey image from disk. Any failure degrades to an empty string.
pub async fn parse_image(model: &ResilientModel, image_path: &Path) -> String {
    let filename = image_path.to_string_lossy().to_string();
    let data = match tokio::fs::read(image_path).await {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("Failed to read survey image {}: {}", filename, e);
            return String::new();
        }
    };
    match image_part_from_upload(&filename, data) {
        Some(image) => parse_image_part(model, image).await,
        None => {
            tracing::warn!("Ignoring unsupported image {}", filename);
            String::new()
        }
    }
}

/// OCR an in-memory image. Any failure degrades to an empty string.
pub async fn parse_image_part(model: &ResilientModel, image: ImagePart) -> String {
    let prompt = ModelPrompt::with_image(prompts::IMAGE_OCR_PROMPT, image);
    match model.generate(&prompt).await {
        Ok(generation) => {
            let text = generation.text.trim().to_string();
            tracing::info!("Vision extraction returned {} chars", text.len());
            text
        }
        Err(e) => {
            tracing::error!("Image extraction failed, continuing with text only: {}", e);
            String::new()
        }
    }
}

/// Join typed text with OCR output
pub fn combine_input(text: &str, image_text: &str) -> String {
    format!("{} {}", text.trim(), image_text.trim())
        .trim()
        .to_string()
}

/// Distill free text into the fixed four-field schema.
/// Only an exhausted model call is an error; sparse answers are `Incomplete`.
pub async fn parse_text_to_answers(model: &ResilientModel, text: &str) -> Result<ParseOutcome> {
    let generation = model.generate_text(prompts::answers_prompt(text)).await?;
    let reply = strip_code_fences(&generation.text);
    tracing::info!("Answer line from model: {}", flatten_line(&reply));
    Ok(answers_outcome(parse_answer_line(&reply)))
}

/// Parse `age:42;smoker:true;...` with type coercion. Unknown keys and
/// unparseable ages are dropped.
pub fn parse_answer_line(line: &str) -> SurveyAnswers {
    let mut answers = SurveyAnswers::default();
    for pair in line.split([';', '\n']) {
        let Some((key, value)) = pair.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches('"').to_ascii_lowercase();
        let value = value.trim().trim_matches('"').trim();
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "age" => match leading_number(value) {
                Some(age) => answers.age = Some(age),
                None => tracing::warn!("Dropping unparseable age '{}'", value),
            },
            "smoker" => {
                let lowered = value.to_ascii_lowercase();
                answers.smoker = Some(lowered == "true" || lowered == "yes");
            }
            "exercise" => answers.exercise = Some(value.to_string()),
            "diet" => answers.diet = Some(value.to_string()),
            _ => {}
        }
    }
    answers
}

fn leading_number(value: &str) -> Option<u32> {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Guardrail: fewer than `MIN_POPULATED_FIELDS` answers rejects the profile
pub fn answers_outcome(answers: SurveyAnswers) -> ParseOutcome {
    if answers.populated() < MIN_POPULATED_FIELDS {
        tracing::warn!(
            "Guardrail triggered: only {} of 4 fields parsed",
            answers.populated()
        );
        return ParseOutcome::Incomplete {
            reason: INCOMPLETE_REASON.to_string(),
        };
    }
    let missing_fields = answers.missing_fields();
    ParseOutcome::Complete(NormalizedAnswers {
        answers,
        missing_fields,
        confidence: ANSWERS_CONFIDENCE,
    })
}
