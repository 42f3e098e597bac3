//! Prompt templates for each pipeline stage

use crate::profiler::types::Factor;

pub const IMAGE_OCR_PROMPT: &str = "\
Analyze the image of this lifestyle or medical survey form.
Extract all key fields and their corresponding values as plain text.
Combine them into a single, comma-separated string.
Example: \"age: 42, smoker: true, exercise: rarely, diet: high sugar\"
If no relevant text is found, return an empty string.";

/// Asks for a single `key:value;...` line rather than JSON
pub fn answers_prompt(text: &str) -> String {
    format!(
        "Analyze the text below. Extract values for 'age', 'smoker', 'exercise', and 'diet'.
Return the result as a single line of semicolon-separated key:value pairs.
Omit any field that is not mentioned. Do not add commentary.

Example: age:42;smoker:true;exercise:rarely;diet:high sugar

Input Text:
---
{text}
---"
    )
}

pub fn factors_prompt(health_data: &str) -> String {
    format!(
        r#"Analyze the following health data and identify potential risk factors.
Your final output MUST be a single, valid JSON object with a key "factors" which is a list of factor objects.
Each factor object has a "factor" name and a "confidence" between 0 and 1.

Example output format:
{{
  "factors": [
    {{"factor": "Smoking", "confidence": 0.95}},
    {{"factor": "High Sugar Diet", "confidence": 0.8}}
  ]
}}

Health Data to Analyze:
---
{health_data}
---"#
    )
}

pub fn risk_prompt(factors: &[Factor]) -> String {
    let listed = factors
        .iter()
        .map(|f| format!("- {} (confidence {:.2})", f.factor, f.confidence))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"Assess the overall health risk implied by these risk factors:
{listed}

Respond with ONLY a JSON object containing exactly these keys:
"risk_level": one of "Low", "Medium", "High"
"score": an integer from 0 to 100
"rationale": a list of the factor names that drove the score"#
    )
}

pub fn recommendations_batch_prompt(risk_level: &str, factors: &[String]) -> String {
    format!(
        r#"A person has a "{risk_level}" health risk level, with contributing factors: {}.
Generate between 3 and 5 short, actionable, distinct recommendations (one sentence each).
Respond with ONLY a JSON array of strings."#,
        factors_phrase(factors)
    )
}

/// One-sentence prompt that lists earlier outputs so the model steers away from them
pub fn recommendation_step_prompt(risk_level: &str, factors: &[String], previous: &[String]) -> String {
    let previous = if previous.is_empty() {
        "None".to_string()
    } else {
        previous.join("; ")
    };
    format!(
        r#"A person has a "{risk_level}" health risk level, with contributing factors: {}.
Generate 1 short, actionable recommendation (1 sentence only) in plain text.
Make it different from previous recommendations: {previous}.
Do NOT write paragraphs. Output only the recommendation text."#,
        factors_phrase(factors)
    )
}

fn factors_phrase(factors: &[String]) -> String {
    if factors.is_empty() {
        "No factors provided".to_string()
    } else {
        factors.join(", ")
    }
}
