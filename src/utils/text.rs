use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z]*").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Drop markdown code fences (with optional language tag), keeping the contents
pub fn strip_code_fences(input: &str) -> String {
    FENCE_RE.replace_all(input, "").trim().to_string()
}

/// Collapse a model reply into a single trimmed line
pub fn flatten_line(input: &str) -> String {
    let unfenced = strip_code_fences(input);
    WS_RE.replace_all(&unfenced, " ").trim().to_string()
}

pub fn truncate_chars(input: &str, max: usize) -> String {
    let mut out = String::new();
    for (idx, ch) in input.chars().enumerate() {
        if idx >= max {
            out.push_str("...");
            break;
        }
        out.push(ch);
    }
    out
}
