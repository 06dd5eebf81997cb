//! Tolerant extraction of the importance score from raw model output.
//!
//! The model is asked for `{"importanceScore": N, ...}` but routinely wraps
//! it in a fenced code block, adds prose, or drops the JSON altogether. The
//! fallbacks below run in a fixed order and each one only fires when the
//! previous one found nothing usable:
//!
//! 1. strip a surrounding code fence and an optional `json` language tag;
//! 2. strict JSON parse, reading a numeric `importanceScore`;
//! 3. only if the JSON parse failed: the first run of digits in the cleaned text;
//! 4. an `importanceScore: N`-like key pattern anywhere in the raw text;
//! 5. the sentinel [`UNPARSED_SCORE`].
//!
//! A number outside `0..=10` is never returned; the rung that found it is
//! treated as having found nothing.

use std::sync::LazyLock;

use filekeep_core::UNPARSED_SCORE;
use regex::Regex;
use tracing::debug;

const FENCE: &str = "```";

static FIRST_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)").expect("digit regex is valid"));

static SCORE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)importanceScore["']?:?\s*(\d+)"#).expect("score key regex is valid")
});

/// Parse an importance score out of `raw`. Never fails: the result is always
/// in `[-1, 10]`, with `-1` meaning nothing usable was found.
pub fn parse_score(raw: &str) -> i32 {
    let cleaned = strip_fence(raw);

    match serde_json::from_str::<serde_json::Value>(cleaned) {
        Ok(value) => {
            if let Some(score) = value
                .get("importanceScore")
                .and_then(serde_json::Value::as_i64)
                .and_then(|n| i32::try_from(n).ok())
                .and_then(in_range)
            {
                return score;
            }
        }
        Err(e) => {
            debug!(error = %e, "model output is not JSON, scanning for digits");
            if let Some(score) = first_capture(&FIRST_DIGITS, cleaned) {
                return score;
            }
        }
    }

    if let Some(score) = first_capture(&SCORE_KEY, raw) {
        return score;
    }

    debug!(raw, "could not extract importance score");
    UNPARSED_SCORE
}

/// Remove a surrounding code fence and a leading `json` tag.
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix(FENCE) else {
        return trimmed;
    };
    let inner = inner.strip_suffix(FENCE).unwrap_or(inner).trim();
    match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => inner[4..].trim(),
        _ => inner,
    }
}

fn first_capture(re: &Regex, haystack: &str) -> Option<i32> {
    re.captures(haystack)?
        .get(1)?
        .as_str()
        .parse::<i32>()
        .ok()
        .and_then(in_range)
}

fn in_range(score: i32) -> Option<i32> {
    (0..=10).contains(&score).then_some(score)
}
