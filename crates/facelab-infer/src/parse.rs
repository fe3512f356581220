//! Lenient parsing of the compare reply.
//!
//! The model is asked for a JSON object but may wrap it in prose or a code
//! fence, or ignore the request entirely. Every input yields a result.

use facelab_core::ComparisonResult;
use serde::Deserialize;

/// Similarity reported when the reply carries no usable score.
pub const DEFAULT_SIMILARITY: f64 = 75.0;

/// Substrings that count as "same person" in a free-text reply.
pub const AFFIRMATIVE_KEYWORDS: &[&str] = &["是", "相同", "一致", "匹配", "同一", "yes", "same person"];

#[derive(Deserialize)]
struct WireComparison {
    #[serde(rename = "match")]
    matched: bool,
    similarity: WireScore,
    explanation: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireScore {
    Number(f64),
    Text(String),
}

impl WireScore {
    fn value(&self) -> Option<f64> {
        match self {
            WireScore::Number(n) => Some(*n),
            WireScore::Text(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        }
    }
}

/// Turn the compare reply text into a [`ComparisonResult`].
///
/// Tries, in order: the whole text as JSON, the outermost `{...}` span as
/// JSON, and finally the keyword heuristic.
pub fn parse_comparison(text: &str) -> ComparisonResult {
    if let Some(result) = parse_structured(text) {
        return result;
    }
    tracing::debug!(len = text.len(), "compare reply is not structured; using keyword fallback");
    infer_from_text(text)
}

fn parse_structured(text: &str) -> Option<ComparisonResult> {
    let trimmed = text.trim();
    serde_json::from_str(trimmed)
        .ok()
        .and_then(from_wire)
        .or_else(|| first_embedded(trimmed))
}

/// First object that parses as a comparison, starting at any `{` and
/// ignoring whatever follows it.
fn first_embedded(text: &str) -> Option<ComparisonResult> {
    text.match_indices('{').find_map(|(i, _)| {
        serde_json::Deserializer::from_str(&text[i..])
            .into_iter::<WireComparison>()
            .next()?
            .ok()
            .and_then(from_wire)
    })
}

fn from_wire(wire: WireComparison) -> Option<ComparisonResult> {
    let similarity = wire.similarity.value().filter(|v| v.is_finite())?;
    Some(ComparisonResult {
        matched: wire.matched,
        similarity: similarity.clamp(0.0, 100.0),
        explanation: wire.explanation,
    })
}

/// Keyword heuristic for replies that contain no parseable object.
pub fn infer_from_text(text: &str) -> ComparisonResult {
    let lower = text.to_lowercase();
    ComparisonResult {
        matched: AFFIRMATIVE_KEYWORDS.iter().any(|k| lower.contains(k)),
        similarity: DEFAULT_SIMILARITY,
        explanation: text.to_string(),
    }
}
