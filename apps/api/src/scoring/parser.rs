//! Response Parser: recovers a JSON payload from free-form model output.
//!
//! Models do not reliably honour "no code fences". Recovery order:
//! 1. the whole trimmed text
//! 2. fenced slices: ```` ```json ```` fences, then bare ```` ``` ```` fences holding an
//!    object, each paired with every possible closing fence; the longest slice that
//!    decodes wins
//! 3. the outermost `{ … }` slice, once, when prose surrounds bare JSON
//!
//! Every failure carries the untouched model text for triage.

use serde_json::Value;
use thiserror::Error;

use crate::scoring::schema::{normalize_report, ScoringReport};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseError {
    /// No decodable JSON could be recovered.
    #[error("model output is not valid JSON: {message}")]
    Parse { raw: String, message: String },

    /// JSON decoded but does not satisfy the expected shape.
    #[error("model output failed validation: {message}")]
    Validation { raw: String, message: String },
}

impl ResponseError {
    pub fn raw(&self) -> &str {
        match self {
            ResponseError::Parse { raw, .. } | ResponseError::Validation { raw, .. } => raw,
        }
    }
}

/// Parses a stage-2 reply into a validated `ScoringReport`.
pub fn parse_report(raw: &str) -> Result<ScoringReport, ResponseError> {
    let value = recover_json(raw)?;
    normalize_report(value).map_err(|problems| ResponseError::Validation {
        raw: raw.to_string(),
        message: problems.join("; "),
    })
}

/// Recovers the JSON value embedded in `raw`, without any shape checks.
pub fn recover_json(raw: &str) -> Result<Value, ResponseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ResponseError::Parse {
            raw: raw.to_string(),
            message: "model output is empty".to_string(),
        });
    }

    let whole_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    // The longest slice that decodes wins, so a small fenced snippet quoted inside a
    // string value never displaces the payload that contains it.
    let mut best: Option<(usize, Value)> = None;
    let mut fence_error = None;
    for candidate in fenced_candidates(raw) {
        if best.as_ref().is_some_and(|(len, _)| *len >= candidate.len()) {
            continue;
        }
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => best = Some((candidate.len(), value)),
            Err(e) => {
                fence_error.get_or_insert_with(|| e.to_string());
            }
        }
    }
    if let Some((_, value)) = best {
        return Ok(value);
    }

    if let Some(value) = outermost_object(trimmed)
        .filter(|slice| slice.len() < trimmed.len())
        .and_then(|slice| serde_json::from_str::<Value>(slice).ok())
    {
        return Ok(value);
    }

    Err(ResponseError::Parse {
        raw: raw.to_string(),
        message: fence_error.unwrap_or(whole_error),
    })
}

/// Every fenced slice worth decoding.
///
/// Fence markers may also occur inside JSON string values, so no single match is
/// trusted: each ```` ```json ```` opening is paired with every later
/// fence in turn, then with the end of the text for output that was cut off.
/// Bare ```` ``` ```` openings follow, and only when their content is an object.
fn fenced_candidates(raw: &str) -> Vec<&str> {
    let lowered = raw.to_ascii_lowercase();
    let fences: Vec<usize> = raw.match_indices(FENCE).map(|(at, _)| at).collect();

    let mut candidates = Vec::new();
    for (open, _) in lowered.rmatch_indices(JSON_FENCE) {
        push_bodies(raw, open + JSON_FENCE.len(), &fences, false, &mut candidates);
    }
    for &open in &fences {
        if !lowered[open..].starts_with(JSON_FENCE) {
            push_bodies(raw, open + FENCE.len(), &fences, true, &mut candidates);
        }
    }
    candidates
}

fn push_bodies<'a>(
    raw: &'a str,
    start: usize,
    fences: &[usize],
    object_only: bool,
    out: &mut Vec<&'a str>,
) {
    let ends = fences
        .iter()
        .copied()
        .filter(|&end| end >= start)
        .chain(std::iter::once(raw.len()));
    for end in ends {
        let body = raw[start..end].trim();
        if body.is_empty() || (object_only && !body.starts_with('{')) {
            continue;
        }
        out.push(body);
    }
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::schema::tests::sample_report_json;
    use serde_json::json;

    fn fence(body: &str) -> String {
        format!("```json\n{body}\n```")
    }

    #[test]
    fn test_bare_json_parses() {
        let raw = sample_report_json().to_string();
        let report = parse_report(&raw).unwrap();
        assert_eq!(report.overall_score, 78);
    }

    #[test]
    fn test_fenced_and_bare_parse_identically() {
        let bare = serde_json::to_string_pretty(&sample_report_json()).unwrap();
        let fenced = fence(&bare);
        assert_eq!(parse_report(&bare).unwrap(), parse_report(&fenced).unwrap());
        assert_eq!(recover_json(&fenced).unwrap(), sample_report_json());
    }

    #[test]
    fn test_fenced_json_with_leading_prose() {
        let raw = format!(
            "Here is the evaluation you asked for:\n\n{}\n\nLet me know if you need more.",
            fence(&sample_report_json().to_string())
        );
        assert_eq!(parse_report(&raw).unwrap().ats_compatibility_score, 85);
    }

    #[test]
    fn test_uppercase_fence_marker() {
        let raw = format!("```JSON\n{}\n```", json!({"a": 1}));
        assert_eq!(recover_json(&raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_innermost_fence_wins() {
        let raw = "```json\nnot this\n```json\n{\"inner\": true}\n```\n```";
        assert_eq!(recover_json(raw).unwrap(), json!({"inner": true}));
    }

    #[test]
    fn test_json_fence_marker_inside_bare_value() {
        let mut value = sample_report_json();
        value["generalRecommendations"] =
            json!(["Show config samples in ```json blocks, closed with ```"]);
        let bare = value.to_string();
        let report = parse_report(&bare).unwrap();
        assert_eq!(
            report.general_recommendations,
            vec!["Show config samples in ```json blocks, closed with ```"]
        );
        assert_eq!(parse_report(&fence(&bare)).unwrap(), report);
    }

    #[test]
    fn test_backticks_inside_fenced_value_do_not_truncate() {
        let mut value = sample_report_json();
        value["generalRecommendations"] = json!(["Wrap code samples in ``` fences"]);
        let bare = value.to_string();
        assert_eq!(
            parse_report(&fence(&bare)).unwrap(),
            parse_report(&bare).unwrap()
        );
        assert_eq!(recover_json(&fence(&bare)).unwrap(), value);
    }

    #[test]
    fn test_fenced_and_bare_agree_for_awkward_strings() {
        for text in [
            "```",
            "```json",
            "``` ```json ```",
            "{\"nested\": \"```\"}",
            "prose ``` then { braces }",
            "```json {\"snippet\": 1} ```",
        ] {
            let value = json!({"note": text, "items": [text, "plain"]});
            let bare = value.to_string();
            assert_eq!(recover_json(&bare).unwrap(), value, "bare: {text}");
            assert_eq!(recover_json(&fence(&bare)).unwrap(), value, "fenced: {text}");
            let with_prose = format!("Here you go:\n{}\nDone.", fence(&bare));
            assert_eq!(recover_json(&with_prose).unwrap(), value, "prose: {text}");
        }
    }

    #[test]
    fn test_bare_fence_holding_object() {
        let raw = "```\n{\"x\": [1, 2]}\n```";
        assert_eq!(recover_json(raw).unwrap(), json!({"x": [1, 2]}));
    }

    #[test]
    fn test_prose_around_unfenced_object() {
        let raw = "Sure! {\"x\": 1} Hope this helps.";
        assert_eq!(recover_json(raw).unwrap(), json!({"x": 1}));
    }

    #[test]
    fn test_truncated_json_is_parse_failure_with_raw_text() {
        let full = sample_report_json().to_string();
        let truncated = &full[..full.len() / 2];
        match parse_report(truncated).unwrap_err() {
            ResponseError::Parse { raw, message } => {
                assert_eq!(raw, truncated);
                assert!(!message.is_empty());
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_fence_is_parse_failure() {
        let raw = "```json\n{\"overallScore\": 80, \"alignment";
        let err = parse_report(raw).unwrap_err();
        assert!(matches!(err, ResponseError::Parse { .. }));
        assert_eq!(err.raw(), raw);
    }

    #[test]
    fn test_empty_string_is_parse_failure() {
        let err = parse_report("").unwrap_err();
        assert!(matches!(err, ResponseError::Parse { .. }));
        assert!(
            matches!(&err, ResponseError::Parse { message, .. } if message == "model output is empty")
        );
        assert_eq!(err.raw(), "");
    }

    #[test]
    fn test_empty_fence_is_parse_failure() {
        assert!(matches!(
            parse_report("```json\n```"),
            Err(ResponseError::Parse { .. })
        ));
    }

    #[test]
    fn test_plain_prose_is_parse_failure() {
        let raw = "I'm sorry, I cannot evaluate this resume.";
        let err = parse_report(raw).unwrap_err();
        assert!(matches!(err, ResponseError::Parse { .. }));
        assert_eq!(err.raw(), raw);
    }

    #[test]
    fn test_valid_json_wrong_shape_is_validation_error() {
        let raw = r#"{"overallScore": "ninety"}"#;
        match parse_report(raw).unwrap_err() {
            ResponseError::Validation { raw: kept, message } => {
                assert_eq!(kept, raw);
                assert!(message.contains("overallScore must be an integer"));
                assert!(message.contains("alignmentFeedback is missing"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_score_is_validation_error_not_clamped() {
        let mut value = sample_report_json();
        value["overallScore"] = json!(101);
        let err = parse_report(&fence(&value.to_string())).unwrap_err();
        assert!(matches!(err, ResponseError::Validation { .. }));
        assert!(err.to_string().contains("between 0 and 100"));
    }
}
