//! ScoringReport: the bit-exact output contract consumed by the JSON API and renderers.
//!
//! `REPORT_SCHEMA` is the single description of the shape. It renders the schema
//! block embedded in the scoring prompt and drives validation of the model's reply,
//! so the two cannot drift. The serde types below are tested to serialise to exactly
//! the same field set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallMatch {
    Strong,
    Moderate,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Readability {
    High,
    Moderate,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub matched: Vec<String>,
    pub unmatched: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatAnalysis {
    pub structure: String,
    pub length: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub impactful_phrases: Vec<String>,
    pub weak_phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillsGapAnalysis {
    pub present_skills: Vec<String>,
    pub suggested_skills: Vec<String>,
}

/// The validated match report. Only ever constructed from a reply that passed
/// `normalize_report`; partial reports do not exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringReport {
    pub overall_score: u8,
    pub alignment_feedback: String,
    pub overall_match: OverallMatch,
    pub keyword_match: KeywordMatch,
    pub readability_score: Readability,
    pub ats_compatibility_score: u8,
    pub format_analysis: FormatAnalysis,
    pub impact_analysis: ImpactAnalysis,
    pub skills_gap_analysis: SkillsGapAnalysis,
    pub overall_improvement_suggestions: Vec<String>,
    pub general_recommendations: Vec<String>,
    pub industry_specific_feedback: Vec<String>,
}

impl ScoringReport {
    /// Keywords present in both lists, compared case-insensitively after trimming.
    pub fn overlapping_keywords(&self) -> Vec<String> {
        let matched: HashSet<String> = self
            .keyword_match
            .matched
            .iter()
            .map(|k| k.trim().to_lowercase())
            .collect();
        self.keyword_match
            .unmatched
            .iter()
            .filter(|k| matched.contains(&k.trim().to_lowercase()))
            .cloned()
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field table
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Integer { min: i64, max: i64 },
    Text,
    Choice(&'static [&'static str]),
    TextList,
    Object(&'static [FieldSpec]),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

const fn field(name: &'static str, kind: FieldKind, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        description,
    }
}

const SCORE: FieldKind = FieldKind::Integer { min: 0, max: 100 };

const KEYWORD_MATCH_FIELDS: &[FieldSpec] = &[
    field("matched", FieldKind::TextList, "Job keywords found in the resume"),
    field(
        "unmatched",
        FieldKind::TextList,
        "Job keywords missing from the resume (disjoint from matched)",
    ),
];

const FORMAT_ANALYSIS_FIELDS: &[FieldSpec] = &[
    field(
        "structure",
        FieldKind::Text,
        "Feedback on structure (e.g. \"Well-organized\", \"Needs improvement\")",
    ),
    field(
        "length",
        FieldKind::Text,
        "Assessment of length (e.g. \"Optimal\", \"Too short\", \"Too long\")",
    ),
];

const IMPACT_ANALYSIS_FIELDS: &[FieldSpec] = &[
    field(
        "impactfulPhrases",
        FieldKind::TextList,
        "Impactful phrases found in the resume",
    ),
    field(
        "weakPhrases",
        FieldKind::TextList,
        "Weak or generic phrases to avoid",
    ),
];

const SKILLS_GAP_FIELDS: &[FieldSpec] = &[
    field(
        "presentSkills",
        FieldKind::TextList,
        "Skills present in the candidate's profile",
    ),
    field(
        "suggestedSkills",
        FieldKind::TextList,
        "Additional skills that would strengthen the profile",
    ),
];

pub const REPORT_SCHEMA: &[FieldSpec] = &[
    field("overallScore", SCORE, "Overall score for the candidate's match"),
    field(
        "alignmentFeedback",
        FieldKind::Text,
        "Feedback on the alignment of the candidate's profile with the job description",
    ),
    field(
        "overallMatch",
        FieldKind::Choice(&["Strong", "Moderate", "Weak"]),
        "Overall summary of the match",
    ),
    field(
        "keywordMatch",
        FieldKind::Object(KEYWORD_MATCH_FIELDS),
        "Keyword coverage",
    ),
    field(
        "readabilityScore",
        FieldKind::Choice(&["High", "Moderate", "Low"]),
        "Assessment of the resume's readability",
    ),
    field(
        "atsCompatibilityScore",
        SCORE,
        "Score based on Applicant Tracking System compatibility",
    ),
    field(
        "formatAnalysis",
        FieldKind::Object(FORMAT_ANALYSIS_FIELDS),
        "Format review",
    ),
    field(
        "impactAnalysis",
        FieldKind::Object(IMPACT_ANALYSIS_FIELDS),
        "Phrase-level impact review",
    ),
    field(
        "skillsGapAnalysis",
        FieldKind::Object(SKILLS_GAP_FIELDS),
        "Skills gap review",
    ),
    field(
        "overallImprovementSuggestions",
        FieldKind::TextList,
        "Suggestions for improving the profile",
    ),
    field(
        "generalRecommendations",
        FieldKind::TextList,
        "General advice for the candidate",
    ),
    field(
        "industrySpecificFeedback",
        FieldKind::TextList,
        "Recommendations tailored to the industry or role",
    ),
];

/// Renders the schema as the annotated JSON skeleton shown to the model.
pub fn render_schema() -> String {
    let mut out = String::from("{\n");
    render_fields(REPORT_SCHEMA, 1, &mut out);
    out.push('}');
    out
}

fn render_fields(fields: &[FieldSpec], depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    for (i, entry) in fields.iter().enumerate() {
        let comma = if i + 1 < fields.len() { "," } else { "" };
        match entry.kind {
            FieldKind::Object(children) => {
                out.push_str(&format!(
                    "{indent}\"{}\": {{  // {}\n",
                    entry.name, entry.description
                ));
                render_fields(children, depth + 1, out);
                out.push_str(&format!("{indent}}}{comma}\n"));
            }
            kind => {
                out.push_str(&format!(
                    "{indent}\"{}\": {}{comma}  // {}\n",
                    entry.name,
                    type_label(kind),
                    entry.description
                ));
            }
        }
    }
}

fn type_label(kind: FieldKind) -> String {
    match kind {
        FieldKind::Integer { min, max } => format!("int ({min}-{max})"),
        FieldKind::Text => "str".to_string(),
        FieldKind::Choice(options) => format!(
            "str (one of {})",
            options
                .iter()
                .map(|o| format!("\"{o}\""))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        FieldKind::TextList => "[str]".to_string(),
        FieldKind::Object(_) => "object".to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// Checks a decoded reply against `REPORT_SCHEMA`, coercing values where that is safe,
/// and returns the typed report or every problem found.
pub fn normalize_report(value: Value) -> Result<ScoringReport, Vec<String>> {
    let mut root = match value {
        Value::Object(root) => root,
        other => {
            return Err(vec![format!(
                "top-level value must be an object, got {}",
                type_name(&other)
            )])
        }
    };

    let mut problems = Vec::new();
    normalize_fields(&mut root, REPORT_SCHEMA, "", &mut problems);
    if !problems.is_empty() {
        return Err(problems);
    }

    let report: ScoringReport =
        serde_json::from_value(Value::Object(root)).map_err(|e| vec![e.to_string()])?;

    let overlap = report.overlapping_keywords();
    if !overlap.is_empty() {
        return Err(vec![format!(
            "keywordMatch.matched and keywordMatch.unmatched overlap: {}",
            overlap.join(", ")
        )]);
    }

    Ok(report)
}

fn normalize_fields(
    object: &mut Map<String, Value>,
    fields: &[FieldSpec],
    prefix: &str,
    problems: &mut Vec<String>,
) {
    for entry in fields {
        let path = if prefix.is_empty() {
            entry.name.to_string()
        } else {
            format!("{prefix}.{}", entry.name)
        };
        match object.get_mut(entry.name) {
            None | Some(Value::Null) => problems.push(format!("{path} is missing")),
            Some(slot) => normalize_value(slot, entry.kind, &path, problems),
        }
    }
}

fn normalize_value(slot: &mut Value, kind: FieldKind, path: &str, problems: &mut Vec<String>) {
    match kind {
        FieldKind::Integer { min, max } => match coerce_integer(slot) {
            Some(n) if (min..=max).contains(&n) => *slot = Value::Number(Number::from(n)),
            Some(n) => problems.push(format!("{path} must be between {min} and {max}, got {n}")),
            None => problems.push(format!("{path} must be an integer, got {slot}")),
        },
        FieldKind::Text => match slot {
            Value::String(_) => {}
            Value::Number(n) => *slot = Value::String(n.to_string()),
            other => problems.push(format!("{path} must be a string, got {}", type_name(other))),
        },
        FieldKind::Choice(options) => {
            let canonical = slot.as_str().and_then(|s| {
                options
                    .iter()
                    .find(|o| o.eq_ignore_ascii_case(s.trim()))
                    .copied()
            });
            match canonical {
                Some(option) => *slot = Value::String(option.to_string()),
                None => problems.push(format!(
                    "{path} must be one of {}, got {slot}",
                    options.join("/")
                )),
            }
        }
        FieldKind::TextList => match slot {
            Value::Array(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    match item {
                        Value::String(_) => {}
                        Value::Number(n) => *item = Value::String(n.to_string()),
                        other => problems.push(format!(
                            "{path}[{i}] must be a string, got {}",
                            type_name(other)
                        )),
                    }
                }
            }
            other => problems.push(format!(
                "{path} must be a list of strings, got {}",
                type_name(other)
            )),
        },
        FieldKind::Object(children) => match slot {
            Value::Object(inner) => normalize_fields(inner, children, path, problems),
            other => problems.push(format!("{path} must be an object, got {}", type_name(other))),
        },
    }
}

/// Integers, integral floats (`85.0`) and numeric strings (`" 85 "`) become an integer.
fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
