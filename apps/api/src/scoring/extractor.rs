//! Stage 1: normalises raw resume text into six named sections via the model.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::llm_client::prompts::NO_PREAMBLE_INSTRUCTION;
use crate::llm_client::{CompletionRequest, LlmError, ModelGateway};
use crate::scoring::parser::{recover_json, ResponseError};
use crate::scoring::prompts::{TemplateError, EXTRACTION_PROMPT};

/// The six sections, with the key each is published under.
const SECTIONS: [&str; 6] = [
    "personalInformation",
    "education",
    "skills",
    "experience",
    "certifications",
    "additionalSections",
];

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("resume text is empty")]
    EmptyText,

    #[error("could not read the resume document: {0}")]
    Unreadable(String),
}

#[derive(Debug, Error)]
pub enum Stage1Error {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Model(#[from] LlmError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// Stage-1 output, validated. Missing sections are present as empty values and
/// unrecognised top-level keys are carried along rather than dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResume {
    pub personal_information: Value,
    pub education: Value,
    pub skills: Value,
    pub experience: Value,
    pub certifications: Value,
    pub additional_sections: Value,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl StructuredResume {
    /// Validates the stage-1 reply: it must decode to an object that is empty or names
    /// at least one section.
    pub fn from_model_output(raw: &str) -> Result<Self, ResponseError> {
        let object = match recover_json(raw)? {
            Value::Object(object) => object,
            _ => {
                return Err(ResponseError::Validation {
                    raw: raw.to_string(),
                    message: "structured resume must be a JSON object".to_string(),
                })
            }
        };

        // `{}` is a resume with nothing in it; an object of unrelated keys is not.
        let was_empty = object.is_empty();
        let mut sections: [Option<Value>; 6] = Default::default();
        let mut other = Map::new();
        for (key, value) in object {
            match section_index(&key) {
                Some(i) if sections[i].is_none() => sections[i] = Some(value),
                _ => {
                    other.insert(key, value);
                }
            }
        }

        if !was_empty && sections.iter().all(Option::is_none) {
            return Err(ResponseError::Validation {
                raw: raw.to_string(),
                message: format!(
                    "structured resume contains none of the sections {}",
                    SECTIONS.join(", ")
                ),
            });
        }

        let [personal, education, skills, experience, certifications, additional] =
            sections.map(|s| s.filter(|v| !v.is_null()));
        Ok(Self {
            personal_information: personal.unwrap_or_else(|| Value::Object(Map::new())),
            education: education.unwrap_or_else(empty_list),
            skills: skills.unwrap_or_else(empty_list),
            experience: experience.unwrap_or_else(empty_list),
            certifications: certifications.unwrap_or_else(empty_list),
            additional_sections: additional.unwrap_or_else(empty_list),
            other,
        })
    }

    /// Pretty JSON embedded into the scoring prompt.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

/// Matches "Personal Information", "personal_information" and "personalInformation" alike.
fn section_index(key: &str) -> Option<usize> {
    let folded: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let folded = match folded.as_str() {
        "additional" | "additionalsection" | "additionalinformation" => "additionalsections",
        "personalinfo" | "personaldetails" => "personalinformation",
        "certification" => "certifications",
        "skill" => "skills",
        other => other,
    };
    SECTIONS
        .iter()
        .position(|section| section.eq_ignore_ascii_case(folded))
}

/// Runs stage 1. Empty text fails before any model call is made.
pub async fn extract_structured(
    gateway: &dyn ModelGateway,
    resume_text: &str,
    temperature: f32,
) -> Result<StructuredResume, Stage1Error> {
    if resume_text.trim().is_empty() {
        return Err(ExtractionError::EmptyText.into());
    }

    // JSON-encode the text so quotes and newlines cannot break the prompt framing.
    let encoded = Value::String(resume_text.to_owned()).to_string();
    let prompt = EXTRACTION_PROMPT.build(&[
        ("resume_text", encoded.as_str()),
        ("no_preamble", NO_PREAMBLE_INSTRUCTION),
    ])?;

    let raw = gateway
        .invoke(CompletionRequest {
            system: None,
            prompt: &prompt,
            temperature,
        })
        .await?;
    debug!("Stage 1 returned {} bytes", raw.len());

    Ok(StructuredResume::from_model_output(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::mock::MockGateway;
    use serde_json::json;

    const RESUME: &str = "Jane Doe\njane@example.com\nSenior Engineer at Acme (2019-2024)\nSkills: Rust, \"SQL\"";

    fn stage1_json() -> String {
        json!({
            "personalInformation": {"name": "Jane Doe", "email": "jane@example.com"},
            "education": [],
            "skills": ["Rust", "SQL"],
            "experience": [{"role": "Senior Engineer", "company": "Acme"}],
            "certifications": [],
            "additionalSections": {"projects": []}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_empty_text_makes_no_model_call() {
        let gateway = MockGateway::scripted([Ok(stage1_json())]);
        let err = extract_structured(&gateway, "", 0.0).await.unwrap_err();
        assert!(matches!(err, Stage1Error::Extraction(ExtractionError::EmptyText)));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_only_text_makes_no_model_call() {
        let gateway = MockGateway::scripted([Ok(stage1_json())]);
        assert!(extract_structured(&gateway, " \n\t ", 0.0).await.is_err());
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_prompt_embeds_encoded_text_without_system_prompt() {
        let gateway = MockGateway::scripted([Ok(stage1_json())]);
        let resume = extract_structured(&gateway, RESUME, 0.0).await.unwrap();
        assert_eq!(resume.skills, json!(["Rust", "SQL"]));

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].system.is_none());
        assert_eq!(calls[0].temperature, 0.0);
        assert!(calls[0]
            .prompt
            .contains(&serde_json::to_string(RESUME).unwrap()));
        assert!(calls[0].prompt.contains("NO PREAMBLE"));
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let gateway = MockGateway::scripted([Err(LlmError::Auth {
            status: 401,
            message: "bad key".to_string(),
        })]);
        let err = extract_structured(&gateway, RESUME, 0.0).await.unwrap_err();
        assert!(matches!(err, Stage1Error::Model(LlmError::Auth { .. })));
    }

    #[tokio::test]
    async fn test_non_json_output_is_rejected_early() {
        let gateway = MockGateway::scripted([Ok("Here is the resume: Jane Doe".to_string())]);
        let err = extract_structured(&gateway, RESUME, 0.0).await.unwrap_err();
        assert!(matches!(err, Stage1Error::Response(ResponseError::Parse { .. })));
    }

    #[test]
    fn test_fenced_output_is_accepted() {
        let raw = format!("```json\n{}\n```", stage1_json());
        let resume = StructuredResume::from_model_output(&raw).unwrap();
        assert_eq!(resume.personal_information["name"], "Jane Doe");
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let resume =
            StructuredResume::from_model_output(r#"{"skills": ["Go"], "education": null}"#)
                .unwrap();
        assert_eq!(resume.personal_information, json!({}));
        assert_eq!(resume.education, json!([]));
        assert_eq!(resume.experience, json!([]));
        assert_eq!(resume.skills, json!(["Go"]));
    }

    #[test]
    fn test_section_keys_are_matched_loosely() {
        let raw = json!({
            "Personal Information": {"name": "Jane"},
            "work_experience": [],
            "Certifications": ["AWS SAA"],
            "Additional Sections": {"volunteer": ["Mentor"]}
        })
        .to_string();
        let resume = StructuredResume::from_model_output(&raw).unwrap();
        assert_eq!(resume.personal_information["name"], "Jane");
        assert_eq!(resume.certifications, json!(["AWS SAA"]));
        assert_eq!(resume.additional_sections["volunteer"][0], "Mentor");
        // Unrecognised keys are forwarded, not dropped.
        assert!(resume.other.contains_key("work_experience"));
    }

    #[test]
    fn test_object_without_any_section_is_rejected() {
        let err =
            StructuredResume::from_model_output(r#"{"error": "cannot parse"}"#).unwrap_err();
        assert!(matches!(err, ResponseError::Validation { .. }));
    }

    #[test]
    fn test_empty_object_yields_empty_sections() {
        let resume = StructuredResume::from_model_output("{}").unwrap();
        assert_eq!(resume.personal_information, json!({}));
        for section in [
            &resume.education,
            &resume.skills,
            &resume.experience,
            &resume.certifications,
            &resume.additional_sections,
        ] {
            assert_eq!(section, &json!([]));
        }
        assert!(resume.other.is_empty());
    }

    #[test]
    fn test_array_output_is_rejected() {
        let err = StructuredResume::from_model_output(r#"[{"skills": []}]"#).unwrap_err();
        assert!(matches!(err, ResponseError::Validation { .. }));
    }

    #[test]
    fn test_prompt_json_uses_published_keys() {
        let resume = StructuredResume::from_model_output(&stage1_json()).unwrap();
        let value: Value = serde_json::from_str(&resume.to_prompt_json()).unwrap();
        for section in SECTIONS {
            assert!(value.get(section).is_some(), "missing {section}");
        }
    }
}
