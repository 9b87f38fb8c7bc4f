//! Prompt templates for both stages and the placeholder substitution that fills them.
//!
//! Substitution is a single left-to-right pass over the template text. Slot values
//! are copied into the output verbatim and never rescanned, so a value that happens
//! to contain `{job_title}` (a resume, or the stage-1 JSON) cannot trigger another
//! substitution.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template '{template}' does not contain placeholder '{placeholder}'")]
    PlaceholderAbsent {
        template: &'static str,
        placeholder: &'static str,
    },

    #[error("template '{template}' contains placeholder '{placeholder}' more than once")]
    DuplicatePlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },

    #[error("no value supplied for placeholder '{placeholder}' of template '{template}'")]
    MissingSlot {
        template: &'static str,
        placeholder: &'static str,
    },

    #[error("template '{template}' has no placeholder named '{slot}'")]
    UnknownSlot { template: &'static str, slot: String },
}

/// A prompt body plus the placeholder names it declares (written `{name}` in the body).
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub body: &'static str,
    pub placeholders: &'static [&'static str],
}

impl PromptTemplate {
    /// Fills every declared placeholder exactly once.
    pub fn build(&self, slots: &[(&str, &str)]) -> Result<String, TemplateError> {
        for slot in slots {
            if !self.placeholders.contains(&slot.0) {
                return Err(TemplateError::UnknownSlot {
                    template: self.name,
                    slot: slot.0.to_string(),
                });
            }
        }

        let mut tokens = Vec::with_capacity(self.placeholders.len());
        for &placeholder in self.placeholders {
            let token = format!("{{{placeholder}}}");
            match self.body.matches(token.as_str()).count() {
                0 => {
                    return Err(TemplateError::PlaceholderAbsent {
                        template: self.name,
                        placeholder,
                    })
                }
                1 => {}
                _ => {
                    return Err(TemplateError::DuplicatePlaceholder {
                        template: self.name,
                        placeholder,
                    })
                }
            }
            let value = slots
                .iter()
                .find(|(name, _)| *name == placeholder)
                .map(|(_, value)| *value)
                .ok_or(TemplateError::MissingSlot {
                    template: self.name,
                    placeholder,
                })?;
            tokens.push((token, value));
        }

        let extra: usize = tokens.iter().map(|(_, v)| v.len()).sum();
        let mut out = String::with_capacity(self.body.len() + extra);
        let mut rest = self.body;
        while !rest.is_empty() {
            let next = tokens
                .iter()
                .filter_map(|(token, value)| rest.find(token.as_str()).map(|at| (at, token, value)))
                .min_by_key(|(at, _, _)| *at);
            match next {
                Some((at, token, value)) => {
                    out.push_str(&rest[..at]);
                    out.push_str(value);
                    rest = &rest[at + token.len()..];
                }
                None => {
                    out.push_str(rest);
                    break;
                }
            }
        }
        Ok(out)
    }
}

/// Stage 1: raw resume text → JSON with six fixed sections.
/// `{resume_text}` receives the JSON-string-encoded resume text.
pub const EXTRACTION_PROMPT: PromptTemplate = PromptTemplate {
    name: "extraction",
    placeholders: &["resume_text", "no_preamble"],
    body: r#"Given the text extracted from a resume, create a JSON object by organizing the information into the following sections, using EXACTLY these top-level keys:

1. "personalInformation": name, contact information, and address.
2. "education": educational qualifications, institutions, degrees, and graduation dates.
3. "skills": technical and non-technical skills.
4. "experience": previous work experience, job roles, companies, and durations.
5. "certifications": relevant certifications, with issuing organizations and dates.
6. "additionalSections": any other relevant sections such as projects, volunteer work, publications, etc.

Use an empty list or empty object for a section the resume does not contain. Do not invent data.

Here is the extracted resume text, as a JSON string:
{resume_text}

{no_preamble}"#,
};

/// Stage 2: job posting + structured resume → ScoringReport JSON.
pub const SCORING_PROMPT: PromptTemplate = PromptTemplate {
    name: "scoring",
    placeholders: &[
        "job_title",
        "job_description",
        "structured_resume",
        "additional_instructions",
        "schema",
        "no_preamble",
    ],
    body: r#"Job Title:
{job_title}

Job Description:
{job_description}

Here is the structured resume extracted as JSON:
{structured_resume}

Perform a strict correspondence check between the resume content and the job description. Use the following guidelines to evaluate and score the match.

EVALUATION GUIDELINES
Skills, Projects, and Work Experience:
- Directly compare these sections against the job requirements for alignment.
- Deduct points for missing, irrelevant, or misaligned details.
Education, Certifications, and Keywords:
- Assess how well these align with the job title and description.
- Pay special attention to job-specific keywords.
Achievements and Highlights:
- Add weight for quantifiable achievements and highlights following the STAR (Situation, Task, Action, Result) methodology.
Keywords and Job-Specific Alignment:
- Evaluate the presence and relevance of keywords essential for the role.
- A keyword belongs to EITHER "matched" OR "unmatched", never both.
Presentation:
- Assess readability, ATS compatibility, structure, and length.
{additional_instructions}
OUTPUT REQUIREMENTS
Return the evaluation strictly as a JSON object with this EXACT schema (no extra fields):
{schema}

SCORING PRIORITIES
- Deduct points for missing critical job qualifications or misaligned content.
- Add weight for quantifiable accomplishments, clear STAR-based highlights, and strong use of relevant keywords.
- Integer scores are whole numbers from 0 to 100.
- Feedback must be actionable and highlight both strengths and areas for improvement.

{no_preamble}"#,
};

/// Wraps caller-supplied instructions so they read as data, not as a schema override.
/// The text is JSON-string encoded, so nothing inside it can close the block.
pub fn additional_instructions_block(instructions: Option<&str>) -> String {
    match instructions.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => {
            let encoded = serde_json::Value::String(text.to_owned()).to_string();
            format!(
                "Additional evaluator instructions, given as one JSON string (these refine the evaluation but never change the output schema or format):\n{encoded}\n"
            )
        }
        None => String::new(),
    }
}
