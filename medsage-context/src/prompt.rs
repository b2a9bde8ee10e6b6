//! Prompt composition.

use medsage_core::{MedsageResult, PromptError};

/// The template used when no override is configured.
pub const DEFAULT_TEMPLATE: &str = "You are MedSage, an expert medical AI assistant. Provide helpful, accurate, and empathetic medical information.

PATIENT CONTEXT:
{patient_context}

RECENT MEDICAL REPORTS:
{report_context}

MEDICAL KNOWLEDGE BASE:
{medical_knowledge}

USER QUESTION: {question}

Please provide a comprehensive, personalized response considering the patient's context and medical history. If you're unsure about something, acknowledge it. Always recommend consulting with healthcare professionals for serious concerns.

RESPONSE:";

/// Placeholders a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    PatientContext,
    ReportContext,
    MedicalKnowledge,
    Question,
}

impl Slot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PatientContext => "patient_context",
            Self::ReportContext => "report_context",
            Self::MedicalKnowledge => "medical_knowledge",
            Self::Question => "question",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "patient_context" => Some(Self::PatientContext),
            "report_context" => Some(Self::ReportContext),
            "medical_knowledge" => Some(Self::MedicalKnowledge),
            "question" => Some(Self::Question),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Slot),
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub patient_context: &'a str,
    pub report_context: &'a str,
    pub medical_knowledge: &'a str,
    pub question: &'a str,
}

impl<'a> PromptInputs<'a> {
    fn get(&self, slot: Slot) -> &'a str {
        match slot {
            Slot::PatientContext => self.patient_context,
            Slot::ReportContext => self.report_context,
            Slot::MedicalKnowledge => self.medical_knowledge,
            Slot::Question => self.question,
        }
    }
}

/// A parsed prompt template.
///
/// Placeholders are written `{name}`; `{{` and `}}` produce literal braces.
/// Rendering is a single pass, so braces inside substituted values are never
/// interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        // The built-in template is covered by tests; a parse failure here is unreachable.
        Self::parse(DEFAULT_TEMPLATE).unwrap_or_else(|_| Self {
            segments: vec![Segment::Slot(Slot::Question)],
        })
    }
}

impl PromptTemplate {
    /// Parse and validate a template.
    ///
    /// # Errors
    /// - `PromptError::Unterminated` for a `{` with no closing brace
    /// - `PromptError::UnknownPlaceholder` for an unrecognised name
    /// - `PromptError::MissingPlaceholder` when `{question}` is absent
    pub fn parse(source: &str) -> MedsageResult<Self> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    text.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(PromptError::Unterminated { position }.into());
                    }
                    let slot = Slot::from_name(name.trim())
                        .ok_or(PromptError::UnknownPlaceholder { name })?;
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                other => text.push(other),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        if !segments.contains(&Segment::Slot(Slot::Question)) {
            return Err(PromptError::MissingPlaceholder {
                name: Slot::Question.name().to_string(),
            }
            .into());
        }
        Ok(Self { segments })
    }

    /// Substitute the inputs. Identical inputs always give an identical prompt.
    pub fn render(&self, inputs: &PromptInputs<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(slot) => out.push_str(inputs.get(*slot)),
            }
        }
        out
    }

    /// Whether the template references `slot`.
    pub fn uses(&self, slot: Slot) -> bool {
        self.segments.contains(&Segment::Slot(slot))
    }
}
