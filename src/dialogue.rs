// 💬 Dialogue State Machine - multi-turn slot filling over the dataset
//
// Three slots (company, metric, year), filled from recognized spans and
// resolved strictly in that order:
//
//   NeedCompany → NeedMetric → NeedYear (default to latest) → Ready
//
// Company and metric persist across turns until overwritten. Year is
// cleared after every answered query, so the next turn re-defaults unless
// the user names one.

use crate::dataset::{Dataset, FieldValue};
use crate::format::format_value;
use crate::recognizer::{EntityRecognizer, LabeledSpan, PhraseRecognizer, SpanKind};
use crate::vocabulary::MetricVocabulary;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// DIALOGUE STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    NeedCompany,
    NeedMetric,
    NeedYear,
    Ready,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DialogueState {
    pub company: Option<String>,
    /// Canonical metric name
    pub metric: Option<String>,
    pub year: Option<i32>,
}

impl DialogueState {
    /// Gate order is fixed: company, then metric, then year
    pub fn status(&self) -> SlotStatus {
        match (&self.company, &self.metric, self.year) {
            (None, _, _) => SlotStatus::NeedCompany,
            (Some(_), None, _) => SlotStatus::NeedMetric,
            (Some(_), Some(_), None) => SlotStatus::NeedYear,
            (Some(_), Some(_), Some(_)) => SlotStatus::Ready,
        }
    }

    /// Apply one turn's spans; later spans of the same kind overwrite earlier
    /// ones. Returns whether a year was supplied this turn.
    pub fn merge(&mut self, spans: &[LabeledSpan], vocabulary: &MetricVocabulary) -> bool {
        let mut year_supplied = false;

        for span in spans {
            match span.kind {
                SpanKind::Year(year) => {
                    self.year = Some(year);
                    year_supplied = true;
                }
                SpanKind::Company => {
                    // No existence check here: an unknown company surfaces at lookup
                    self.company = Some(span.text.clone());
                }
                SpanKind::Metric => match vocabulary.canonical(&span.text) {
                    Some(canonical) => self.metric = Some(canonical.to_string()),
                    None => tracing::warn!(text = %span.text, "metric span not in vocabulary, ignored"),
                },
            }
        }

        year_supplied
    }

    pub fn clear(&mut self) {
        *self = DialogueState::default();
    }
}

// ============================================================================
// REPLY
// ============================================================================

/// Outcome of one turn. Every variant renders to a user-facing sentence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Answer {
        company: String,
        metric: String,
        year: i32,
        value: String,
    },
    AskCompany,
    AskMetric {
        company: String,
    },
    /// Lookup miss. `year` is None when the company has no rows at all,
    /// so no default year exists.
    NotFound {
        metric: String,
        company: String,
        year: Option<i32>,
    },
    Unexpected {
        detail: String,
    },
}

impl Reply {
    pub fn is_answer(&self) -> bool {
        matches!(self, Reply::Answer { .. })
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Answer {
                company,
                metric,
                year,
                value,
            } => write!(f, "Here is the data: {company}'s {metric} in {year} was {value}."),
            Reply::AskCompany => write!(f, "Which company are you asking about?"),
            Reply::AskMetric { company } => {
                write!(f, "What financial metric would you like for {company}?")
            }
            Reply::NotFound {
                metric,
                company,
                year: Some(year),
            } => write!(
                f,
                "I'm sorry, I could not find data for {metric} for {company} in {year}."
            ),
            Reply::NotFound {
                metric,
                company,
                year: None,
            } => write!(f, "I'm sorry, I could not find data for {metric} for {company}."),
            Reply::Unexpected { detail } => write!(f, "An unexpected error occurred: {detail}"),
        }
    }
}

// ============================================================================
// DIALOGUE ENGINE
// ============================================================================

/// One conversation. Owns its state; dataset and vocabulary are shared.
pub struct DialogueEngine<R: EntityRecognizer = PhraseRecognizer> {
    dataset: Arc<Dataset>,
    vocabulary: Arc<MetricVocabulary>,
    recognizer: R,
    state: DialogueState,
}

impl DialogueEngine<PhraseRecognizer> {
    /// Engine with a PhraseRecognizer seeded from the dataset's companies,
    /// any extra company names, and the vocabulary
    pub fn with_phrase_recognizer(
        dataset: Arc<Dataset>,
        vocabulary: Arc<MetricVocabulary>,
        extra_companies: &[String],
    ) -> Self {
        let recognizer = PhraseRecognizer::for_dataset(&dataset, &vocabulary, extra_companies);
        DialogueEngine::new(dataset, vocabulary, recognizer)
    }
}

impl<R: EntityRecognizer> DialogueEngine<R> {
    pub fn new(dataset: Arc<Dataset>, vocabulary: Arc<MetricVocabulary>, recognizer: R) -> Self {
        DialogueEngine {
            dataset,
            vocabulary,
            recognizer,
            state: DialogueState::default(),
        }
    }

    pub fn state(&self) -> &DialogueState {
        &self.state
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Forget everything said so far
    pub fn reset(&mut self) {
        self.state.clear();
    }

    /// Conversational boundary: utterance in, sentence out
    pub fn respond(&mut self, utterance: &str) -> String {
        let spans = self.recognizer.recognize(utterance);
        self.respond_to_spans(&spans).to_string()
    }

    /// One turn over already-recognized spans
    pub fn respond_to_spans(&mut self, spans: &[LabeledSpan]) -> Reply {
        let year_supplied = self.state.merge(spans, &self.vocabulary);
        tracing::debug!(?spans, year_supplied, state = ?self.state, "merged turn");

        match self.state.status() {
            SlotStatus::NeedCompany => Reply::AskCompany,
            SlotStatus::NeedMetric => Reply::AskMetric {
                company: self.state.company.clone().unwrap_or_default(),
            },
            SlotStatus::NeedYear => {
                let company = self.state.company.clone().unwrap_or_default();
                match self.dataset.latest_year(&company) {
                    Some(latest) => {
                        tracing::debug!(company = %company, year = latest, "no year provided, defaulting to latest");
                        self.state.year = Some(latest);
                        self.resolve()
                    }
                    None => Reply::NotFound {
                        metric: self.state.metric.clone().unwrap_or_default(),
                        company,
                        year: None,
                    },
                }
            }
            SlotStatus::Ready => self.resolve(),
        }
    }

    /// Keyed lookup + projection. Only a successful answer clears the year.
    fn resolve(&mut self) -> Reply {
        let (company, metric, year) = match (&self.state.company, &self.state.metric, self.state.year) {
            (Some(c), Some(m), Some(y)) => (c.clone(), m.clone(), y),
            _ => {
                return Reply::Unexpected {
                    detail: "query slots are incomplete".to_string(),
                }
            }
        };

        let value = self
            .dataset
            .get(&company, year)
            .and_then(|record| record.value(&metric));

        match value {
            Some(FieldValue::Number(v)) => {
                self.state.year = None;
                Reply::Answer {
                    value: format_value(v, &metric),
                    company,
                    metric,
                    year,
                }
            }
            Some(FieldValue::Text(text)) => {
                tracing::warn!(%company, %metric, year, "non-numeric value for metric");
                Reply::Unexpected {
                    detail: format!("value {text:?} for '{metric}' is not numeric"),
                }
            }
            None => Reply::NotFound {
                metric,
                company,
                year: Some(year),
            },
        }
    }
}
