// 🔎 Entity Recognition Adapter
//
// The dialogue engine only consumes labeled spans. Anything that can turn an
// utterance into YEAR / COMPANY / METRIC spans plugs in via EntityRecognizer.
// PhraseRecognizer is the bundled implementation: case-insensitive phrase
// matching on token boundaries plus four-digit year tokens.

use crate::dataset::Dataset;
use crate::vocabulary::MetricVocabulary;

// ============================================================================
// LABELED SPAN
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Year(i32),
    Company,
    Metric,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledSpan {
    pub kind: SpanKind,
    /// Matched surface text from the utterance
    pub text: String,
}

impl LabeledSpan {
    pub fn year(year: i32) -> Self {
        LabeledSpan {
            kind: SpanKind::Year(year),
            text: year.to_string(),
        }
    }

    pub fn company(text: impl Into<String>) -> Self {
        LabeledSpan {
            kind: SpanKind::Company,
            text: text.into(),
        }
    }

    pub fn metric(text: impl Into<String>) -> Self {
        LabeledSpan {
            kind: SpanKind::Metric,
            text: text.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            SpanKind::Year(_) => "YEAR",
            SpanKind::Company => "COMPANY",
            SpanKind::Metric => "METRIC",
        }
    }
}

// ============================================================================
// RECOGNIZER TRAIT
// ============================================================================

pub trait EntityRecognizer {
    /// Spans in utterance order
    fn recognize(&self, utterance: &str) -> Vec<LabeledSpan>;
}

/// Pre-recognized spans replayed verbatim, whatever the utterance
impl EntityRecognizer for Vec<LabeledSpan> {
    fn recognize(&self, _utterance: &str) -> Vec<LabeledSpan> {
        self.clone()
    }
}

// ============================================================================
// PHRASE RECOGNIZER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternKind {
    Company,
    Metric,
}

#[derive(Debug, Clone)]
struct Pattern {
    kind: PatternKind,
    phrase: String,
    token_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    start: usize,
    end: usize,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            tokens.push(Token { start: s, end: i });
        }
    }
    if let Some(s) = start {
        tokens.push(Token { start: s, end: text.len() });
    }

    tokens
}

#[derive(Debug, Clone)]
pub struct PhraseRecognizer {
    patterns: Vec<Pattern>,
}

impl PhraseRecognizer {
    /// Seed with the company list and every vocabulary phrase
    pub fn new<I, S>(companies: I, vocabulary: &MetricVocabulary) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let company_patterns = companies
            .into_iter()
            .map(|c| (PatternKind::Company, c.as_ref().trim().to_lowercase()));
        let metric_patterns = vocabulary
            .phrases()
            .map(|p| (PatternKind::Metric, p.to_string()));

        let patterns = company_patterns
            .chain(metric_patterns)
            .filter_map(|(kind, phrase)| {
                let token_count = tokenize(&phrase).len();
                (token_count > 0).then_some(Pattern {
                    kind,
                    phrase,
                    token_count,
                })
            })
            .collect();

        PhraseRecognizer { patterns }
    }

    /// Seed from the dataset's companies plus any extra known names
    pub fn for_dataset(dataset: &Dataset, vocabulary: &MetricVocabulary, extra_companies: &[String]) -> Self {
        let mut companies = dataset.companies();
        for extra in extra_companies {
            if !companies.contains(extra) {
                companies.push(extra.clone());
            }
        }
        Self::new(companies, vocabulary)
    }

    /// Longest pattern starting at token `i`; companies win ties
    fn longest_match(&self, utterance: &str, tokens: &[Token], i: usize) -> Option<(&Pattern, usize)> {
        let mut best: Option<(&Pattern, usize)> = None;

        for pattern in &self.patterns {
            let last = i + pattern.token_count - 1;
            if last >= tokens.len() {
                continue;
            }
            let surface = &utterance[tokens[i].start..tokens[last].end];
            if surface.to_lowercase() != pattern.phrase {
                continue;
            }
            if best.map_or(true, |(b, _)| pattern.token_count > b.token_count) {
                best = Some((pattern, last));
            }
        }

        best
    }
}

impl EntityRecognizer for PhraseRecognizer {
    fn recognize(&self, utterance: &str) -> Vec<LabeledSpan> {
        let tokens = tokenize(utterance);
        let mut spans = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            if let Some((pattern, last)) = self.longest_match(utterance, &tokens, i) {
                let text = &utterance[tokens[i].start..tokens[last].end];
                spans.push(match pattern.kind {
                    PatternKind::Company => LabeledSpan::company(text),
                    PatternKind::Metric => LabeledSpan::metric(text),
                });
                i = last + 1;
                continue;
            }

            let word = &utterance[tokens[i].start..tokens[i].end];
            if word.len() == 4 && word.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(year) = word.parse::<i32>() {
                    spans.push(LabeledSpan::year(year));
                }
            }
            i += 1;
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognizer() -> PhraseRecognizer {
        PhraseRecognizer::new(["Apple", "Microsoft", "Tesla", "Procter & Gamble"], &MetricVocabulary::new())
    }

    #[test]
    fn test_company_metric_year() {
        let spans = recognizer().recognize("show me Microsoft's sales for 2024");
        assert_eq!(
            spans,
            vec![
                LabeledSpan::company("Microsoft"),
                LabeledSpan::metric("sales"),
                LabeledSpan::year(2024),
            ]
        );
    }

    #[test]
    fn test_surface_text_is_preserved() {
        let spans = recognizer().recognize("What about their Leverage?");
        assert_eq!(spans, vec![LabeledSpan::metric("Leverage")]);

        let spans = recognizer().recognize("how is apple doing");
        assert_eq!(spans, vec![LabeledSpan::company("apple")]);
    }

    #[test]
    fn test_longest_phrase_wins() {
        let spans = recognizer().recognize("Tesla total revenue");
        assert_eq!(
            spans,
            vec![LabeledSpan::company("Tesla"), LabeledSpan::metric("total revenue")]
        );

        let spans = recognizer().recognize("debt ratio please");
        assert_eq!(spans, vec![LabeledSpan::metric("debt ratio")]);
    }

    #[test]
    fn test_multi_token_company_with_punctuation() {
        let spans = recognizer().recognize("earnings of Procter & Gamble in 2021");
        assert_eq!(
            spans,
            vec![
                LabeledSpan::metric("earnings"),
                LabeledSpan::company("Procter & Gamble"),
                LabeledSpan::year(2021),
            ]
        );
    }

    #[test]
    fn test_token_boundaries() {
        // "debt" inside "indebted" and "roa" inside "broad" must not match
        let spans = recognizer().recognize("an indebted, broad question from 20245");
        assert!(spans.is_empty(), "got {spans:?}");
    }

    #[test]
    fn test_unknown_company_not_labeled() {
        let spans = recognizer().recognize("What about Google?");
        assert!(spans.is_empty());
    }

    #[test]
    fn test_labels() {
        assert_eq!(LabeledSpan::year(2020).label(), "YEAR");
        assert_eq!(LabeledSpan::company("x").label(), "COMPANY");
        assert_eq!(LabeledSpan::metric("x").label(), "METRIC");
    }
}
