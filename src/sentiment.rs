//! Lexicon-based sentiment scoring.
//!
//! Signed term weights are summed with negation inversion and intensity
//! multipliers, divided by token count and clamped to [-1, 1]. Identical text
//! always produces the identical score.

use serde::Serialize;

use crate::config::SentimentConfig;
use crate::models::SentimentLabel;

static LEXICON: &[(&str, f64)] = &[
    // positive
    ("amazing", 2.5),
    ("appreciate", 1.8),
    ("appreciated", 1.8),
    ("beautiful", 2.0),
    ("clean", 1.0),
    ("convenient", 1.5),
    ("enjoy", 1.5),
    ("enjoyed", 1.5),
    ("enjoying", 1.5),
    ("excellent", 2.5),
    ("fantastic", 2.5),
    ("friendly", 1.5),
    ("fun", 1.5),
    ("glad", 1.5),
    ("good", 1.5),
    ("gorgeous", 2.0),
    ("great", 2.0),
    ("happy", 1.8),
    ("helpful", 1.5),
    ("improved", 1.5),
    ("informative", 1.2),
    ("love", 2.0),
    ("loved", 2.0),
    ("nice", 1.5),
    ("perfect", 2.2),
    ("perfectly", 2.0),
    ("quickly", 0.8),
    ("safe", 1.2),
    ("safer", 1.5),
    ("thank", 1.5),
    ("thankful", 1.8),
    ("thanks", 1.5),
    ("welcome", 1.2),
    ("wonderful", 2.5),
    // negative
    ("afraid", -1.6),
    ("angry", -2.0),
    ("annoying", -1.6),
    ("awful", -2.5),
    ("bad", -1.8),
    ("broken", -1.8),
    ("closed", -0.6),
    ("complaint", -1.0),
    ("complaints", -1.0),
    ("conspiracy", -2.0),
    ("crime", -2.0),
    ("dangerous", -2.0),
    ("delayed", -1.2),
    ("delays", -1.2),
    ("dirty", -1.5),
    ("disappointed", -1.8),
    ("emergency", -1.5),
    ("fake", -1.8),
    ("frustrated", -1.8),
    ("frustrating", -1.8),
    ("hate", -2.5),
    ("hazard", -1.8),
    ("hiding", -1.5),
    ("hoax", -2.0),
    ("horrible", -2.5),
    ("inconvenient", -1.5),
    ("issue", -0.8),
    ("issues", -0.8),
    ("leak", -1.2),
    ("leaking", -1.2),
    ("liar", -2.2),
    ("lies", -2.0),
    ("loud", -1.2),
    ("lying", -2.0),
    ("noisy", -1.3),
    ("poor", -1.5),
    ("problem", -1.2),
    ("problems", -1.2),
    ("propaganda", -2.0),
    ("rude", -1.8),
    ("sad", -1.8),
    ("scary", -1.8),
    ("shortage", -1.3),
    ("slow", -1.0),
    ("stolen", -2.0),
    ("suspicious", -1.5),
    ("terrible", -2.5),
    ("theft", -2.0),
    ("unacceptable", -2.2),
    ("unsafe", -2.0),
    ("upset", -1.6),
    ("urgent", -1.0),
    ("vandalism", -2.0),
    ("waste", -1.5),
    ("worried", -1.4),
    ("worse", -2.0),
    ("worst", -2.5),
];

static NEGATORS: &[&str] = &[
    "not", "no", "never", "none", "nothing", "hardly", "without", "don't", "doesn't", "didn't",
    "isn't", "wasn't", "aren't", "weren't", "can't", "cannot", "won't", "shouldn't", "couldn't",
];

/// Negated terms flip sign and lose some strength.
const NEGATION_SCALAR: f64 = -0.75;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sentiment {
    pub score: f64,
    pub label: SentimentLabel,
}

impl Sentiment {
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            label: SentimentLabel::Neutral,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentimentClassifier {
    config: SentimentConfig,
}

impl SentimentClassifier {
    pub fn new(config: SentimentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SentimentConfig {
        &self.config
    }

    pub fn classify(&self, text: &str) -> Sentiment {
        let normalized = normalize_quotes(text);
        let tokens = tokenize(&normalized);
        if tokens.is_empty() {
            return Sentiment::neutral();
        }

        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        let mut raw = 0.0;

        for (index, token) in tokens.iter().enumerate() {
            let Some(weight) = lookup(&lowered[index]) else {
                continue;
            };
            let mut value = weight;
            if is_shouting(token) {
                value *= 1.0 + self.config.caps_boost;
            }
            if self.is_negated(&lowered, index) {
                value *= NEGATION_SCALAR;
            }
            raw += value;
        }

        let token_count = tokens.len() as f64;
        let exclamations = normalized.matches('!').count() as f64;
        let density = (exclamations / token_count).min(1.0);
        raw *= 1.0 + density * self.config.exclamation_gain;

        let score = (raw * self.config.gain / token_count).clamp(-1.0, 1.0);
        if !score.is_finite() {
            return Sentiment::neutral();
        }

        Sentiment {
            score,
            label: self.label_for(score),
        }
    }

    pub fn label_for(&self, score: f64) -> SentimentLabel {
        if score > self.config.positive_threshold {
            SentimentLabel::Positive
        } else if score < self.config.negative_threshold {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    fn is_negated(&self, lowered: &[String], index: usize) -> bool {
        let start = index.saturating_sub(self.config.negation_window);
        lowered[start..index]
            .iter()
            .any(|token| NEGATORS.contains(&token.as_str()))
    }
}

impl Default for SentimentClassifier {
    fn default() -> Self {
        Self::new(SentimentConfig::default())
    }
}

pub(crate) fn normalize_quotes(text: &str) -> String {
    text.replace(['\u{2018}', '\u{2019}'], "'")
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|token| token.trim_matches('\''))
        .filter(|token| !token.is_empty())
        .collect()
}

fn lookup(term: &str) -> Option<f64> {
    LEXICON
        .iter()
        .find(|(entry, _)| *entry == term)
        .map(|(_, weight)| *weight)
}

fn is_shouting(token: &str) -> bool {
    let mut letters = token.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && token.chars().count() >= 2 && letters.all(|c| c.is_uppercase())
}
