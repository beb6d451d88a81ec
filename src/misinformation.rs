//! Weighted rule matching for unverified-claim risk.
//!
//! Rules are plain data: each carries an id, a weight and a signal whose
//! strength in [0, 1] is multiplied by the weight. The final risk is the
//! clamped sum, so policies can be changed by editing the rule set alone.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sentiment::normalize_quotes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    /// Strength grows with the number of distinct phrases found.
    Phrases { phrases: Vec<String>, saturation: usize },
    /// Urgency markers or an exclamation pile-up with no source cited.
    UrgencyWithoutSource {
        markers: Vec<String>,
        min_exclamations: usize,
        sources: Vec<String>,
    },
    /// Uppercase share of letters above `threshold`.
    CapsRatio { threshold: f64, min_letters: usize },
    /// A claim pattern with no corroborating language.
    ClaimWithoutSource { claims: Vec<String>, sources: Vec<String> },
}

impl Signal {
    fn strength(&self, text: &TextView) -> f64 {
        match self {
            Signal::Phrases { phrases, saturation } => {
                let hits = phrases.iter().filter(|p| text.contains(p)).count();
                (hits as f64 / (*saturation).max(1) as f64).min(1.0)
            }
            Signal::UrgencyWithoutSource {
                markers,
                min_exclamations,
                sources,
            } => {
                let urgent = markers.iter().any(|m| text.contains(m))
                    || text.exclamations >= *min_exclamations;
                if urgent && !sources.iter().any(|s| text.contains(s)) {
                    1.0
                } else {
                    0.0
                }
            }
            Signal::CapsRatio {
                threshold,
                min_letters,
            } => {
                if text.letters >= *min_letters && text.caps_ratio() > *threshold {
                    1.0
                } else {
                    0.0
                }
            }
            Signal::ClaimWithoutSource { claims, sources } => {
                let claimed = claims.iter().any(|c| text.contains(c));
                if claimed && !sources.iter().any(|s| text.contains(s)) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub description: String,
    pub weight: f64,
    #[serde(flatten)]
    pub signal: Signal,
}

/// Ordered, data-driven rule registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Add a rule, replacing any rule with the same id in place.
    pub fn upsert(&mut self, rule: Rule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Rule> {
        let index = self.rules.iter().position(|r| r.id == id)?;
        Some(self.rules.remove(index))
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(Error::Config(format!("duplicate rule id: {}", rule.id)));
            }
            if !(0.0..=1.0).contains(&rule.weight) {
                return Err(Error::Config(format!(
                    "rule {} weight {} outside [0, 1]",
                    rule.id, rule.weight
                )));
            }
            match &rule.signal {
                Signal::Phrases { saturation, .. } if *saturation == 0 => {
                    return Err(Error::Config(format!("rule {} saturation must be >= 1", rule.id)));
                }
                Signal::CapsRatio { threshold, .. } if !(0.0..1.0).contains(threshold) => {
                    return Err(Error::Config(format!("rule {} threshold outside [0, 1)", rule.id)));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        let sources = strings(&[
            "according to",
            "source:",
            "sources:",
            "confirmed by",
            "official notice",
            "announced",
            "per the",
            "report from",
            "http://",
            "https://",
            "www.",
        ]);

        Self::new(vec![
            Rule {
                id: "unverified_claim_markers".to_string(),
                description: "Contains phrases typical of unverified or conspiratorial claims".to_string(),
                weight: 0.45,
                signal: Signal::Phrases {
                    phrases: strings(&[
                        "conspiracy",
                        "they're hiding",
                        "they are hiding",
                        "secretly",
                        "fake news",
                        "hoax",
                        "cover up",
                        "cover-up",
                        "secret cure",
                        "government hiding",
                        "they don't want you to know",
                        "wake up",
                        "sheeple",
                        "mainstream media lies",
                        "alternative facts",
                        "propaganda",
                    ]),
                    saturation: 2,
                },
            },
            Rule {
                id: "urgency_without_source".to_string(),
                description: "Urgent framing without a cited source".to_string(),
                weight: 0.25,
                signal: Signal::UrgencyWithoutSource {
                    markers: strings(&[
                        "urgent",
                        "emergency",
                        "breaking",
                        "immediately",
                        "act now",
                        "share before",
                        "spread the word",
                    ]),
                    min_exclamations: 3,
                    sources: sources.clone(),
                },
            },
            Rule {
                id: "excessive_caps".to_string(),
                description: "Large share of the message is written in capitals".to_string(),
                weight: 0.15,
                signal: Signal::CapsRatio {
                    threshold: 0.3,
                    min_letters: 10,
                },
            },
            Rule {
                id: "claim_without_corroboration".to_string(),
                description: "Makes a claim without corroborating or source language".to_string(),
                weight: 0.2,
                signal: Signal::ClaimWithoutSource {
                    claims: strings(&[
                        "they're hiding",
                        "they are hiding",
                        "hiding something",
                        "i heard",
                        "rumor",
                        "rumour",
                        "apparently",
                        "supposedly",
                        "everyone knows",
                        "without telling",
                        "behind our backs",
                        "they're putting",
                        "they don't want",
                        "the truth about",
                        "lying about",
                    ]),
                    sources,
                },
            },
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleHit {
    pub rule: String,
    pub description: String,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub risk: f64,
    pub hits: Vec<RuleHit>,
}

#[derive(Debug, Clone, Default)]
pub struct MisinformationDetector {
    rules: RuleSet,
}

impl MisinformationDetector {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn risk(&self, text: &str) -> f64 {
        self.assess(text).risk
    }

    /// Score `text` and report which rules contributed.
    pub fn assess(&self, text: &str) -> Assessment {
        let view = TextView::new(text);
        if view.lower.trim().is_empty() {
            return Assessment {
                risk: 0.0,
                hits: Vec::new(),
            };
        }

        let hits: Vec<RuleHit> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let contribution = rule.weight * rule.signal.strength(&view);
                (contribution > 0.0).then(|| RuleHit {
                    rule: rule.id.clone(),
                    description: rule.description.clone(),
                    contribution,
                })
            })
            .collect();

        let risk = hits.iter().map(|h| h.contribution).sum::<f64>().clamp(0.0, 1.0);
        Assessment { risk, hits }
    }
}

struct TextView {
    lower: String,
    exclamations: usize,
    letters: usize,
    uppercase: usize,
}

impl TextView {
    fn new(text: &str) -> Self {
        let normalized = normalize_quotes(text);
        let letters = normalized.chars().filter(|c| c.is_alphabetic()).count();
        let uppercase = normalized.chars().filter(|c| c.is_uppercase()).count();
        Self {
            lower: normalized.to_lowercase(),
            exclamations: normalized.matches('!').count(),
            letters,
            uppercase,
        }
    }

    fn caps_ratio(&self) -> f64 {
        if self.letters == 0 {
            0.0
        } else {
            self.uppercase as f64 / self.letters as f64
        }
    }

    /// Word-boundary aware phrase search over the lowercased text.
    fn contains(&self, phrase: &str) -> bool {
        let needle = phrase.to_lowercase();
        if needle.is_empty() {
            return false;
        }
        let bytes = self.lower.as_bytes();
        self.lower.match_indices(&needle).any(|(pos, _)| {
            let before_ok = pos == 0 || !is_word_byte(bytes[pos - 1]) || !starts_with_word(&needle);
            let end = pos + needle.len();
            let after_ok = end >= bytes.len() || !is_word_byte(bytes[end]) || !ends_with_word(&needle);
            before_ok && after_ok
        })
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

fn starts_with_word(needle: &str) -> bool {
    needle.bytes().next().is_some_and(is_word_byte)
}

fn ends_with_word(needle: &str) -> bool {
    needle.bytes().last().is_some_and(is_word_byte)
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conspiracy_post_is_high_risk() {
        let detector = MisinformationDetector::default();
        let assessment = detector.assess(
            "URGENT: There's a conspiracy about the water quality! They're hiding something from us!",
        );
        assert!(assessment.risk > 0.8, "risk was {}", assessment.risk);
        let rules: Vec<&str> = assessment.hits.iter().map(|h| h.rule.as_str()).collect();
        assert!(rules.contains(&"unverified_claim_markers"));
        assert!(rules.contains(&"urgency_without_source"));
        assert!(rules.contains(&"claim_without_corroboration"));
    }

    #[test]
    fn ordinary_post_is_low_risk() {
        let detector = MisinformationDetector::default();
        let risk = detector.risk("The new pool hours are great! Everyone seems to be enjoying the extended time.");
        assert!(risk < 0.2, "risk was {risk}");
    }

    #[test]
    fn citing_a_source_suppresses_urgency() {
        let detector = MisinformationDetector::default();
        let uncited = detector.risk("URGENT water shutoff tomorrow morning");
        let cited = detector.risk("URGENT water shutoff tomorrow morning according to the building office");
        assert!(uncited > cited);
    }

    #[test]
    fn phrase_match_respects_word_boundaries() {
        let view = TextView::new("The hoaxes page lists debunked stories");
        assert!(!view.contains("hoax"));
        let view = TextView::new("This is a hoax.");
        assert!(view.contains("hoax"));
        let view = TextView::new("Don\u{2019}t trust it, they\u{2019}re hiding the report");
        assert!(view.contains("they're hiding"));
    }

    #[test]
    fn shouting_raises_risk() {
        let detector = MisinformationDetector::default();
        let assessment = detector.assess("THE GATE CODE CHANGED AND NOBODY TOLD US ABOUT IT");
        assert!(assessment.hits.iter().any(|h| h.rule == "excessive_caps"));
    }

    #[test]
    fn rules_can_be_added_and_removed_without_code_changes() {
        let mut rules = RuleSet::default();
        let before = MisinformationDetector::new(rules.clone()).risk("miracle mold remover cures everything");
        assert_eq!(before, 0.0);

        rules.upsert(Rule {
            id: "miracle_claims".to_string(),
            description: "Miracle product claims".to_string(),
            weight: 0.4,
            signal: Signal::Phrases {
                phrases: vec!["miracle".to_string()],
                saturation: 1,
            },
        });
        let after = MisinformationDetector::new(rules.clone()).risk("miracle mold remover cures everything");
        assert!((after - 0.4).abs() < 1e-12);

        assert!(rules.remove("miracle_claims").is_some());
        assert!(rules.remove("miracle_claims").is_none());
    }

    #[test]
    fn rule_set_round_trips_through_json() {
        let json = r#"[
            {"id": "rumor", "description": "Rumor language", "weight": 0.3,
             "kind": "phrases", "phrases": ["rumor has it"], "saturation": 1}
        ]"#;
        let rules: RuleSet = serde_json::from_str(json).unwrap();
        rules.validate().unwrap();
        let risk = MisinformationDetector::new(rules).risk("Rumor has it the gym is closing");
        assert!((risk - 0.3).abs() < 1e-12);
    }

    #[test]
    fn validation_rejects_duplicate_ids_and_bad_weights() {
        let mut rules = RuleSet::default();
        let mut copy = rules.iter().next().cloned().unwrap();
        rules.rules.push(copy.clone());
        assert!(rules.validate().is_err());

        copy.id = "heavy".to_string();
        copy.weight = 1.5;
        let rules = RuleSet::new(vec![copy]);
        assert!(rules.validate().is_err());
    }

    #[test]
    fn risk_is_clamped_and_empty_text_is_zero() {
        let detector = MisinformationDetector::default();
        let risk = detector.risk(
            "URGENT!!! CONSPIRACY HOAX: THEY'RE HIDING THE TRUTH ABOUT THE FAKE NEWS, WAKE UP!!!",
        );
        assert!(risk <= 1.0);
        assert_eq!(detector.risk("   "), 0.0);
    }
}
