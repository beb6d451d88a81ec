//! Stateless scoring stages composed into one pure call.

use crate::config::ScoringConfig;
use crate::misinformation::{MisinformationDetector, RuleHit};
use crate::models::NewPost;
use crate::priority::{PriorityBand, PriorityInputs, PriorityScorer};
use crate::sentiment::{Sentiment, SentimentClassifier};

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub sentiment: Sentiment,
    pub misinformation_risk: f64,
    pub rule_hits: Vec<RuleHit>,
    pub priority_score: f64,
}

impl Analysis {
    pub fn priority_band(&self) -> PriorityBand {
        PriorityBand::from_score(self.priority_score)
    }
}

#[derive(Debug, Clone)]
pub struct Analyzer {
    sentiment: SentimentClassifier,
    misinformation: MisinformationDetector,
    priority: PriorityScorer,
}

impl Analyzer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            sentiment: SentimentClassifier::new(config.sentiment.clone()),
            misinformation: MisinformationDetector::new(config.misinformation_rules.clone()),
            priority: PriorityScorer::new(config.priority.clone()),
        }
    }

    /// Sentiment and risk are independent; priority consumes both.
    pub fn analyze(&self, post: &NewPost) -> Analysis {
        let sentiment = self.sentiment.classify(&post.content);
        let assessment = self.misinformation.assess(&post.content);
        let priority_score = self.priority.score(&PriorityInputs {
            sentiment_score: sentiment.score,
            misinformation_risk: assessment.risk,
            category: post.category,
            engagement_count: post.engagement_count,
        });

        Analysis {
            sentiment,
            misinformation_risk: assessment.risk,
            rule_hits: assessment.hits,
            priority_score,
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, SentimentLabel};

    fn post(content: &str, category: Category) -> NewPost {
        NewPost {
            content: content.to_string(),
            author: "John D.".to_string(),
            category,
            engagement_count: None,
        }
    }

    #[test]
    fn pool_hours_post_scores_low_everywhere() {
        let analysis = Analyzer::default().analyze(&post(
            "The new pool hours are great! Everyone seems to be enjoying the extended time.",
            Category::General,
        ));
        assert_eq!(analysis.sentiment.label, SentimentLabel::Positive);
        assert!(analysis.misinformation_risk < 0.2);
        assert!(analysis.priority_score < 0.4);
        assert_eq!(analysis.priority_band(), PriorityBand::Low);
    }

    #[test]
    fn every_score_is_in_range() {
        let analyzer = Analyzer::default();
        let texts = [
            "",
            "ok",
            "EMERGENCY: The fire alarm system is broken! This is a safety hazard!",
            "CONSPIRACY: They're putting chemicals in the air vents to control us!",
            "The WiFi speed has improved significantly. Thank you for the upgrade!",
        ];
        for text in texts {
            for category in Category::ALL {
                let a = analyzer.analyze(&post(text, category));
                assert!((-1.0..=1.0).contains(&a.sentiment.score));
                assert!((0.0..=1.0).contains(&a.misinformation_risk));
                assert!((0.0..=1.0).contains(&a.priority_score));
            }
        }
    }
}
