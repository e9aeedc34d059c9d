//! Phase 1: keyword admission gate applied before any analysis call.
//!
//! The rule shape is fixed: length check, then the irrelevance veto, then
//! either enough critical topics alone or a critical + secondary combination.
//! Every threshold and vocabulary comes from configuration.

use anyhow::{Context, Result};
use regex::{escape, RegexSet};
use serde::Serialize;

use crate::{
    config::{Catalog, PipelineConfig},
    domain::{CandidateItem, ClassificationVerdict, RejectReason},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionRule {
    pub min_word_count: usize,
    pub irrelevant_tolerance: usize,
    pub critical_alone: usize,
    pub critical_in_combo: usize,
    pub secondary_in_combo: usize,
}

impl Default for AdmissionRule {
    fn default() -> Self {
        Self {
            min_word_count: 100,
            irrelevant_tolerance: 0,
            critical_alone: 2,
            critical_in_combo: 1,
            secondary_in_combo: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchCounts {
    pub critical: usize,
    pub secondary: usize,
    pub irrelevant: usize,
}

/// Pure admission decision.
pub fn decide(counts: MatchCounts, word_count: usize, rule: &AdmissionRule) -> ClassificationVerdict {
    let reason = if word_count < rule.min_word_count {
        Some(RejectReason::TooShort)
    } else if counts.irrelevant > rule.irrelevant_tolerance {
        Some(RejectReason::IrrelevantContent)
    } else if counts.critical >= rule.critical_alone
        || (counts.critical >= rule.critical_in_combo
            && counts.secondary >= rule.secondary_in_combo)
    {
        None
    } else {
        Some(RejectReason::InsufficientTopics)
    };

    ClassificationVerdict {
        admitted: reason.is_none(),
        critical_matches: counts.critical,
        secondary_matches: counts.secondary,
        irrelevant_matches: counts.irrelevant,
        reason,
    }
}

/// Case-insensitive, word-bounded phrase vocabulary.
#[derive(Debug)]
pub struct Vocabulary {
    set: RegexSet,
}

impl Vocabulary {
    pub fn new(terms: &[String]) -> Result<Self> {
        let patterns: Vec<String> = terms
            .iter()
            .map(|term| term.split_whitespace().map(escape).collect::<Vec<_>>())
            .filter(|words| !words.is_empty())
            .map(|words| format!(r"(?i)\b{}\b", words.join(r"\s+")))
            .collect();
        let set = RegexSet::new(&patterns).context("compiling topic vocabulary")?;
        Ok(Self { set })
    }

    /// Number of distinct terms present in `text`.
    pub fn count_matches(&self, text: &str) -> usize {
        self.set.matches(text).iter().count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub admitted: usize,
    pub too_short: usize,
    pub vetoed: usize,
    pub off_topic: usize,
}

impl FilterReport {
    pub fn rejected(&self) -> usize {
        self.too_short + self.vetoed + self.off_topic
    }

    fn record(&mut self, verdict: &ClassificationVerdict) {
        match verdict.reason {
            None => self.admitted += 1,
            Some(RejectReason::TooShort) => self.too_short += 1,
            Some(RejectReason::IrrelevantContent) => self.vetoed += 1,
            Some(RejectReason::InsufficientTopics) => self.off_topic += 1,
        }
    }
}

#[derive(Debug)]
pub struct RelevanceClassifier {
    critical: Vocabulary,
    secondary: Vocabulary,
    irrelevant: Vocabulary,
    rule: AdmissionRule,
}

impl RelevanceClassifier {
    pub fn new(catalog: &Catalog, rule: AdmissionRule) -> Result<Self> {
        Ok(Self {
            critical: Vocabulary::new(&catalog.critical_topics)?,
            secondary: Vocabulary::new(&catalog.secondary_topics)?,
            irrelevant: Vocabulary::new(&catalog.irrelevant_keywords)?,
            rule,
        })
    }

    pub fn from_config(catalog: &Catalog, config: &PipelineConfig) -> Result<Self> {
        let rule = AdmissionRule {
            min_word_count: config.min_word_count,
            irrelevant_tolerance: config.irrelevant_tolerance,
            critical_alone: config.critical_alone,
            critical_in_combo: config.critical_in_combo,
            secondary_in_combo: config.secondary_in_combo,
        };
        Self::new(catalog, rule)
    }

    pub fn counts(&self, item: &CandidateItem) -> MatchCounts {
        let text = format!("{}\n{}", item.title, item.body);
        MatchCounts {
            critical: self.critical.count_matches(&text),
            secondary: self.secondary.count_matches(&text),
            irrelevant: self.irrelevant.count_matches(&text),
        }
    }

    pub fn classify(&self, item: &CandidateItem) -> ClassificationVerdict {
        decide(self.counts(item), item.word_count(), &self.rule)
    }

    /// Keep admitted items in arrival order; rejections only feed the report.
    pub fn filter(&self, items: Vec<CandidateItem>) -> (Vec<CandidateItem>, FilterReport) {
        let mut report = FilterReport::default();
        let mut admitted = Vec::with_capacity(items.len());
        for item in items {
            let verdict = self.classify(&item);
            report.record(&verdict);
            if verdict.admitted {
                admitted.push(item);
            } else if let Some(reason) = verdict.reason {
                tracing::trace!(
                    target: "pipeline",
                    sequence = item.sequence,
                    reason = reason.label(),
                    critical = verdict.critical_matches,
                    secondary = verdict.secondary_matches,
                    irrelevant = verdict.irrelevant_matches,
                    "item rejected in phase 1"
                );
            }
        }
        tracing::info!(
            target: "pipeline",
            admitted = report.admitted,
            too_short = report.too_short,
            vetoed = report.vetoed,
            off_topic = report.off_topic,
            "phase 1 filtering finished"
        );
        (admitted, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(critical: usize, secondary: usize, irrelevant: usize) -> MatchCounts {
        MatchCounts {
            critical,
            secondary,
            irrelevant,
        }
    }

    fn item(title: &str, body: &str) -> CandidateItem {
        CandidateItem {
            sequence: 0,
            title: title.into(),
            comparison_title: title.to_lowercase(),
            body: body.into(),
            source: "test".into(),
            link: None,
            published: None,
        }
    }

    fn padded(text: &str, words: usize) -> String {
        let mut out = text.to_string();
        for _ in 0..words {
            out.push_str(" lorem");
        }
        out
    }

    fn catalog() -> Catalog {
        Catalog {
            critical_topics: vec!["supreme court".into(), "parliament".into(), "act".into()],
            secondary_topics: vec!["environment".into(), "health".into(), "policy".into()],
            irrelevant_keywords: vec!["cricket".into(), "horoscope".into()],
            feeds: Vec::new(),
        }
    }

    #[test]
    fn two_critical_topics_admit() {
        let v = decide(counts(2, 0, 0), 150, &AdmissionRule::default());
        assert!(v.admitted);
        assert_eq!(v.reason, None);
    }

    #[test]
    fn one_critical_needs_two_secondary() {
        let rule = AdmissionRule::default();
        assert!(decide(counts(1, 2, 0), 150, &rule).admitted);
        let v = decide(counts(1, 1, 0), 150, &rule);
        assert_eq!(v.reason, Some(RejectReason::InsufficientTopics));
        assert!(!decide(counts(0, 5, 0), 150, &rule).admitted);
    }

    #[test]
    fn irrelevance_vetoes_strong_matches() {
        let v = decide(counts(9, 9, 1), 500, &AdmissionRule::default());
        assert_eq!(v.reason, Some(RejectReason::IrrelevantContent));
    }

    #[test]
    fn tolerance_allows_small_irrelevant_counts() {
        let rule = AdmissionRule {
            irrelevant_tolerance: 1,
            ..AdmissionRule::default()
        };
        assert!(decide(counts(2, 0, 1), 150, &rule).admitted);
        assert!(!decide(counts(2, 0, 2), 150, &rule).admitted);
    }

    #[test]
    fn short_bodies_are_rejected_first() {
        let v = decide(counts(5, 5, 5), 99, &AdmissionRule::default());
        assert_eq!(v.reason, Some(RejectReason::TooShort));
    }

    #[test]
    fn decision_is_deterministic() {
        let rule = AdmissionRule::default();
        for c in 0..4 {
            for s in 0..4 {
                for i in 0..2 {
                    let a = decide(counts(c, s, i), 120, &rule);
                    let b = decide(counts(c, s, i), 120, &rule);
                    assert_eq!(a, b);
                }
            }
        }
    }

    #[test]
    fn vocabulary_matches_whole_words_only() {
        let vocab = Vocabulary::new(&["act".to_string(), "supreme court".to_string()]).unwrap();
        assert_eq!(vocab.count_matches("The actor had an impact"), 0);
        assert_eq!(vocab.count_matches("Under the Act, the Supreme\nCourt ruled"), 2);
        assert_eq!(vocab.count_matches("act act act"), 1);
    }

    #[test]
    fn classifier_counts_title_and_body() {
        let classifier = RelevanceClassifier::new(&catalog(), AdmissionRule::default()).unwrap();
        let body = padded("The Supreme Court upheld the act on environment policy.", 120);
        let verdict = classifier.classify(&item("Court ruling", &body));
        assert!(verdict.admitted);
        assert_eq!(verdict.critical_matches, 2);
        assert_eq!(verdict.secondary_matches, 2);
    }

    #[test]
    fn configured_thresholds_change_the_verdict() {
        let single = item("Parliament", &padded("parliament session", 120));

        let strict = RelevanceClassifier::from_config(&catalog(), &PipelineConfig::default()).unwrap();
        assert_eq!(
            strict.classify(&single).reason,
            Some(RejectReason::InsufficientTopics)
        );

        let lenient = PipelineConfig {
            critical_alone: 1,
            ..PipelineConfig::default()
        };
        let lenient = RelevanceClassifier::from_config(&catalog(), &lenient).unwrap();
        assert!(lenient.classify(&single).admitted);

        let combo = item("Parliament", &padded("parliament health", 120));
        assert!(!strict.classify(&combo).admitted);
        let loose_combo = PipelineConfig {
            secondary_in_combo: 1,
            ..PipelineConfig::default()
        };
        let loose_combo = RelevanceClassifier::from_config(&catalog(), &loose_combo).unwrap();
        assert!(loose_combo.classify(&combo).admitted);
    }

    #[test]
    fn filter_keeps_order_and_reports_reasons() {
        let classifier = RelevanceClassifier::new(&catalog(), AdmissionRule::default()).unwrap();
        let items = vec![
            item("Parliament passes act", &padded("health", 120)),
            item("Cricket", &padded("Parliament act cricket", 120)),
            item("Short", "Parliament act"),
            item("Weather", &padded("sunny", 120)),
            item("Supreme Court", &padded("parliament", 120)),
        ];
        let (kept, report) = classifier.filter(items);
        let titles: Vec<_> = kept.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Parliament passes act", "Supreme Court"]);
        assert_eq!(
            report,
            FilterReport {
                admitted: 2,
                too_short: 1,
                vetoed: 1,
                off_topic: 1,
            }
        );
        assert_eq!(report.rejected(), 3);
    }
}
