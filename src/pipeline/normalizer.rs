use std::collections::HashSet;

use crate::domain::{CandidateItem, RawItem};

#[derive(Debug, Default)]
pub struct Normalized {
    pub items: Vec<CandidateItem>,
    pub duplicates: usize,
    /// Items whose title had no words left after normalization.
    pub untitled: usize,
}

/// Lower-case, drop punctuation and collapse whitespace.
pub fn comparison_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn word_set(comparison: &str) -> HashSet<&str> {
    comparison.split_whitespace().collect()
}

/// Jaccard similarity of two word sets.
pub fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Canonicalize raw items and drop near-duplicate titles, keeping the first
/// occurrence. Output order follows input order.
pub fn normalize(raw: Vec<RawItem>, threshold: f64) -> Normalized {
    let mut out = Normalized::default();
    let mut kept_titles: Vec<String> = Vec::with_capacity(raw.len());

    for item in raw {
        let comparison = comparison_title(&item.title);
        if comparison.is_empty() {
            out.untitled += 1;
            continue;
        }

        let words = word_set(&comparison);
        let is_duplicate = kept_titles
            .iter()
            .any(|seen| jaccard(&words, &word_set(seen)) >= threshold);
        if is_duplicate {
            tracing::debug!(
                target: "pipeline",
                source = %item.source,
                title = %truncate(&item.title, 60),
                "dropping near-duplicate title"
            );
            out.duplicates += 1;
            continue;
        }

        kept_titles.push(comparison.clone());
        out.items.push(CandidateItem {
            sequence: out.items.len(),
            title: collapse_whitespace(&item.title),
            comparison_title: comparison,
            body: item.body.trim().to_string(),
            source: item.source.trim().to_string(),
            link: item.link.filter(|l| !l.trim().is_empty()),
            published: item.published,
        });
    }

    out
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    }
}
