//! Turns the model's sectioned text into an [`AnalysisResult`].
//!
//! The primary pass reads header lines (`**Key Points:**`, `## Summary`, ...).
//! When it finds nothing, or misses the verdict, a fallback scans for
//! `Label: value` pairs anywhere in the text. A verdict that is missing or
//! not an unambiguous yes always reads as not relevant.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::{
    ai::PromptTemplate,
    domain::{AnalysisResult, Relevance},
    error::AnalysisError,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("response was empty")]
    Empty,
    #[error("no recognizable fields in {0} response")]
    NoFields(&'static str),
}

impl From<ParseError> for AnalysisError {
    fn from(err: ParseError) -> Self {
        AnalysisError::Parse(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Verdict,
    Summary,
    Simplified,
    Explanation,
    KeyPoints,
    Concepts,
    Prelims,
    Mains,
    Background,
    RelatedTopics,
    Tags,
}

/// Longest labels first so `relevant for upsc` wins over `relevant`.
static LABELS: Lazy<Vec<(&'static str, Field)>> = Lazy::new(|| {
    let mut labels = vec![
        ("relevant for upsc", Field::Verdict),
        ("is this relevant", Field::Verdict),
        ("relevant", Field::Verdict),
        ("verdict", Field::Verdict),
        ("brief summary", Field::Summary),
        ("summary", Field::Summary),
        ("simplified explanation", Field::Simplified),
        ("simplified", Field::Simplified),
        ("upsc relevance", Field::Explanation),
        ("exam relevance", Field::Explanation),
        ("relevance", Field::Explanation),
        ("key points", Field::KeyPoints),
        ("concepts to understand", Field::Concepts),
        ("key concepts", Field::Concepts),
        ("concepts", Field::Concepts),
        ("prelims perspective", Field::Prelims),
        ("potential prelims questions", Field::Prelims),
        ("prelims questions", Field::Prelims),
        ("prelims", Field::Prelims),
        ("mains perspective", Field::Mains),
        ("potential mains questions", Field::Mains),
        ("mains questions", Field::Mains),
        ("mains", Field::Mains),
        ("static portion", Field::Background),
        ("background", Field::Background),
        ("related topics", Field::RelatedTopics),
        ("tags", Field::Tags),
    ];
    labels.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    labels
});

static INLINE_LABEL: Lazy<Regex> = Lazy::new(|| {
    let alternation = LABELS
        .iter()
        .map(|(label, _)| regex::escape(label).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({alternation})\b\s*\**\s*[:\-–]")).expect("valid label regex")
});

static GS_PAPER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bGS[\s\-]?(?:paper\s*)?(IV|I{1,3}|[1-4])\b").expect("valid gs regex")
});

static QUESTION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[Qq]\s*\d*\s*[.:)\-]|\d+\s*[.:)])").expect("valid question regex"));

#[derive(Debug, Default)]
struct Sections {
    found: Vec<(Field, Vec<String>)>,
}

impl Sections {
    fn lines_mut(&mut self, field: Field) -> &mut Vec<String> {
        if let Some(pos) = self.found.iter().position(|(f, _)| *f == field) {
            &mut self.found[pos].1
        } else {
            self.found.push((field, Vec::new()));
            let last = self.found.len() - 1;
            &mut self.found[last].1
        }
    }

    fn has(&self, field: Field) -> bool {
        self.found.iter().any(|(f, _)| *f == field)
    }

    fn get(&self, field: Field) -> &[String] {
        self.found
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, lines)| lines.as_slice())
            .unwrap_or(&[])
    }

    fn is_empty(&self) -> bool {
        self.found.is_empty()
    }
}

pub fn parse_response(
    template: PromptTemplate,
    raw: &str,
) -> Result<AnalysisResult, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut sections = parse_headers(raw);
    if sections.is_empty() || !sections.has(Field::Verdict) {
        let fallback = parse_inline(raw);
        for (field, lines) in fallback.found {
            if !sections.has(field) {
                sections.lines_mut(field).extend(lines);
            }
        }
    }
    if sections.is_empty() {
        return Err(ParseError::NoFields(template.name()));
    }

    Ok(assemble(&sections))
}

fn parse_headers(raw: &str) -> Sections {
    let mut sections = Sections::default();
    let mut current: Option<Field> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((field, rest)) = split_header(trimmed) {
            current = Some(field);
            let lines = sections.lines_mut(field);
            if !rest.is_empty() {
                lines.push(rest.to_string());
            }
            continue;
        }
        if let Some(field) = current {
            sections.lines_mut(field).push(trimmed.to_string());
        }
    }

    sections
}

/// Recognize a header line and return the field plus any inline value.
fn split_header(line: &str) -> Option<(Field, &str)> {
    let cleaned = line
        .trim_start_matches(|c: char| c == '#' || c == '*' || c == '_' || c.is_whitespace())
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['.', ')'])
        .trim_start_matches(|c: char| c == '*' || c == '_' || c.is_whitespace());

    for (label, field) in LABELS.iter() {
        let Some(head) = cleaned.get(..label.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(label) {
            continue;
        }
        let after = &cleaned[label.len()..];
        if after.chars().next().is_some_and(|c| c.is_alphanumeric()) {
            continue;
        }
        let after = after.trim_start_matches(|c: char| c == '*' || c == '_' || c.is_whitespace());
        let rest = if after.is_empty() {
            ""
        } else if let Some(stripped) = after
            .strip_prefix(':')
            .or_else(|| after.strip_prefix(" -"))
            .or_else(|| after.strip_prefix('-'))
            .or_else(|| after.strip_prefix('–'))
        {
            stripped
        } else if after.starts_with('(') && after.ends_with([':', '*', ')']) {
            // "Prelims Perspective (2-3 questions):"
            ""
        } else {
            continue;
        };
        let rest = rest
            .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
            .trim_start_matches(':')
            .trim();
        return Some((*field, rest));
    }
    None
}

fn parse_inline(raw: &str) -> Sections {
    let mut sections = Sections::default();
    let matches: Vec<_> = INLINE_LABEL.captures_iter(raw).collect();
    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let normalized = label
            .as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        let Some(field) = LABELS
            .iter()
            .find(|(l, _)| *l == normalized)
            .map(|(_, f)| *f)
        else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(raw.len());
        let value = raw[whole.end()..end].trim();
        if sections.has(field) {
            continue;
        }
        let lines = sections.lines_mut(field);
        lines.extend(
            value
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    sections
}

fn assemble(sections: &Sections) -> AnalysisResult {
    let explanation = text(sections.get(Field::Explanation));
    let mut tags = list(sections.get(Field::Tags))
        .into_iter()
        .flat_map(|tag| {
            tag.split(',')
                .map(|t| t.trim().trim_start_matches('#').to_string())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    for paper in gs_papers(&explanation) {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(&paper)) {
            tags.push(paper);
        }
    }

    AnalysisResult {
        relevance: verdict(sections.get(Field::Verdict)),
        summary: text(sections.get(Field::Summary)),
        simplified: text(sections.get(Field::Simplified)),
        explanation,
        key_points: list(sections.get(Field::KeyPoints)),
        concepts: list(sections.get(Field::Concepts)),
        prelims_questions: questions(sections.get(Field::Prelims)),
        mains_questions: questions(sections.get(Field::Mains)),
        background: text(sections.get(Field::Background)),
        related_topics: list(sections.get(Field::RelatedTopics)),
        tags,
    }
}

/// Only an answer that starts with "yes" and carries no negation counts.
fn verdict(lines: &[String]) -> Relevance {
    let joined = lines.join(" ").to_lowercase();
    let words: Vec<&str> = joined
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let negated = words.iter().any(|w| matches!(*w, "no" | "not" | "irrelevant"));
    match words.first() {
        Some(&"yes") if !negated => Relevance::Relevant,
        _ => Relevance::NotRelevant,
    }
}

fn text(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| strip_markup(l))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn list(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|l| strip_bullet(l))
        .filter(|l| !l.is_empty())
        .collect()
}

fn questions(lines: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in lines {
        let cleaned = strip_markup(line);
        if cleaned.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if !QUESTION_START.is_match(&cleaned) => {
                last.push(' ');
                last.push_str(&cleaned);
            }
            _ => out.push(cleaned),
        }
    }
    out
}

fn strip_markup(line: &str) -> String {
    line.replace("**", "").trim().to_string()
}

fn strip_bullet(line: &str) -> String {
    let cleaned = strip_markup(line);
    cleaned
        .trim_start_matches(['•', '-', '*', '·', '–'])
        .trim()
        .to_string()
}

fn gs_papers(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in GS_PAPER.captures_iter(text) {
        let Some(num) = caps.get(1) else { continue };
        let paper = match num.as_str().to_ascii_uppercase().as_str() {
            "I" | "1" => "GS1",
            "II" | "2" => "GS2",
            "III" | "3" => "GS3",
            "IV" | "4" => "GS4",
            _ => continue,
        };
        if !out.iter().any(|p| p == paper) {
            out.push(paper.to_string());
        }
    }
    out
}
