//! Markdown study digests and the per-source chat summary.

use std::fmt::Write as _;

use chrono_tz::Tz;

use crate::{
    domain::{AnalysisResult, CandidateItem},
    pipeline::{Digest, DigestKind},
};

const SOURCE_LINKS_SHOWN: usize = 10;
const LINK_TITLE_CHARS: usize = 60;

pub fn render(digest: &Digest, tz: Tz) -> String {
    match &digest.kind {
        DigestKind::News => render_news_digest(digest, tz),
        DigestKind::Document { file_name } => render_document_digest(digest, file_name, tz),
    }
}

pub fn file_name(digest: &Digest, tz: Tz) -> String {
    let date = digest.generated_at.with_timezone(&tz).format("%Y-%m-%d");
    match &digest.kind {
        DigestKind::News => format!("upsc-daily-news-{date}.md"),
        DigestKind::Document { .. } => format!("upsc-newspaper-analysis-{date}.md"),
    }
}

pub fn render_news_digest(digest: &Digest, tz: Tz) -> String {
    let mut out = header("UPSC Daily News Analysis", digest, tz);
    let kept: Vec<_> = digest.kept().collect();

    out.push_str("## All topics covered\n\n");
    for (idx, (item, _)) in kept.iter().enumerate() {
        let _ = writeln!(out, "{}. {} _({})_", idx + 1, item.title, item.source);
    }
    out.push('\n');

    for (idx, (item, result)) in kept.iter().enumerate() {
        let _ = writeln!(out, "## {}. {}\n", idx + 1, item.title);
        let _ = writeln!(out, "{}\n", source_line(item, tz));
        text_section(&mut out, "UPSC Relevance", &result.explanation);
        list_section(&mut out, "Key Points", &result.key_points);
        list_section(&mut out, "Concepts to Understand", &result.concepts);
        numbered_section(&mut out, "Prelims Perspective", &result.prelims_questions);
        numbered_section(&mut out, "Mains Perspective", &result.mains_questions);
        text_section(&mut out, "Static Portion", &result.background);
        tags_line(&mut out, result);
    }
    failures_section(&mut out, digest);
    out
}

pub fn render_document_digest(digest: &Digest, file_name: &str, tz: Tz) -> String {
    let mut out = header("UPSC Newspaper Analysis", digest, tz);
    let _ = writeln!(out, "Source file: `{file_name}`\n");

    let mut any = false;
    for (item, result) in digest.kept() {
        any = true;
        let _ = writeln!(out, "## Article {}: {}\n", item.sequence + 1, item.title);
        text_section(&mut out, "Summary", &result.summary);
        text_section(&mut out, "Simplified Explanation", &result.simplified);
        list_section(&mut out, "Key Concepts", &result.concepts);
        text_section(&mut out, "UPSC Relevance", &result.explanation);
        numbered_section(&mut out, "Prelims Questions", &result.prelims_questions);
        numbered_section(&mut out, "Mains Questions", &result.mains_questions);
        list_section(&mut out, "Related Topics", &result.related_topics);
        tags_line(&mut out, result);
    }
    if !any {
        out.push_str("_No article in this document was judged relevant for UPSC preparation._\n\n");
    }
    failures_section(&mut out, digest);
    out
}

fn header(title: &str, digest: &Digest, tz: Tz) -> String {
    let generated = digest.generated_at.with_timezone(&tz);
    let mut out = format!(
        "# {title}\n\n**{}** (generated {})\n\n",
        generated.format("%A, %d %B %Y"),
        generated.format("%H:%M %Z")
    );
    out.push_str("```\n");
    out.push_str(&digest.summary.render_text());
    out.push_str("\n```\n\n");
    out
}

/// Items the analysis gave up on, so a short digest is never a silent one.
fn failures_section(out: &mut String, digest: &Digest) {
    let failures: Vec<_> = digest.failures().collect();
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out, "## Not analyzed ({})\n", failures.len());
    for (item, attempts, error) in failures {
        let _ = writeln!(
            out,
            "- {} _({})_: {} after {} attempt{}",
            item.title,
            item.source,
            error,
            attempts,
            if attempts == 1 { "" } else { "s" }
        );
    }
    out.push('\n');
}

fn source_line(item: &CandidateItem, tz: Tz) -> String {
    let mut line = format!("_Source: {}", item.source);
    if let Some(published) = item.published {
        let _ = write!(line, " | {}", published.with_timezone(&tz).format("%d %b %Y"));
    }
    line.push('_');
    if let Some(link) = &item.link {
        let _ = write!(line, " [link]({link})");
    }
    line
}

fn text_section(out: &mut String, heading: &str, body: &str) {
    if body.is_empty() {
        return;
    }
    let _ = writeln!(out, "### {heading}\n\n{body}\n");
}

fn list_section(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "### {heading}\n");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out.push('\n');
}

fn numbered_section(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "### {heading}\n");
    for (idx, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}. {item}", idx + 1);
    }
    out.push('\n');
}

fn tags_line(out: &mut String, result: &AnalysisResult) {
    if !result.tags.is_empty() {
        let _ = writeln!(out, "**Tags:** {}\n", result.tags.join(", "));
    }
    out.push_str("---\n\n");
}

/// HTML chat message listing kept articles grouped by source, largest
/// group first.
pub fn format_source_summary(digest: &Digest) -> String {
    let mut groups: Vec<(&str, Vec<&CandidateItem>)> = Vec::new();
    for (item, _) in digest.kept() {
        match groups.iter_mut().find(|(source, _)| *source == item.source) {
            Some((_, items)) => items.push(item),
            None => groups.push((item.source.as_str(), vec![item])),
        }
    }
    if groups.is_empty() {
        return "📊 No articles found from any source.".to_string();
    }
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut parts = vec!["📊 Articles Found by Source:\n".to_string()];
    let mut total = 0;
    for (source, items) in &groups {
        total += items.len();
        parts.push(format!(
            "\n📰 <b>{}</b>: {} article{}",
            escape_html(source),
            items.len(),
            if items.len() == 1 { "" } else { "s" }
        ));
        for (idx, item) in items.iter().take(SOURCE_LINKS_SHOWN).enumerate() {
            let title: String = item.title.chars().take(LINK_TITLE_CHARS).collect();
            match &item.link {
                Some(link) => parts.push(format!(
                    "{}. <a href='{}'>{}</a>",
                    idx + 1,
                    escape_html(link),
                    escape_html(&title)
                )),
                None => parts.push(format!("{}. {}", idx + 1, escape_html(&title))),
            }
        }
        if items.len() > SOURCE_LINKS_SHOWN {
            parts.push(format!("... and {} more", items.len() - SOURCE_LINKS_SHOWN));
        }
    }
    parts.push(format!("\n\n✅ <b>Total: {total} UPSC-relevant articles</b>"));
    parts.join("\n")
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
