use std::convert::TryFrom;

use teloxide::types::User;

use crate::{collectors::document::DocumentKind, domain::QueueSnapshot};

pub fn format_user_display(user: &User) -> String {
    if let Some(username) = &user.username {
        format!("@{}", username)
    } else {
        let mut parts = Vec::new();
        parts.push(user.first_name.as_str());
        if let Some(last) = &user.last_name {
            parts.push(last.as_str());
        }
        let name = parts.join(" ").trim().to_string();
        if name.is_empty() {
            "Unknown".to_string()
        } else {
            name
        }
    }
}

pub fn user_to_i64(user: &User) -> i64 {
    i64::try_from(user.id.0).unwrap_or(i64::MAX)
}

/// Plain-text "news" (any case, optional punctuation) also starts a run.
pub fn is_news_trigger(text: &str) -> bool {
    let cleaned = text
        .trim()
        .trim_end_matches(['!', '.', '?'])
        .trim();
    cleaned.eq_ignore_ascii_case("news")
}

/// Why an upload cannot be processed, as a user-facing reply.
pub fn check_upload(file_name: Option<&str>, size: u32, max_bytes: u32) -> Result<String, String> {
    let Some(name) = file_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Err("❌ The file has no name; please upload a .pdf or .txt newspaper.".to_string());
    };
    if DocumentKind::from_file_name(name).is_none() {
        return Err("❌ Please upload a PDF or TXT file of the newspaper.".to_string());
    }
    if size > max_bytes {
        return Err(format!(
            "❌ The file is too large ({:.1} MB). The limit is {:.1} MB.",
            f64::from(size) / 1_048_576.0,
            f64::from(max_bytes) / 1_048_576.0
        ));
    }
    Ok(name.to_string())
}

pub fn format_status(snapshot: QueueSnapshot, current: Option<&str>) -> String {
    let running = current.unwrap_or("idle");
    format!(
        "🤖 Bot status\n- Working on: {running}\n- Queued documents: {}\n- Queued news digests: {}",
        snapshot.high_priority, snapshot.normal_priority
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn news_trigger_is_loose_about_case_and_punctuation() {
        assert!(is_news_trigger("news"));
        assert!(is_news_trigger("  News! "));
        assert!(is_news_trigger("NEWS?"));
        assert!(!is_news_trigger("news please"));
        assert!(!is_news_trigger("fake news"));
    }

    #[test]
    fn uploads_are_checked_for_type_and_size() {
        assert_eq!(check_upload(Some("paper.PDF"), 10, 100), Ok("paper.PDF".to_string()));
        assert!(check_upload(Some("scan.png"), 10, 100).is_err());
        assert!(check_upload(None, 10, 100).is_err());
        let too_big = check_upload(Some("paper.pdf"), 30 * 1_048_576, 20 * 1_048_576).unwrap_err();
        assert!(too_big.contains("30.0 MB"));
    }

    #[test]
    fn status_shows_idle_processor() {
        let text = format_status(QueueSnapshot::default(), None);
        assert!(text.contains("Working on: idle"));
    }
}
