//! Uploaded newspaper documents: text extraction and segmentation.

use crate::{domain::RawItem, error::RunError};

const TITLE_MAX_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Some(DocumentKind::Pdf)
        } else if lower.ends_with(".txt") {
            Some(DocumentKind::Text)
        } else {
            None
        }
    }
}

/// Extract the document's text. PDF parsing runs on the blocking pool.
pub async fn extract_text(file_name: &str, bytes: Vec<u8>) -> Result<String, RunError> {
    let kind = DocumentKind::from_file_name(file_name)
        .ok_or_else(|| RunError::DocumentUnreadable(format!("unsupported file type: {file_name}")))?;

    let text = match kind {
        DocumentKind::Text => String::from_utf8_lossy(&bytes).into_owned(),
        DocumentKind::Pdf => tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes)
        })
        .await
        .map_err(|err| RunError::DocumentUnreadable(err.to_string()))?
        .map_err(|err| RunError::DocumentUnreadable(err.to_string()))?,
    };

    if text.split_whitespace().next().is_none() {
        return Err(RunError::EmptyDocument);
    }
    Ok(text)
}

/// Split extracted text into candidate articles on blank lines. The first
/// line of each block becomes its title; the whole block is the body.
pub fn segment(text: &str, source: &str) -> Vec<RawItem> {
    let mut items = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in text.lines().chain(std::iter::once("")) {
        let line = line.trim();
        if !line.is_empty() {
            block.push(line);
            continue;
        }
        if block.is_empty() {
            continue;
        }
        let title: String = block[0].chars().take(TITLE_MAX_CHARS).collect();
        items.push(RawItem::new(source, title, block.join("\n")));
        block.clear();
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_separate_articles() {
        let text = "Cabinet approves scheme\nThe Union Cabinet approved...\n\n\n  \nMonsoon arrives early\nIMD said...\n";
        let items = segment(text, "paper.pdf");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Cabinet approves scheme");
        assert_eq!(items[0].body, "Cabinet approves scheme\nThe Union Cabinet approved...");
        assert_eq!(items[1].source, "paper.pdf");
    }

    #[test]
    fn long_first_lines_are_cut_for_titles() {
        let line = "word ".repeat(60);
        let items = segment(&line, "x.txt");
        assert_eq!(items[0].title.chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn file_kind_follows_extension() {
        assert_eq!(DocumentKind::from_file_name("Hindu_04-03.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_file_name("notes.txt"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_file_name("scan.jpg"), None);
    }

    #[tokio::test]
    async fn text_uploads_are_read_directly() {
        let text = extract_text("notes.txt", b"Hello\n\nWorld".to_vec()).await.unwrap();
        assert_eq!(segment(&text, "notes.txt").len(), 2);
    }

    #[tokio::test]
    async fn blank_documents_are_rejected() {
        let err = extract_text("empty.txt", b" \n\n ".to_vec()).await.unwrap_err();
        assert!(matches!(err, RunError::EmptyDocument));
    }

    #[tokio::test]
    async fn corrupt_pdfs_are_unreadable() {
        let err = extract_text("broken.pdf", b"not a pdf".to_vec()).await.unwrap_err();
        assert!(matches!(err, RunError::DocumentUnreadable(_)));
    }
}
