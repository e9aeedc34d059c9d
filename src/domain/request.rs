use chrono::{DateTime, Utc};
use teloxide::types::ChatId;

#[derive(Debug, Clone)]
pub enum RequestKind {
    DailyNews,
    Document { file_name: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    Command,
    Scheduled,
}

#[derive(Debug, Clone)]
pub struct DigestRequest {
    pub chat_id: ChatId,
    pub requested_by: Option<i64>,
    pub kind: RequestKind,
    pub origin: RequestOrigin,
    pub requested_at: DateTime<Utc>,
}

impl DigestRequest {
    pub fn news(chat_id: ChatId, requested_by: Option<i64>, origin: RequestOrigin) -> Self {
        Self {
            chat_id,
            requested_by,
            kind: RequestKind::DailyNews,
            origin,
            requested_at: Utc::now(),
        }
    }

    pub fn document(
        chat_id: ChatId,
        requested_by: Option<i64>,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            chat_id,
            requested_by,
            kind: RequestKind::Document { file_name, bytes },
            origin: RequestOrigin::Command,
            requested_at: Utc::now(),
        }
    }

    pub fn label(&self) -> &str {
        match &self.kind {
            RequestKind::DailyNews => "daily news",
            RequestKind::Document { file_name, .. } => file_name,
        }
    }
}
