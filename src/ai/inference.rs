use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::prompts::PromptTemplate;
use crate::error::AnalysisError;

pub fn build_request(model: String, template: PromptTemplate, text: &str) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: template.system_prompt().into(),
            },
            ChatMessage {
                role: "user".into(),
                content: template.user_prompt(text),
            },
        ],
        temperature: 0.3,
        top_p: 0.9,
        max_tokens: 2048,
    }
}

/// Text of the first choice. A completion without one counts as an
/// unparseable response, not a transport failure.
pub fn extract_content(completion: ChatCompletionResponse) -> Result<String, AnalysisError> {
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|msg| msg.content)
        .ok_or_else(|| AnalysisError::Parse("completion contained no message".into()))?;
    if content.trim().is_empty() {
        return Err(AnalysisError::Parse("completion message was empty".into()));
    }
    Ok(content)
}

/// Map a non-success HTTP status to a failure class.
pub fn classify_status(status: StatusCode, body: &str) -> AnalysisError {
    let detail = format!("{status}: {}", body.chars().take(200).collect::<String>());
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        AnalysisError::Transient(detail)
    } else {
        AnalysisError::Permanent(detail)
    }
}

/// Map a transport error to a failure class.
pub fn classify_transport(err: &reqwest::Error) -> AnalysisError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        AnalysisError::Transient(err.to_string())
    } else if err.is_decode() {
        AnalysisError::Parse(err.to_string())
    } else {
        AnalysisError::Permanent(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: i32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatCompletionMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_both_prompts() {
        let request = build_request("meta/llama".into(), PromptTemplate::NewsDigest, "Title: X");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "meta/llama");
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("Title: X"));
    }

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(classify_status(status, "").is_transient(), "{status}");
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
            StatusCode::UNPROCESSABLE_ENTITY,
        ] {
            assert!(!classify_status(status, "").is_transient(), "{status}");
        }
    }

    #[test]
    fn empty_completions_are_parse_failures() {
        let no_choices: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(extract_content(no_choices), Err(AnalysisError::Parse(_))));

        let blank: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "  "}}]}"#).unwrap();
        assert!(matches!(extract_content(blank), Err(AnalysisError::Parse(_))));

        let ok: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "Summary: x"}}]}"#).unwrap();
        assert_eq!(extract_content(ok).unwrap(), "Summary: x");
    }
}
