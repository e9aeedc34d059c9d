use futures::future::BoxFuture;
use reqwest::Client;

use super::{
    inference::{build_request, classify_status, classify_transport, extract_content, ChatCompletionResponse},
    prompts::PromptTemplate,
};
use crate::{config::AnalysisConfig, error::AnalysisError, pipeline::AnalysisBackend};

/// OpenAI-compatible chat-completions client for the NVIDIA endpoint.
#[derive(Clone)]
pub struct NvidiaClient {
    http: Client,
    config: AnalysisConfig,
}

impl NvidiaClient {
    pub fn new(http: Client, config: AnalysisConfig) -> Self {
        Self { http, config }
    }

    pub async fn complete(&self, template: PromptTemplate, text: &str) -> Result<String, AnalysisError> {
        let request = build_request(self.config.model.clone(), template, text);
        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|err| classify_transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| classify_transport(&err))?;
        extract_content(completion)
    }
}

impl AnalysisBackend for NvidiaClient {
    fn analyze<'a>(
        &'a self,
        text: &'a str,
        template: PromptTemplate,
    ) -> BoxFuture<'a, Result<String, AnalysisError>> {
        Box::pin(self.complete(template, text))
    }
}
