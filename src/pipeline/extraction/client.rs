use async_trait::async_trait;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use super::types::{
    MarkerExtraction, MarkerExtractionRequest, MarkerExtractionResponse, MarkerExtractor,
};
use super::ExtractionError;
use crate::config::IngestConfig;
use crate::error::UploadError;
use crate::pipeline::upload::{RetryError, RetryPolicy};

/// HTTP client for the marker extraction service.
///
/// Connectivity failures go through the retry policy; a `401` or a
/// `success: false` answer is final.
pub struct HttpMarkerExtractor {
    url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpMarkerExtractor {
    pub fn new(config: &IngestConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                ExtractionError::Connectivity(UploadError::network(format!("HTTP client: {e}")))
            })?;
        Ok(Self::with_client(
            &config.extraction_url,
            client,
            RetryPolicy::new(config.max_attempts, config.base_delay),
        ))
    }

    pub fn with_client(url: &str, client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self {
            url: url.to_string(),
            client,
            retry,
        }
    }

    async fn request_once(&self, text: &str) -> Result<MarkerExtraction, ExtractionError> {
        let response = self
            .client
            .post(&self.url)
            .json(&MarkerExtractionRequest { text })
            .send()
            .await
            .map_err(|e| ExtractionError::Connectivity(UploadError::from_transport(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Connectivity(UploadError::from_transport(&e)))?;

        interpret_response(status, &body)
    }
}

#[async_trait]
impl MarkerExtractor for HttpMarkerExtractor {
    async fn extract_markers(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<MarkerExtraction, ExtractionError> {
        let outcome = self
            .retry
            .execute_with(
                cancel,
                |_| self.request_once(text),
                ExtractionError::is_connectivity,
                |attempt, delay, err| {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Marker extraction request failed, retrying"
                    );
                },
            )
            .await;

        match outcome {
            Ok(extraction) => {
                tracing::info!(
                    markers = extraction.markers.len(),
                    date_groups = extraction.date_groups.len(),
                    "Markers extracted"
                );
                Ok(extraction)
            }
            Err(RetryError::Cancelled) => Err(ExtractionError::Cancelled),
            Err(RetryError::Exhausted { last, .. }) => Err(last),
            Err(RetryError::NotRetryable { error, .. }) => Err(error),
        }
    }
}

/// Map status + body onto the extraction contract.
pub(crate) fn interpret_response(
    status: StatusCode,
    body: &str,
) -> Result<MarkerExtraction, ExtractionError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ExtractionError::SessionExpired);
    }

    let parsed = serde_json::from_str::<MarkerExtractionResponse>(body);

    if !status.is_success() {
        let message = parsed
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| format!("Extraction service returned status {}", status.as_u16()));
        return Err(ExtractionError::Collaborator(message));
    }

    let response = parsed.map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;
    if !response.success {
        return Err(ExtractionError::Collaborator(
            response
                .error
                .unwrap_or_else(|| "Extraction service reported failure".to_string()),
        ));
    }

    Ok(MarkerExtraction::from(response))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn unauthorized_is_session_expired() {
        let err = interpret_response(StatusCode::UNAUTHORIZED, "{}").unwrap_err();
        assert_eq!(err, ExtractionError::SessionExpired);
    }

    #[test]
    fn server_error_uses_body_message_when_present() {
        let err = interpret_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"success":false,"error":"model overloaded"}"#,
        )
        .unwrap_err();
        assert_eq!(err, ExtractionError::Collaborator("model overloaded".into()));

        let err = interpret_response(StatusCode::BAD_GATEWAY, "nope").unwrap_err();
        assert_eq!(
            err,
            ExtractionError::Collaborator("Extraction service returned status 502".into())
        );
    }

    #[test]
    fn malformed_success_body() {
        let err = interpret_response(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse(_)));
    }

    #[test]
    fn success_false_is_failure() {
        let err = interpret_response(StatusCode::OK, r#"{"success":false}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Collaborator(_)));
    }

    #[test]
    fn success_body_is_extraction() {
        let extraction = interpret_response(
            StatusCode::OK,
            r#"{"success":true,"markers":[{"name":"TSH","value":2.1,"unit":"mIU/L"}],"dateGroups":[],"hasMultipleDates":false}"#,
        )
        .unwrap();
        assert_eq!(extraction.markers.len(), 1);
        assert!(extraction.date_groups.is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_is_retried_then_reported() {
        let extractor = HttpMarkerExtractor::with_client(
            "http://127.0.0.1:9/api/extract-markers",
            reqwest::Client::new(),
            RetryPolicy::new(2, Duration::from_millis(1)),
        );
        let err = extractor
            .extract_markers("Glucose 90", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_connectivity());
    }
}
