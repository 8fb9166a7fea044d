use async_trait::async_trait;
use reqwest::StatusCode;

use super::types::{GroupSaveRequest, GroupSaveResponse, GroupSaver};
use super::SaveError;
use crate::config::IngestConfig;
use crate::error::UploadError;
use crate::models::Measurement;

/// Posts `{markers, date}` to the persistence collaborator.
pub struct HttpGroupSaver {
    url: String,
    client: reqwest::Client,
}

impl HttpGroupSaver {
    pub fn new(config: &IngestConfig) -> Result<Self, SaveError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SaveError::Transport(UploadError::network(format!("HTTP client: {e}"))))?;
        Ok(Self::with_client(&config.markers_url, client))
    }

    pub fn with_client(url: &str, client: reqwest::Client) -> Self {
        Self {
            url: url.to_string(),
            client,
        }
    }
}

#[async_trait]
impl GroupSaver for HttpGroupSaver {
    async fn save_group(
        &self,
        date: &str,
        markers: &[Measurement],
    ) -> Result<GroupSaveResponse, SaveError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GroupSaveRequest { markers, date })
            .send()
            .await
            .map_err(|e| SaveError::Transport(UploadError::from_transport(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SaveError::Transport(UploadError::from_transport(&e)))?;

        interpret_response(status, &body)
    }
}

pub(crate) fn interpret_response(status: StatusCode, body: &str) -> Result<GroupSaveResponse, SaveError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(SaveError::SessionExpired);
    }

    let parsed = serde_json::from_str::<GroupSaveResponse>(body);

    if !status.is_success() {
        let message = parsed
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| format!("Marker save failed with status {}", status.as_u16()));
        return Err(SaveError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    parsed.map_err(|e| SaveError::MalformedResponse(e.to_string()))
}
