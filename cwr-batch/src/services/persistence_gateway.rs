//! Coordinate write-back to the backend
//!
//! `PUT /geocaches/{id}/coordinates` with form fields `gc_lat` / `gc_lon`
//! (the two halves of the DDM text). Every failure is reported through the
//! returned [`SaveOutcome`]; nothing is thrown past this boundary.

use async_trait::async_trait;
use cwr_common::coordinates::split_ddm;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::CoordinateCandidate;

/// Longest backend error body kept in a save error
const ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("No DDM coordinate to save")]
    NothingToSave,

    #[error("Cannot split coordinate '{0}' into latitude and longitude")]
    InvalidDdm(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend rejected save ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Result of one save attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveOutcome {
    pub fn saved() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<Result<(), PersistenceError>> for SaveOutcome {
    fn from(result: Result<(), PersistenceError>) -> Self {
        match result {
            Ok(()) => SaveOutcome::saved(),
            Err(e) => SaveOutcome::failed(e.to_string()),
        }
    }
}

/// Coordinate persistence seam
#[async_trait]
pub trait CoordinatePersistence: Send + Sync {
    /// Save `candidate` as the record's corrected coordinate
    async fn save(&self, record_id: i64, candidate: &CoordinateCandidate) -> SaveOutcome;
}

/// Backend-backed persistence over HTTP
pub struct HttpPersistenceGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPersistenceGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn coordinates_url(&self, record_id: i64) -> String {
        format!("{}/geocaches/{}/coordinates", self.base_url, record_id)
    }

    async fn try_save(&self, record_id: i64, candidate: &CoordinateCandidate) -> Result<(), PersistenceError> {
        let ddm = match (candidate.exists, candidate.ddm.as_deref()) {
            (true, Some(ddm)) => ddm,
            _ => return Err(PersistenceError::NothingToSave),
        };
        let (gc_lat, gc_lon) =
            split_ddm(ddm).ok_or_else(|| PersistenceError::InvalidDdm(ddm.to_string()))?;

        debug!(record_id, gc_lat = %gc_lat, gc_lon = %gc_lon, "Saving coordinate");

        let response = self
            .client
            .put(self.coordinates_url(record_id))
            .form(&[("gc_lat", gc_lat.as_str()), ("gc_lon", gc_lon.as_str())])
            .send()
            .await
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl CoordinatePersistence for HttpPersistenceGateway {
    async fn save(&self, record_id: i64, candidate: &CoordinateCandidate) -> SaveOutcome {
        let result = self.try_save(record_id, candidate).await;
        if let Err(e) = &result {
            warn!(record_id, error = %e, "Coordinate save failed");
        }
        result.into()
    }
}
