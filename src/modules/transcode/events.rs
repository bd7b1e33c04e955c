use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job message published by the catalog service when an upload finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeJob {
    pub song_id: Uuid,
    pub raw_object_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscodeStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

/// Terminal outcome reported back to the catalog service. Exactly one of
/// these goes out per job that runs the pipeline to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeResultEvent {
    pub song_id: Uuid,
    pub status: TranscodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TranscodeResultEvent {
    pub fn success(song_id: Uuid, stream_url: String, duration_seconds: u64) -> Self {
        Self {
            song_id,
            status: TranscodeStatus::Success,
            stream_url: Some(stream_url),
            duration_seconds: Some(duration_seconds),
            message: None,
        }
    }

    pub fn failure(song_id: Uuid, message: String) -> Self {
        Self {
            song_id,
            status: TranscodeStatus::Failed,
            stream_url: None,
            duration_seconds: None,
            message: Some(message),
        }
    }
}
