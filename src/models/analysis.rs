use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
}

/// Body of a successful `/detect` call: the model API payload, untouched.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub success: bool,
    pub filename: String,
    pub result: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub classifier: String,
    pub explainer: String,
    pub model_api: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceStatus,
    pub max_frames: usize,
    pub analyze_max_bytes: usize,
    pub detect_max_bytes: usize,
}

pub fn configured(flag: bool) -> String {
    if flag { "configured" } else { "not_configured" }.to_string()
}
