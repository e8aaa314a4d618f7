use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    /// `ok`, `error`, or `skipped` when running on in-process stores.
    pub database: String,
}
