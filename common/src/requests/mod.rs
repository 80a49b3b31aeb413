use serde::{Deserialize, Serialize};

/// Request payload for `POST /api/verify`.
///
/// The verification page forwards `location.search` and `location.hash` untouched;
/// fragments never reach the server on their own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub id: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub fragment: Option<String>,
}

/// Query string of `GET /api/records/{id}/qr`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct QrQuery {
    pub size: Option<u32>,
}
