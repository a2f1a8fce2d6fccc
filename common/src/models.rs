use serde::{Deserialize, Serialize};

/// Body of `POST /rsa` and `POST /ecdsa/<variant>/sign` (radix-32 strings)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashed_token: Option<String>,
}

/// Body of `POST /ecdsa/<variant>/init`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashed_token: Option<String>,
}

/// Andreev init round: P = G·p⁻¹ and Q = G·p⁻¹·q
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndreevInitResponse {
    #[serde(rename = "Px", alias = "px")]
    pub px: String,
    #[serde(rename = "Py", alias = "py")]
    pub py: String,
    #[serde(rename = "Qx", alias = "qx")]
    pub qx: String,
    #[serde(rename = "Qy", alias = "qy")]
    pub qy: String,
}

/// Butun init round: the signer's one-time point Ŕ = G·k
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButunInitResponse {
    #[serde(rename = "Ŕx")]
    pub rx: String,
    #[serde(rename = "Ŕy")]
    pub ry: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignResponse {
    pub signed_blinded_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
