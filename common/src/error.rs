use thiserror::Error;

/// 要求者 (クライアント) 側のブラインド処理で発生するエラー
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlindingError {
    #[error("public key algorithm id {0} is for encryption only")]
    EncryptionOnly(u8),
    #[error("unsupported public key algorithm id: {0}")]
    UnsupportedAlgorithm(u8),
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(String),
    #[error("key algorithm mismatch: expected {expected}, found id {found}")]
    AlgorithmMismatch { expected: &'static str, found: u8 },
    #[error("blinding context is incomplete")]
    IncompleteContext,
    #[error("raw signature has not been prepared")]
    MissingRawSignature,
    #[error("point is not on the curve")]
    PointNotOnCurve,
    #[error("point is the identity element")]
    IdentityPoint,
    #[error("scalar is zero")]
    ZeroScalar,
    #[error("value is out of range: {0}")]
    OutOfRange(&'static str),
    #[error("modular inverse does not exist")]
    ModInv,
    #[error("rsa modulus too small for blinding: {0} bits")]
    ModulusTooSmall(u64),
    #[error("blinder is in state {0:?} and cannot {1}")]
    InvalidState(crate::blinding::BlinderState, &'static str),
    #[error("unblinded signature does not verify")]
    InvalidSignature,
}

/// 通信プロトコル層のエラー
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("signer responded with error: {0}")]
    Rejected(String),
    #[error("malformed signer response: {0}")]
    MalformedResponse(String),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("invalid radix-32 value: {0}")]
    InvalidRadix(String),
}

/// 署名者 (サーバー) 側のエラー
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignerError {
    #[error("no pending session for the given token")]
    UnknownToken,
    #[error("request carries no message to sign")]
    MissingMessage,
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
    #[error("signing key does not match the requested scheme")]
    KeyMismatch,
}
