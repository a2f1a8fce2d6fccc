use crate::constants::{
    ANDREEV_INIT_PATH, ANDREEV_SIGN_PATH, BUTUN_INIT_PATH, BUTUN_SIGN_PATH, RSA_PATH,
};
use crate::error::ProtocolError;
use crate::models::{AndreevInitResponse, ButunInitResponse, InitRequest, SignRequest, SignResponse};
use crate::serialization::{biguint_to_radix32, radix32_to_biguint};
use anyhow::Result;
use log::{debug, trace};
use num_bigint::BigUint;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// 署名サーバーとの JSON リクエスト/レスポンス交換
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value>;
}

/// reqwest による HTTP 実装
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Transport for HttpTransport {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let res = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let text = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            return Err(ProtocolError::Transport(text).into());
        }
        let value = res
            .json::<Value>()
            .await
            .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?;
        trace!("response body: {}", value);
        Ok(value)
    }
}

/// `{error}` を含む応答を拒否し、期待する型に変換する
pub fn parse_response<T: DeserializeOwned>(value: Value) -> Result<T> {
    if let Some(error) = value.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ProtocolError::Rejected(message).into());
    }
    serde_json::from_value(value).map_err(|e| ProtocolError::MalformedResponse(e.to_string()).into())
}

async fn exchange<T: Transport, B: Serialize, R: DeserializeOwned>(
    transport: &T,
    path: &str,
    body: &B,
) -> Result<R> {
    let body = serde_json::to_value(body)?;
    let response = transport.post_json(path, &body).await?;
    parse_response(response)
}

fn sign_request(message: &BigUint, hashed_token: &BigUint) -> SignRequest {
    SignRequest {
        message: Some(biguint_to_radix32(message)),
        hashed_token: Some(biguint_to_radix32(hashed_token)),
    }
}

fn init_request(hashed_token: &BigUint) -> InitRequest {
    InitRequest {
        hashed_token: Some(biguint_to_radix32(hashed_token)),
    }
}

/// ECDSA 方式の種類 (エンドポイントのパスに対応)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EcdsaVariant {
    Andreev,
    Butun,
}

impl EcdsaVariant {
    pub fn init_path(&self) -> &'static str {
        match self {
            EcdsaVariant::Andreev => ANDREEV_INIT_PATH,
            EcdsaVariant::Butun => BUTUN_INIT_PATH,
        }
    }

    pub fn sign_path(&self) -> &'static str {
        match self {
            EcdsaVariant::Andreev => ANDREEV_SIGN_PATH,
            EcdsaVariant::Butun => BUTUN_SIGN_PATH,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EcdsaVariant::Andreev => "andreev",
            EcdsaVariant::Butun => "butun",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "andreev" => Some(EcdsaVariant::Andreev),
            "butun" => Some(EcdsaVariant::Butun),
            _ => None,
        }
    }
}

/// ブラインドされたメッセージを RSA で署名してもらう
pub async fn request_rsa_signing<T: Transport>(
    transport: &T,
    blinded_message: &BigUint,
    hashed_token: &BigUint,
) -> Result<BigUint> {
    let response: SignResponse =
        exchange(transport, RSA_PATH, &sign_request(blinded_message, hashed_token)).await?;
    radix32_to_biguint(&response.signed_blinded_message)
}

/// Andreev 方式の初期化ラウンド。戻り値は (Px, Py, Qx, Qy)
pub async fn request_andreev_initialization<T: Transport>(
    transport: &T,
    hashed_token: &BigUint,
) -> Result<[BigUint; 4]> {
    let response: AndreevInitResponse =
        exchange(transport, ANDREEV_INIT_PATH, &init_request(hashed_token)).await?;
    Ok([
        radix32_to_biguint(&response.px)?,
        radix32_to_biguint(&response.py)?,
        radix32_to_biguint(&response.qx)?,
        radix32_to_biguint(&response.qy)?,
    ])
}

/// Butun 方式の初期化ラウンド。戻り値は Ŕ の (x, y)
pub async fn request_butun_initialization<T: Transport>(
    transport: &T,
    hashed_token: &BigUint,
) -> Result<(BigUint, BigUint)> {
    let response: ButunInitResponse =
        exchange(transport, BUTUN_INIT_PATH, &init_request(hashed_token)).await?;
    Ok((
        radix32_to_biguint(&response.rx)?,
        radix32_to_biguint(&response.ry)?,
    ))
}

/// ECDSA 方式の署名ラウンド
pub async fn request_ecdsa_signing<T: Transport>(
    transport: &T,
    variant: EcdsaVariant,
    blinded_message: &BigUint,
    hashed_token: &BigUint,
) -> Result<BigUint> {
    let response: SignResponse = exchange(
        transport,
        variant.sign_path(),
        &sign_request(blinded_message, hashed_token),
    )
    .await?;
    radix32_to_biguint(&response.signed_blinded_message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    // 固定の応答を返し、送信内容を記録するトランスポート
    struct Canned {
        response: Value,
        sent: Mutex<Vec<(String, Value)>>,
    }

    impl Transport for Canned {
        async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
            self.sent
                .lock()
                .unwrap()
                .push((path.to_string(), body.clone()));
            Ok(self.response.clone())
        }
    }

    fn canned(response: Value) -> Canned {
        Canned {
            response,
            sent: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_parse_response_rejects_error() {
        let err = parse_response::<SignResponse>(json!({"error": "Missing Token..."})).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProtocolError>(),
            Some(&ProtocolError::Rejected("Missing Token...".into()))
        );
        let err = parse_response::<SignResponse>(json!({"other": 1})).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_rsa_request_shape() {
        let transport = canned(json!({"signed_blinded_message": "v"}));
        let signed = request_rsa_signing(&transport, &BigUint::from(32u32), &BigUint::from(1u32))
            .await
            .unwrap();
        assert_eq!(signed, BigUint::from(31u32));
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].0, "/rsa");
        assert_eq!(sent[0].1, json!({"message": "10", "hashed_token": "1"}));
    }

    #[tokio::test]
    async fn test_butun_init_invalid_radix() {
        let transport = canned(json!({"Ŕx": "!!", "Ŕy": "1"}));
        let err = request_butun_initialization(&transport, &BigUint::from(1u32))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::InvalidRadix(_))
        ));
    }

    #[tokio::test]
    async fn test_andreev_init_sends_token_only() {
        let transport = canned(json!({"Px": "1", "Py": "2", "Qx": "3", "Qy": "4"}));
        let values = request_andreev_initialization(&transport, &BigUint::from(5u32))
            .await
            .unwrap();
        assert_eq!(values[3], BigUint::from(4u32));
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].0, ANDREEV_INIT_PATH);
        assert_eq!(sent[0].1, json!({"hashed_token": "5"}));
    }

    #[test]
    fn test_variant_names() {
        for variant in [EcdsaVariant::Andreev, EcdsaVariant::Butun] {
            assert_eq!(EcdsaVariant::from_name(variant.name()), Some(variant));
        }
        assert_eq!(EcdsaVariant::from_name("rsa"), None);
        assert_eq!(EcdsaVariant::Butun.sign_path(), "/ecdsa/butun/sign");
    }
}
