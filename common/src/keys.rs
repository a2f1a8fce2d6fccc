use crate::constants::PUBLIC_KEY_VERSION_V4;
use crate::curve::Curve;
use crate::error::BlindingError;
use crate::rsa::{KeyPair, PublicKey, SecretKey};
use crate::serialization::{mpi_from_be_bytes, to_mpi_buffer};
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use num_bigint::BigUint;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{AffinePoint, Scalar};
use sequoia_openpgp::crypto::{mpi, Password};
use sequoia_openpgp::packet::key::SecretKeyMaterial as PgpSecretKeyMaterial;
use sequoia_openpgp::parse::Parse;
use sequoia_openpgp::policy::StandardPolicy;
use sequoia_openpgp::serialize::SerializeInto;
use sequoia_openpgp::types::Curve as PgpCurve;
use sequoia_openpgp::Cert;
use std::fs;
use std::time::UNIX_EPOCH;

/// RFC 4880 9.1 の公開鍵アルゴリズム
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicKeyAlgorithm {
    Rsa,
    RsaEncryptOnly,
    RsaSignOnly,
    Ecdsa,
    Other(u8),
}

impl PublicKeyAlgorithm {
    pub fn id(&self) -> u8 {
        match self {
            PublicKeyAlgorithm::Rsa => 1,
            PublicKeyAlgorithm::RsaEncryptOnly => 2,
            PublicKeyAlgorithm::RsaSignOnly => 3,
            PublicKeyAlgorithm::Ecdsa => 19,
            PublicKeyAlgorithm::Other(id) => *id,
        }
    }
}

impl From<u8> for PublicKeyAlgorithm {
    fn from(id: u8) -> Self {
        match id {
            1 => PublicKeyAlgorithm::Rsa,
            2 => PublicKeyAlgorithm::RsaEncryptOnly,
            3 => PublicKeyAlgorithm::RsaSignOnly,
            19 => PublicKeyAlgorithm::Ecdsa,
            other => PublicKeyAlgorithm::Other(other),
        }
    }
}

/// 公開鍵のアルゴリズム固有のパラメータ
#[derive(Clone, Debug, PartialEq)]
pub enum PublicKeyMaterial {
    Rsa(PublicKey),
    Ecdsa { curve: Curve, point: AffinePoint },
    Unsupported,
}

/// 署名者または署名対象の公開鍵と、署名ペイロードに必要なメタデータ
#[derive(Clone, Debug)]
pub struct KeyManager {
    pub algorithm: PublicKeyAlgorithm,
    pub material: PublicKeyMaterial,
    /// 鍵の作成時刻 (UNIX 秒)
    pub created: u32,
    /// 作成時刻からの有効期間 (秒)。None は無期限
    pub expires_in: Option<u32>,
    pub key_id: [u8; 8],
    /// 先頭がプライマリユーザーID
    pub user_ids: Vec<String>,
    pub armored: Option<String>,
}

impl KeyManager {
    pub fn is_for_rsa_sign(&self) -> bool {
        matches!(
            self.algorithm,
            PublicKeyAlgorithm::Rsa | PublicKeyAlgorithm::RsaSignOnly
        ) && matches!(self.material, PublicKeyMaterial::Rsa(_))
    }

    pub fn is_for_ecdsa_sign(&self) -> bool {
        self.algorithm == PublicKeyAlgorithm::Ecdsa
            && matches!(self.material, PublicKeyMaterial::Ecdsa { .. })
    }

    /// 署名用の RSA 公開鍵 (アルゴリズムが一致しない場合はエラー)
    pub fn rsa_public_key(&self) -> Result<&PublicKey> {
        match (&self.material, self.is_for_rsa_sign()) {
            (PublicKeyMaterial::Rsa(key), true) => Ok(key),
            _ => Err(BlindingError::AlgorithmMismatch {
                expected: "RSA",
                found: self.algorithm.id(),
            }
            .into()),
        }
    }

    /// 署名用の ECDSA 公開点 (アルゴリズムが一致しない場合はエラー)
    pub fn ecdsa_public_point(&self) -> Result<(Curve, AffinePoint)> {
        match (&self.material, self.is_for_ecdsa_sign()) {
            (PublicKeyMaterial::Ecdsa { curve, point }, true) => Ok((*curve, *point)),
            _ => Err(BlindingError::AlgorithmMismatch {
                expected: "ECDSA",
                found: self.algorithm.id(),
            }
            .into()),
        }
    }

    pub fn primary_user_id(&self) -> Result<&str> {
        self.user_ids
            .first()
            .map(String::as_str)
            .ok_or_else(|| anyhow!("key has no user id"))
    }

    /// V4 公開鍵パケットの本体 (RFC 4880 5.5.2)
    pub fn public_key_body(&self) -> Result<Vec<u8>> {
        let mut body = vec![PUBLIC_KEY_VERSION_V4];
        body.extend_from_slice(&self.created.to_be_bytes());
        body.push(self.algorithm.id());
        match &self.material {
            PublicKeyMaterial::Rsa(key) => {
                body.extend(to_mpi_buffer(&key.n));
                body.extend(to_mpi_buffer(&key.e));
            }
            PublicKeyMaterial::Ecdsa { curve, point } => {
                let oid = curve.oid();
                body.push(oid.len() as u8);
                body.extend_from_slice(oid);
                body.extend(mpi_from_be_bytes(point.to_encoded_point(false).as_bytes()));
            }
            PublicKeyMaterial::Unsupported => {
                return Err(BlindingError::UnsupportedAlgorithm(self.algorithm.id()).into())
            }
        }
        Ok(body)
    }
}

/// 署名者の秘密鍵パラメータ
#[derive(Clone, Debug)]
pub enum SecretKeyMaterial {
    Rsa(SecretKey),
    Ecdsa(Scalar),
}

/// 署名サーバーが保持する鍵 (公開鍵情報 + 秘密鍵)
#[derive(Clone, Debug)]
pub struct SignerKeyPair {
    pub public: KeyManager,
    pub secret: SecretKeyMaterial,
}

impl SignerKeyPair {
    /// RSA の鍵ペアとして取り出す
    pub fn rsa_keypair(&self) -> Result<KeyPair> {
        match (&self.secret, self.public.rsa_public_key()) {
            (SecretKeyMaterial::Rsa(secret), Ok(public)) => Ok(KeyPair {
                public: public.clone(),
                secret: secret.clone(),
            }),
            _ => Err(anyhow!("signer key is not an RSA signing key")),
        }
    }

    /// ECDSA の秘密スカラーと曲線を取り出す
    pub fn ecdsa_secret(&self) -> Result<(Curve, Scalar)> {
        match (&self.secret, self.public.ecdsa_public_point()) {
            (SecretKeyMaterial::Ecdsa(d), Ok((curve, _))) => Ok((curve, *d)),
            _ => Err(anyhow!("signer key is not an ECDSA signing key")),
        }
    }
}

fn key_manager_from_cert(cert: &Cert) -> Result<KeyManager> {
    let policy = StandardPolicy::new();
    let key = cert.primary_key().key();
    let algorithm = PublicKeyAlgorithm::from(u8::from(key.pk_algo()));

    // アルゴリズム固有のパラメータを抽出
    let material = match key.mpis() {
        mpi::PublicKey::RSA { e, n } => PublicKeyMaterial::Rsa(PublicKey {
            n: BigUint::from_bytes_be(n.value()),
            e: BigUint::from_bytes_be(e.value()),
        }),
        mpi::PublicKey::ECDSA { curve, q } => {
            if *curve != PgpCurve::NistP256 {
                return Err(BlindingError::UnsupportedCurve(curve.to_string()).into());
            }
            let curve = Curve::NistP256;
            let point = curve.decode_sec1(q.value())?;
            PublicKeyMaterial::Ecdsa { curve, point }
        }
        _ => PublicKeyMaterial::Unsupported,
    };

    let creation_time = key.creation_time();
    let created = creation_time.duration_since(UNIX_EPOCH)?.as_secs() as u32;

    let mut user_ids: Vec<String> = cert
        .userids()
        .map(|ua| String::from_utf8_lossy(ua.userid().value()).into_owned())
        .collect();
    let mut expires_in = None;
    if let Ok(valid) = cert.with_policy(&policy, None) {
        if let Some(expiration) = valid.primary_key().key_expiration_time() {
            expires_in = Some(expiration.duration_since(creation_time)?.as_secs() as u32);
        }
        // プライマリユーザーIDを先頭に移動
        if let Ok(primary) = valid.primary_userid() {
            let primary = String::from_utf8_lossy(primary.userid().value()).into_owned();
            user_ids.retain(|uid| *uid != primary);
            user_ids.insert(0, primary);
        }
    }

    let key_id = <[u8; 8]>::try_from(key.keyid().as_bytes())
        .map_err(|_| anyhow!("unexpected key id length"))?;
    let armored = String::from_utf8(cert.armored().to_vec()?)?;

    debug!(
        "key_manager_from_cert: algorithm = {:?}, created = {}, expires_in = {:?}",
        algorithm, created, expires_in
    );
    Ok(KeyManager {
        algorithm,
        material,
        created,
        expires_in,
        key_id,
        user_ids,
        armored: Some(armored),
    })
}

/// ASCII アーマー形式 (または バイナリ) の公開鍵を読み込む
pub fn load_public_key_from_pgp_str(armored: &str) -> Result<KeyManager> {
    let cert = Cert::from_bytes(armored.as_bytes())?;
    let key_manager = key_manager_from_cert(&cert)?;
    info!(
        "Public key loaded: algorithm id = {}, key id = {}",
        key_manager.algorithm.id(),
        hex::encode(key_manager.key_id)
    );
    Ok(key_manager)
}

pub fn load_public_key_from_pgp(filepath: &str) -> Result<KeyManager> {
    let armored = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read public key file '{}'", filepath))?;
    load_public_key_from_pgp_str(&armored)
}

/// 秘密鍵を読み込む。パスワードが必要なら `Some(password)` を渡す。
pub fn load_signing_key_from_pgp_str(armored: &str, password: Option<&str>) -> Result<SignerKeyPair> {
    let cert = Cert::from_bytes(armored.as_bytes())?;
    let public = key_manager_from_cert(&cert)?;

    let mut key = cert
        .primary_key()
        .key()
        .clone()
        .parts_into_secret()
        .map_err(|_| anyhow!("Secret key not found"))?;

    // 暗号化されているなら復号
    if !key.has_unencrypted_secret() {
        let pw = Password::from(password.unwrap_or(""));
        key = key.decrypt_secret(&pw)?;
    }

    let secret = match key.secret() {
        PgpSecretKeyMaterial::Unencrypted(unencrypted) => unencrypted.map(|m| match m {
            mpi::SecretKeyMaterial::RSA { d, .. } => match &public.material {
                PublicKeyMaterial::Rsa(pk) => Ok(SecretKeyMaterial::Rsa(SecretKey {
                    d: BigUint::from_bytes_be(d.value()),
                    n: pk.n.clone(),
                })),
                _ => Err(anyhow!("RSA secret without RSA public key")),
            },
            mpi::SecretKeyMaterial::ECDSA { scalar } => {
                let value = BigUint::from_bytes_be(scalar.value());
                Ok(SecretKeyMaterial::Ecdsa(
                    Curve::NistP256.scalar_from_biguint(&value)?,
                ))
            }
            _ => Err(BlindingError::UnsupportedAlgorithm(public.algorithm.id()).into()),
        })?,
        PgpSecretKeyMaterial::Encrypted(_) => return Err(anyhow!("Secret key is still locked")),
    };

    info!(
        "Signing key loaded: algorithm id = {}",
        public.algorithm.id()
    );
    Ok(SignerKeyPair { public, secret })
}

pub fn load_signing_key_from_pgp(filepath: &str, password: Option<&str>) -> Result<SignerKeyPair> {
    let armored = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read secret key file '{}'", filepath))?;
    load_signing_key_from_pgp_str(&armored, password)
}
