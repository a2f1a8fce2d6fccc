use crate::constants::HASH_ALGORITHM_SHA512;
use crate::curve::Curve;
use crate::serialization::to_fixed_be_bytes;
use anyhow::Result;
use num_bigint::BigUint;
use p256::Scalar;
use sha2::{Digest, Sha512};

/// 署名ペイロードのハッシュ関数
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha512,
}

impl HashAlgorithm {
    /// RFC 4880 9.4 のアルゴリズム ID
    pub fn id(&self) -> u8 {
        match self {
            HashAlgorithm::Sha512 => HASH_ALGORITHM_SHA512,
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// 署名の検証方式を示すタグ
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum VerificationAlgorithm {
    Default = 0,
    Butun = 1,
}

/// アルゴリズムごとのブラインド処理の状態
///
/// 公開パラメータは署名者の鍵から、秘密のブラインド係数は
/// ブラインダーの初期化時に設定される。
pub trait BlindingContext {
    fn hashed_token(&self) -> Option<&BigUint>;

    /// 必要なフィールドがすべて揃っているか。ゼロも「存在する値」として扱う
    fn contains_all_blinding_information(&self) -> bool;

    /// 署名データをアルゴリズムに応じた整数にエンコードする
    fn encode_signature_payload(&self, data: &[u8], hasher: HashAlgorithm) -> Result<BigUint>;

    fn verification_algorithm(&self) -> VerificationAlgorithm;
}

/// 具体的なコンテキスト型であり、かつ情報が揃っている場合のみ true
pub fn is_valid_blinding_context<C: BlindingContext>(context: Option<&C>) -> bool {
    context.is_some_and(|c| c.contains_all_blinding_information())
}

/// ECDSA 系コンテキストのペイロード: ハッシュ値をそのまま整数として扱う
pub(crate) fn encode_hash_as_integer(data: &[u8], hasher: HashAlgorithm) -> BigUint {
    BigUint::from_bytes_be(&hasher.digest(data))
}

/// エンコード済みペイロードから ECDSA の署名対象スカラーを取り出す
pub fn ecdsa_message_scalar(curve: &Curve, raw_signature: &BigUint) -> Result<Scalar> {
    let bytes = to_fixed_be_bytes(raw_signature, HashAlgorithm::Sha512.output_len())?;
    Ok(curve.trunc_hash(&bytes))
}
