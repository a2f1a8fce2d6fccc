use crate::blinding::context::{BlindingContext, HashAlgorithm, VerificationAlgorithm};
use crate::constants::{
    PACKET_TAG_PUBLIC_KEY, PACKET_TAG_SIGNATURE, SIGNATURE_VERSION_V4, SIG_TYPE_PERSONA, SUBPACKET_CREATION_TIME,
    SUBPACKET_ISSUER,
};
use crate::error::BlindingError;
use crate::keys::{KeyManager, PublicKeyMaterial};
use anyhow::{anyhow, Result};
use log::{debug, info};
use num_bigint::BigUint;
use p256::AffinePoint;
use rand::Rng;

/// 署名者が誰の鍵に署名するのかを知らないまま作成される鍵署名パケット
///
/// 署名要求と公開された署名を結び付けられないよう、作成時刻は
/// 対象鍵の有効期間内でランダムに選ぶ。
#[derive(Clone, Debug)]
pub struct BlindSignaturePacket {
    pub target_key: KeyManager,
    pub signer_key: KeyManager,
    pub creation_time: u32,
    pub hasher: HashAlgorithm,
    pub verification_algorithm: VerificationAlgorithm,
    /// ブラインド前のエンコード済みペイロード
    raw_signature: Option<BigUint>,
    /// ハッシュ値の左端 16 ビット
    signed_hash_prefix: [u8; 2],
    /// 完成した署名の MPI 列
    sig: Option<Vec<u8>>,
    /// Andreev 方式で検証に使う公開点 T
    verification_point: Option<AffinePoint>,
}

impl BlindSignaturePacket {
    /// パケットを作成し、コンテキストを使って raw_signature を準備する
    pub fn new<R: Rng>(
        target_key: KeyManager,
        signer_key: KeyManager,
        context: &dyn BlindingContext,
        rng: &mut R,
    ) -> Result<Self> {
        let creation_time = Self::calculate_random_creation_time(&target_key, rng);
        Self::with_creation_time(target_key, signer_key, context, creation_time)
    }

    pub fn with_creation_time(
        target_key: KeyManager,
        signer_key: KeyManager,
        context: &dyn BlindingContext,
        creation_time: u32,
    ) -> Result<Self> {
        let mut packet = Self {
            target_key,
            signer_key,
            creation_time,
            hasher: HashAlgorithm::Sha512,
            verification_algorithm: context.verification_algorithm(),
            raw_signature: None,
            signed_hash_prefix: [0u8; 2],
            sig: None,
            verification_point: None,
        };
        packet.prepare_raw_signature(context)?;
        Ok(packet)
    }

    /// 対象鍵の作成時刻から有効期限までの一様乱数。
    /// 期限がない場合は 2^32 - 1 を上限とする (RFC 4880 3.5)
    pub fn calculate_random_creation_time<R: Rng>(target_key: &KeyManager, rng: &mut R) -> u32 {
        let created = target_key.created;
        let expire = match target_key.expires_in {
            Some(expires_in) if expires_in > 0 => created.saturating_add(expires_in),
            _ => u32::MAX,
        };
        rng.gen_range(created..=expire)
    }

    /// 署名対象のバイト列
    ///
    /// publicKeyData || userIdData || signatureHashData || signatureTrailer
    pub fn produce_payload_bytes(
        target_key: &KeyManager,
        signer_key: &KeyManager,
        creation_time: u32,
    ) -> Result<Vec<u8>> {
        let key_body = target_key.public_key_body()?;
        let key_len = u16::try_from(key_body.len())
            .map_err(|_| anyhow!("public key packet too long: {}", key_body.len()))?;
        let user_id = target_key.primary_user_id()?.as_bytes();

        let mut payload = Vec::new();
        payload.push(0x99);
        payload.extend_from_slice(&key_len.to_be_bytes());
        payload.extend_from_slice(&key_body);

        payload.push(0xb4);
        payload.extend_from_slice(&(user_id.len() as u32).to_be_bytes());
        payload.extend_from_slice(user_id);

        let body = Self::signature_body(signer_key, creation_time);
        payload.extend_from_slice(&body);
        payload.extend_from_slice(&Self::signature_trailer(body.len()));
        debug!("produce_payload_bytes: {} bytes", payload.len());
        Ok(payload)
    }

    // version || type || pk algo || hash algo || hashed subpackets
    fn signature_body(signer_key: &KeyManager, creation_time: u32) -> Vec<u8> {
        let mut subpacket = vec![5, SUBPACKET_CREATION_TIME];
        subpacket.extend_from_slice(&creation_time.to_be_bytes());

        let mut body = vec![
            SIGNATURE_VERSION_V4,
            SIG_TYPE_PERSONA,
            signer_key.algorithm.id(),
            HashAlgorithm::Sha512.id(),
        ];
        body.extend_from_slice(&(subpacket.len() as u16).to_be_bytes());
        body.extend_from_slice(&subpacket);
        body
    }

    fn signature_trailer(body_len: usize) -> Vec<u8> {
        let mut trailer = vec![SIGNATURE_VERSION_V4, 0xff];
        trailer.extend_from_slice(&(body_len as u32).to_be_bytes());
        trailer
    }

    /// 署名データを生成し、コンテキストのエンコードを適用する
    pub fn prepare_raw_signature(&mut self, context: &dyn BlindingContext) -> Result<()> {
        let payload =
            Self::produce_payload_bytes(&self.target_key, &self.signer_key, self.creation_time)?;
        let digest = self.hasher.digest(&payload);
        self.signed_hash_prefix = [digest[0], digest[1]];
        self.raw_signature = Some(context.encode_signature_payload(&payload, self.hasher)?);
        Ok(())
    }

    pub fn raw_signature(&self) -> Result<&BigUint> {
        self.raw_signature
            .as_ref()
            .ok_or_else(|| BlindingError::MissingRawSignature.into())
    }

    pub fn signed_hash_prefix(&self) -> [u8; 2] {
        self.signed_hash_prefix
    }

    pub fn sig(&self) -> Option<&[u8]> {
        self.sig.as_deref()
    }

    pub fn verification_point(&self) -> Option<&AffinePoint> {
        self.verification_point.as_ref()
    }

    pub fn set_signature(&mut self, sig: Vec<u8>, verification_point: Option<AffinePoint>) {
        self.sig = Some(sig);
        self.verification_point = verification_point;
    }

    /// 署名パケットの本体 (RFC 4880 5.2.3)
    pub fn write_unframed(&self) -> Result<Vec<u8>> {
        let sig = self
            .sig
            .as_ref()
            .ok_or_else(|| anyhow!("signature has not been forged yet"))?;

        let mut unhashed = vec![9, SUBPACKET_ISSUER];
        unhashed.extend_from_slice(&self.signer_key.key_id);

        let mut out = Self::signature_body(&self.signer_key, self.creation_time);
        out.extend_from_slice(&(unhashed.len() as u16).to_be_bytes());
        out.extend_from_slice(&unhashed);
        out.extend_from_slice(&self.signed_hash_prefix);
        out.extend_from_slice(sig);
        Ok(out)
    }

    /// 新形式のパケットヘッダを付けた署名パケット
    pub fn to_packet_bytes(&self) -> Result<Vec<u8>> {
        let out = frame_packet(PACKET_TAG_SIGNATURE, &self.write_unframed()?);
        info!("Signature packet serialized: {} bytes", out.len());
        Ok(out)
    }

    /// 署名者の鍵の点を T に置き換えた公開鍵パケット。
    /// T を持たない署名 (RSA, Butun) では None
    pub fn verification_key_packet(&self) -> Result<Option<Vec<u8>>> {
        let t = match self.verification_point {
            Some(t) => t,
            None => return Ok(None),
        };
        let mut key = self.signer_key.clone();
        match &mut key.material {
            PublicKeyMaterial::Ecdsa { point, .. } => *point = t,
            _ => {
                return Err(BlindingError::AlgorithmMismatch {
                    expected: "ECDSA",
                    found: key.algorithm.id(),
                }
                .into())
            }
        }
        Ok(Some(frame_packet(PACKET_TAG_PUBLIC_KEY, &key.public_key_body()?)))
    }

    /// 書き出すバイト列: 検証鍵パケット (ある場合) に署名パケットを続ける
    pub fn export_bytes(&self) -> Result<Vec<u8>> {
        let mut out = self.verification_key_packet()?.unwrap_or_default();
        out.extend(self.to_packet_bytes()?);
        Ok(out)
    }
}

/// 新形式のパケットヘッダ (RFC 4880 4.2.2) を付ける
fn frame_packet(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![0xc0 | tag];
    let len = body.len();
    if len < 192 {
        out.push(len as u8);
    } else if len < 8384 {
        let adjusted = len - 192;
        out.push(((adjusted >> 8) + 192) as u8);
        out.push((adjusted & 0xff) as u8);
    } else {
        out.push(0xff);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
    out.extend_from_slice(body);
    out
}
