use super::context::{BlindingContext, HashAlgorithm, VerificationAlgorithm};
use super::{hashed_token, Blinder, BlinderState};
use crate::error::BlindingError;
use crate::keys::KeyManager;
use crate::packet::BlindSignaturePacket;
use crate::rsa::{emsa_pkcs1_v15_encode, generate_blinding_factor, rsa_verify, PublicKey};
use crate::serialization::to_mpi_buffer;
use crate::transport::{request_rsa_signing, Transport};
use anyhow::Result;
use log::{debug, info, trace};
use num_bigint::BigUint;
use rand::{CryptoRng, Rng};

// 逆元を持たないブラインド係数を引き直す回数の上限
const MAX_FACTOR_ATTEMPTS: usize = 16;

/// RSA ブラインド署名のコンテキスト
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RsaBlindingContext {
    pub modulus: Option<BigUint>,
    pub public_exponent: Option<BigUint>,
    /// r = token · p₁ · p₂ (法 N で可逆)
    pub blinding_factor: Option<BigUint>,
    pub hashed_token: Option<BigUint>,
}

impl RsaBlindingContext {
    /// 署名者の公開鍵から公開パラメータのみを持つコンテキストを作る
    pub fn from_key(key_manager: &KeyManager) -> Result<Self> {
        let key = key_manager.rsa_public_key()?;
        Ok(Self {
            modulus: Some(key.n.clone()),
            public_exponent: Some(key.e.clone()),
            ..Default::default()
        })
    }

    fn public_key(&self) -> Result<PublicKey> {
        match (&self.modulus, &self.public_exponent) {
            (Some(n), Some(e)) => Ok(PublicKey {
                n: n.clone(),
                e: e.clone(),
            }),
            _ => Err(BlindingError::IncompleteContext.into()),
        }
    }
}

impl BlindingContext for RsaBlindingContext {
    fn hashed_token(&self) -> Option<&BigUint> {
        self.hashed_token.as_ref()
    }

    fn contains_all_blinding_information(&self) -> bool {
        self.modulus.is_some()
            && self.public_exponent.is_some()
            && self.blinding_factor.is_some()
            && self.hashed_token.is_some()
    }

    fn encode_signature_payload(&self, data: &[u8], hasher: HashAlgorithm) -> Result<BigUint> {
        let key = self.public_key()?;
        emsa_pkcs1_v15_encode(&hasher.digest(data), key.byte_length())
    }

    fn verification_algorithm(&self) -> VerificationAlgorithm {
        VerificationAlgorithm::Default
    }
}

/// RSA ブラインダー
///
/// blind(m) = m · rᵉ mod N, unblind(s) = s · r⁻¹ mod N
#[derive(Clone, Debug)]
pub struct RsaBlinder {
    key_manager: KeyManager,
    token: BigUint,
    context: RsaBlindingContext,
    state: BlinderState,
}

impl RsaBlinder {
    pub fn new(key_manager: KeyManager, token: BigUint) -> Self {
        Self {
            key_manager,
            token,
            context: RsaBlindingContext::default(),
            state: BlinderState::Unprepared,
        }
    }

    pub fn blinding_context(&self) -> &RsaBlindingContext {
        &self.context
    }

    /// 公開パラメータを鍵から取得し、秘密のブラインド係数を生成する
    pub fn init_context<R: Rng + CryptoRng>(&mut self, rng: &mut R) -> Result<()> {
        let mut context = RsaBlindingContext::from_key(&self.key_manager)?;
        let n = context.public_key()?.n;

        let mut factor = None;
        for attempt in 0..MAX_FACTOR_ATTEMPTS {
            let r = &self.token * generate_blinding_factor(n.bits(), rng)?;
            if (&r % &n).modinv(&n).is_some() {
                factor = Some(r);
                break;
            }
            debug!("init_context: blinding factor not invertible (attempt {})", attempt);
        }
        context.blinding_factor = Some(factor.ok_or(BlindingError::ModInv)?);
        context.hashed_token = Some(hashed_token(&self.token));

        info!("RSA blinding context initialized: modulus bits = {}", n.bits());
        self.context = context;
        self.state = BlinderState::Initialized;
        Ok(())
    }

    fn checked_parts(&self) -> Result<(&BigUint, &BigUint, &BigUint)> {
        match (
            &self.context.modulus,
            &self.context.public_exponent,
            &self.context.blinding_factor,
        ) {
            (Some(n), Some(e), Some(r)) if self.context.contains_all_blinding_information() => {
                Ok((n, e, r))
            }
            _ => Err(BlindingError::IncompleteContext.into()),
        }
    }

    pub fn blind(&self, message: &BigUint) -> Result<BigUint> {
        let (n, e, r) = self.checked_parts()?;
        let blinded = (message * r.modpow(e, n)) % n;
        trace!("rsa blind: blinded = {}", blinded);
        Ok(blinded)
    }

    pub fn unblind(&self, message: &BigUint) -> Result<BigUint> {
        let (n, _, r) = self.checked_parts()?;
        let r_inv = (r % n).modinv(n).ok_or(BlindingError::ModInv)?;
        Ok((message * r_inv) % n)
    }
}

impl Blinder for RsaBlinder {
    fn context(&self) -> &dyn BlindingContext {
        &self.context
    }

    fn state(&self) -> BlinderState {
        self.state
    }

    async fn forge_signature<T: Transport>(
        &mut self,
        packet: &mut BlindSignaturePacket,
        transport: &T,
    ) -> Result<()> {
        if self.state != BlinderState::Initialized {
            return Err(BlindingError::InvalidState(self.state, "forge a signature").into());
        }
        let (n, _, _) = self.checked_parts()?;
        let n = n.clone();
        let message = packet.raw_signature()?.clone();
        let hashed = self
            .context
            .hashed_token
            .clone()
            .ok_or(BlindingError::IncompleteContext)?;

        let blinded = self.blind(&message)?;
        self.state = BlinderState::Blinded;

        let signed_blinded = request_rsa_signing(transport, &blinded, &hashed).await?;
        if signed_blinded >= n {
            return Err(BlindingError::OutOfRange("signed blinded message exceeds modulus").into());
        }
        let signature = self.unblind(&signed_blinded)?;

        let public = self.context.public_key()?;
        if !rsa_verify(&public, &message, &signature) {
            return Err(BlindingError::InvalidSignature.into());
        }

        packet.set_signature(to_mpi_buffer(&signature), None);
        self.state = BlinderState::Forged;
        info!("RSA blind signature forged: {} bits", signature.bits());
        Ok(())
    }
}
