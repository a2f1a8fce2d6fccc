use super::context::{
    ecdsa_message_scalar, encode_hash_as_integer, BlindingContext, HashAlgorithm,
    VerificationAlgorithm,
};
use super::{hashed_token, Blinder, BlinderState};
use crate::curve::{ecdsa_verify, invert, Curve};
use crate::error::BlindingError;
use crate::keys::KeyManager;
use crate::packet::BlindSignaturePacket;
use crate::serialization::to_mpi_buffer;
use crate::transport::{
    request_andreev_initialization, request_ecdsa_signing, EcdsaVariant, Transport,
};
use anyhow::Result;
use log::{debug, info};
use num_bigint::BigUint;
use p256::elliptic_curve::Field;
use p256::{AffinePoint, ProjectivePoint, Scalar};
use rand::{CryptoRng, RngCore};

/// Andreev 方式のブラインド係数 (いずれも [1, n-1] の乱数)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AndreevBlindingFactor {
    pub a: Scalar,
    pub b: Scalar,
    pub c: Scalar,
    pub d: Scalar,
}

impl AndreevBlindingFactor {
    pub fn random<R: RngCore + CryptoRng>(curve: &Curve, rng: &mut R) -> Self {
        Self {
            a: curve.random_scalar(rng),
            b: curve.random_scalar(rng),
            c: curve.random_scalar(rng),
            d: curve.random_scalar(rng),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EcdsaAndreevBlindingContext {
    pub curve: Option<Curve>,
    /// 署名者の公開鍵
    pub public_point: Option<AffinePoint>,
    pub blinding_factor: Option<AndreevBlindingFactor>,
    pub hashed_token: Option<BigUint>,
}

impl EcdsaAndreevBlindingContext {
    pub fn from_key(key_manager: &KeyManager) -> Result<Self> {
        let (curve, point) = key_manager.ecdsa_public_point()?;
        Ok(Self {
            curve: Some(curve),
            public_point: Some(point),
            ..Default::default()
        })
    }
}

impl BlindingContext for EcdsaAndreevBlindingContext {
    fn hashed_token(&self) -> Option<&BigUint> {
        self.hashed_token.as_ref()
    }

    fn contains_all_blinding_information(&self) -> bool {
        self.curve.is_some()
            && self.public_point.is_some()
            && self.blinding_factor.is_some()
            && self.hashed_token.is_some()
    }

    fn encode_signature_payload(&self, data: &[u8], hasher: HashAlgorithm) -> Result<BigUint> {
        Ok(encode_hash_as_integer(data, hasher))
    }

    // (r, s) は公開鍵 T に対する通常の ECDSA 署名として検証できる
    fn verification_algorithm(&self) -> VerificationAlgorithm {
        VerificationAlgorithm::Default
    }
}

/// 初期化ラウンドから導出される公開値
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AndreevPublicPoints {
    /// r = K.x mod n, K = P·(c·a)⁻¹
    pub r: Scalar,
    /// 署名検証用の公開鍵 T
    pub t: AffinePoint,
}

/// Andreev 方式の ECDSA ブラインダー
#[derive(Clone, Debug)]
pub struct EcdsaAndreevBlinder {
    key_manager: KeyManager,
    token: BigUint,
    context: EcdsaAndreevBlindingContext,
    state: BlinderState,
}

impl EcdsaAndreevBlinder {
    pub fn new(key_manager: KeyManager, token: BigUint) -> Self {
        Self {
            key_manager,
            token,
            context: EcdsaAndreevBlindingContext::default(),
            state: BlinderState::Unprepared,
        }
    }

    pub fn blinding_context(&self) -> &EcdsaAndreevBlindingContext {
        &self.context
    }

    pub fn init_context<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<()> {
        let mut context = EcdsaAndreevBlindingContext::from_key(&self.key_manager)?;
        let curve = context.curve.ok_or(BlindingError::IncompleteContext)?;
        context.blinding_factor = Some(AndreevBlindingFactor::random(&curve, rng));
        context.hashed_token = Some(hashed_token(&self.token));
        info!("Andreev blinding context initialized on {}", curve.name());
        self.context = context;
        self.state = BlinderState::Initialized;
        Ok(())
    }

    fn checked_parts(&self) -> Result<(Curve, AndreevBlindingFactor)> {
        match (self.context.curve, self.context.blinding_factor) {
            (Some(curve), Some(factor)) if self.context.contains_all_blinding_information() => {
                Ok((curve, factor))
            }
            _ => Err(BlindingError::IncompleteContext.into()),
        }
    }

    /// 署名者の P, Q から r と T を計算する
    ///
    /// T = (P·c⁻¹·d + Q + G·b)·(a·r)⁻¹
    pub fn derive_public_points(
        &self,
        p: &AffinePoint,
        q: &AffinePoint,
    ) -> Result<AndreevPublicPoints> {
        let (curve, f) = self.checked_parts()?;
        let p = ProjectivePoint::from(curve.validate(&ProjectivePoint::from(*p))?);
        let q = ProjectivePoint::from(curve.validate(&ProjectivePoint::from(*q))?);

        let k = curve.validate(&(p * invert(&(f.c * f.a))?))?;
        let r = curve.x_mod_n(&k);
        if bool::from(r.is_zero()) {
            return Err(BlindingError::ZeroScalar.into());
        }

        let sum = p * invert(&f.c)? * f.d + q + curve.generator() * f.b;
        let t = curve.validate(&(sum * invert(&(f.a * r))?))?;
        debug!("derive_public_points: T computed");
        Ok(AndreevPublicPoints { r, t })
    }

    /// 初期化ラウンドを実行し、署名者の P, Q から公開値を導出する
    pub async fn request_public_points<T: Transport>(
        &self,
        transport: &T,
    ) -> Result<AndreevPublicPoints> {
        let (curve, _) = self.checked_parts()?;
        let hashed = self
            .context
            .hashed_token
            .as_ref()
            .ok_or(BlindingError::IncompleteContext)?;
        let [px, py, qx, qy] = request_andreev_initialization(transport, hashed).await?;
        let p = curve.mkpoint(&px, &py)?;
        let q = curve.mkpoint(&qx, &qy)?;
        self.derive_public_points(&p, &q)
    }

    /// m' = m·a + b (mod n)
    pub fn blind(&self, message: &Scalar) -> Result<Scalar> {
        let (_, f) = self.checked_parts()?;
        Ok(*message * f.a + f.b)
    }

    /// s = s'·c + d (mod n)
    pub fn unblind(&self, message: &Scalar) -> Result<Scalar> {
        let (_, f) = self.checked_parts()?;
        Ok(*message * f.c + f.d)
    }
}

impl Blinder for EcdsaAndreevBlinder {
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
        let (curve, _) = self.checked_parts()?;
        let hashed = self
            .context
            .hashed_token
            .clone()
            .ok_or(BlindingError::IncompleteContext)?;
        let message = ecdsa_message_scalar(&curve, packet.raw_signature()?)?;

        let points = self.request_public_points(transport).await?;
        let blinded = self.blind(&message)?;
        self.state = BlinderState::Blinded;

        let signed = request_ecdsa_signing(
            transport,
            EcdsaVariant::Andreev,
            &curve.scalar_to_biguint(&blinded),
            &hashed,
        )
        .await?;
        let signed = curve.scalar_from_biguint(&signed)?;
        if bool::from(signed.is_zero()) {
            return Err(BlindingError::OutOfRange("signed blinded message is zero").into());
        }

        let s = self.unblind(&signed)?;
        if !ecdsa_verify(&curve, &points.t, &message, &points.r, &s) {
            return Err(BlindingError::InvalidSignature.into());
        }

        let mut sig = to_mpi_buffer(&curve.scalar_to_biguint(&points.r));
        sig.extend(to_mpi_buffer(&curve.scalar_to_biguint(&s)));
        packet.set_signature(sig, Some(points.t));
        self.state = BlinderState::Forged;
        info!("Andreev blind signature forged");
        Ok(())
    }
}
