//! Butun–Demirer の ECDSA ブラインド署名
//!
//! 変数名は論文の記法 (Ŕ, ŕ, ḿ, ś) に従う。

use super::context::{
    ecdsa_message_scalar, encode_hash_as_integer, BlindingContext, HashAlgorithm,
    VerificationAlgorithm,
};
use super::{hashed_token, Blinder, BlinderState};
use crate::curve::{invert, Curve};
use crate::error::BlindingError;
use crate::keys::KeyManager;
use crate::packet::BlindSignaturePacket;
use crate::serialization::to_mpi_buffer;
use crate::transport::{
    request_butun_initialization, request_ecdsa_signing, EcdsaVariant, Transport,
};
use anyhow::Result;
use log::{info, trace};
use num_bigint::BigUint;
use p256::elliptic_curve::Field;
use p256::{AffinePoint, ProjectivePoint, Scalar};
use rand::{CryptoRng, RngCore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButunBlindingFactor {
    pub a: Scalar,
    pub b: Scalar,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ButunEcdsaBlindingContext {
    pub curve: Option<Curve>,
    /// 署名者の公開鍵 Y (無限遠点ではない曲線上の点)
    pub signers_public_key: Option<AffinePoint>,
    pub blinding_factor: Option<ButunBlindingFactor>,
    pub hashed_token: Option<BigUint>,
}

impl ButunEcdsaBlindingContext {
    pub fn from_key(key_manager: &KeyManager) -> Result<Self> {
        let (curve, point) = key_manager.ecdsa_public_point()?;
        Ok(Self {
            curve: Some(curve),
            signers_public_key: Some(point),
            ..Default::default()
        })
    }
}

impl BlindingContext for ButunEcdsaBlindingContext {
    fn hashed_token(&self) -> Option<&BigUint> {
        self.hashed_token.as_ref()
    }

    fn contains_all_blinding_information(&self) -> bool {
        let key_is_valid = match (self.curve, self.signers_public_key) {
            (Some(curve), Some(point)) => curve.is_on_curve(&ProjectivePoint::from(point)),
            _ => false,
        };
        key_is_valid && self.blinding_factor.is_some() && self.hashed_token.is_some()
    }

    fn encode_signature_payload(&self, data: &[u8], hasher: HashAlgorithm) -> Result<BigUint> {
        Ok(encode_hash_as_integer(data, hasher))
    }

    fn verification_algorithm(&self) -> VerificationAlgorithm {
        VerificationAlgorithm::Butun
    }
}

/// 署名者と要求者の公開点
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ButunPublicPoints {
    /// Ŕ = G·k
    pub signer: AffinePoint,
    /// R = Ŕ·a + G·b
    pub requester: AffinePoint,
}

#[derive(Clone, Debug)]
pub struct ButunEcdsaBlinder {
    key_manager: KeyManager,
    token: BigUint,
    context: ButunEcdsaBlindingContext,
    state: BlinderState,
}

impl ButunEcdsaBlinder {
    pub fn new(key_manager: KeyManager, token: BigUint) -> Self {
        Self {
            key_manager,
            token,
            context: ButunEcdsaBlindingContext::default(),
            state: BlinderState::Unprepared,
        }
    }

    pub fn blinding_context(&self) -> &ButunEcdsaBlindingContext {
        &self.context
    }

    pub fn init_context<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<()> {
        let mut context = ButunEcdsaBlindingContext::from_key(&self.key_manager)?;
        let curve = context.curve.ok_or(BlindingError::IncompleteContext)?;
        context.blinding_factor = Some(ButunBlindingFactor {
            a: curve.random_scalar(rng),
            b: curve.random_scalar(rng),
        });
        context.hashed_token = Some(hashed_token(&self.token));
        info!("Butun blinding context initialized on {}", curve.name());
        self.context = context;
        self.state = BlinderState::Initialized;
        Ok(())
    }

    fn checked_parts(&self) -> Result<(Curve, ButunBlindingFactor)> {
        match (self.context.curve, self.context.blinding_factor) {
            (Some(curve), Some(factor)) if self.context.contains_all_blinding_information() => {
                Ok((curve, factor))
            }
            _ => Err(BlindingError::IncompleteContext.into()),
        }
    }

    /// 署名者の Ŕ を検証し、R = Ŕ·a + G·b を計算する
    pub fn derive_public_points(&self, signer: &AffinePoint) -> Result<ButunPublicPoints> {
        let (curve, f) = self.checked_parts()?;
        let signer = curve.validate(&ProjectivePoint::from(*signer))?;
        // 0 < ŕ < n
        if bool::from(curve.x_mod_n(&signer).is_zero()) {
            return Err(BlindingError::ZeroScalar.into());
        }
        let requester =
            curve.validate(&(ProjectivePoint::from(signer) * f.a + curve.generator() * f.b))?;
        Ok(ButunPublicPoints { signer, requester })
    }

    /// 初期化ラウンドを実行する
    pub async fn request_public_points<T: Transport>(
        &self,
        transport: &T,
    ) -> Result<ButunPublicPoints> {
        let (curve, _) = self.checked_parts()?;
        let hashed = self
            .context
            .hashed_token
            .as_ref()
            .ok_or(BlindingError::IncompleteContext)?;
        let (x, y) = request_butun_initialization(transport, hashed).await?;
        let signer = curve.mkpoint(&x, &y)?;
        self.derive_public_points(&signer)
    }

    /// ḿ = a·m·ŕ·r⁻¹ (mod n)
    pub fn blind(&self, message: &Scalar, points: &ButunPublicPoints) -> Result<Scalar> {
        let (curve, f) = self.checked_parts()?;
        let r = curve.x_mod_n(&points.requester);
        let r_inv = invert(&r)?;
        let r_prime = curve.x_mod_n(&points.signer);
        Ok(f.a * message * r_prime * r_inv)
    }

    /// s = ś·r·ŕ⁻¹ + b·m (mod n)
    pub fn unblind(
        &self,
        signed_blinded_message: &Scalar,
        message: &Scalar,
        points: &ButunPublicPoints,
    ) -> Result<Scalar> {
        let (curve, f) = self.checked_parts()?;
        if bool::from(signed_blinded_message.is_zero()) {
            return Err(BlindingError::OutOfRange("signed blinded message is zero").into());
        }
        let r = curve.x_mod_n(&points.requester);
        let r_prime_inv = invert(&curve.x_mod_n(&points.signer))?;
        let s = *signed_blinded_message * r * r_prime_inv + f.b * message;
        if bool::from(s.is_zero()) {
            return Err(BlindingError::ZeroScalar.into());
        }
        trace!("butun unblind: s computed");
        Ok(s)
    }
}

/// Butun 署名の検証: s·G = r·Y + m·R
pub fn verify(
    curve: &Curve,
    signers_public_key: &AffinePoint,
    message: &Scalar,
    s: &Scalar,
    requester: &AffinePoint,
) -> bool {
    let r = curve.x_mod_n(requester);
    let lhs = curve.generator() * s;
    let rhs =
        ProjectivePoint::from(*signers_public_key) * r + ProjectivePoint::from(*requester) * message;
    lhs == rhs
}

impl Blinder for ButunEcdsaBlinder {
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
        let signers_public_key = self
            .context
            .signers_public_key
            .ok_or(BlindingError::IncompleteContext)?;
        let message = ecdsa_message_scalar(&curve, packet.raw_signature()?)?;

        let points = self.request_public_points(transport).await?;
        let blinded = self.blind(&message, &points)?;
        self.state = BlinderState::Blinded;

        let signed = request_ecdsa_signing(
            transport,
            EcdsaVariant::Butun,
            &curve.scalar_to_biguint(&blinded),
            &hashed,
        )
        .await?;
        let signed = curve.scalar_from_biguint(&signed)?;
        let s = self.unblind(&signed, &message, &points)?;

        if !verify(&curve, &signers_public_key, &message, &s, &points.requester) {
            return Err(BlindingError::InvalidSignature.into());
        }

        let mut sig = to_mpi_buffer(&curve.scalar_to_biguint(&s));
        sig.extend(curve.point_to_mpi_buffer(&points.requester));
        packet.set_signature(sig, None);
        self.state = BlinderState::Forged;
        info!("Butun blind signature forged");
        Ok(())
    }
}
