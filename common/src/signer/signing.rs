use crate::curve::{invert, Curve};
use crate::error::BlindingError;
use crate::rsa::{rsa_sign, SecretKey};
use anyhow::Result;
use log::{debug, trace};
use num_bigint::BigUint;
use p256::elliptic_curve::Field;
use p256::{AffinePoint, ProjectivePoint, Scalar};
use rand::{CryptoRng, RngCore};

/// RSA の署名者は状態を持たない: s' = m'^d mod N
pub fn sign_rsa(secret: &SecretKey, blinded_message: &BigUint) -> Result<BigUint> {
    rsa_sign(secret, blinded_message)
}

/// Andreev 方式で署名者が保持する秘密スカラー
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AndreevSecret {
    pub p: Scalar,
    pub q: Scalar,
}

/// 初期化ラウンド: p, q を生成し P = G·p⁻¹, Q = G·p⁻¹·q を返す
pub fn andreev_prepare<R: RngCore + CryptoRng>(
    curve: &Curve,
    rng: &mut R,
) -> Result<(AndreevSecret, AffinePoint, AffinePoint)> {
    let p = curve.random_scalar(rng);
    let q = curve.random_scalar(rng);
    let p_inv = invert(&p)?;
    let big_p = curve.validate(&(curve.generator() * p_inv))?;
    let big_q = curve.validate(&(curve.generator() * (p_inv * q)))?;
    debug!("andreev_prepare: P and Q generated");
    Ok((AndreevSecret { p, q }, big_p, big_q))
}

/// s' = p·m' + q (mod n)
pub fn andreev_sign(secret: &AndreevSecret, blinded_message: &Scalar) -> Scalar {
    secret.p * blinded_message + secret.q
}

/// 初期化ラウンド: ŕ = Ŕ.x mod n が 0 でない k と Ŕ = G·k を選ぶ
pub fn butun_prepare<R: RngCore + CryptoRng>(curve: &Curve, rng: &mut R) -> (Scalar, AffinePoint) {
    butun_prepare_with(curve, || {
        let k = curve.random_scalar(rng);
        (k, curve.generator() * k)
    })
}

/// 候補 (k, Ŕ) の生成を差し替えられる版。条件を満たすまで候補を取り直す
pub fn butun_prepare_with<F>(curve: &Curve, mut candidate: F) -> (Scalar, AffinePoint)
where
    F: FnMut() -> (Scalar, ProjectivePoint),
{
    loop {
        let (k, point) = candidate();
        let affine = point.to_affine();
        let r_prime = curve.x_mod_n(&affine);
        if curve.is_on_curve(&point) && !bool::from(r_prime.is_zero()) {
            return (k, affine);
        }
        trace!("butun_prepare: candidate rejected, retrying");
    }
}

/// ś = d·ŕ + k·ḿ (mod n)
pub fn butun_sign(curve: &Curve, d: &Scalar, k: &Scalar, blinded_message: &Scalar) -> Result<Scalar> {
    let signer_point = curve.validate(&(curve.generator() * k))?;
    let r_prime = curve.x_mod_n(&signer_point);
    if bool::from(r_prime.is_zero()) {
        return Err(BlindingError::ZeroScalar.into());
    }
    Ok(*d * r_prime + *k * blinded_message)
}
