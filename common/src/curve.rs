use crate::error::BlindingError;
use crate::serialization::{mpi_from_be_bytes, to_fixed_be_bytes};
use anyhow::Result;
use log::trace;
use num_bigint::BigUint;
use p256::elliptic_curve::{
    group::Group,
    ops::Reduce,
    point::AffineCoordinates,
    sec1::{FromEncodedPoint, ToEncodedPoint},
    Field, PrimeField,
};
use p256::{AffinePoint, EncodedPoint, FieldBytes, NonZeroScalar, ProjectivePoint, Scalar, U256};
use rand::{CryptoRng, RngCore};

// P-256 の基点の位数 n
// OpenPGP で使用される P-256 の OID (1.2.840.10045.3.1.7)
const P256_OID: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
const P256_SCALAR_BYTES: usize = 32;

/// 署名者の鍵が属する楕円曲線
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Curve {
    NistP256,
}

impl Curve {
    pub fn name(&self) -> &'static str {
        match self {
            Curve::NistP256 => "NIST P-256",
        }
    }

    pub fn oid(&self) -> &'static [u8] {
        match self {
            Curve::NistP256 => P256_OID,
        }
    }

    pub fn generator(&self) -> ProjectivePoint {
        ProjectivePoint::GENERATOR
    }

    /// [1, n-1] の一様乱数スカラー
    pub fn random_scalar<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Scalar {
        *NonZeroScalar::random(rng)
    }

    /// アフィン座標から点を復元する。曲線上にない場合はエラー
    pub fn mkpoint(&self, x: &BigUint, y: &BigUint) -> Result<AffinePoint> {
        let x = to_fixed_be_bytes(x, P256_SCALAR_BYTES)
            .map_err(|_| BlindingError::PointNotOnCurve)?;
        let y = to_fixed_be_bytes(y, P256_SCALAR_BYTES)
            .map_err(|_| BlindingError::PointNotOnCurve)?;
        let encoded = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(&x),
            FieldBytes::from_slice(&y),
            false,
        );
        Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or_else(|| BlindingError::PointNotOnCurve.into())
    }

    /// SEC1 形式 (0x04 || x || y) のバイト列から点を復元する
    pub fn decode_sec1(&self, bytes: &[u8]) -> Result<AffinePoint> {
        let encoded =
            EncodedPoint::from_bytes(bytes).map_err(|_| BlindingError::PointNotOnCurve)?;
        let point: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
        let point = point.ok_or(BlindingError::PointNotOnCurve)?;
        self.validate(&ProjectivePoint::from(point))
    }

    /// 演算結果の点が無限遠点でなく、曲線上にあることを確認する
    pub fn validate(&self, point: &ProjectivePoint) -> Result<AffinePoint> {
        if bool::from(point.is_identity()) {
            return Err(BlindingError::IdentityPoint.into());
        }
        let affine = point.to_affine();
        let reencoded: Option<AffinePoint> =
            AffinePoint::from_encoded_point(&affine.to_encoded_point(false)).into();
        reencoded.ok_or_else(|| BlindingError::PointNotOnCurve.into())
    }

    pub fn is_on_curve(&self, point: &ProjectivePoint) -> bool {
        self.validate(point).is_ok()
    }

    /// 点のアフィン座標 (x, y)
    pub fn coordinates(&self, point: &AffinePoint) -> (BigUint, BigUint) {
        let encoded = point.to_encoded_point(false);
        let x = encoded.x().map(|x| BigUint::from_bytes_be(x)).unwrap_or_default();
        let y = encoded.y().map(|y| BigUint::from_bytes_be(y)).unwrap_or_default();
        (x, y)
    }

    /// x 座標を n で剰余したスカラー
    pub fn x_mod_n(&self, point: &AffinePoint) -> Scalar {
        let x = point.x();
        let r = <Scalar as Reduce<U256>>::reduce_bytes(&x);
        trace!("x_mod_n: r = {:?}", r);
        r
    }

    /// n 未満の整数をスカラーに変換する
    pub fn scalar_from_biguint(&self, value: &BigUint) -> Result<Scalar> {
        let bytes = to_fixed_be_bytes(value, P256_SCALAR_BYTES)
            .map_err(|_| BlindingError::OutOfRange("scalar exceeds curve order"))?;
        Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(&bytes)))
            .ok_or_else(|| BlindingError::OutOfRange("scalar exceeds curve order").into())
    }

    pub fn scalar_to_biguint(&self, scalar: &Scalar) -> BigUint {
        BigUint::from_bytes_be(&scalar.to_bytes())
    }

    /// ハッシュ値の左端 n ビットを取り出し、スカラーとして扱う
    pub fn trunc_hash(&self, hash: &[u8]) -> Scalar {
        let mut bytes = [0u8; P256_SCALAR_BYTES];
        if hash.len() >= P256_SCALAR_BYTES {
            bytes.copy_from_slice(&hash[..P256_SCALAR_BYTES]);
        } else {
            bytes[P256_SCALAR_BYTES - hash.len()..].copy_from_slice(hash);
        }
        <Scalar as Reduce<U256>>::reduce_bytes(FieldBytes::from_slice(&bytes))
    }

    /// 点を非圧縮 SEC1 形式の MPI としてエンコードする
    pub fn point_to_mpi_buffer(&self, point: &AffinePoint) -> Vec<u8> {
        mpi_from_be_bytes(point.to_encoded_point(false).as_bytes())
    }
}

/// 逆元 (ゼロの場合はエラー)
pub fn invert(scalar: &Scalar) -> Result<Scalar> {
    Option::<Scalar>::from(scalar.invert()).ok_or_else(|| BlindingError::ZeroScalar.into())
}

/// 標準 ECDSA 署名 (r, s) を公開鍵で検証する
pub fn ecdsa_verify(
    curve: &Curve,
    public_key: &AffinePoint,
    message: &Scalar,
    r: &Scalar,
    s: &Scalar,
) -> bool {
    if bool::from(r.is_zero()) || bool::from(s.is_zero()) {
        return false;
    }
    let w = match invert(s) {
        Ok(w) => w,
        Err(_) => return false,
    };
    let u1 = *message * w;
    let u2 = *r * w;
    let point = curve.generator() * u1 + ProjectivePoint::from(*public_key) * u2;
    match curve.validate(&point) {
        Ok(affine) => curve.x_mod_n(&affine) == *r,
        Err(_) => false,
    }
}
