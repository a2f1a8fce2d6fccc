use crate::constants::{self, MIN_RSA_BLINDING_BITS};
use crate::error::BlindingError;
use anyhow::{anyhow, Result};
use log::{debug, info, trace};
use num_bigint::BigUint;
use num_prime::RandPrime;
use num_traits::{One, Zero};
use rand::Rng;

// SHA-512 の DigestInfo プレフィックス (RFC 8017 9.2 注記 1)
const SHA512_DIGEST_INFO: &[u8] = &[
    0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03,
    0x05, 0x00, 0x04, 0x40,
];

// RSA公開鍵を表す構造体
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    // モジュラス (法)
    pub n: BigUint,
    // 公開指数
    pub e: BigUint,
}

// RSA秘密鍵を表す構造体
#[derive(Clone, Debug)]
pub struct SecretKey {
    // 秘密指数
    pub d: BigUint,
    // モジュラス (公開鍵と共通)
    pub n: BigUint,
}

// RSA鍵ペア (公開鍵と秘密鍵) を表す構造体
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

impl PublicKey {
    /// モジュラスのバイト長 (MPI のバイト長と同じ)
    pub fn byte_length(&self) -> usize {
        ((self.n.bits() + 7) / 8) as usize
    }
}

/// RSA署名生成 (m^d mod n)
/// 署名者はブラインドされたメッセージの内容を知らないまま署名する
pub fn rsa_sign(secret: &SecretKey, m: &BigUint) -> Result<BigUint> {
    // 内部不変条件: n > 0, d > 0
    assert!(!secret.n.is_zero(), "RSA秘密鍵nが0です");
    assert!(!secret.d.is_zero(), "RSA秘密鍵dが0です");
    info!(
        "RSA署名生成開始: n bits = {}, m bits = {}",
        secret.n.bits(),
        m.bits()
    );
    if m >= &secret.n {
        return Err(BlindingError::OutOfRange("rsa message exceeds modulus").into());
    }
    let signature = m.modpow(&secret.d, &secret.n);
    info!("RSA署名生成完了: {} bits", signature.bits());
    trace!("RSA署名生成完了: signature = {}", signature);
    Ok(signature)
}

/// RSA署名検証 (s^e mod n == m)
pub fn rsa_verify(pubkey: &PublicKey, m: &BigUint, signature: &BigUint) -> bool {
    assert!(!pubkey.n.is_zero(), "RSA公開鍵nが0です");
    if signature >= &pubkey.n {
        return false;
    }
    let verification = signature.modpow(&pubkey.e, &pubkey.n) == *m;
    debug!("RSA署名検証結果: {}", verification);
    verification
}

/// EMSA-PKCS1-v1_5 エンコード (SHA-512)
/// hashed: 署名データのハッシュ値
/// target_length: モジュラスのバイト長
pub fn emsa_pkcs1_v15_encode(hashed: &[u8], target_length: usize) -> Result<BigUint> {
    let t_len = SHA512_DIGEST_INFO.len() + hashed.len();
    // 0x00 0x01 PS(最低8バイト) 0x00 T
    if target_length < t_len + 11 {
        return Err(anyhow!(
            "intended encoded message length too short: {} < {}",
            target_length,
            t_len + 11
        ));
    }
    let mut em = Vec::with_capacity(target_length);
    em.push(0x00);
    em.push(0x01);
    em.extend(std::iter::repeat(0xff).take(target_length - t_len - 3));
    em.push(0x00);
    em.extend_from_slice(SHA512_DIGEST_INFO);
    em.extend_from_slice(hashed);
    debug!("emsa_pkcs1_v15_encode: em length = {}", em.len());
    Ok(BigUint::from_bytes_be(&em))
}

/// ブラインド係数の元になる 2 つの素数の積を生成する
/// bits: モジュラスのビット長。各素数はその半分のビット長を持つ
pub fn generate_blinding_factor(bits: u64, rng: &mut impl Rng) -> Result<BigUint> {
    if bits < MIN_RSA_BLINDING_BITS {
        return Err(BlindingError::ModulusTooSmall(bits).into());
    }
    let sub_prime_length = (bits / 2) as usize;
    debug!("generate_blinding_factor: sub prime bits = {}", sub_prime_length);
    let p1: BigUint = rng.gen_prime_exact(sub_prime_length, None);
    let p2: BigUint = rng.gen_prime_exact(sub_prime_length, None);
    Ok(p1 * p2)
}

/// RSA鍵ペア生成 (テストおよびデモ用の署名者鍵)
/// bits: 生成する鍵のビット長 (素数p, qのビット長の合計)
/// rng: 乱数生成器
pub fn generate_keypair(bits: usize, rng: &mut impl Rng) -> Result<KeyPair> {
    info!("RSA鍵ペア生成開始: bits = {}", bits);
    loop {
        // 指定されたビット長の半分を持つ素数 p, q を生成
        let p: BigUint = rng.gen_prime_exact(bits / 2, None);
        let q: BigUint = rng.gen_prime_exact(bits / 2, None);
        if p == q {
            continue;
        }
        // モジュラス n = p * q を計算
        let n = &p * &q;
        if n.bits() as usize != bits {
            continue;
        }
        // オイラーのトーシェント関数 φ(n) = (p-1)*(q-1) を計算
        let phi = (&p - BigUint::one()) * (&q - BigUint::one());
        let e = BigUint::from(constants::E);
        // e と φ(n) のモジュラ逆数 d を計算 (秘密指数)
        let d = match e.modinv(&phi) {
            Some(val) => val,
            // e と φ(n) が互いに素でない場合は素数を取り直す
            None => continue,
        };
        let keypair = KeyPair {
            public: PublicKey {
                n: n.clone(),
                e,
            },
            secret: SecretKey { d, n },
        };
        info!("RSA鍵ペア生成完了: n bits = {}", keypair.public.n.bits());
        return Ok(keypair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::RandBigInt;
    use num_prime::nt_funcs::is_prime;
    use rand::thread_rng;
    use sha2::{Digest, Sha512};

    // テストで使用するRSA鍵のビット長
    const TEST_RSA_BITS: usize = 1024;

    // RSA署名と検証が成功するかのテスト
    #[test]
    fn test_rsa_sign_success() {
        let mut rng = thread_rng();
        let keypair = generate_keypair(TEST_RSA_BITS, &mut rng).unwrap();
        let hash = Sha512::digest(b"Test message");
        let m = emsa_pkcs1_v15_encode(&hash, keypair.public.byte_length()).unwrap();
        let signature = rsa_sign(&keypair.secret, &m).unwrap();
        assert!(rsa_verify(&keypair.public, &m, &signature));
    }

    // RSA署名検証が異なるメッセージで失敗するかのテスト
    #[test]
    fn test_rsa_sign_fail() {
        let mut rng = thread_rng();
        let keypair = generate_keypair(TEST_RSA_BITS, &mut rng).unwrap();
        let m = rng.gen_biguint_below(&keypair.public.n);
        let signature = rsa_sign(&keypair.secret, &m).unwrap();
        let wrong_m = (&m + 1u32) % &keypair.public.n;
        assert!(!rsa_verify(&keypair.public, &wrong_m, &signature));
    }

    // モジュラス以上のメッセージは署名しない
    #[test]
    fn test_rsa_sign_rejects_oversized_message() {
        let mut rng = thread_rng();
        let keypair = generate_keypair(512, &mut rng).unwrap();
        let m = keypair.public.n.clone();
        let err = rsa_sign(&keypair.secret, &m).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BlindingError>(),
            Some(BlindingError::OutOfRange(_))
        ));
    }

    // EMSA-PKCS1-v1_5 のレイアウトテスト
    #[test]
    fn test_emsa_layout() {
        let hash = Sha512::digest(b"payload");
        let encoded = emsa_pkcs1_v15_encode(&hash, 128).unwrap();
        // 先頭の 0x00 は BigUint では落ちるため 127 バイト
        let bytes = encoded.to_bytes_be();
        assert_eq!(bytes.len(), 127);
        assert_eq!(bytes[0], 0x01);
        let sep = 127 - SHA512_DIGEST_INFO.len() - hash.len() - 1;
        assert!(bytes[1..sep].iter().all(|b| *b == 0xff));
        assert_eq!(bytes[sep], 0x00);
        assert_eq!(&bytes[bytes.len() - 64..], hash.as_slice());
    }

    #[test]
    fn test_emsa_too_short() {
        let hash = Sha512::digest(b"payload");
        assert!(emsa_pkcs1_v15_encode(&hash, 64).is_err());
    }

    // ブラインド係数のビット長テスト
    #[test]
    fn test_generate_blinding_factor() {
        let mut rng = thread_rng();
        let factor = generate_blinding_factor(512, &mut rng).unwrap();
        // 256 ビット素数 2 つの積は 511 または 512 ビット
        assert!(factor.bits() >= 511 && factor.bits() <= 512);
        assert!(!is_prime(&factor, None).probably());
    }

    #[test]
    fn test_generate_blinding_factor_too_small() {
        let mut rng = thread_rng();
        let err = generate_blinding_factor(128, &mut rng).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BlindingError>(),
            Some(&BlindingError::ModulusTooSmall(128))
        );
    }
}
