use anyhow::{anyhow, Context, Result};
use blindsig_common::{
    blinding::{create_blinder_for_key_manager, Blinder, ImplementationHint},
    constants::DEFAULT_SERVER_URL,
    keys::{load_public_key_from_pgp, KeyManager},
    packet::BlindSignaturePacket,
    serialization::hex_to_biguint,
    transport::HttpTransport,
};
use dialoguer::{Input, Select};
use log::{debug, info};
use num_bigint::BigUint;
use num_prime::nt_funcs::is_prime;
use rand::thread_rng;
use std::fs;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let server_url: String = Input::<String>::new()
        .with_prompt("Signer server URL")
        .default(DEFAULT_SERVER_URL.to_string())
        .interact_text()?;

    let schemes = &[
        ("RSA", None),
        ("ECDSA (Butun-Demirer)", Some(ImplementationHint::Butun)),
        ("ECDSA (Andreev)", Some(ImplementationHint::Andreev)),
    ];
    let scheme_idx = Select::new()
        .with_prompt("Select blind signature scheme")
        .items(&schemes.iter().map(|(name, _)| *name).collect::<Vec<_>>())
        .default(0)
        .interact()?;
    let (scheme_name, hint) = schemes[scheme_idx];

    // --- 鍵の読み込み ---
    let default_signer = match hint {
        None => "keys/rsa_1024_pub.asc",
        Some(_) => "keys/ecc_nist_p_256_pub.asc",
    };
    let signer_path = prompt_existing_path("Signer PUBLIC key file path", default_signer)?;
    let target_path = prompt_existing_path("Target PUBLIC key file path", "keys/target_pub.asc")?;

    info!("Loading signer key...");
    let signer_key = load_public_key_from_pgp(&signer_path)
        .with_context(|| format!("Failed to load signer key from '{}'", signer_path))?;
    check_scheme(&signer_key, hint)?;
    info!("Loading target key...");
    let target_key = load_public_key_from_pgp(&target_path)
        .with_context(|| format!("Failed to load target key from '{}'", target_path))?;

    // --- トークン ---
    let token_hex: String = Input::<String>::new()
        .with_prompt("Token (hex, must be a prime)")
        .interact_text()?;
    let token = hex_to_biguint(&token_hex).context("Failed to parse token")?;
    check_token(&token)?;

    // --- ブラインド署名 ---
    info!("Running {} blind signature session with {}", scheme_name, server_url);
    let mut blinder = create_blinder_for_key_manager(&signer_key, &token, hint)
        .context("Failed to create blinder for signer key")?;
    let mut packet =
        BlindSignaturePacket::new(target_key, signer_key, blinder.context(), &mut thread_rng())?;
    debug!("Signature creation time: {}", packet.creation_time);

    let transport = HttpTransport::new(server_url);
    blinder
        .forge_signature(&mut packet, &transport)
        .await
        .context("Blind signature session failed")?;
    info!("Signature forged and verified.");

    // --- 出力 ---
    // Andreev 方式では T の公開鍵パケットが先頭に付く
    let packet_bytes = packet.export_bytes()?;
    if packet.verification_point().is_some() {
        info!("Verification key packet for T included in the output");
    }
    let formats = &["Hex", "Binary"];
    let format_idx = Select::new()
        .with_prompt("Output format")
        .items(formats)
        .default(0)
        .interact()?;
    let output_path: String = Input::<String>::new()
        .with_prompt("Output filename")
        .default(match format_idx {
            0 => "signature.hex".to_string(),
            _ => "signature.sig".to_string(),
        })
        .interact_text()?;

    match format_idx {
        0 => fs::write(&output_path, hex::encode(&packet_bytes)),
        _ => fs::write(&output_path, &packet_bytes),
    }
    .with_context(|| format!("Failed to write signature to '{}'", output_path))?;
    info!(
        "Signature packet ({} bytes) saved to {}",
        packet_bytes.len(),
        output_path
    );

    Ok(())
}

fn prompt_existing_path(prompt: &str, default: &str) -> Result<String> {
    let path = Input::<String>::new()
        .with_prompt(prompt)
        .default(default.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if Path::new(input).exists() {
                Ok(())
            } else {
                Err("File does not exist")
            }
        })
        .interact_text()?;
    Ok(path)
}

// 選択した方式と署名者の鍵の種類が一致するか
fn check_scheme(signer_key: &KeyManager, hint: Option<ImplementationHint>) -> Result<()> {
    match hint {
        None if !signer_key.is_for_rsa_sign() => {
            Err(anyhow!("RSA scheme selected but the signer key is not an RSA signing key"))
        }
        Some(_) if !signer_key.is_for_ecdsa_sign() => {
            Err(anyhow!("ECDSA scheme selected but the signer key is not an ECDSA key"))
        }
        _ => Ok(()),
    }
}

fn check_token(token: &BigUint) -> Result<()> {
    if !is_prime(token, None).probably() {
        return Err(anyhow!("Token is not a prime number"));
    }
    Ok(())
}
