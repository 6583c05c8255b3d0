use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Generate a webhook transmission signature.
///
/// Format: HMAC-SHA256(transmission_id|transmission_time|webhook_id|body_hash, secret)
/// where `body_hash` is the hex SHA-256 of the raw request body.
pub fn generate_webhook_signature(
    secret: &str,
    transmission_id: &str,
    transmission_time: &str,
    webhook_id: &str,
    body: &[u8],
) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    let body_hash = hex::encode(Sha256::digest(body));
    let payload = format!(
        "{}|{}|{}|{}",
        transmission_id, transmission_time, webhook_id, body_hash
    );

    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a webhook transmission signature using constant-time comparison.
///
/// Must be called on the raw body bytes, before any parsing.
pub fn verify_webhook_signature(
    secret: &str,
    transmission_id: &str,
    transmission_time: &str,
    webhook_id: &str,
    body: &[u8],
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected = generate_webhook_signature(
        secret,
        transmission_id,
        transmission_time,
        webhook_id,
        body,
    )?;

    let expected_bytes = expected.as_bytes();
    let signature_bytes = signature.trim().to_ascii_lowercase().into_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(&signature_bytes).into())
}
