//! Time-based one-time passwords (RFC 6238 over RFC 4226).
//!
//! Secrets are 16 symbols of unpadded Base32 (RFC 4648 alphabet). Codes
//! are six decimal digits derived from HMAC-SHA1 over the 30-second time
//! step counter, with a one-step skew window in each direction to absorb
//! clock drift between server and authenticator app.

use chrono::Utc;
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha1::Sha1;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// Length of a generated secret in Base32 symbols.
pub const SECRET_LENGTH: usize = 16;

/// Width of one time step in seconds.
pub const STEP_SECONDS: i64 = 30;

/// Number of digits in a code.
pub const CODE_DIGITS: usize = 6;

/// RFC 4648 Base32 alphabet.
const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// TOTP-related errors.
#[derive(Error, Debug)]
pub enum TotpError {
    /// Secret contains symbols outside the Base32 alphabet.
    #[error("malformed two-factor secret")]
    MalformedSecret,
}

/// Generate a fresh 16-symbol Base32 secret from the OS random source.
pub fn generate_secret() -> String {
    let mut raw = [0u8; SECRET_LENGTH];
    OsRng.fill_bytes(&mut raw);
    // 256 is a multiple of 32, so the modulo does not skew the distribution.
    raw.iter()
        .map(|&b| ALPHABET[(b % 32) as usize] as char)
        .collect()
}

/// Decode a Base32 secret into raw key bytes.
///
/// Accepts lowercase input and trailing `=` padding; anything else outside
/// the alphabet is rejected.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, TotpError> {
    let trimmed = secret.trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(TotpError::MalformedSecret);
    }

    let mut out = Vec::with_capacity(trimmed.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for ch in trimmed.bytes() {
        let symbol = ch.to_ascii_uppercase();
        let value = match symbol {
            b'A'..=b'Z' => symbol - b'A',
            b'2'..=b'7' => symbol - b'2' + 26,
            _ => return Err(TotpError::MalformedSecret),
        };
        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }

    Ok(out)
}

/// The time step counter for a Unix timestamp.
pub fn time_step(unix_secs: i64) -> i64 {
    unix_secs.div_euclid(STEP_SECONDS)
}

/// Derive the six-digit code for a key at a given time step.
pub fn derive_code(key: &[u8], step: i64) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(&step.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation per RFC 4226 section 5.3.
    let offset = (digest[19] & 0x0f) as usize;
    let slice: [u8; 4] = [
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ];
    let code = (u32::from_be_bytes(slice) & 0x7fff_ffff) % 1_000_000;
    format!("{code:06}")
}

/// Validate a submitted code against a secret at an explicit timestamp.
///
/// Checks the current step plus one step either side. Empty codes and
/// malformed secrets never validate.
pub fn validate_code_at(secret: &str, code: &str, unix_secs: i64) -> bool {
    if code.is_empty() {
        return false;
    }
    let key = match decode_secret(secret) {
        Ok(key) => key,
        Err(_) => return false,
    };

    let current = time_step(unix_secs);
    [-1i64, 0, 1].iter().any(|delta| {
        let step = current + delta;
        step >= 0 && derive_code(&key, step) == code
    })
}

/// Validate a submitted code against the wall clock.
pub fn validate_code(secret: &str, code: &str) -> bool {
    validate_code_at(secret, code, Utc::now().timestamp())
}

/// Build an `otpauth://` provisioning URI for authenticator apps.
pub fn provisioning_uri(secret: &str, account: &str, issuer: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={CODE_DIGITS}&period={STEP_SECONDS}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // "JBSWY3DPEHPK3PXP" decodes to 48656c6c6f21deadbeef.
    const SECRET: &str = "JBSWY3DPEHPK3PXP";

    #[test]
    fn test_decode_secret() {
        let key = decode_secret(SECRET).unwrap();
        assert_eq!(
            key,
            vec![0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x21, 0xde, 0xad, 0xbe, 0xef]
        );
    }

    #[test]
    fn test_decode_accepts_lowercase_and_padding() {
        assert_eq!(
            decode_secret("jbswy3dpehpk3pxp").unwrap(),
            decode_secret(SECRET).unwrap()
        );
        assert_eq!(
            decode_secret("JBSWY3DPEHPK3PXP====").unwrap(),
            decode_secret(SECRET).unwrap()
        );
    }

    #[test]
    fn test_decode_rejects_invalid_symbols() {
        assert!(matches!(decode_secret("JBSWY3DP1"), Err(TotpError::MalformedSecret)));
        assert!(matches!(decode_secret("JBSWY 3DP"), Err(TotpError::MalformedSecret)));
        assert!(matches!(decode_secret(""), Err(TotpError::MalformedSecret)));
        assert!(matches!(decode_secret("===="), Err(TotpError::MalformedSecret)));
    }

    #[test]
    fn test_known_codes() {
        let key = decode_secret(SECRET).unwrap();
        assert_eq!(derive_code(&key, 0), "282760");
        assert_eq!(derive_code(&key, 1), "996554");
        assert_eq!(derive_code(&key, 2), "602287");
    }

    #[test]
    fn test_time_step() {
        assert_eq!(time_step(0), 0);
        assert_eq!(time_step(29), 0);
        assert_eq!(time_step(30), 1);
        assert_eq!(time_step(59), 1);
        assert_eq!(time_step(60), 2);
    }

    #[test]
    fn test_skew_window() {
        // Timestamp 45 sits in step 1; steps 0..=2 are accepted.
        assert!(validate_code_at(SECRET, "996554", 45));
        assert!(validate_code_at(SECRET, "282760", 45));
        assert!(validate_code_at(SECRET, "602287", 45));

        // Step 3 is two steps ahead of step 1.
        let key = decode_secret(SECRET).unwrap();
        let step3 = derive_code(&key, 3);
        assert!(!validate_code_at(SECRET, &step3, 45));
    }

    #[test]
    fn test_rejects_empty_and_wrong_codes() {
        assert!(!validate_code_at(SECRET, "", 45));
        assert!(!validate_code_at(SECRET, "000000", 45));
        assert!(!validate_code_at("not!base32", "996554", 45));
    }

    #[test]
    fn test_negative_steps_skipped() {
        // At timestamp 0 the skew window would reach step -1; only steps
        // 0 and 1 may match.
        assert!(validate_code_at(SECRET, "282760", 0));
        assert!(validate_code_at(SECRET, "996554", 0));
    }

    #[test]
    fn test_generated_secret_shape() {
        let secret = generate_secret();
        assert_eq!(secret.len(), SECRET_LENGTH);
        assert!(secret.bytes().all(|b| ALPHABET.contains(&b)));
        decode_secret(&secret).unwrap();
    }

    #[test]
    fn test_generated_secrets_differ() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn test_provisioning_uri() {
        let uri = provisioning_uri(SECRET, "ada@example.test", "Gatehouse");
        assert_eq!(
            uri,
            "otpauth://totp/Gatehouse:ada@example.test?secret=JBSWY3DPEHPK3PXP&issuer=Gatehouse&algorithm=SHA1&digits=6&period=30"
        );
    }
}
