//! Webhook signature verification
//!
//! The messaging provider signs every webhook with HMAC-SHA1 over the full
//! request URL followed by the form parameters sorted by name, with the
//! account auth token as the key. The result is base64-encoded into the
//! `X-Twilio-Signature` header.
//!
//! Verification must run against the raw, unparsed body: re-encoding a parsed
//! body can reorder or re-escape parameters and break the digest.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Compute the expected signature for a webhook request.
///
/// `url` is the full public URL the provider addressed (scheme, host, path,
/// query); `raw_body` is the urlencoded form body exactly as received.
pub fn compute_signature(auth_token: &str, url: &str, raw_body: &[u8]) -> String {
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw_body)
        .into_owned()
        .collect();
    pairs.sort();

    let mut payload = String::from(url);
    for (key, value) in &pairs {
        payload.push_str(key);
        payload.push_str(value);
    }

    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify a claimed webhook signature against the shared auth token.
///
/// Returns false on any mismatch, including undecodable signature headers.
/// The comparison is constant-time.
pub fn verify_signature(
    auth_token: &str,
    signature_header: &str,
    url: &str,
    raw_body: &[u8],
) -> bool {
    let Ok(claimed) = BASE64.decode(signature_header.trim()) else {
        return false;
    };

    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw_body)
        .into_owned()
        .collect();
    pairs.sort();

    let mut payload = String::from(url);
    for (key, value) in &pairs {
        payload.push_str(key);
        payload.push_str(value);
    }

    let Ok(mut mac) = HmacSha1::new_from_slice(auth_token.as_bytes()) else {
        return false;
    };
    mac.update(payload.as_bytes());
    mac.verify_slice(&claimed).is_ok()
}

/// Parse a raw urlencoded webhook body into owned key/value pairs.
///
/// Later duplicates win, matching how the provider populates its form fields.
pub fn parse_form_body(raw_body: &[u8]) -> std::collections::HashMap<String, String> {
    url::form_urlencoded::parse(raw_body).into_owned().collect()
}
