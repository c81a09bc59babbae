//! Request canonicalization and HMAC-SHA1 signing.
//!
//! The server recomputes the signature from the query it receives, so the
//! canonical string must match its algorithm byte for byte: drop any old
//! `signature`, sort by key, percent-encode, join with `&`, lower-case.

use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::consts::SIGNATURE_KEY;

/// Request parameters. A `BTreeMap` keeps keys sorted, which is the order
/// the canonical string needs.
pub type ParameterSet = BTreeMap<String, String>;

type HmacSha1 = Hmac<Sha1>;

/// Build the canonical string that gets signed.
pub fn canonicalize(params: &ParameterSet) -> String {
    params
        .iter()
        .filter(|(key, _)| key.as_str() != SIGNATURE_KEY)
        .map(|(key, value)| format!("{}={}", urlencoded(key), urlencoded(value)))
        .collect::<Vec<_>>()
        .join("&")
        .to_ascii_lowercase()
}

/// Sign `params` with `secret` and return the signed set.
///
/// An empty set is returned untouched. A stale `signature` is replaced, never
/// folded into the new one.
pub fn sign(mut params: ParameterSet, secret: &[u8]) -> ParameterSet {
    if params.is_empty() {
        return params;
    }
    let signature = signature_of(&params, secret);
    params.insert(SIGNATURE_KEY.to_string(), signature);
    params
}

/// base64(HMAC-SHA1(secret, canonicalize(params)))
pub fn signature_of(params: &ParameterSet, secret: &[u8]) -> String {
    let canonical = canonicalize(params);
    // HMAC takes keys of any length; this cannot fail.
    let mut mac = <HmacSha1 as Mac>::new_from_slice(secret)
        .expect("HMAC-SHA1 accepts keys of any length");
    mac.update(canonical.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Serialize parameters into a URL query string, in key order.
pub fn to_query_string(params: &ParameterSet) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoded(key), urlencoded(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything except ASCII alphanumerics and `-_.~*`.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'*' => {
                out.push(b as char);
            }
            _ => {
                out.push_str(&format!("%{:02X}", b));
            }
        }
    }
    out
}

/// A signed GET request, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    pub endpoint: String,
    pub params: ParameterSet,
}

impl SignedRequest {
    pub fn new(endpoint: &str, params: ParameterSet, secret: &[u8]) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            params: sign(params, secret),
        }
    }

    /// The command this request runs, if any.
    pub fn command(&self) -> Option<&str> {
        self.params.get("command").map(String::as_str)
    }

    /// Full request URL with the encoded query appended.
    pub fn url(&self) -> String {
        if self.params.is_empty() {
            return self.endpoint.clone();
        }
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}",
            self.endpoint,
            separator,
            to_query_string(&self.params)
        )
    }
}
