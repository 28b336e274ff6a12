// SPDX-License-Identifier: MIT OR Apache-2.0
//! PII masking and recursive redaction of state/audit payloads.
//!
//! Every state snapshot and audit payload passes through [`redact_value`]
//! before persistence: emails become `a***@domain`, telephones keep at most
//! four visible digits, URLs collapse to `scheme://host/.../<last_segment>`,
//! and secret-bearing fields are replaced wholesale.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde_json::Value;

/// Placeholder written over secret-bearing fields.
pub const REDACTED: &str = "***REDACTED***";

/// Field names whose values are replaced with [`REDACTED`] outright.
const SENSITIVE_KEYS: &[&str] = &[
    "unit_price",
    "amount",
    "address",
    "token",
    "api_key",
    "password",
    "smtp_pass",
];

/// Keys holding URLs that are collapsed rather than fully redacted.
const URL_KEYS: &[&str] = &["file_url", "url", "order_url", "blob_path"];

/// Mask an email to `a***@domain`. Idempotent; non-addresses collapse to
/// [`REDACTED`].
#[must_use]
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return REDACTED.to_string();
    };
    // Already-masked locals pass through unchanged.
    if local.ends_with("***") && !local.is_empty() {
        return email.to_string();
    }
    let masked_local = match local.chars().next() {
        Some(first) => format!("{first}***"),
        None => "***".to_string(),
    };
    format!("{masked_local}@{domain}")
}

/// Mask a telephone number, keeping at most the first and last two digits.
#[must_use]
pub fn mask_telephone(telephone: &str) -> String {
    if telephone == REDACTED || telephone.contains("****") {
        return telephone.to_string();
    }
    let len = telephone.chars().count();
    if len < 4 {
        return REDACTED.to_string();
    }
    if len <= 6 {
        let first = telephone.chars().next().unwrap_or('*');
        let last = telephone.chars().last().unwrap_or('*');
        return format!("{first}****{last}");
    }
    let first: String = telephone.chars().take(2).collect();
    let last: String = telephone.chars().skip(len - 2).collect();
    format!("{first}****{last}")
}

/// Collapse a URL to `scheme://host/.../<last_segment>`.
#[must_use]
pub fn mask_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return REDACTED.to_string();
    };
    let (host, path) = match rest.split_once('/') {
        Some((host, path)) => (host, path),
        None => (rest, ""),
    };
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if last.is_empty() {
        format!("{scheme}://{host}/***")
    } else {
        format!("{scheme}://{host}/.../{last}")
    }
}

fn looks_like_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn redact_string(key: &str, s: &str) -> Value {
    let key_lower = key.to_ascii_lowercase();
    if SENSITIVE_KEYS.contains(&key_lower.as_str()) {
        return Value::String(REDACTED.to_string());
    }
    if key_lower == "email" || (key_lower.ends_with("email") && s.contains('@')) {
        return Value::String(mask_email(s));
    }
    if key_lower == "sender_id" && s.contains('@') {
        return Value::String(mask_email(s));
    }
    if matches!(key_lower.as_str(), "recipients" | "cc" | "to") && s.contains('@') {
        return Value::String(mask_email(s));
    }
    if key_lower == "telephone" {
        return Value::String(mask_telephone(s));
    }
    if URL_KEYS.contains(&key_lower.as_str()) && looks_like_url(s) {
        return Value::String(mask_url(s));
    }
    Value::String(s.to_string())
}

/// Recursively redact a JSON value in key context `key`.
///
/// Objects and arrays are walked in full; leaf strings are masked according
/// to the key they sit under. Non-string values under sensitive keys are
/// replaced with [`REDACTED`] as well (prices, amounts).
#[must_use]
pub fn redact_in_context(key: &str, value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), redact_in_context(k, v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items.iter().map(|v| redact_in_context(key, v)).collect(),
        ),
        Value::String(s) => redact_string(key, s),
        other => {
            if SENSITIVE_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                Value::String(REDACTED.to_string())
            } else {
                other.clone()
            }
        }
    }
}

/// Redact a whole value tree (entry point for state snapshots and audit
/// payloads).
#[must_use]
pub fn redact_value(value: &Value) -> Value {
    redact_in_context("", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn email_masking_keeps_domain() {
        assert_eq!(mask_email("buyer@example.com"), "b***@example.com");
        assert_eq!(mask_email("a@x.cn"), "a***@x.cn");
        assert_eq!(mask_email("not-an-email"), REDACTED);
    }

    #[test]
    fn email_masking_is_idempotent() {
        let once = mask_email("buyer@example.com");
        assert_eq!(mask_email(&once), once);
    }

    #[test]
    fn telephone_masking_limits_visible_digits() {
        assert_eq!(mask_telephone("13812345678"), "13****78");
        assert_eq!(mask_telephone("123456"), "1****6");
        assert_eq!(mask_telephone("123"), REDACTED);
    }

    #[test]
    fn telephone_masking_is_idempotent() {
        let once = mask_telephone("13812345678");
        assert_eq!(mask_telephone(&once), once);
    }

    #[test]
    fn url_masking_keeps_host_and_last_segment() {
        assert_eq!(
            mask_url("https://files.corp/v1/blobs/abc123"),
            "https://files.corp/.../abc123"
        );
        assert_eq!(mask_url("https://files.corp"), "https://files.corp/***");
        assert_eq!(mask_url("garbage"), REDACTED);
    }

    #[test]
    fn sensitive_keys_are_replaced() {
        let v = json!({
            "unit_price": 12.5,
            "amount": 100,
            "address": "1 Main St",
            "api_key": "sk-secret",
            "smtp_pass": "hunter2",
            "name": "Acme"
        });
        let r = redact_value(&v);
        for key in ["unit_price", "amount", "address", "api_key", "smtp_pass"] {
            assert_eq!(r[key], REDACTED, "{key}");
        }
        assert_eq!(r["name"], "Acme");
    }

    #[test]
    fn redaction_recurses_through_nesting() {
        let v = json!({
            "contacts": [
                {"email": "buyer@example.com", "telephone": "13812345678"},
                {"email": "second@example.com"}
            ],
            "upload": {"file_url": "https://files.corp/v1/blobs/xyz"}
        });
        let r = redact_value(&v);
        assert_eq!(r["contacts"][0]["email"], "b***@example.com");
        assert_eq!(r["contacts"][0]["telephone"], "13****78");
        assert_eq!(r["contacts"][1]["email"], "s***@example.com");
        assert_eq!(r["upload"]["file_url"], "https://files.corp/.../xyz");
    }

    #[test]
    fn sender_id_addresses_are_masked() {
        let v = json!({"sender_id": "buyer@example.com"});
        assert_eq!(redact_value(&v)["sender_id"], "b***@example.com");
    }

    #[test]
    fn no_plain_email_survives_redaction() {
        let v = json!({
            "email_event": {
                "sender_id": "buyer@example.com",
                "recipients": ["x"],
            },
            "matched": {"email": "second@example.com"}
        });
        let r = serde_json::to_string(&redact_value(&v)).unwrap();
        assert!(!r.contains("buyer@example.com"));
        assert!(!r.contains("second@example.com"));
    }

    proptest! {
        #[test]
        fn mask_email_idempotent_on_arbitrary_input(s in "[a-z0-9@.]{0,32}") {
            let once = mask_email(&s);
            prop_assert_eq!(mask_email(&once), once.clone());
        }

        #[test]
        fn redaction_is_a_fixpoint(
            email in "[a-z]{1,8}@[a-z]{1,8}\\.com",
            phone in "[0-9]{7,11}",
        ) {
            let v = json!({"email": email, "telephone": phone});
            let once = redact_value(&v);
            let twice = redact_value(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
