//! Data authentication codes: HMAC-SHA256, a simplified CBC-style MAC, and
//! timestamped variants of both for replay rejection.
//!
//! String data is authenticated as-is; any other serializable value is
//! rendered as JSON first (object keys sorted). MACs are lowercase hex and
//! compared with ordinary string equality.

use std::sync::Arc;

use eventshield_core::{Clock, MacConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{CryptoError, CryptoResult};
use crate::hmac::hmac_sha256_hex;

/// CBC-MAC accumulator width in bytes.
pub const CBC_BLOCK_SIZE: usize = 16;

/// Which construction a timestamped MAC uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacKind {
    #[default]
    Hmac,
    Cbc,
}

/// A MAC together with the millisecond timestamp folded into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampedMac {
    pub mac: String,
    pub timestamp: u64,
}

/// Render data the way it is fed to a MAC: strings raw, everything else as JSON.
pub fn canonical_message<T: Serialize + ?Sized>(data: &T) -> CryptoResult<String> {
    Ok(match serde_json::to_value(data)? {
        Value::String(text) => text,
        other => serde_json::to_string(&other)?,
    })
}

pub fn generate_hmac(data: &str, key: &str) -> String {
    hmac_sha256_hex(key, data)
}

pub fn verify_hmac(data: &str, mac: &str, key: &str) -> bool {
    generate_hmac(data, key) == mac
}

/// [`generate_hmac`] over [`canonical_message`].
pub fn generate_hmac_json<T: Serialize + ?Sized>(data: &T, key: &str) -> CryptoResult<String> {
    Ok(generate_hmac(&canonical_message(data)?, key))
}

pub fn verify_hmac_json<T: Serialize + ?Sized>(data: &T, mac: &str, key: &str) -> CryptoResult<bool> {
    Ok(generate_hmac_json(data, key)? == mac)
}

/// Non-cryptographic CBC-style MAC.
///
/// The message is zero-padded to 16-byte blocks. Each block is XORed into
/// the accumulator, then every accumulator byte gets the matching key byte
/// (cycled) added mod 256. There is no block cipher.
pub fn generate_cbc_mac(data: &str, key: &str) -> CryptoResult<String> {
    let key = key.as_bytes();
    if key.is_empty() {
        return Err(CryptoError::Format("CBC-MAC key must not be empty".to_string()));
    }

    let mut acc = [0u8; CBC_BLOCK_SIZE];
    for block in data.as_bytes().chunks(CBC_BLOCK_SIZE) {
        for (slot, byte) in acc.iter_mut().zip(block) {
            *slot ^= byte;
        }
        for (j, slot) in acc.iter_mut().enumerate() {
            *slot = slot.wrapping_add(key[j % key.len()]);
        }
    }

    Ok(hex::encode(acc))
}

pub fn verify_cbc_mac(data: &str, mac: &str, key: &str) -> CryptoResult<bool> {
    Ok(generate_cbc_mac(data, key)? == mac)
}

fn mac_of(message: &str, key: &str, kind: MacKind) -> CryptoResult<String> {
    match kind {
        MacKind::Hmac => Ok(generate_hmac(message, key)),
        MacKind::Cbc => generate_cbc_mac(message, key),
    }
}

fn timestamped_message<T: Serialize + ?Sized>(data: &T, timestamp: u64) -> CryptoResult<String> {
    let payload = serde_json::json!({
        "data": serde_json::to_value(data)?,
        "timestamp": timestamp,
    });
    Ok(serde_json::to_string(&payload)?)
}

/// MAC over `{"data": data, "timestamp": timestamp}`.
pub fn generate_timestamped_mac<T: Serialize + ?Sized>(
    data: &T,
    key: &str,
    kind: MacKind,
    timestamp: u64,
) -> CryptoResult<TimestampedMac> {
    let mac = mac_of(&timestamped_message(data, timestamp)?, key, kind)?;
    Ok(TimestampedMac { mac, timestamp })
}

/// False once `now - timestamp` exceeds `max_age_ms`; timestamps in the
/// future are not rejected.
pub fn verify_timestamped_mac<T: Serialize + ?Sized>(
    data: &T,
    stamped: &TimestampedMac,
    key: &str,
    kind: MacKind,
    max_age_ms: u64,
    now_ms: u64,
) -> CryptoResult<bool> {
    let age = now_ms.saturating_sub(stamped.timestamp);
    if age > max_age_ms {
        debug!(age_ms = age, max_age_ms, "Rejecting stale timestamped MAC");
        return Ok(false);
    }

    Ok(mac_of(&timestamped_message(data, stamped.timestamp)?, key, kind)? == stamped.mac)
}

/// Timestamped MACs bound to a clock and a maximum age.
pub struct MacService {
    clock: Arc<dyn Clock>,
    max_age_ms: u64,
}

impl MacService {
    pub fn new(config: &MacConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            max_age_ms: config.max_age_ms,
        }
    }

    pub fn max_age_ms(&self) -> u64 {
        self.max_age_ms
    }

    pub fn generate<T: Serialize + ?Sized>(
        &self,
        data: &T,
        key: &str,
        kind: MacKind,
    ) -> CryptoResult<TimestampedMac> {
        generate_timestamped_mac(data, key, kind, self.clock.now_millis())
    }

    pub fn verify<T: Serialize + ?Sized>(
        &self,
        data: &T,
        stamped: &TimestampedMac,
        key: &str,
        kind: MacKind,
    ) -> CryptoResult<bool> {
        verify_timestamped_mac(
            data,
            stamped,
            key,
            kind,
            self.max_age_ms,
            self.clock.now_millis(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventshield_core::FixedClock;
    use serde_json::json;
    use std::time::Duration;

    const KEY: &str = "k3y-for-tests";

    #[test]
    fn test_hmac_roundtrip() {
        let mac = generate_hmac("attendee=42", KEY);
        assert_eq!(mac.len(), 64);
        assert!(verify_hmac("attendee=42", &mac, KEY));
        assert!(!verify_hmac("attendee=43", &mac, KEY));
        assert!(!verify_hmac("attendee=42", &mac, "other"));
    }

    #[test]
    fn test_string_data_is_not_quoted() {
        let raw = generate_hmac("hello", KEY);
        assert_eq!(generate_hmac_json("hello", KEY).unwrap(), raw);
        assert_eq!(canonical_message("hello").unwrap(), "hello");
    }

    #[test]
    fn test_json_data_is_key_order_independent() {
        let a = json!({"b": 1, "a": [true, null]});
        let b: Value = serde_json::from_str(r#"{"a":[true,null],"b":1}"#).unwrap();

        assert_eq!(canonical_message(&a).unwrap(), r#"{"a":[true,null],"b":1}"#);
        assert_eq!(
            generate_hmac_json(&a, KEY).unwrap(),
            generate_hmac_json(&b, KEY).unwrap()
        );
        let mac = generate_hmac_json(&a, KEY).unwrap();
        assert!(verify_hmac_json(&b, &mac, KEY).unwrap());
    }

    #[test]
    fn test_cbc_mac_known_values() {
        assert_eq!(generate_cbc_mac("", KEY).unwrap(), "0".repeat(32));

        // single block "A" with key "B": 0x41 ^ 0 + 0x42 = 0x83, rest 0 + 0x42
        let expected = format!("83{}", "42".repeat(15));
        assert_eq!(generate_cbc_mac("A", "B").unwrap(), expected);
    }

    #[test]
    fn test_cbc_mac_two_blocks() {
        // 17 bytes: second block is "a" followed by 15 zero bytes
        let message = "aaaaaaaaaaaaaaaaa";
        let mut acc = [0x61u8; 16];
        for slot in acc.iter_mut() {
            *slot = slot.wrapping_add(0x01);
        }
        acc[0] ^= 0x61;
        for slot in acc.iter_mut() {
            *slot = slot.wrapping_add(0x01);
        }

        assert_eq!(generate_cbc_mac(message, "\u{1}").unwrap(), hex::encode(acc));
        assert!(verify_cbc_mac(message, &hex::encode(acc), "\u{1}").unwrap());
    }

    #[test]
    fn test_cbc_mac_rejects_empty_key() {
        assert!(matches!(
            generate_cbc_mac("data", ""),
            Err(CryptoError::Format(_))
        ));
    }

    #[test]
    fn test_timestamped_payload_shape() {
        let message = timestamped_message(&json!({"seat": 7}), 1_700_000_000_000).unwrap();
        assert_eq!(message, r#"{"data":{"seat":7},"timestamp":1700000000000}"#);
    }

    #[test]
    fn test_timestamped_mac_expiry() {
        let stamped =
            generate_timestamped_mac("payload", KEY, MacKind::Hmac, 1_000_000).unwrap();

        let fresh = 1_000_000 + 300_000;
        let stale = fresh + 1;
        assert!(verify_timestamped_mac("payload", &stamped, KEY, MacKind::Hmac, 300_000, fresh).unwrap());
        assert!(!verify_timestamped_mac("payload", &stamped, KEY, MacKind::Hmac, 300_000, stale).unwrap());
    }

    #[test]
    fn test_timestamped_mac_detects_tampering() {
        let mut stamped = generate_timestamped_mac("payload", KEY, MacKind::Cbc, 5_000).unwrap();
        assert!(verify_timestamped_mac("payload", &stamped, KEY, MacKind::Cbc, 300_000, 6_000).unwrap());
        assert!(!verify_timestamped_mac("payl0ad", &stamped, KEY, MacKind::Cbc, 300_000, 6_000).unwrap());

        stamped.timestamp += 1;
        assert!(!verify_timestamped_mac("payload", &stamped, KEY, MacKind::Cbc, 300_000, 6_000).unwrap());
    }

    #[test]
    fn test_mac_service_uses_clock() {
        let clock = Arc::new(FixedClock::new(10_000));
        let service = MacService::new(&MacConfig::default(), clock.clone());

        let stamped = service.generate(&json!([1, 2, 3]), KEY, MacKind::Hmac).unwrap();
        assert_eq!(stamped.timestamp, 10_000);
        assert!(service.verify(&json!([1, 2, 3]), &stamped, KEY, MacKind::Hmac).unwrap());

        clock.advance(Duration::from_millis(service.max_age_ms() + 1));
        assert!(!service.verify(&json!([1, 2, 3]), &stamped, KEY, MacKind::Hmac).unwrap());
    }
}
