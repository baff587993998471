//! Codec for the check-in token printed in a ticket's QR code.
//!
//! The token is standard base64 over a compact JSON object carrying the
//! ticket, user, main event and sub-event ids. It is not signed: possession
//! of the link is what authorizes a check-in.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPayload {
    #[serde(rename = "t")]
    pub ticket_id: Uuid,
    #[serde(rename = "u")]
    pub user_id: Uuid,
    #[serde(rename = "e")]
    pub event_id: Uuid,
    #[serde(rename = "s")]
    pub sub_event_id: Uuid,
}

impl VerificationPayload {
    pub fn encode(&self) -> String {
        // Serializing four UUIDs cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn decode(token: &str) -> Option<Self> {
        let bytes = STANDARD.decode(token.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// The public check-in page a QR code points to. Standard base64 may contain
/// `+`, `/` and `=`, so the token is percent-encoded into the path segment.
pub fn verification_url(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/verify/{}",
        public_base_url.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> VerificationPayload {
        VerificationPayload {
            ticket_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            sub_event_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_token_uses_short_keys() {
        let p = payload();
        let bytes = STANDARD.decode(p.encode()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["t"], p.ticket_id.to_string());
        assert_eq!(json["u"], p.user_id.to_string());
        assert_eq!(json["e"], p.event_id.to_string());
        assert_eq!(json["s"], p.sub_event_id.to_string());
    }

    #[test]
    fn test_decode_accepts_encoded_token() {
        let p = payload();
        assert_eq!(VerificationPayload::decode(&p.encode()), Some(p));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(VerificationPayload::decode("not-base64!!").is_none());
        let not_a_payload = STANDARD.encode(br#"{"t":"abc"}"#);
        assert!(VerificationPayload::decode(&not_a_payload).is_none());
    }

    #[test]
    fn test_url_escapes_reserved_characters() {
        let url = verification_url("https://tickets.example.com/", "ab+c/d==");
        assert_eq!(url, "https://tickets.example.com/verify/ab%2Bc%2Fd%3D%3D");
    }
}
