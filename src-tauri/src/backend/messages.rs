//! Message Types für das Backend
//!
//! Der Credentials-Endpunkt liefert die Call-ID entweder als
//! zusammengesetzte `cid` (`"type:id"`) oder bereits getrennt als
//! `callType` + `callId`. Beide Varianten werden hier explizit dekodiert.

use super::token::parse_user_id_from_token;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Credentials sind syntaktisch dekodiert, aber inhaltlich unbrauchbar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Missing or empty field: {0}")]
    MissingField(&'static str),

    #[error("Invalid call id '{0}', expected 'type:id'")]
    InvalidCid(String),
}

// ============================================================================
// CALL ID
// ============================================================================

/// Call-Identifikator `(call_type, id)`, als `cid` geschrieben `type:id`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId {
    #[serde(rename = "type")]
    call_type: String,
    id: String,
}

impl CallId {
    pub fn new(call_type: impl Into<String>, id: impl Into<String>) -> Result<Self, CredentialError> {
        let call_type = call_type.into();
        let id = id.into();

        if call_type.trim().is_empty() {
            return Err(CredentialError::MissingField("callType"));
        }
        if id.trim().is_empty() {
            return Err(CredentialError::MissingField("callId"));
        }

        Ok(Self { call_type, id })
    }

    /// Parst eine zusammengesetzte `cid`. Getrennt wird am ersten Doppelpunkt,
    /// die ID selbst darf also weitere Doppelpunkte enthalten.
    pub fn parse(cid: &str) -> Result<Self, CredentialError> {
        let (call_type, id) = cid
            .split_once(':')
            .ok_or_else(|| CredentialError::InvalidCid(cid.to_string()))?;

        Self::new(call_type, id).map_err(|_| CredentialError::InvalidCid(cid.to_string()))
    }

    pub fn call_type(&self) -> &str {
        &self.call_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.call_type, self.id)
    }
}

impl FromStr for CallId {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// CALL CREDENTIALS
// ============================================================================

/// Einmal-Credentials für genau einen Join-Versuch. Werden nicht gespeichert.
#[derive(Clone, PartialEq, Eq)]
pub struct CallCredentials {
    pub api_key: String,
    pub token: String,
    pub user_id: String,
    pub call_id: CallId,
}

impl fmt::Debug for CallCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Token nie ins Log
        f.debug_struct("CallCredentials")
            .field("api_key", &self.api_key)
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("call_id", &self.call_id.to_string())
            .finish()
    }
}

// ============================================================================
// SERVER → CLIENT MESSAGES
// ============================================================================

/// Antwort von `GET /credentials`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsResponse {
    pub api_key: String,
    pub token: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
}

impl CredentialsResponse {
    /// Validiert die Antwort und leitet fehlende Felder ab
    pub fn into_credentials(self) -> Result<CallCredentials, CredentialError> {
        if self.api_key.trim().is_empty() {
            return Err(CredentialError::MissingField("apiKey"));
        }
        if self.token.trim().is_empty() {
            return Err(CredentialError::MissingField("token"));
        }

        let call_id = match (self.cid, self.call_type, self.call_id) {
            (Some(cid), _, _) if !cid.is_empty() => CallId::parse(&cid)?,
            (_, Some(call_type), Some(id)) => CallId::new(call_type, id)?,
            (_, None, _) => return Err(CredentialError::MissingField("callType")),
            (_, _, None) => return Err(CredentialError::MissingField("callId")),
        };

        let user_id = match self.user_id {
            Some(user_id) if !user_id.is_empty() => user_id,
            _ => parse_user_id_from_token(&self.token),
        };

        Ok(CallCredentials {
            api_key: self.api_key,
            token: self.token,
            user_id,
            call_id,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn decode(json: &str) -> Result<CallCredentials, CredentialError> {
        serde_json::from_str::<CredentialsResponse>(json)
            .unwrap()
            .into_credentials()
    }

    #[test]
    fn test_cid_is_split_at_first_colon() {
        let cid = CallId::parse("default:room1").unwrap();
        assert_eq!(cid.call_type(), "default");
        assert_eq!(cid.id(), "room1");
        assert_eq!(cid.to_string(), "default:room1");

        let nested: CallId = "audio_room:a:b".parse().unwrap();
        assert_eq!(nested.call_type(), "audio_room");
        assert_eq!(nested.id(), "a:b");
    }

    #[test]
    fn test_invalid_cids() {
        for bad in ["", "room1", ":room1", "default:", " : "] {
            assert_eq!(
                CallId::parse(bad),
                Err(CredentialError::InvalidCid(bad.to_string())),
                "cid {bad:?}"
            );
        }
    }

    #[test]
    fn test_credentials_with_cid_and_token_user() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"user_id":"lucy"}"#);
        let json = format!(
            r#"{{"apiKey":"k","token":"eyJhbGciOiJIUzI1NiJ9.{payload}.sig","cid":"default:room1"}}"#
        );

        let creds = decode(&json).unwrap();
        assert_eq!(creds.api_key, "k");
        assert_eq!(creds.user_id, "lucy");
        assert_eq!(creds.call_id.call_type(), "default");
        assert_eq!(creds.call_id.id(), "room1");
    }

    #[test]
    fn test_credentials_with_split_call_id() {
        let creds = decode(
            r#"{"apiKey":"k","token":"t","userId":"human","callType":"default","callId":"abc"}"#,
        )
        .unwrap();
        assert_eq!(creds.user_id, "human");
        assert_eq!(creds.call_id, CallId::new("default", "abc").unwrap());
    }

    #[test]
    fn test_empty_user_id_falls_back_to_token() {
        let creds =
            decode(r#"{"apiKey":"k","token":"opaque","userId":"","cid":"default:x"}"#).unwrap();
        assert_eq!(creds.user_id, "");
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            decode(r#"{"apiKey":"","token":"t","cid":"a:b"}"#),
            Err(CredentialError::MissingField("apiKey"))
        );
        assert_eq!(
            decode(r#"{"apiKey":"k","token":" ","cid":"a:b"}"#),
            Err(CredentialError::MissingField("token"))
        );
        assert_eq!(
            decode(r#"{"apiKey":"k","token":"t","callId":"b"}"#),
            Err(CredentialError::MissingField("callType"))
        );
        assert_eq!(
            decode(r#"{"apiKey":"k","token":"t","callType":"a"}"#),
            Err(CredentialError::MissingField("callId"))
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = decode(r#"{"apiKey":"k","token":"secret-token","cid":"a:b"}"#).unwrap();
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("a:b"));
    }
}
