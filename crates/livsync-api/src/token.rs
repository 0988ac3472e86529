// Session token payload decoding.
//
// Tokens are three dot-separated base64url segments. Only the middle
// (claims) segment is read; signatures are never verified locally.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::AuthError;

/// Claims read from an ID token payload.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    #[serde(rename = "custom:user_id")]
    pub custom_user_id: Option<String>,
    pub sub: Option<String>,
    /// Issued-at, seconds since the epoch.
    pub iat: Option<i64>,
    /// Expiry, seconds since the epoch.
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// The user identifier required by device-listing calls.
    pub fn user_id(&self) -> Option<&str> {
        self.custom_user_id
            .as_deref()
            .or(self.sub.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// Decode the claims segment of `token`.
///
/// Trailing `=` padding is stripped before decoding, so both padded and
/// unpadded encodings are accepted.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken {
            reason: "expected three dot-separated segments".into(),
        });
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken {
            reason: format!("payload is not base64url: {e}"),
        })?;

    serde_json::from_slice(&bytes).map_err(|e| AuthError::MalformedToken {
        reason: format!("payload is not a JSON claims object: {e}"),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use base64::engine::general_purpose::URL_SAFE;

    use super::*;

    fn token_with(claims: &str, padded: bool) -> String {
        let payload = if padded {
            URL_SAFE.encode(claims)
        } else {
            URL_SAFE_NO_PAD.encode(claims)
        };
        format!("eyJhbGciOiJSUzI1NiJ9.{payload}.c2ln")
    }

    #[test]
    fn decodes_unpadded_payload() {
        let token = token_with(r#"{"custom:user_id":"u1"}"#, false);
        assert!(!token.contains('='));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.user_id(), Some("u1"));
    }

    #[test]
    fn decodes_padded_payload() {
        let token = token_with(r#"{"custom:user_id":"u1"}"#, true);
        assert!(token.contains('='));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.user_id(), Some("u1"));
    }

    #[test]
    fn falls_back_to_sub() {
        let token = token_with(r#"{"sub":"abc","iat":1700000000,"exp":1700003600}"#, false);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.user_id(), Some("abc"));
        assert_eq!(claims.iat, Some(1_700_000_000));
        assert_eq!(claims.exp, Some(1_700_003_600));
    }

    #[test]
    fn missing_identifier_yields_none() {
        let token = token_with(r#"{"email":"me@example.com"}"#, false);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.user_id(), None);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(matches!(
            decode_claims("only.two"),
            Err(AuthError::MalformedToken { .. })
        ));
        assert!(matches!(
            decode_claims("a.b.c.d"),
            Err(AuthError::MalformedToken { .. })
        ));
    }

    #[test]
    fn rejects_non_base64_payload() {
        assert!(matches!(
            decode_claims("a.!!!.c"),
            Err(AuthError::MalformedToken { .. })
        ));
    }

    #[test]
    fn rejects_non_json_payload() {
        let token = format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(
            decode_claims(&token),
            Err(AuthError::MalformedToken { .. })
        ));
    }
}
