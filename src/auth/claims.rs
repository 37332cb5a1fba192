use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub iss: String,
    pub iat: i64,     // Issued at
    pub exp: i64,     // Expiration time
    pub jti: String,
    pub token_type: TokenType,
}

impl Claims {
    /// Claims are only usable once their class is confirmed.
    pub fn expect_type(&self, expected: TokenType) -> Result<(), AuthError> {
        if self.token_type == expected {
            Ok(())
        } else {
            Err(AuthError::WrongTokenType {
                expected,
                found: self.token_type,
            })
        }
    }

    pub fn subject_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(token_type: TokenType, sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            iss: "http://localhost:8080".into(),
            iat: 0,
            exp: 1,
            jti: "jti".into(),
            token_type,
        }
    }

    #[test]
    fn test_token_type_wire_format() {
        let json = serde_json::to_value(claims(TokenType::Refresh, "x")).unwrap();
        assert_eq!(json["token_type"], "refresh");

        let parsed: Result<TokenType, _> = serde_json::from_str("\"bearer\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_expect_type() {
        assert!(claims(TokenType::Access, "x").expect_type(TokenType::Access).is_ok());
        assert!(matches!(
            claims(TokenType::Refresh, "x").expect_type(TokenType::Access),
            Err(AuthError::WrongTokenType {
                expected: TokenType::Access,
                found: TokenType::Refresh,
            })
        ));
    }

    #[test]
    fn test_subject_id() {
        let id = Uuid::new_v4();
        assert_eq!(claims(TokenType::Access, &id.to_string()).subject_id().unwrap(), id);
        assert!(matches!(
            claims(TokenType::Access, "not-a-uuid").subject_id(),
            Err(AuthError::InvalidSubject)
        ));
    }
}
