use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// The single live refresh token of a user, stored as a digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RefreshTokenRecord {
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(user_id: Uuid, token_hash: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            token_hash,
            created_at: Utc::now(),
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_record_expiry() {
        let live =
            RefreshTokenRecord::new(Uuid::new_v4(), "h".into(), Utc::now() + Duration::days(1));
        assert!(!live.is_expired());

        let stale =
            RefreshTokenRecord::new(Uuid::new_v4(), "h".into(), Utc::now() - Duration::seconds(1));
        assert!(stale.is_expired());
    }

    #[test]
    fn test_user_serialization_omits_password_hash() {
        let user = User::new("a@example.com".into(), "$2b$04$secret".into());
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["email"], "a@example.com");
        assert!(json.get("password_hash").is_none());
    }
}
