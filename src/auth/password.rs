use crate::db::User;
use crate::error::AppError;
use crate::Result;

/// bcrypt is deliberately slow, so both calls run on the blocking pool.
pub async fn hash_password(plaintext: &str, cost: u32) -> Result<String> {
    let plaintext = plaintext.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
        .await
        .map_err(|e| AppError::InternalError(format!("password hashing task failed: {}", e)))?
        .map_err(|e| AppError::InternalError(format!("failed to hash the password: {}", e)))
}

/// A malformed stored hash counts as a mismatch.
pub async fn password_matches(user: &User, plaintext: &str) -> Result<bool> {
    let plaintext = plaintext.to_owned();
    let hash = user.password_hash.clone();
    let matches =
        tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash).unwrap_or(false))
            .await
            .map_err(|e| AppError::InternalError(format!("password check task failed: {}", e)))?;

    Ok(matches)
}
