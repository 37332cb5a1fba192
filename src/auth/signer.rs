use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;

use crate::auth::claims::Claims;
use crate::error::AppError;

/// The only algorithm tokens are signed and accepted with.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("malformed token")]
    MalformedToken,

    #[error("signature does not verify")]
    SignatureInvalid,

    #[error("token declares algorithm {0:?}")]
    AlgorithmMismatch(Algorithm),

    #[error("token expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => VerificationError::SignatureInvalid,
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            ErrorKind::InvalidAlgorithm => VerificationError::SignatureInvalid,
            _ => VerificationError::MalformedToken,
        }
    }
}

/// Signs and verifies bearer tokens with a shared secret fixed at start-up.
pub struct CredentialSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl CredentialSigner {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(SIGNING_ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, VerificationError> {
        // The header is attacker controlled; only the configured algorithm is
        // ever used to check the signature.
        let header = decode_header(token).map_err(|_| VerificationError::MalformedToken)?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(VerificationError::AlgorithmMismatch(header.alg));
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}
