//! Authentication module
//!
//! Token signing, pair issuance, the refresh token ledger, the request gate
//! and the HTTP handlers that expose them.

pub mod claims;
pub mod gate;
pub mod handlers;
pub mod issuer;
pub mod ledger;
pub mod middleware;
pub mod password;
pub mod service;
pub mod signer;

pub use claims::{Claims, TokenType};
pub use gate::{AuthGate, GateDecision, GateOutcome, GatePredicate, GateRequest};
pub use issuer::{IssuedToken, TokenIssuer, TokenPair};
pub use ledger::RefreshTokenLedger;
pub use middleware::{require_access_token, AuthenticatedUser};
pub use service::AuthService;
pub use signer::{CredentialSigner, VerificationError};
