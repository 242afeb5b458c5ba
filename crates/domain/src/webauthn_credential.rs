use serde::{Deserialize, Serialize};

use crate::UserId;

/// Surrogate identifier for a [`WebAuthnCredential`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAuthnCredentialId(pub i64);

/// A registered WebAuthn/FIDO2 public-key credential.
///
/// *Invariant W1:* `sign_count` is monotonic non-decreasing; an assertion
/// presenting a non-increasing counter is rejected as a suspected clone and
/// the credential is revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebAuthnCredential {
    /// Surrogate primary key.
    pub id: WebAuthnCredentialId,
    /// The user this credential authenticates.
    pub user_id: UserId,
    /// Opaque credential identifier assigned by the authenticator.
    pub credential_id: Vec<u8>,
    /// Serialized relying-party-library credential record (public key,
    /// COSE algorithm, and backup-state flags); opaque to everything but
    /// the ceremony service that decodes it for verification.
    pub public_key: Vec<u8>,
    /// Authenticator's monotonic sign counter, as of the last successful
    /// assertion.
    pub sign_count: u32,
    /// Set once a sign-counter regression has been observed.
    pub revoked: bool,
}
