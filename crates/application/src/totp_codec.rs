use serde::Serialize;
use shelfguard_core::AppResult;

/// RFC 6238 specifies HMAC-SHA1 with a 160-bit native key size; generate a
/// full 20-byte secret rather than the shorter 16-byte secret some
/// implementations default to.
pub const TOTP_SECRET_LEN: usize = 20;

/// A freshly generated TOTP secret, ready to hand to the user.
#[derive(Debug, Clone, Serialize)]
pub struct TotpEnrollment {
    /// Base32 (no padding) encoding of the raw secret, for display.
    pub secret_base32: String,
    /// `otpauth://` provisioning URI, for QR-code rendering.
    pub otpauth_uri: String,
}

/// Port for RFC 6238 secret generation and code verification.
///
/// Implementations must accept the code for the current 30-second step and
/// the immediately adjacent steps (±1) to tolerate clock skew, and reject
/// wider windows.
pub trait TotpProvider: Send + Sync {
    /// Generates a new [`TOTP_SECRET_LEN`]-byte secret for `account`,
    /// returning the raw bytes alongside a display-ready enrollment
    /// payload.
    fn generate_secret(&self, account: &str) -> AppResult<(Vec<u8>, TotpEnrollment)>;

    /// Verifies a 6-digit code against `secret_bytes` within the ±1 step
    /// skew window.
    fn verify_code(&self, secret_bytes: &[u8], code: &str) -> AppResult<bool>;

    /// Renders `otpauth_uri` as a base64-encoded PNG data URI, for clients
    /// that asked for `include_qr` at registration instead of typing the
    /// secret in by hand.
    fn qr_code_data_uri(&self, secret_bytes: &[u8], account: &str) -> AppResult<String>;
}
