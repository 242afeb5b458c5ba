//! RFC 6238 TOTP provider using the `totp-rs` crate.

use shelfguard_application::{TOTP_SECRET_LEN, TotpEnrollment, TotpProvider};
use shelfguard_core::{AppError, AppResult};
use totp_rs::{Algorithm, Secret, TOTP};

/// TOTP provider generating [`TOTP_SECRET_LEN`]-byte (160-bit) secrets,
/// HMAC-SHA1, 6 digits, 30-second step, ±1 step skew window.
#[derive(Clone)]
pub struct TotpRsProvider {
    issuer: String,
}

impl TotpRsProvider {
    /// Creates a new provider. `issuer` appears in the provisioning URI and
    /// authenticator app entry.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self { issuer: issuer.into() }
    }

    fn build_totp(&self, secret_bytes: Vec8, account: &str) -> AppResult<TOTP> {
        TOTP::new(Algorithm::SHA1, 6, 1, 30, secret_bytes, Some(self.issuer.clone()), account.to_owned())
            .map_err(|error| AppError::Store(format!("failed to construct TOTP: {error}")))
    }
}

type Vec8 = Vec<u8>;

impl TotpProvider for TotpRsProvider {
    fn generate_secret(&self, account: &str) -> AppResult<(Vec<u8>, TotpEnrollment)> {
        let mut secret_bytes = vec![0_u8; TOTP_SECRET_LEN];
        getrandom::fill(&mut secret_bytes)
            .map_err(|error| AppError::Store(format!("failed to generate TOTP secret: {error}")))?;

        let totp = self.build_totp(secret_bytes.clone(), account)?;
        let secret_base32 = Secret::Raw(secret_bytes.clone()).to_encoded().to_string();
        let otpauth_uri = totp.get_url();

        Ok((
            secret_bytes,
            TotpEnrollment {
                secret_base32,
                otpauth_uri,
            },
        ))
    }

    fn verify_code(&self, secret_bytes: &[u8], code: &str) -> AppResult<bool> {
        let totp = self.build_totp(secret_bytes.to_vec(), "")?;
        totp.check_current(code)
            .map_err(|error| AppError::Store(format!("failed to verify TOTP code: {error}")))
    }

    fn qr_code_data_uri(&self, secret_bytes: &[u8], account: &str) -> AppResult<String> {
        let totp = self.build_totp(secret_bytes.to_vec(), account)?;
        totp.get_qr_base64()
            .map(|base64| format!("data:image/png;base64,{base64}"))
            .map_err(|error| AppError::Store(format!("failed to render TOTP QR code: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_is_full_160_bits() {
        let provider = TotpRsProvider::new("ShelfGuard");
        let (secret_bytes, enrollment) = provider
            .generate_secret("tester")
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(secret_bytes.len(), TOTP_SECRET_LEN);
        assert!(enrollment.otpauth_uri.starts_with("otpauth://totp/"));
    }

    #[test]
    fn current_code_round_trips() {
        let provider = TotpRsProvider::new("ShelfGuard");
        let (secret_bytes, _) = provider.generate_secret("tester").unwrap_or_else(|_| unreachable!());
        let totp = provider.build_totp(secret_bytes.clone(), "tester").unwrap_or_else(|_| unreachable!());
        let code = totp.generate_current().unwrap_or_else(|_| unreachable!());
        assert!(provider.verify_code(&secret_bytes, &code).unwrap_or(false));
    }
}
