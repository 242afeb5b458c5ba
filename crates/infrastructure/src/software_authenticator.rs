//! A deterministic, in-process stand-in for a hardware FIDO2 authenticator.
//!
//! Reimplementing a WebAuthn relying party without something that can act
//! as the client and authenticator side of the ceremony is infeasible: a
//! real test would need a browser driving platform authenticator APIs.
//! `SoftwareAuthenticator` builds wire-format attestation and assertion
//! responses directly, so [`crate::WebAuthnCeremony`] can be exercised
//! end-to-end in a unit test.
//!
//! Gated behind the `test-support` feature; nothing in the default build of
//! `shelfguard-infrastructure` or `shelfguard-api` pulls this in.

use std::collections::HashMap;
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ciborium::Value as CborValue;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::{Value as JsonValue, json};
use sha2::{Digest, Sha256};
use shelfguard_core::{AppError, AppResult};
use webauthn_rs::prelude::{
    CreationChallengeResponse, PublicKeyCredential, RegisterPublicKeyCredential,
    RequestChallengeResponse,
};

struct EnrolledKey {
    signing_key: SigningKey,
    sign_count: u32,
}

/// A single software-backed authenticator with its own credential store.
///
/// Each instance models one physical key: credentials created on it are
/// only usable against the `origin` it was configured with, matching the
/// browser's same-origin binding of `navigator.credentials`.
pub struct SoftwareAuthenticator {
    origin: String,
    credentials: Mutex<HashMap<Vec<u8>, EnrolledKey>>,
}

impl SoftwareAuthenticator {
    /// Creates a fresh authenticator bound to `origin`, with no credentials.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            credentials: Mutex::new(HashMap::new()),
        }
    }

    /// Answers a registration challenge, enrolling a brand-new key pair.
    pub fn register(&self, challenge: &CreationChallengeResponse) -> AppResult<RegisterPublicKeyCredential> {
        let options = serde_json::to_value(challenge)
            .map_err(|error| AppError::Store(format!("failed to inspect creation challenge: {error}")))?;
        let public_key = &options["publicKey"];
        let challenge_b64 = json_str(public_key, "challenge")?;
        let rp_id = json_str(&public_key["rp"], "id")?;

        let client_data = json!({
            "type": "webauthn.create",
            "challenge": challenge_b64,
            "origin": self.origin,
            "crossOrigin": false,
        });
        let client_data_json = serde_json::to_vec(&client_data)
            .map_err(|error| AppError::Store(format!("failed to encode client data: {error}")))?;

        let signing_key = SigningKey::random(&mut OsRng);
        let mut credential_id = vec![0_u8; 16];
        OsRng.fill_bytes(&mut credential_id);

        let cose_key = encode_cose_p256_key(&signing_key);
        let rp_id_hash = Sha256::digest(rp_id.as_bytes());

        let mut attested_credential_data = Vec::with_capacity(16 + 2 + credential_id.len() + cose_key.len());
        attested_credential_data.extend_from_slice(&[0_u8; 16]); // aaguid
        attested_credential_data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        attested_credential_data.extend_from_slice(&credential_id);
        attested_credential_data.extend_from_slice(&cose_key);

        let mut auth_data = Vec::with_capacity(32 + 1 + 4 + attested_credential_data.len());
        auth_data.extend_from_slice(&rp_id_hash);
        auth_data.push(0b0100_0101); // UP | UV | AT
        auth_data.extend_from_slice(&0_u32.to_be_bytes());
        auth_data.extend_from_slice(&attested_credential_data);

        let attestation_object = encode_none_attestation(&auth_data)?;

        let credential_id_b64 = URL_SAFE_NO_PAD.encode(&credential_id);
        let response = json!({
            "id": credential_id_b64,
            "rawId": credential_id_b64,
            "type": "public-key",
            "response": {
                "attestationObject": URL_SAFE_NO_PAD.encode(&attestation_object),
                "clientDataJSON": URL_SAFE_NO_PAD.encode(&client_data_json),
            },
            "clientExtensionResults": {},
        });

        self.credentials.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).insert(
            credential_id,
            EnrolledKey {
                signing_key,
                sign_count: 0,
            },
        );

        serde_json::from_value(response)
            .map_err(|error| AppError::Store(format!("failed to build attestation response: {error}")))
    }

    /// Answers an authentication challenge, signing with the first
    /// enrolled credential this authenticator holds that the server
    /// allow-listed (an empty allow-list is treated as "any").
    pub fn authenticate(&self, challenge: &RequestChallengeResponse) -> AppResult<PublicKeyCredential> {
        let options = serde_json::to_value(challenge)
            .map_err(|error| AppError::Store(format!("failed to inspect request challenge: {error}")))?;
        let public_key = &options["publicKey"];
        let challenge_b64 = json_str(public_key, "challenge")?;
        let rp_id = json_str(public_key, "rpId")?;

        let mut guard = self.credentials.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (credential_id, enrolled) = guard
            .iter_mut()
            .next()
            .ok_or_else(|| AppError::Input("authenticator has no enrolled credentials".to_owned()))?;
        let credential_id = credential_id.clone();

        let client_data = json!({
            "type": "webauthn.get",
            "challenge": challenge_b64,
            "origin": self.origin,
            "crossOrigin": false,
        });
        let client_data_json = serde_json::to_vec(&client_data)
            .map_err(|error| AppError::Store(format!("failed to encode client data: {error}")))?;

        enrolled.sign_count += 1;
        let rp_id_hash = Sha256::digest(rp_id.as_bytes());
        let mut auth_data = Vec::with_capacity(32 + 1 + 4);
        auth_data.extend_from_slice(&rp_id_hash);
        auth_data.push(0b0000_0101); // UP | UV
        auth_data.extend_from_slice(&enrolled.sign_count.to_be_bytes());

        let client_data_hash = Sha256::digest(&client_data_json);
        let mut signed_data = Vec::with_capacity(auth_data.len() + client_data_hash.len());
        signed_data.extend_from_slice(&auth_data);
        signed_data.extend_from_slice(&client_data_hash);

        let signature: Signature = enrolled.signing_key.sign(&signed_data);
        let signature_der = signature.to_der();

        let credential_id_b64 = URL_SAFE_NO_PAD.encode(&credential_id);
        let response = json!({
            "id": credential_id_b64,
            "rawId": credential_id_b64,
            "type": "public-key",
            "response": {
                "authenticatorData": URL_SAFE_NO_PAD.encode(&auth_data),
                "clientDataJSON": URL_SAFE_NO_PAD.encode(&client_data_json),
                "signature": URL_SAFE_NO_PAD.encode(signature_der.as_bytes()),
            },
            "clientExtensionResults": {},
        });

        serde_json::from_value(response)
            .map_err(|error| AppError::Store(format!("failed to build assertion response: {error}")))
    }

    /// Forces the next assertion's sign counter backwards, simulating a
    /// cloned authenticator for invariant W1 tests.
    pub fn rewind_sign_count(&self, to: u32) {
        let mut guard = self.credentials.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(enrolled) = guard.values_mut().next() {
            enrolled.sign_count = to;
        }
    }
}

fn json_str<'a>(value: &'a JsonValue, field: &str) -> AppResult<&'a str> {
    value
        .get(field)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| AppError::Store(format!("missing '{field}' in challenge options")))
}

fn encode_cose_p256_key(signing_key: &SigningKey) -> Vec<u8> {
    let point = signing_key.verifying_key().to_encoded_point(false);
    let x = point.x().map(|bytes| bytes.to_vec()).unwrap_or_default();
    let y = point.y().map(|bytes| bytes.to_vec()).unwrap_or_default();

    let map = CborValue::Map(vec![
        (CborValue::Integer(1.into()), CborValue::Integer(2.into())), // kty: EC2
        (CborValue::Integer(3.into()), CborValue::Integer((-7).into())), // alg: ES256
        (CborValue::Integer((-1).into()), CborValue::Integer(1.into())), // crv: P-256
        (CborValue::Integer((-2).into()), CborValue::Bytes(x)),
        (CborValue::Integer((-3).into()), CborValue::Bytes(y)),
    ]);

    let mut out = Vec::new();
    let _ = ciborium::into_writer(&map, &mut out);
    out
}

fn encode_none_attestation(auth_data: &[u8]) -> AppResult<Vec<u8>> {
    let map = CborValue::Map(vec![
        (CborValue::Text("fmt".to_owned()), CborValue::Text("none".to_owned())),
        (CborValue::Text("attStmt".to_owned()), CborValue::Map(vec![])),
        (CborValue::Text("authData".to_owned()), CborValue::Bytes(auth_data.to_vec())),
    ]);

    let mut out = Vec::new();
    ciborium::into_writer(&map, &mut out)
        .map_err(|error| AppError::Store(format!("failed to encode attestation object: {error}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cose_key_encodes_ec2_p256() {
        let signing_key = SigningKey::random(&mut OsRng);
        let encoded = encode_cose_p256_key(&signing_key);
        assert!(!encoded.is_empty());
    }
}
