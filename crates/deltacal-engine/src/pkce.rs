//! PKCE material for the authorization flow (RFC 7636).
//!
//! Each connection attempt gets a fresh [`PkceFlow`]: a random code
//! verifier, the SHA-256 challenge derived from it, and a state value that
//! correlates the redirect result and guards against CSRF. The verifier is
//! single-use; it accompanies the code exchange to prove possession and is
//! discarded with the flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};

/// Google's OAuth consent endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Raw byte lengths before base64url encoding.
const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 16;

/// Random bytes as an unpadded base64url string.
fn random_urlsafe(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// The S256 challenge for a code verifier.
fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// One authorization attempt's PKCE material.
#[derive(Debug, Clone)]
pub struct PkceFlow {
    /// High-entropy code verifier, kept for the code exchange.
    pub verifier: String,
    /// SHA-256 challenge sent with the consent request.
    pub challenge: String,
    /// Anti-CSRF state, also the redirect-result correlation key.
    pub state: String,
}

impl PkceFlow {
    /// Generates fresh verifier, challenge, and state.
    pub fn new() -> Self {
        let verifier = random_urlsafe(VERIFIER_BYTES);
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
            state: random_urlsafe(STATE_BYTES),
        }
    }

    /// Builds the consent-page URL for this flow.
    ///
    /// Offline access with a forced consent prompt, so the provider always
    /// issues a refresh token.
    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        let scope = scopes.join(" ");
        let params = [
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", &scope),
            ("code_challenge", &self.challenge),
            ("code_challenge_method", "S256"),
            ("state", &self.state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ];

        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{GOOGLE_AUTH_URL}?{query}")
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}
