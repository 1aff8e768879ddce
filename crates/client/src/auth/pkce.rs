//! PKCE (Proof Key for Code Exchange) utilities for the OAuth2 flow
//!
//! Implements the RFC 7636 verifier/challenge pair used by the platform's
//! OAuth2 authorization endpoint. The host application generates a challenge,
//! sends the user through the browser authorization step, and hands the
//! returned code plus the original verifier to
//! [`Credentials::oauth2_code`](crate::config::Credentials::oauth2_code).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Generate a cryptographically random code verifier
///
/// 32 random bytes, base64url-encoded to 43 characters (RFC 7636 requires
/// 43-128).
#[must_use]
pub fn generate_code_verifier() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Compute the code challenge for a verifier
///
/// Per RFC 7636: `BASE64URL(SHA256(ASCII(code_verifier)))`.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verifier/challenge pair for one authorization attempt
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Kept secret until token exchange
    pub code_verifier: String,

    /// Sent in the authorization request
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh pair
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge }
    }

    /// Challenge method identifier (always S256)
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}

/// Build the browser authorization URL for an OAuth2 PKCE login
///
/// # Errors
/// Returns [`ClientError::Config`] if the base URL cannot carry the
/// authorization path.
pub fn build_authorization_url(
    base_url: &Url,
    client_id: &str,
    redirect_uri: &str,
    challenge: &PkceChallenge,
) -> ClientResult<String> {
    let endpoint = base_url
        .join("/oauth2/authorize")
        .map_err(|e| ClientError::config(format!("invalid base URL: {e}")))?;

    let params = [
        ("response_type", "code"),
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("code_challenge", &challenge.code_challenge),
        ("code_challenge_method", challenge.challenge_method()),
    ];
    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!("{endpoint}?{query}"))
}
