//! PKCE material (RFC 7636, `S256` method)
//!
//! The verifier never leaves process memory except in the final token
//! exchange; the challenge is derived exactly once when the material is
//! generated.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// The only challenge method this client emits
pub const CHALLENGE_METHOD: &str = "S256";

/// Random bytes behind the `state` parameter (22 base64url chars)
pub const STATE_BYTES: usize = 16;

/// Random bytes behind the code verifier (64 base64url chars)
pub const VERIFIER_BYTES: usize = 48;

/// Per-flow PKCE material
#[derive(Clone)]
pub struct PkceMaterial {
    state: String,
    code_verifier: String,
    code_challenge: String,
}

impl PkceMaterial {
    /// Opaque, single-use CSRF token echoed back on the callback
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// High-entropy secret sent only to the token endpoint
    #[must_use]
    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    /// `BASE64URL(SHA256(code_verifier))`
    #[must_use]
    pub fn code_challenge(&self) -> &str {
        &self.code_challenge
    }

    /// Always [`CHALLENGE_METHOD`]
    #[must_use]
    pub fn code_challenge_method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

impl std::fmt::Debug for PkceMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceMaterial")
            .field("state", &self.state)
            .field("code_verifier", &"<redacted>")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

/// Generate fresh state, verifier and challenge from the thread-local CSPRNG
#[must_use]
pub fn generate() -> PkceMaterial {
    let state_bytes: [u8; STATE_BYTES] = rand::random();
    let verifier_bytes: [u8; VERIFIER_BYTES] = rand::random();

    let state = URL_SAFE_NO_PAD.encode(state_bytes);
    let code_verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);
    let code_challenge = code_challenge(&code_verifier);

    PkceMaterial {
        state,
        code_verifier,
        code_challenge,
    }
}

/// Derive the `S256` challenge for a verifier
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
