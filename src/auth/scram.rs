//! SCRAM-SHA-256 authentication implementation
//!
//! Implements the SCRAM-SHA-256 (Salted Challenge Response Authentication
//! Mechanism) client side as defined in RFC 5802 / RFC 7677 for PostgreSQL
//! authentication (Postgres 10+). Channel binding is not used; the GS2
//! header is always `n,,` and the `c=` attribute is always `biws`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// SCRAM authentication error types
#[derive(Debug, Clone)]
pub enum ScramError {
    /// Server signature did not match the locally computed one
    SignatureMismatch,
    /// Invalid server message format
    InvalidServerMessage(String),
    /// Base64 decoding error
    Base64Error(String),
    /// HMAC keying error
    KeyError(String),
}

impl fmt::Display for ScramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScramError::SignatureMismatch => write!(f, "server signature mismatch"),
            ScramError::InvalidServerMessage(msg) => write!(f, "invalid server message: {}", msg),
            ScramError::Base64Error(msg) => write!(f, "Base64 error: {}", msg),
            ScramError::KeyError(msg) => write!(f, "key error: {}", msg),
        }
    }
}

impl std::error::Error for ScramError {}

/// Internal state carried between the client-final message and the
/// server-final verification
#[derive(Clone, Debug)]
pub struct ScramState {
    /// Combined authentication message (for verification)
    auth_message: Vec<u8>,
    /// Server key (for verification calculation)
    server_key: Vec<u8>,
}

/// SCRAM-SHA-256 client implementation
///
/// Lives only for the duration of one handshake; all derived key material
/// is dropped with it on success or failure.
pub struct ScramClient {
    username: String,
    password: String,
    nonce: String,
}

impl ScramClient {
    /// Create a new SCRAM client with a fresh 24-byte random nonce
    pub fn new(username: String, password: String) -> Self {
        let mut rng = rand::thread_rng();
        let nonce_bytes: Vec<u8> = (0..24).map(|_| rng.gen()).collect();
        let nonce = BASE64.encode(&nonce_bytes);

        Self {
            username,
            password,
            nonce,
        }
    }

    /// Create a client with a fixed nonce, for exchange tests against
    /// known vectors
    #[doc(hidden)]
    pub fn with_nonce(username: String, password: String, nonce: String) -> Self {
        Self {
            username,
            password,
            nonce,
        }
    }

    /// Generate client first message: `n,,n=<user>,r=<nonce>`
    pub fn client_first(&self) -> String {
        format!("n,,{}", self.client_first_bare())
    }

    fn client_first_bare(&self) -> String {
        format!("n={},r={}", self.username, self.nonce)
    }

    /// Process server first message and generate client final message
    ///
    /// Returns (client_final_message, internal_state)
    pub fn client_final(&mut self, server_first: &str) -> Result<(String, ScramState), ScramError> {
        // Parse server first message: r=<client_nonce><server_nonce>,s=<salt>,i=<iterations>
        let (server_nonce, salt, iterations) = parse_server_first(server_first)?;

        // Verify server nonce starts with our client nonce
        if !server_nonce.starts_with(&self.nonce) {
            return Err(ScramError::InvalidServerMessage(
                "server nonce does not extend the client nonce".to_string(),
            ));
        }

        // Decode salt and iterations
        let salt_bytes = BASE64
            .decode(&salt)
            .map_err(|_| ScramError::Base64Error("invalid salt encoding".to_string()))?;
        let iterations = iterations
            .parse::<u32>()
            .map_err(|_| ScramError::InvalidServerMessage("invalid iteration count".to_string()))?;

        // No channel binding: c = base64("n,,") = "biws"
        let client_final_without_proof = format!("c=biws,r={}", server_nonce);

        // AuthMessage = client-first-bare , server-first , client-final-without-proof
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare(),
            server_first,
            client_final_without_proof
        );

        let salted_password = salt_password(&self.password, &salt_bytes, iterations);

        // ClientKey := HMAC(SaltedPassword, "Client Key")
        // StoredKey := SHA256(ClientKey)
        // ClientSignature := HMAC(StoredKey, AuthMessage)
        // ClientProof := ClientKey XOR ClientSignature
        let client_key = hmac_sha256(&salted_password, b"Client Key")?;
        let stored_key = Sha256::digest(&client_key);
        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;

        let mut proof = client_key;
        for (proof_byte, sig_byte) in proof.iter_mut().zip(client_signature.iter()) {
            *proof_byte ^= sig_byte;
        }

        // ServerKey := HMAC(SaltedPassword, "Server Key"), kept for the
        // server-final verification
        let server_key = hmac_sha256(&salted_password, b"Server Key")?;

        let client_final = format!("{},p={}", client_final_without_proof, BASE64.encode(&proof));

        let state = ScramState {
            auth_message: auth_message.into_bytes(),
            server_key,
        };

        Ok((client_final, state))
    }

    /// Verify server final message (`v=<signature>`) and confirm
    /// authentication
    pub fn verify_server_final(
        &self,
        server_final: &str,
        state: &ScramState,
    ) -> Result<(), ScramError> {
        let server_sig_encoded = server_final
            .strip_prefix("v=")
            .ok_or_else(|| ScramError::InvalidServerMessage("missing 'v=' prefix".to_string()))?;

        let server_signature = BASE64.decode(server_sig_encoded).map_err(|_| {
            ScramError::Base64Error("invalid server signature encoding".to_string())
        })?;

        // ServerSignature := HMAC(ServerKey, AuthMessage)
        let expected_signature = hmac_sha256(&state.server_key, &state.auth_message)
            .map_err(|_| ScramError::SignatureMismatch)?;

        if constant_time_compare(&server_signature, &expected_signature) {
            Ok(())
        } else {
            Err(ScramError::SignatureMismatch)
        }
    }
}

/// SaltedPassword := PBKDF2-HMAC-SHA256(password, salt, iterations, 32)
fn salt_password(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut salted_password = [0u8; 32];
    let _ = pbkdf2::<HmacSha256>(password.as_bytes(), salt, iterations, &mut salted_password);
    salted_password
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ScramError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| ScramError::KeyError("HMAC key error".to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Parse server first message format: r=<nonce>,s=<salt>,i=<iterations>
fn parse_server_first(msg: &str) -> Result<(String, String, String), ScramError> {
    let mut nonce = String::new();
    let mut salt = String::new();
    let mut iterations = String::new();

    for part in msg.split(',') {
        if let Some(value) = part.strip_prefix("r=") {
            nonce = value.to_string();
        } else if let Some(value) = part.strip_prefix("s=") {
            salt = value.to_string();
        } else if let Some(value) = part.strip_prefix("i=") {
            iterations = value.to_string();
        }
    }

    if nonce.is_empty() || salt.is_empty() || iterations.is_empty() {
        return Err(ScramError::InvalidServerMessage(
            "missing required fields in server first message".to_string(),
        ));
    }

    Ok((nonce, salt, iterations))
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
