use anyhow::{Result, anyhow};
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Client credentials issued by the membership registry.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString) -> Self {
        Self {
            client_id,
            client_secret,
        }
    }

    /// Value for the outbound `Authorization` header.
    ///
    /// # Errors
    /// Returns an error if the HMAC cannot be keyed with the client secret.
    pub fn signature(&self) -> Result<String> {
        build_signature(&self.client_id, self.client_secret.expose_secret())
    }
}

/// Build `{client_id}:{base64(HMAC-SHA256(client_secret, client_id))}`.
///
/// The digest is computed over the bytes of `client_id` keyed with
/// `client_secret` and encoded as padded standard base64.
///
/// # Errors
/// Returns an error if the HMAC cannot be keyed with `client_secret`.
pub fn build_signature(client_id: &str, client_secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|e| anyhow!("Error keying HMAC with client secret: {e}"))?;
    mac.update(client_id.as_bytes());

    let digest = mac.finalize().into_bytes();

    Ok(format!("{client_id}:{}", Base64::encode_string(&digest)))
}
