use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::HeaderValue;
use serde_json::Value;
use tracing::debug;

use crate::error::ClassifiedError;
use crate::pipeline::descriptor::{EncryptionMethod, Outcome, RequestDescriptor};
use crate::pipeline::module::RequestModule;
use crate::security::cipher::PayloadCipher;

/// Header carrying the per-request nonce, base64 encoded.
pub const NONCE_HEADER: &str = "x-aes-nonce";

/// Transforms the outgoing payload when a descriptor asks for it: whole-body
/// or field-level AES, one fresh nonce per request attached as a header.
pub struct EncryptionModule {
    cipher: PayloadCipher,
}

impl EncryptionModule {
    pub fn new(secret: &str) -> Self {
        Self {
            cipher: PayloadCipher::new(secret),
        }
    }
}

#[async_trait]
impl RequestModule for EncryptionModule {
    fn name(&self) -> &'static str {
        "encryption"
    }

    async fn on_request(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<Outcome, ClassifiedError> {
        let Some(spec) = descriptor.encryption.clone() else {
            return Ok(Outcome::Proceed);
        };
        match spec.method {
            EncryptionMethod::Rsa => {
                // declared in the surface, not implemented: pass through untouched
                debug!(url = %descriptor.url, "rsa payload encryption requested, passing through");
                return Ok(Outcome::Proceed);
            }
            EncryptionMethod::Aes => {}
        }

        let nonce = PayloadCipher::generate_nonce();
        let encoded = general_purpose::STANDARD.encode(nonce);
        let header = HeaderValue::from_str(&encoded)
            .map_err(|e| ClassifiedError::encryption(format!("nonce header: {e}")))?;
        descriptor.headers.insert(NONCE_HEADER, header);

        if spec.whole_message {
            if let Some(body) = descriptor.body.take() {
                let sealed = self.cipher.encrypt_value(&body, &nonce)?;
                descriptor.body = Some(Value::String(sealed));
            }
        } else if !spec.fields.is_empty() {
            if let Some(Value::Object(map)) = descriptor.body.as_mut() {
                for field in &spec.fields {
                    // only string and object fields are sealed
                    let sealed = match map.get(field) {
                        Some(value @ (Value::String(_) | Value::Object(_))) => {
                            self.cipher.encrypt_value(value, &nonce)?
                        }
                        _ => continue,
                    };
                    map.insert(field.clone(), Value::String(sealed));
                }
            }
        }
        Ok(Outcome::Proceed)
    }
}
