use sha2::{Digest, Sha256};

/// Server-issued parameters for login password encoding.
#[derive(Debug, Clone)]
pub struct PwdEncodeParams<'a> {
    pub user_name: &'a str,
    pub salt: &'a str,
    pub challenge: &'a str,
    pub iterations: u32,
}

/// Challenge/salt iterated SHA-256 password digest.
///
/// The irreversible variant folds the user name and salt in before the
/// challenge so the digest cannot be replayed across accounts; the reversible
/// variant chains the challenge onto the bare password hash.
pub fn encode_pwd(password: &str, params: &PwdEncodeParams<'_>, irreversible: bool) -> String {
    if irreversible {
        let mut key = sha256_hex(&format!("{}{}{}", params.user_name, params.salt, password));
        key = sha256_hex(&format!("{}{}", key, params.challenge));
        for _ in 2..params.iterations {
            key = sha256_hex(&key);
        }
        key
    } else {
        let mut key = format!("{}{}", sha256_hex(password), params.challenge);
        for _ in 1..params.iterations {
            key = sha256_hex(&key);
        }
        key
    }
}

pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
