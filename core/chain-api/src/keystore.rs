//! Polkadot-js json keystore support. Only sr25519 accounts are understood.

use {
    crate::{AccountId, Config},
    base64::{engine::general_purpose::STANDARD as BASE64, Engine},
    schnorrkel::{signing_context, SecretKey},
    serde::Deserialize,
    std::{fmt, path::Path, str::FromStr},
    subxt::utils::{MultiAddress, MultiSignature},
    xsalsa20poly1305::{
        aead::{AeadInPlace, KeyInit},
        Key, Nonce, Tag, XSalsa20Poly1305,
    },
};

const PKCS8_HEADER: [u8; 16] = [48, 83, 2, 1, 1, 48, 5, 6, 3, 43, 101, 112, 4, 34, 4, 32];
const PKCS8_DIVIDER: [u8; 5] = [161, 35, 3, 33, 0];
const SECRET_SIZE: usize = 64;
const PUBLIC_SIZE: usize = 32;

const SALT_SIZE: usize = 32;
const SCRYPT_HEADER_SIZE: usize = SALT_SIZE + 3 * 4;
const SCRYPT_OUTPUT_SIZE: usize = 64;
const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;

const SIGNING_CONTEXT: &[u8] = b"substrate";

#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("failed to read keystore: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid keystore: {0}")]
    Format(String),
    #[error("unsupported keystore content: {0:?}")]
    Unsupported(Vec<String>),
    #[error("failed to decrypt keystore: {0}")]
    Decryption(&'static str),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn contains(&self, needle: &str) -> bool {
        match self {
            Self::One(value) => value == needle,
            Self::Many(values) => values.iter().any(|v| v == needle),
        }
    }
}

#[derive(Deserialize)]
struct Encoding {
    content: Vec<String>,
    #[serde(rename = "type")]
    kind: OneOrMany,
}

/// Encrypted account as exported by polkadot-js compatible wallets.
#[derive(Deserialize)]
pub struct Keystore {
    address: String,
    #[serde(default)]
    encoded: String,
    encoding: Encoding,
}

impl Keystore {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeystoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, KeystoreError> {
        serde_json::from_str(content).map_err(|e| KeystoreError::Format(e.to_string()))
    }

    /// Decrypts the stored key. An entry without an encoded key (watch-only account) produces a
    /// locked [`Account`].
    pub fn unlock(&self, password: &str) -> Result<Account, KeystoreError> {
        let address = AccountId::from_str(&self.address)
            .map_err(|e| KeystoreError::Format(format!("invalid address: {e:?}")))?;

        if !self.encoding.content.iter().any(|c| c == "sr25519") {
            return Err(KeystoreError::Unsupported(self.encoding.content.clone()));
        }

        if self.encoded.is_empty() {
            return Ok(Account {
                address,
                keypair: None,
            });
        }

        let encoded = BASE64
            .decode(&self.encoded)
            .map_err(|e| KeystoreError::Format(format!("invalid base64 payload: {e}")))?;

        let pkcs8 = if self.encoding.kind.contains("xsalsa20-poly1305") {
            self.decrypt(password, &encoded)?
        } else {
            encoded
        };

        let keypair = decode_pkcs8(&pkcs8)?;
        if keypair.public.to_bytes() != address.0 {
            return Err(KeystoreError::Decryption("key does not belong to the address"));
        }

        Ok(Account {
            address,
            keypair: Some(keypair),
        })
    }

    fn decrypt(&self, password: &str, data: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        let (key, data) = if self.encoding.kind.contains("scrypt") {
            let (header, rest) = split(data, SCRYPT_HEADER_SIZE)?;
            (scrypt_key(password, header)?, rest)
        } else {
            (padded_key(password), data)
        };

        let (nonce, rest) = split(data, NONCE_SIZE)?;
        let (tag, ciphertext) = split(rest, TAG_SIZE)?;

        let mut buffer = ciphertext.to_vec();
        XSalsa20Poly1305::new(Key::from_slice(&key))
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce),
                &[],
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| KeystoreError::Decryption("invalid password or corrupted payload"))?;
        Ok(buffer)
    }
}

fn split(data: &[u8], at: usize) -> Result<(&[u8], &[u8]), KeystoreError> {
    if data.len() < at {
        return Err(KeystoreError::Format("encrypted payload is truncated".into()));
    }
    Ok(data.split_at(at))
}

fn scrypt_key(password: &str, header: &[u8]) -> Result<[u8; KEY_SIZE], KeystoreError> {
    let (salt, params) = header.split_at(SALT_SIZE);
    let mut words = params
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]));
    let (Some(n), Some(p), Some(r)) = (words.next(), words.next(), words.next()) else {
        return Err(KeystoreError::Format("truncated scrypt parameters".into()));
    };

    if !n.is_power_of_two() {
        return Err(KeystoreError::Format(format!("scrypt N is not a power of two: {n}")));
    }

    let params = scrypt::Params::new(n.trailing_zeros() as u8, r, p, SCRYPT_OUTPUT_SIZE)
        .map_err(|e| KeystoreError::Format(format!("invalid scrypt parameters: {e}")))?;
    let mut output = [0; SCRYPT_OUTPUT_SIZE];
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut output)
        .map_err(|e| KeystoreError::Format(format!("scrypt failed: {e}")))?;

    let mut key = [0; KEY_SIZE];
    key.copy_from_slice(&output[..KEY_SIZE]);
    Ok(key)
}

fn padded_key(password: &str) -> [u8; KEY_SIZE] {
    let mut key = [0; KEY_SIZE];
    let len = password.len().min(KEY_SIZE);
    key[..len].copy_from_slice(&password.as_bytes()[..len]);
    key
}

fn decode_pkcs8(data: &[u8]) -> Result<schnorrkel::Keypair, KeystoreError> {
    const CORRUPTED: KeystoreError = KeystoreError::Decryption("corrupted pkcs8 payload");

    let body = data.strip_prefix(&PKCS8_HEADER).ok_or(CORRUPTED)?;
    if body.len() != SECRET_SIZE + PKCS8_DIVIDER.len() + PUBLIC_SIZE {
        return Err(CORRUPTED);
    }

    let (secret, rest) = body.split_at(SECRET_SIZE);
    let (divider, public) = rest.split_at(PKCS8_DIVIDER.len());
    if divider != PKCS8_DIVIDER {
        return Err(CORRUPTED);
    }

    let keypair = SecretKey::from_ed25519_bytes(secret)
        .map_err(|_| CORRUPTED)?
        .to_keypair();
    if keypair.public.to_bytes() != public {
        return Err(CORRUPTED);
    }

    Ok(keypair)
}

/// Account loaded from a keystore. The key is missing when the keystore only holds the address.
pub struct Account {
    address: AccountId,
    keypair: Option<schnorrkel::Keypair>,
}

impl Account {
    pub fn address(&self) -> &AccountId {
        &self.address
    }

    pub fn is_locked(&self) -> bool {
        self.keypair.is_none()
    }

    pub fn signer(&self) -> Option<AccountSigner> {
        self.keypair.clone().map(|keypair| AccountSigner {
            address: self.address.clone(),
            keypair,
        })
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address.to_string())
            .field("locked", &self.is_locked())
            .finish()
    }
}

pub struct AccountSigner {
    address: AccountId,
    keypair: schnorrkel::Keypair,
}

impl AccountSigner {
    pub fn address(&self) -> &AccountId {
        &self.address
    }
}

impl subxt::tx::Signer<Config> for AccountSigner {
    fn account_id(&self) -> AccountId {
        self.address.clone()
    }

    fn address(&self) -> MultiAddress<AccountId, ()> {
        self.address.clone().into()
    }

    fn sign(&self, signer_payload: &[u8]) -> MultiSignature {
        let signature = self
            .keypair
            .sign(signing_context(SIGNING_CONTEXT).bytes(signer_payload));
        MultiSignature::Sr25519(signature.to_bytes())
    }
}
