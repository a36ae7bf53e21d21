use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use serde::Deserialize;
use tfhe::{CompactCiphertextList, CompactPublicKey};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::EncryptedVote;

/// Type tag the coprocessor network assigns to a 64-bit unsigned
/// ciphertext.
pub const UTYPE_EUINT64: u8 = 5;

/// Key material for one security zone, bound to a wallet session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneKeys {
    pub security_zone: u8,
    /// Serialized compact public key of the zone.
    pub public_key: Vec<u8>,
}

/// Raw SDK surface: one key-exchange round trip, one encryption round
/// trip per value. No retries here; retry policy belongs to callers.
#[async_trait]
pub trait FheBackend: Send + Sync {
    async fn key_exchange(&self, wallet: Address) -> ClientResult<ZoneKeys>;
    async fn encrypt_u64(
        &self,
        keys: &ZoneKeys,
        wallet: Address,
        value: u64,
    ) -> ClientResult<EncryptedVote>;
}

struct SessionState {
    wallet: Address,
    keys: ZoneKeys,
}

/// One encryption session per connected wallet.
///
/// Session validity is tied to the wallet identity: initializing with the
/// wallet already bound is a no-op, initializing with a different wallet
/// discards the old keys and runs a fresh key exchange.
pub struct FheSession {
    backend: Arc<dyn FheBackend>,
    state: Mutex<Option<SessionState>>,
}

impl FheSession {
    pub fn new(backend: Arc<dyn FheBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(None),
        }
    }

    /// Idempotent per wallet: exactly one key exchange per wallet session.
    pub async fn initialize(&self, wallet: Address) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        if let Some(current) = state.as_ref() {
            if current.wallet == wallet {
                debug!(wallet = ?wallet, "encryption session already initialized");
                return Ok(());
            }
            info!(old = ?current.wallet, new = ?wallet, "wallet changed, re-keying encryption session");
            *state = None;
        }
        let keys = self.backend.key_exchange(wallet).await?;
        *state = Some(SessionState { wallet, keys });
        info!(wallet = ?wallet, "encryption session ready");
        Ok(())
    }

    /// Drop the session, e.g. on wallet disconnect.
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
    }

    pub async fn is_ready_for(&self, wallet: Address) -> bool {
        self.state
            .lock()
            .await
            .as_ref()
            .map(|s| s.wallet == wallet)
            .unwrap_or(false)
    }

    /// Encrypt one 64-bit value under the current session. Errors if no
    /// session is established; the caller decides whether to retry.
    pub async fn encrypt_u64(&self, value: u64) -> ClientResult<EncryptedVote> {
        let state = self.state.lock().await;
        let state = state.as_ref().ok_or_else(|| {
            ClientError::Initialization("encryption session not initialized".to_string())
        })?;
        self.backend
            .encrypt_u64(&state.keys, state.wallet, value)
            .await
    }
}

/// HTTP backend for the coprocessor network: serves per-zone public keys
/// and attests packed ciphertexts, returning the handle and signature the
/// contract verifies.
pub struct CoprocessorBackend {
    http: reqwest::Client,
    base_url: String,
    security_zone: u8,
}

#[derive(Deserialize)]
struct ZoneKeyResponse {
    public_key: String,
}

#[derive(Deserialize)]
struct AttestResponse {
    ct_hash: String,
    signature: String,
}

impl CoprocessorBackend {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.coprocessor_url.trim_end_matches('/').to_string(),
            security_zone: config.security_zone,
        }
    }
}

#[async_trait]
impl FheBackend for CoprocessorBackend {
    async fn key_exchange(&self, wallet: Address) -> ClientResult<ZoneKeys> {
        let url = format!("{}/v1/keys/{}", self.base_url, self.security_zone);
        let response = self
            .http
            .get(&url)
            .query(&[("account", format!("{wallet:#x}"))])
            .send()
            .await
            .map_err(|e| ClientError::Initialization(format!("key exchange failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ClientError::Initialization(format!(
                "key exchange rejected: {}",
                response.status()
            )));
        }
        let body: ZoneKeyResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Initialization(format!("malformed key response: {e}")))?;

        let public_key = hex::decode(body.public_key.trim_start_matches("0x"))
            .map_err(|e| ClientError::Initialization(format!("zone key is not hex: {e}")))?;
        // Fail at session setup on bad key material, not at encryption time.
        bincode::deserialize::<CompactPublicKey>(&public_key)
            .map_err(|e| ClientError::Initialization(format!("zone key does not parse: {e}")))?;

        Ok(ZoneKeys {
            security_zone: self.security_zone,
            public_key,
        })
    }

    async fn encrypt_u64(
        &self,
        keys: &ZoneKeys,
        wallet: Address,
        value: u64,
    ) -> ClientResult<EncryptedVote> {
        let public_key: CompactPublicKey = bincode::deserialize(&keys.public_key)
            .map_err(|e| ClientError::Encryption(format!("zone key does not parse: {e}")))?;

        let mut builder = CompactCiphertextList::builder(&public_key);
        builder.push(value);
        let packed = builder.build_packed();
        let ciphertext = bincode::serialize(&packed)
            .map_err(|e| ClientError::Encryption(format!("ciphertext serialization failed: {e}")))?;

        let request = serde_json::json!({
            "account": format!("{wallet:#x}"),
            "security_zone": keys.security_zone,
            "utype": UTYPE_EUINT64,
            "ciphertext": hex::encode(ciphertext),
        });
        let url = format!("{}/v1/attest", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Encryption(format!("attestation failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ClientError::Encryption(format!(
                "attestation rejected: {}",
                response.status()
            )));
        }
        let body: AttestResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Encryption(format!("malformed attestation: {e}")))?;

        let ct_hash = U256::from_str_radix(body.ct_hash.trim_start_matches("0x"), 16)
            .map_err(|e| ClientError::Encryption(format!("attestation handle is not hex: {e}")))?;
        let signature = hex::decode(body.signature.trim_start_matches("0x"))
            .map_err(|e| ClientError::Encryption(format!("attestation signature is not hex: {e}")))?;

        Ok(EncryptedVote {
            ct_hash,
            security_zone: keys.security_zone,
            utype: UTYPE_EUINT64,
            signature: Bytes::from(signature),
        })
    }
}
