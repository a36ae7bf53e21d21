use std::env;

use ethers::types::Address;
use tracing_subscriber::EnvFilter;

use crate::error::{ClientError, ClientResult};

/// Static environment configuration: the chain RPC endpoint, the poll
/// contract, the signer key and the coprocessor endpoint. Nothing here is
/// negotiated at runtime.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    /// Optional: without it the client can read polls but not vote,
    /// create, end or reveal.
    pub signer_key: Option<String>,
    pub coprocessor_url: String,
    pub security_zone: u8,
}

impl ClientConfig {
    /// Load configuration from the environment, with `.env` support.
    pub fn from_env() -> ClientResult<Self> {
        dotenvy::dotenv().ok();

        let rpc_url = require("POLL_RPC_URL")?;
        let contract_address = require("POLL_CONTRACT_ADDRESS")?
            .parse::<Address>()
            .map_err(|e| ClientError::Config(format!("invalid contract address: {e}")))?;
        let signer_key = env::var("POLL_SIGNER_KEY").ok();
        let coprocessor_url = require("FHE_COPROCESSOR_URL")?;
        let security_zone = match env::var("FHE_SECURITY_ZONE") {
            Ok(raw) => raw
                .parse::<u8>()
                .map_err(|e| ClientError::Config(format!("invalid security zone: {e}")))?,
            Err(_) => 0,
        };

        Ok(Self {
            rpc_url,
            contract_address,
            signer_key,
            coprocessor_url,
            security_zone,
        })
    }
}

fn require(key: &str) -> ClientResult<String> {
    env::var(key).map_err(|_| ClientError::Config(format!("{key} must be set")))
}

/// Install the process-wide tracing subscriber, filtered through
/// `RUST_LOG`. Call once from the embedding application.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_reads_the_full_set() {
        env::set_var("POLL_RPC_URL", "http://localhost:8545");
        env::set_var(
            "POLL_CONTRACT_ADDRESS",
            "0x744d70e58B9eE0D3e09372c0BB33e1C332A05B4c",
        );
        env::set_var("FHE_COPROCESSOR_URL", "http://localhost:3000");
        env::set_var("FHE_SECURITY_ZONE", "1");
        env::remove_var("POLL_SIGNER_KEY");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.rpc_url, "http://localhost:8545");
        assert_eq!(config.security_zone, 1);
        assert!(config.signer_key.is_none());
    }
}
