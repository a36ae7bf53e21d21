use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ethers::contract::{abigen, ContractCall, EthLogDecode};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};
use tracing::info;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{EncryptedVote, Poll, PollDraft, PollOption, TokenGate};

abigen!(
    SecureVotePoll,
    r#"[
        function pollCounter() view returns (uint256)
        function getPoll(uint256 pollId) view returns (string question, string description, string category, uint256 endsAt, address creator, bool isActive, bool resultsRevealed, uint256 optionCount, uint256 totalVotes, string[] optionLabels, address tokenAddress, uint256 minimumTokenBalance)
        function createPoll(string question, string description, string category, uint256 durationInMinutes, string[] optionLabels, address tokenAddress, uint256 minimumTokenBalance) returns (uint256)
        function castVote(uint256 pollId, uint256 optionId, (uint256,uint8,uint8,bytes) encryptedVote)
        function endPoll(uint256 pollId)
        function revealResults(uint256 pollId)
        function getDecryptedResult(uint256 pollId, uint256 optionId) view returns (uint128 value, bool isDecrypted)
        function hasVoted(uint256 pollId, address voter) view returns (bool)
        event PollCreated(uint256 indexed pollId, address indexed creator)
    ]"#
);

abigen!(
    Erc20,
    r#"[
        function balanceOf(address account) view returns (uint256)
        function symbol() view returns (string)
        function decimals() view returns (uint8)
    ]"#
);

/// One option's tally as reported by the contract after a reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptedResult {
    pub value: u64,
    /// False while the threshold network has not finished decrypting.
    /// Not an error; `value` is meaningless until this flips.
    pub is_decrypted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedPoll {
    pub poll_id: u64,
    pub tx_hash: H256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub balance: U256,
    pub symbol: String,
    pub decimals: u8,
}

/// Read/write surface of the on-chain poll contract. Pure
/// request/response; no state lives here.
#[async_trait]
pub trait PollGateway: Send + Sync {
    /// Address of the connected signer.
    fn signer(&self) -> Address;

    async fn poll_count(&self) -> ClientResult<u64>;
    async fn fetch_poll(&self, poll_id: u64) -> ClientResult<Poll>;
    async fn create_poll(&self, draft: &PollDraft) -> ClientResult<CreatedPoll>;
    async fn cast_vote(
        &self,
        poll_id: u64,
        option_id: u64,
        vote: &EncryptedVote,
    ) -> ClientResult<H256>;
    async fn end_poll(&self, poll_id: u64) -> ClientResult<H256>;
    async fn reveal_results(&self, poll_id: u64) -> ClientResult<H256>;
    async fn decrypted_result(&self, poll_id: u64, option_id: u64) -> ClientResult<DecryptedResult>;
    async fn has_voted(&self, poll_id: u64, voter: Address) -> ClientResult<bool>;
    async fn token_balance(&self, token: Address, holder: Address) -> ClientResult<TokenBalance>;
}

type ChainClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Ethers-backed gateway over an HTTP JSON-RPC endpoint.
pub struct EthersPollGateway {
    contract: SecureVotePoll<ChainClient>,
    client: Arc<ChainClient>,
}

impl EthersPollGateway {
    pub async fn connect(config: &ClientConfig) -> ClientResult<Self> {
        let key = config
            .signer_key
            .as_deref()
            .ok_or_else(|| ClientError::Connection("no signer key configured".to_string()))?;

        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| ClientError::Connection(format!("rpc provider error: {e}")))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| ClientError::Connection(format!("chain id lookup failed: {e}")))?;
        let wallet = key
            .parse::<LocalWallet>()
            .map_err(|e| ClientError::Connection(format!("invalid signer key: {e}")))?
            .with_chain_id(chain_id.as_u64());

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let contract = SecureVotePoll::new(config.contract_address, Arc::clone(&client));
        info!(contract = ?config.contract_address, chain_id = chain_id.as_u64(), "gateway connected");
        Ok(Self { contract, client })
    }

    async fn send_tx(&self, call: ContractCall<ChainClient, ()>, label: &str) -> ClientResult<H256> {
        let pending = call
            .send()
            .await
            .map_err(|e| ClientError::Submission(format!("{label} send failed: {e}")))?;
        let receipt = pending
            .await
            .map_err(|e| ClientError::Submission(format!("{label} confirmation failed: {e}")))?
            .ok_or_else(|| ClientError::Submission(format!("{label} transaction dropped")))?;
        Ok(receipt.transaction_hash)
    }
}

#[async_trait]
impl PollGateway for EthersPollGateway {
    fn signer(&self) -> Address {
        self.client.signer().address()
    }

    async fn poll_count(&self) -> ClientResult<u64> {
        let count = self
            .contract
            .poll_counter()
            .call()
            .await
            .map_err(|e| ClientError::Fetch(format!("pollCounter failed: {e}")))?;
        Ok(count.low_u64())
    }

    async fn fetch_poll(&self, poll_id: u64) -> ClientResult<Poll> {
        let (
            question,
            description,
            category,
            ends_at,
            creator,
            is_active,
            results_revealed,
            option_count,
            total_votes,
            option_labels,
            token_address,
            minimum_token_balance,
        ) = self
            .contract
            .get_poll(U256::from(poll_id))
            .call()
            .await
            .map_err(|e| ClientError::Fetch(format!("getPoll({poll_id}) failed: {e}")))?;

        let ends_at = unix_to_datetime(ends_at)?;
        let option_count = option_count.low_u64() as u32;
        let options = (0..option_count)
            .map(|id| PollOption {
                id,
                label: option_labels
                    .get(id as usize)
                    .cloned()
                    .unwrap_or_else(|| format!("Option {}", id + 1)),
                vote_count: None,
            })
            .collect();
        let token_gate = if token_address == Address::zero() {
            None
        } else {
            Some(TokenGate {
                token: token_address,
                minimum_balance: minimum_token_balance,
            })
        };

        Ok(Poll {
            id: poll_id,
            question,
            description,
            category,
            ends_at,
            creator,
            is_active,
            results_revealed,
            total_votes: total_votes.low_u64(),
            options,
            token_gate,
            tx_hash: None,
        })
    }

    async fn create_poll(&self, draft: &PollDraft) -> ClientResult<CreatedPoll> {
        // address(0) and a zero minimum mean an ungated poll.
        let gate = draft.token_gate.unwrap_or(TokenGate {
            token: Address::zero(),
            minimum_balance: U256::zero(),
        });
        let call = self.contract.create_poll(
            draft.question.clone(),
            draft.description.clone(),
            draft.category.clone(),
            U256::from(draft.duration_minutes),
            draft.options.clone(),
            gate.token,
            gate.minimum_balance,
        );

        let pending = call
            .send()
            .await
            .map_err(|e| ClientError::Submission(format!("createPoll send failed: {e}")))?;
        let receipt = pending
            .await
            .map_err(|e| ClientError::Submission(format!("createPoll confirmation failed: {e}")))?
            .ok_or_else(|| ClientError::Submission("createPoll transaction dropped".to_string()))?;

        let poll_id = receipt
            .logs
            .iter()
            .find_map(|log| PollCreatedFilter::decode_log(&log.clone().into()).ok())
            .map(|event| event.poll_id.low_u64())
            .ok_or_else(|| ClientError::Submission("PollCreated event not found".to_string()))?;

        Ok(CreatedPoll {
            poll_id,
            tx_hash: receipt.transaction_hash,
        })
    }

    async fn cast_vote(
        &self,
        poll_id: u64,
        option_id: u64,
        vote: &EncryptedVote,
    ) -> ClientResult<H256> {
        let call = self.contract.cast_vote(
            U256::from(poll_id),
            U256::from(option_id),
            vote.as_tuple(),
        );
        let tx_hash = self.send_tx(call, "castVote").await?;
        info!(poll_id, option_id, tx = ?tx_hash, "vote transaction confirmed");
        Ok(tx_hash)
    }

    async fn end_poll(&self, poll_id: u64) -> ClientResult<H256> {
        self.send_tx(self.contract.end_poll(U256::from(poll_id)), "endPoll")
            .await
    }

    async fn reveal_results(&self, poll_id: u64) -> ClientResult<H256> {
        self.send_tx(
            self.contract.reveal_results(U256::from(poll_id)),
            "revealResults",
        )
        .await
    }

    async fn decrypted_result(&self, poll_id: u64, option_id: u64) -> ClientResult<DecryptedResult> {
        let (value, is_decrypted) = self
            .contract
            .get_decrypted_result(U256::from(poll_id), U256::from(option_id))
            .call()
            .await
            .map_err(|e| {
                ClientError::Fetch(format!(
                    "getDecryptedResult({poll_id}, {option_id}) failed: {e}"
                ))
            })?;
        let value = u64::try_from(value).map_err(|_| {
            ClientError::Fetch(format!("tally for option {option_id} overflows u64"))
        })?;
        Ok(DecryptedResult {
            value,
            is_decrypted,
        })
    }

    async fn has_voted(&self, poll_id: u64, voter: Address) -> ClientResult<bool> {
        self.contract
            .has_voted(U256::from(poll_id), voter)
            .call()
            .await
            .map_err(|e| ClientError::Fetch(format!("hasVoted({poll_id}) failed: {e}")))
    }

    async fn token_balance(&self, token: Address, holder: Address) -> ClientResult<TokenBalance> {
        let erc20 = Erc20::new(token, Arc::clone(&self.client));
        let balance = erc20
            .balance_of(holder)
            .call()
            .await
            .map_err(|e| ClientError::Fetch(format!("balanceOf failed: {e}")))?;
        // Symbol and decimals are cosmetic; fall back rather than fail.
        let symbol = erc20
            .symbol()
            .call()
            .await
            .unwrap_or_else(|_| "TOKEN".to_string());
        let decimals = erc20.decimals().call().await.unwrap_or(18);
        Ok(TokenBalance {
            balance,
            symbol,
            decimals,
        })
    }
}

fn unix_to_datetime(seconds: U256) -> ClientResult<DateTime<Utc>> {
    Utc.timestamp_opt(seconds.low_u64() as i64, 0)
        .single()
        .ok_or_else(|| ClientError::Fetch(format!("timestamp {seconds} out of range")))
}
