//! Client-side orchestration for a confidential on-chain polling
//! application.
//!
//! Votes are homomorphically encrypted before submission and tallied in
//! ciphertext by the poll contract; decrypted aggregates only become
//! readable after a threshold reveal. This crate wires those external
//! collaborators together: a chain gateway over the contract, one
//! encryption session per wallet, the vote submission pipeline and the
//! bounded loop that waits for decryption to complete.

pub mod config;
pub mod error;
pub mod fhe;
pub mod gateway;
pub mod models;
pub mod pipeline;
pub mod polls;
pub mod resolve;
pub mod retry;

pub use config::{init_tracing, ClientConfig};
pub use error::{ClientError, ClientResult};
pub use fhe::{CoprocessorBackend, FheBackend, FheSession, ZoneKeys};
pub use gateway::{
    CreatedPoll, DecryptedResult, EthersPollGateway, PollGateway, TokenBalance,
};
pub use models::{
    EncryptedVote, EncryptionPhase, EncryptionProgress, Poll, PollDraft, PollOption, PollStatus,
    TokenGate,
};
pub use pipeline::{VotePipeline, VoteStage, VOTE_INCREMENT};
pub use polls::{create_poll, fetch_all_polls};
pub use resolve::{ResultResolver, RevealOutcome};
pub use retry::{poll_until, RetryPolicy};
