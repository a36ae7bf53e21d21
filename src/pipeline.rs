use std::sync::Arc;

use chrono::Utc;
use ethers::types::H256;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::fhe::FheSession;
use crate::gateway::PollGateway;
use crate::models::{EncryptionPhase, EncryptionProgress, Poll, PollStatus};

/// Every ballot adds one unit to the chosen option's encrypted counter.
/// The option index only selects which counter receives it; encrypting the
/// index itself would add the index value to the tally instead of a vote.
pub const VOTE_INCREMENT: u64 = 1;

/// Stages of one submission, in order. `Confirmed` and `Failed` are
/// terminal; no stage may be skipped or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStage {
    Idle,
    Encrypting,
    Submitting,
    Confirmed,
    Failed,
}

/// Drives one ballot through encryption and on-chain submission, exactly
/// once, with observable progress.
pub struct VotePipeline<G> {
    gateway: Arc<G>,
    session: Arc<FheSession>,
}

impl<G: PollGateway> VotePipeline<G> {
    pub fn new(gateway: Arc<G>, session: Arc<FheSession>) -> Self {
        Self { gateway, session }
    }

    /// Encrypt and submit a vote for `option_id` in `poll`.
    ///
    /// Returns the transaction hash. Refreshing the poll list afterwards
    /// is the caller's responsibility. There is no client-side timeout:
    /// the call blocks until the wallet or chain responds.
    pub async fn cast_vote<F>(&self, poll: &Poll, option_id: u32, on_progress: F) -> ClientResult<H256>
    where
        F: Fn(EncryptionProgress),
    {
        match self.run(poll, option_id, &on_progress).await {
            Ok(tx_hash) => Ok(tx_hash),
            Err(err) => {
                error!(poll_id = poll.id, option_id, %err, "vote submission failed");
                // Reset so the caller can retry as a brand-new run.
                on_progress(EncryptionProgress::idle());
                Err(err)
            }
        }
    }

    async fn run<F>(&self, poll: &Poll, option_id: u32, on_progress: &F) -> ClientResult<H256>
    where
        F: Fn(EncryptionProgress),
    {
        if poll.status(Utc::now()) != PollStatus::Active {
            return Err(ClientError::Submission(format!(
                "poll {} is not open for voting",
                poll.id
            )));
        }
        if option_id as usize >= poll.options.len() {
            return Err(ClientError::Submission(format!(
                "option {option_id} does not exist in poll {}",
                poll.id
            )));
        }

        let voter = self.gateway.signer();
        let already_voted = match self.gateway.has_voted(poll.id, voter).await {
            Ok(voted) => voted,
            // The contract enforces single voting anyway; a failed
            // pre-flight read must not block the ballot.
            Err(err) => {
                warn!(poll_id = poll.id, %err, "hasVoted pre-flight unavailable");
                false
            }
        };
        if already_voted {
            return Err(ClientError::Submission(format!(
                "wallet {voter:#x} already voted in poll {}",
                poll.id
            )));
        }

        let mut stage = VoteStage::Idle;
        self.advance(poll.id, &mut stage, VoteStage::Encrypting);
        on_progress(EncryptionProgress::at(
            EncryptionPhase::Extract,
            20,
            "Initializing vote encryption",
        ));
        self.session.initialize(voter).await?;

        on_progress(EncryptionProgress::at(
            EncryptionPhase::Pack,
            50,
            "Encrypting vote",
        ));
        let envelope = self.session.encrypt_u64(VOTE_INCREMENT).await?;

        on_progress(EncryptionProgress::at(
            EncryptionPhase::Verify,
            90,
            "Finalizing encrypted vote",
        ));

        self.advance(poll.id, &mut stage, VoteStage::Submitting);
        let tx_hash = self
            .gateway
            .cast_vote(poll.id, option_id as u64, &envelope)
            .await?;

        self.advance(poll.id, &mut stage, VoteStage::Confirmed);
        on_progress(EncryptionProgress::at(
            EncryptionPhase::Done,
            100,
            "Vote encrypted and submitted",
        ));
        info!(poll_id = poll.id, option_id, tx = ?tx_hash, "ballot confirmed");
        Ok(tx_hash)
    }

    fn advance(&self, poll_id: u64, stage: &mut VoteStage, next: VoteStage) {
        debug!(poll_id, from = ?*stage, to = ?next, "pipeline stage");
        *stage = next;
    }
}
