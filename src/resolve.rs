use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::ClientResult;
use crate::gateway::PollGateway;
use crate::models::Poll;
use crate::retry::{poll_until, RetryPolicy};

/// Terminal outcome of one resolution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RevealOutcome {
    /// Every option's tally decrypted. `discrepancy` is raised when the
    /// chain recorded votes but every decrypted tally is zero, so the
    /// caller can warn instead of presenting misleading zeros.
    Decrypted { tallies: Vec<u64>, discrepancy: bool },
    /// Budget exhausted before decryption completed. Not an error: the
    /// caller should offer a manual re-trigger.
    Pending { attempts: u32 },
    /// A newer run for the same poll took over; discard this result.
    Superseded,
}

/// Polls the chain after a reveal request until every option's tally is
/// decrypted, on a fixed-interval budget. At most one run is live per
/// poll: resolving again supersedes the run in flight and restarts the
/// attempt counter from zero.
pub struct ResultResolver<G> {
    gateway: Arc<G>,
    policy: RetryPolicy,
    generations: Mutex<HashMap<u64, u64>>,
}

impl<G: PollGateway> ResultResolver<G> {
    pub fn new(gateway: Arc<G>, policy: RetryPolicy) -> Self {
        Self {
            gateway,
            policy,
            generations: Mutex::new(HashMap::new()),
        }
    }

    /// Request the on-chain reveal, then watch for decrypted tallies.
    pub async fn reveal_and_resolve(&self, poll: &Poll) -> ClientResult<RevealOutcome> {
        let tx_hash = self.gateway.reveal_results(poll.id).await?;
        info!(poll_id = poll.id, tx = ?tx_hash, "decryption requested");
        self.resolve(poll).await
    }

    pub async fn resolve(&self, poll: &Poll) -> ClientResult<RevealOutcome> {
        self.resolve_poll(poll.id, poll.options.len() as u32, poll.total_votes)
            .await
    }

    pub async fn resolve_poll(
        &self,
        poll_id: u64,
        option_count: u32,
        total_votes: u64,
    ) -> ClientResult<RevealOutcome> {
        let generation = self.begin(poll_id);
        let outcome = poll_until(self.policy, |round| {
            self.sweep(poll_id, option_count, total_votes, generation, round)
        })
        .await?;

        Ok(outcome.unwrap_or(RevealOutcome::Pending {
            attempts: self.policy.max_attempts,
        }))
    }

    fn begin(&self, poll_id: u64) -> u64 {
        let mut generations = self.generations.lock().expect("generation map poisoned");
        let entry = generations.entry(poll_id).or_insert(0);
        *entry += 1;
        *entry
    }

    fn is_current(&self, poll_id: u64, generation: u64) -> bool {
        let generations = self.generations.lock().expect("generation map poisoned");
        generations.get(&poll_id).copied() == Some(generation)
    }

    /// One sweep over all options, strictly sequential. Every option is
    /// queried on every sweep so a late option cannot starve the others.
    async fn sweep(
        &self,
        poll_id: u64,
        option_count: u32,
        total_votes: u64,
        generation: u64,
        round: u32,
    ) -> ClientResult<Option<RevealOutcome>> {
        if !self.is_current(poll_id, generation) {
            return Ok(Some(RevealOutcome::Superseded));
        }

        let mut tallies = Vec::with_capacity(option_count as usize);
        let mut all_decrypted = true;
        for option_id in 0..option_count as u64 {
            let result = self.gateway.decrypted_result(poll_id, option_id).await?;
            if result.is_decrypted {
                tallies.push(result.value);
            } else {
                all_decrypted = false;
                tallies.push(0);
            }
        }

        if !all_decrypted {
            info!(poll_id, attempt = round + 1, "decryption pending");
            return Ok(None);
        }

        let sum: u64 = tallies.iter().sum();
        let discrepancy = total_votes > 0 && sum == 0;
        if discrepancy {
            warn!(
                poll_id,
                total_votes, "votes recorded on-chain but every decrypted tally is zero"
            );
        }
        info!(poll_id, ?tallies, "all option tallies decrypted");
        Ok(Some(RevealOutcome::Decrypted {
            tallies,
            discrepancy,
        }))
    }
}
