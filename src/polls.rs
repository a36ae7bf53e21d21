use chrono::Utc;
use tracing::{info, warn};

use crate::error::ClientResult;
use crate::gateway::PollGateway;
use crate::models::{Poll, PollDraft};

/// Fetch every poll on the contract, newest first.
///
/// Read failures degrade to an empty or partial list so the caller can
/// show nothing or stale data instead of crashing.
pub async fn fetch_all_polls<G: PollGateway>(gateway: &G) -> Vec<Poll> {
    let count = match gateway.poll_count().await {
        Ok(count) => count,
        Err(err) => {
            warn!(%err, "poll count unavailable");
            return Vec::new();
        }
    };

    let mut polls = Vec::with_capacity(count as usize);
    for poll_id in 0..count {
        match gateway.fetch_poll(poll_id).await {
            Ok(poll) => polls.push(poll),
            Err(err) => warn!(poll_id, %err, "skipping unreadable poll"),
        }
    }
    polls.reverse();
    info!(fetched = polls.len(), total = count, "poll list refreshed");
    polls
}

/// Create a poll on-chain and return a placeholder entry so the caller
/// has a row to show before the next full fetch cycle.
pub async fn create_poll<G: PollGateway>(gateway: &G, draft: &PollDraft) -> ClientResult<Poll> {
    let created = gateway.create_poll(draft).await?;
    info!(poll_id = created.poll_id, tx = ?created.tx_hash, "poll created");
    Ok(Poll::placeholder(
        created.poll_id,
        draft,
        gateway.signer(),
        created.tx_hash,
        Utc::now(),
    ))
}
