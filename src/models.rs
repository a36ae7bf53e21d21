use chrono::{DateTime, Duration, Utc};
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// Display status of a poll. Always derived from the chain-owned fields
/// via [`Poll::status`], never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollStatus {
    Active,
    Closed,
    Revealed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    /// Zero-based index within the poll. Order-significant: it is the key
    /// of the on-chain tally counter.
    pub id: u32,
    pub label: String,
    /// Present only after the option's tally has been decrypted.
    pub vote_count: Option<u64>,
}

/// ERC-20 gate restricting who may vote in a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGate {
    pub token: Address,
    pub minimum_balance: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    /// Sequential on-chain identifier, stable once assigned.
    pub id: u64,
    pub question: String,
    pub description: String,
    pub category: String,
    pub ends_at: DateTime<Utc>,
    pub creator: Address,
    pub is_active: bool,
    pub results_revealed: bool,
    pub total_votes: u64,
    pub options: Vec<PollOption>,
    pub token_gate: Option<TokenGate>,
    /// Set only on the placeholder entry returned right after creation.
    pub tx_hash: Option<H256>,
}

impl Poll {
    /// Derive the display status from the chain-owned fields and the
    /// current time. Revealed wins over everything else.
    pub fn status(&self, now: DateTime<Utc>) -> PollStatus {
        if self.results_revealed {
            PollStatus::Revealed
        } else if now > self.ends_at || !self.is_active {
            PollStatus::Closed
        } else {
            PollStatus::Active
        }
    }

    /// The contract lets the creator end a poll at any time, and anyone
    /// end it once the deadline has passed.
    pub fn can_end(&self, caller: Address, now: DateTime<Utc>) -> bool {
        caller == self.creator || now > self.ends_at
    }

    /// Synthetic entry appended right after `createPoll` confirms, so the
    /// caller has a row to show before the next full fetch cycle.
    pub fn placeholder(
        id: u64,
        draft: &PollDraft,
        creator: Address,
        tx_hash: H256,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            question: draft.question.clone(),
            description: draft.description.clone(),
            category: draft.category.clone(),
            ends_at: now + Duration::minutes(draft.duration_minutes as i64),
            creator,
            is_active: true,
            results_revealed: false,
            total_votes: 0,
            options: draft
                .options
                .iter()
                .enumerate()
                .map(|(id, label)| PollOption {
                    id: id as u32,
                    label: label.clone(),
                    vote_count: None,
                })
                .collect(),
            token_gate: draft.token_gate,
            tx_hash: Some(tx_hash),
        }
    }
}

/// Creation form data for a new poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDraft {
    pub question: String,
    pub description: String,
    pub category: String,
    pub duration_minutes: u64,
    pub options: Vec<String>,
    pub token_gate: Option<TokenGate>,
}

/// Opaque signed ciphertext envelope produced by the encryption adapter.
/// Matches the contract's input struct; passed through unmodified, the
/// client never inspects or mutates its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedVote {
    pub ct_hash: U256,
    pub security_zone: u8,
    pub utype: u8,
    pub signature: Bytes,
}

impl EncryptedVote {
    /// The tuple shape the contract binding expects.
    pub fn as_tuple(&self) -> (U256, u8, u8, Bytes) {
        (
            self.ct_hash,
            self.security_zone,
            self.utype,
            self.signature.clone(),
        )
    }
}

/// Coarse phases of one encryption attempt, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionPhase {
    Extract,
    Pack,
    Verify,
    Done,
}

/// Transient pipeline progress reported to the caller. `progress` is
/// monotonically non-decreasing within one vote attempt and resets to the
/// idle baseline between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionProgress {
    pub is_encrypting: bool,
    pub progress: u8,
    pub message: String,
    pub phase: Option<EncryptionPhase>,
}

impl EncryptionProgress {
    /// Baseline state between attempts.
    pub fn idle() -> Self {
        Self {
            is_encrypting: false,
            progress: 0,
            message: String::new(),
            phase: None,
        }
    }

    pub(crate) fn at(phase: EncryptionPhase, progress: u8, message: &str) -> Self {
        Self {
            is_encrypting: progress < 100,
            progress,
            message: message.to_string(),
            phase: Some(phase),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_poll(ends_at: DateTime<Utc>, is_active: bool, results_revealed: bool) -> Poll {
        Poll {
            id: 0,
            question: "Ship it?".to_string(),
            description: String::new(),
            category: "Governance".to_string(),
            ends_at,
            creator: Address::repeat_byte(0x11),
            is_active,
            results_revealed,
            total_votes: 0,
            options: vec![
                PollOption {
                    id: 0,
                    label: "Yes".to_string(),
                    vote_count: None,
                },
                PollOption {
                    id: 1,
                    label: "No".to_string(),
                    vote_count: None,
                },
            ],
            token_gate: None,
            tx_hash: None,
        }
    }

    #[test]
    fn status_is_active_before_deadline() {
        let now = Utc::now();
        let poll = sample_poll(now + Duration::hours(1), true, false);
        assert_eq!(poll.status(now), PollStatus::Active);
    }

    #[test]
    fn status_is_closed_after_deadline() {
        let now = Utc::now();
        let poll = sample_poll(now - Duration::minutes(1), true, false);
        assert_eq!(poll.status(now), PollStatus::Closed);
    }

    #[test]
    fn status_is_closed_when_deactivated_early() {
        let now = Utc::now();
        let poll = sample_poll(now + Duration::hours(1), false, false);
        assert_eq!(poll.status(now), PollStatus::Closed);
    }

    #[test]
    fn revealed_wins_over_every_other_field() {
        let now = Utc::now();
        for (ends_at, is_active) in [
            (now + Duration::hours(1), true),
            (now + Duration::hours(1), false),
            (now - Duration::hours(1), true),
            (now - Duration::hours(1), false),
        ] {
            let poll = sample_poll(ends_at, is_active, true);
            assert_eq!(poll.status(now), PollStatus::Revealed);
        }
    }

    #[test]
    fn creator_can_end_any_time_others_only_after_deadline() {
        let now = Utc::now();
        let poll = sample_poll(now + Duration::hours(1), true, false);
        let outsider = Address::repeat_byte(0x22);

        assert!(poll.can_end(poll.creator, now));
        assert!(!poll.can_end(outsider, now));

        let expired = sample_poll(now - Duration::minutes(1), true, false);
        assert!(expired.can_end(outsider, now));
    }

    #[test]
    fn placeholder_mirrors_the_draft() {
        let now = Utc::now();
        let draft = PollDraft {
            question: "Ship it?".to_string(),
            description: "A test".to_string(),
            category: "Governance".to_string(),
            duration_minutes: 30,
            options: vec!["Yes".to_string(), "No".to_string()],
            token_gate: None,
        };
        let creator = Address::repeat_byte(0x11);
        let poll = Poll::placeholder(7, &draft, creator, H256::repeat_byte(0xab), now);

        assert_eq!(poll.id, 7);
        assert_eq!(poll.status(now), PollStatus::Active);
        assert_eq!(poll.ends_at, now + Duration::minutes(30));
        assert_eq!(poll.total_votes, 0);
        assert_eq!(poll.options.len(), 2);
        assert_eq!(poll.options[1].id, 1);
        assert!(poll.tx_hash.is_some());
    }
}
