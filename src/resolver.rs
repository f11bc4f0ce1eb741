//! Pure block resolution over an immutable snapshot.
//!
//! Synchronous and free of shared state: the caller fetches the active
//! block list once per request (see [`crate::cache::BlockCache`]) and this
//! module answers which single block applies. Matching finds every block
//! covering the username or any candidate address; narrowing picks the
//! most specific one deterministically.

use crate::block::Block;
use crate::policy::{PrecedencePolicy, TieBreaker};
use crate::target::BlockTarget;
use chrono::Utc;
use std::cmp::Ordering;
use std::net::IpAddr;
use tracing::debug;

/// A matching block together with where in the candidate list it matched.
#[derive(Debug, Clone, Copy)]
pub struct MatchedBlock<'a> {
    pub block: &'a Block,
    /// Index of the first candidate address this block covered. Account
    /// matches carry 0; they outrank everything at the specificity stage
    /// anyway.
    pub candidate_pos: usize,
}

/// Parse a comma-separated candidate address list (e.g. an XFF header).
///
/// Entries are trimmed; malformed entries are skipped, never fatal. At
/// most `max` valid addresses are kept.
pub fn parse_candidate_list(raw: &str, max: usize) -> Vec<IpAddr> {
    let mut out = Vec::new();
    for token in raw.split(',') {
        if out.len() >= max {
            break;
        }
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.parse::<IpAddr>() {
            Ok(addr) => out.push(addr),
            Err(_) => debug!(token, "skipping malformed candidate address"),
        }
    }
    out
}

/// Collect every active block that covers the username or any candidate
/// address.
///
/// Address softblocks only restrict anonymous use, so they are skipped
/// when `anon` is false. Account blocks ignore the address list entirely.
pub fn matching_blocks<'a>(
    snapshot: &'a [Block],
    username: Option<&str>,
    addresses: &[IpAddr],
    anon: bool,
) -> Vec<MatchedBlock<'a>> {
    let now = Utc::now().timestamp();
    let mut matches = Vec::new();

    for block in snapshot {
        if block.is_expired_at(now) {
            continue;
        }
        match &block.target {
            BlockTarget::Account { .. } => {
                if let Some(user) = username
                    && block.target.matches_name(user)
                {
                    matches.push(MatchedBlock {
                        block,
                        candidate_pos: 0,
                    });
                }
            }
            _ => {
                if !anon && !block.hardblock {
                    continue;
                }
                if let Some(pos) = addresses
                    .iter()
                    .position(|addr| block.target.matches_address(*addr))
                {
                    matches.push(MatchedBlock {
                        block,
                        candidate_pos: pos,
                    });
                }
            }
        }
    }

    matches
}

/// Narrow a set of matches to the single authoritative block.
///
/// Specificity decides first (narrowest range wins, exact IPs beat any
/// range, account blocks beat both). The policy's tie-breaker chain runs
/// next, and the newest block id settles whatever remains, so the result
/// is always deterministic. Empty input yields `None`.
pub fn select_most_specific<'a>(
    matches: Vec<MatchedBlock<'a>>,
    policy: &PrecedencePolicy,
) -> Option<&'a Block> {
    matches
        .into_iter()
        .min_by(|a, b| compare(a, b, policy))
        .map(|m| m.block)
}

/// Resolve the single block applying to a request identity, or `None`.
pub fn resolve<'a>(
    snapshot: &'a [Block],
    username: Option<&str>,
    addresses: &[IpAddr],
    anon: bool,
    policy: &PrecedencePolicy,
) -> Option<&'a Block> {
    let matches = matching_blocks(snapshot, username, addresses, anon);
    debug!(
        candidates = addresses.len(),
        matches = matches.len(),
        "collected block matches"
    );
    select_most_specific(matches, policy)
}

/// Total order over matches: `Less` means "wins".
fn compare(a: &MatchedBlock<'_>, b: &MatchedBlock<'_>, policy: &PrecedencePolicy) -> Ordering {
    let ord = a
        .block
        .target
        .specificity()
        .cmp(&b.block.target.specificity());
    if ord != Ordering::Equal {
        return ord;
    }

    for tie_breaker in &policy.tie_breakers {
        let ord = match tie_breaker {
            TieBreaker::HardBeforeSoft => b.block.hardblock.cmp(&a.block.hardblock),
            TieBreaker::CreateAccountDisabled => b
                .block
                .create_account_blocked
                .cmp(&a.block.create_account_blocked),
            TieBreaker::EarliestCandidate => a.candidate_pos.cmp(&b.candidate_pos),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    b.block.id.cmp(&a.block.id)
}
