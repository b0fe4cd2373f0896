use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

/// Stable hash of (session id, normalized content, idempotency token).
/// Normalization trims the message and collapses internal whitespace runs,
/// so retyped copies of the same message still collide.
pub fn fingerprint(session_id: &str, content: &str, idempotency_token: Option<&str>) -> String {
    let normalized = normalize(content);
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized.as_bytes());
    hasher.update([0u8]);
    if let Some(token) = idempotency_token {
        hasher.update(token.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn normalize(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Novelty {
    Novel,
    Duplicate { prior_seq: u64 },
}

/// Per-session record of recently delivered message fingerprints.
///
/// Bounded: once the count exceeds the ceiling the oldest entries are
/// evicted, so long-lived sessions cannot grow it without limit. One
/// instance per session, owned by the session, so operations on one session
/// can never observe another's set.
#[derive(Debug)]
pub struct Deduplicator {
    seen: HashMap<String, u64>,
    order: VecDeque<String>,
    ceiling: usize,
}

impl Deduplicator {
    pub fn new(ceiling: usize) -> Self {
        Self {
            seen: HashMap::new(),
            order: VecDeque::new(),
            ceiling: ceiling.max(1),
        }
    }

    /// Has this fingerprint already reached a terminal outcome?
    pub fn check(&self, fingerprint: &str) -> Novelty {
        match self.seen.get(fingerprint) {
            Some(&prior_seq) => Novelty::Duplicate { prior_seq },
            None => Novelty::Novel,
        }
    }

    /// Remember a fingerprint and the sequence number that recorded it.
    pub fn record(&mut self, fingerprint: &str, seq: u64) {
        if self.seen.contains_key(fingerprint) {
            return;
        }
        if self.order.len() == self.ceiling
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.seen.insert(fingerprint.to_string(), seq);
        self.order.push_back(fingerprint.to_string());
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_session_scoped() {
        let a = fingerprint("sess-1", "hello world", None);
        let b = fingerprint("sess-1", "hello world", None);
        let c = fingerprint("sess-2", "hello world", None);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn whitespace_variants_collide() {
        let a = fingerprint("sess-1", "  hello   world ", None);
        let b = fingerprint("sess-1", "hello world", None);
        assert_eq!(a, b);
    }

    #[test]
    fn idempotency_token_separates_identical_content() {
        let bare = fingerprint("sess-1", "hello", None);
        let t1 = fingerprint("sess-1", "hello", Some("t1"));
        let t2 = fingerprint("sess-1", "hello", Some("t2"));
        assert_ne!(bare, t1);
        assert_ne!(t1, t2);
    }

    #[test]
    fn recorded_fingerprint_reports_duplicate_with_prior_seq() {
        let mut dedup = Deduplicator::new(100);
        let fp = fingerprint("sess-1", "hello", None);
        assert_eq!(dedup.check(&fp), Novelty::Novel);
        dedup.record(&fp, 4);
        assert_eq!(dedup.check(&fp), Novelty::Duplicate { prior_seq: 4 });
    }

    #[test]
    fn ceiling_evicts_oldest_first() {
        let mut dedup = Deduplicator::new(3);
        for i in 0..4u64 {
            dedup.record(&format!("fp-{i}"), i);
        }
        assert_eq!(dedup.len(), 3);
        assert_eq!(dedup.check("fp-0"), Novelty::Novel);
        assert_eq!(dedup.check("fp-3"), Novelty::Duplicate { prior_seq: 3 });
    }

    #[test]
    fn re_recording_does_not_duplicate_entries() {
        let mut dedup = Deduplicator::new(3);
        dedup.record("fp", 1);
        dedup.record("fp", 9);
        assert_eq!(dedup.len(), 1);
        assert_eq!(dedup.check("fp"), Novelty::Duplicate { prior_seq: 1 });
    }
}
