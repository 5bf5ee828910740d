//! In-memory claim tracking, mirroring `gossipd::sync::SyncManager`'s
//! `RwLock<HashMap<..>>` pattern: a small guarded set the orchestrator
//! consults before touching a queue record.
//!
//! spec.md §5: "records are claimed by compare-and-swap on (id, attempts)
//! to prevent two workers from re-attempting the same record". The `Store`
//! trait gives each individual read/write a transactional guarantee, but
//! nothing stops two concurrent [`crate::orchestrator::run_tick`] calls
//! (e.g. two tasks driving the same `Driver` under a multi-worker `bmd`
//! deployment) from both draining the same due record in the same tick.
//! `ClaimSet` closes that gap in-process; it is not a distributed lock and
//! is only meaningful shared between ticks that share one process's memory.

use bm_core::Id;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Shared, cloneable handle to the set of queue-record ids currently being
/// processed by some in-flight tick.
#[derive(Clone, Default)]
pub struct ClaimSet(Arc<RwLock<HashSet<Id>>>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to claim `id` for the caller. Returns `None` if another
    /// in-flight tick already holds it; otherwise returns a guard that
    /// releases the claim on drop.
    pub fn try_claim(&self, id: Id) -> Option<ClaimGuard> {
        let mut claimed = self.0.write();
        if claimed.insert(id) {
            Some(ClaimGuard {
                claims: self.clone(),
                id,
            })
        } else {
            None
        }
    }
}

/// RAII handle releasing its record's claim when the caller is done with it,
/// however `process_record` returns (success, retry, or early `?`).
pub struct ClaimGuard {
    claims: ClaimSet,
    id: Id,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.claims.0.write().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused_while_the_first_is_held() {
        let claims = ClaimSet::new();
        let first = claims.try_claim(1).expect("first claim succeeds");
        assert!(claims.try_claim(1).is_none());
        drop(first);
        assert!(claims.try_claim(1).is_some());
    }

    #[test]
    fn distinct_ids_claim_independently() {
        let claims = ClaimSet::new();
        let _a = claims.try_claim(1).unwrap();
        assert!(claims.try_claim(2).is_some());
    }
}
