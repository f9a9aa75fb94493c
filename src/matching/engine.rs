//! Match search and atomic claim

use crate::error::Result;
use crate::queue::QueueStore;
use crate::session::SessionRegistry;
use crate::types::QueueEntry;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Mutual compatibility between a requester and a queued candidate.
///
/// Both directions must hold: the requester's preference accepts the
/// candidate's gender and the candidate's preference accepts the
/// requester's. A participant never matches their own entry.
pub fn is_match(requester: &QueueEntry, candidate: &QueueEntry) -> bool {
    if requester.device_id == candidate.device_id {
        return false;
    }
    requester.looking_for.accepts(candidate.gender)
        && candidate.looking_for.accepts(requester.gender)
}

pub struct MatchEngine {
    store: Arc<dyn QueueStore>,
    registry: Arc<SessionRegistry>,
    /// All claim sequences serialize through this lock.
    search_lock: Mutex<()>,
}

impl MatchEngine {
    pub fn new(store: Arc<dyn QueueStore>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            store,
            registry,
            search_lock: Mutex::new(()),
        }
    }

    /// Search for a partner for an already-enqueued requester.
    ///
    /// On success both queue entries are removed and the pairing is
    /// recorded before the lock is released; the caller only has to
    /// deliver the match events. Returns `None` when nobody compatible
    /// is waiting, leaving the requester enqueued.
    pub async fn find_match(&self, requester: &QueueEntry) -> Result<Option<QueueEntry>> {
        let _guard = self.search_lock.lock().await;

        // Another search may have claimed the requester between their
        // enqueue and this lock acquisition; pairings are set under the
        // same lock, so this check closes that window. The requester's
        // queue entry is dropped here so a paired participant is never
        // also enqueued.
        if self.registry.partner_of(&requester.device_id)?.is_some() {
            self.store
                .remove(&requester.device_id, requester.gender)
                .await?;
            return Ok(None);
        }

        let candidates = self.store.scan(requester.looking_for.into()).await?;
        for candidate in candidates {
            if !is_match(requester, &candidate) {
                continue;
            }
            if self.registry.partner_of(&candidate.device_id)?.is_some() {
                continue;
            }

            // A disconnect can remove the entry between scan and claim;
            // an unremovable candidate is simply no longer available.
            if !self
                .store
                .remove(&candidate.device_id, candidate.gender)
                .await?
            {
                debug!(
                    "Candidate {} vanished before claim",
                    crate::utils::short_id(&candidate.device_id)
                );
                continue;
            }

            self.store
                .remove(&requester.device_id, requester.gender)
                .await?;
            self.registry
                .set_pair(&requester.device_id, &candidate.device_id)?;

            info!(
                "Matched {} with {}",
                crate::utils::short_id(&requester.device_id),
                crate::utils::short_id(&candidate.device_id)
            );
            return Ok(Some(candidate));
        }

        debug!(
            "No compatible partner for {} (looking_for: {})",
            crate::utils::short_id(&requester.device_id),
            requester.looking_for
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueueStore;
    use crate::types::{BucketSelector, Gender, Preference};
    use proptest::prelude::*;
    use std::time::Duration;

    fn entry(device_id: &str, gender: Option<Gender>, looking_for: Preference) -> QueueEntry {
        QueueEntry::new(device_id.to_string(), gender, looking_for)
    }

    async fn engine_with(entries: Vec<QueueEntry>) -> (MatchEngine, Arc<SessionRegistry>) {
        let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
        let registry = Arc::new(SessionRegistry::new(Duration::ZERO));
        let engine = MatchEngine::new(Arc::clone(&store), Arc::clone(&registry));
        for e in entries {
            store.enqueue(e).await.unwrap();
        }
        (engine, registry)
    }

    #[test]
    fn test_mutual_predicate_grid() {
        let genders = [Some(Gender::Male), Some(Gender::Female), None];
        let prefs = [Preference::Male, Preference::Female, Preference::Any];

        for &g_a in &genders {
            for &p_a in &prefs {
                for &g_b in &genders {
                    for &p_b in &prefs {
                        let a = entry("a", g_a, p_a);
                        let b = entry("b", g_b, p_b);
                        let expected = p_a.accepts(g_b) && p_b.accepts(g_a);
                        assert_eq!(
                            is_match(&a, &b),
                            expected,
                            "a: {:?}/{:?}, b: {:?}/{:?}",
                            g_a,
                            p_a,
                            g_b,
                            p_b
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_never_matches_self() {
        let a = entry("a", Some(Gender::Male), Preference::Any);
        let same = entry("a", Some(Gender::Male), Preference::Any);
        assert!(!is_match(&a, &same));
    }

    #[test]
    fn test_one_sided_interest_is_not_a_match() {
        // a wants b, but b only wants women
        let a = entry("a", Some(Gender::Male), Preference::Female);
        let b = entry("b", Some(Gender::Female), Preference::Female);
        assert!(!is_match(&a, &b));
        assert!(!is_match(&b, &a));
    }

    #[tokio::test]
    async fn test_find_match_empty_queue() {
        let (engine, _registry) = engine_with(vec![]).await;
        let requester = entry("a", Some(Gender::Male), Preference::Any);
        assert!(engine.find_match(&requester).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_match_claims_oldest_compatible() {
        let first = entry("first", Some(Gender::Female), Preference::Any);
        let second = entry("second", Some(Gender::Female), Preference::Any);
        let (engine, registry) = engine_with(vec![first, second]).await;

        let requester = entry("req", Some(Gender::Male), Preference::Female);
        let matched = engine.find_match(&requester).await.unwrap().unwrap();
        assert_eq!(matched.device_id, "first");
        assert_eq!(registry.partner_of("req").unwrap(), Some("first".to_string()));
        assert_eq!(registry.partner_of("first").unwrap(), Some("req".to_string()));
    }

    #[tokio::test]
    async fn test_find_match_skips_incompatible_and_self() {
        let own = entry("req", Some(Gender::Male), Preference::Any);
        let picky = entry("picky", Some(Gender::Male), Preference::Female);
        let open = entry("open", Some(Gender::Male), Preference::Any);
        let (engine, _registry) = engine_with(vec![own.clone(), picky, open]).await;

        // "picky" only wants women so a male "any" requester skips them
        let matched = engine.find_match(&own).await.unwrap().unwrap();
        assert_eq!(matched.device_id, "open");
    }

    #[tokio::test]
    async fn test_claim_removes_both_entries() {
        let req = entry("req", Some(Gender::Male), Preference::Any);
        let other = entry("other", Some(Gender::Female), Preference::Any);

        let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
        let registry = Arc::new(SessionRegistry::new(Duration::ZERO));
        let engine = MatchEngine::new(Arc::clone(&store), Arc::clone(&registry));
        store.enqueue(other).await.unwrap();
        store.enqueue(req.clone()).await.unwrap();

        engine.find_match(&req).await.unwrap().unwrap();
        assert!(store.scan(BucketSelector::Any).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_for_already_paired_requester_drops_their_entry() {
        let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
        let registry = Arc::new(SessionRegistry::new(Duration::ZERO));
        let engine = MatchEngine::new(Arc::clone(&store), Arc::clone(&registry));

        // The requester enqueued, then a concurrent search paired them
        // before their own search ran
        let requester = entry("a", Some(Gender::Male), Preference::Any);
        store.enqueue(requester.clone()).await.unwrap();
        registry.set_pair("a", "b").unwrap();

        assert!(engine.find_match(&requester).await.unwrap().is_none());
        assert!(store.scan(BucketSelector::Any).await.unwrap().is_empty());
        assert_eq!(registry.partner_of("a").unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_catch_all_reachable_only_through_any() {
        let unlabeled = entry("x", None, Preference::Any);
        let (engine, _registry) = engine_with(vec![unlabeled]).await;

        let specific = entry("req", Some(Gender::Male), Preference::Female);
        assert!(engine.find_match(&specific).await.unwrap().is_none());

        let open = entry("req", Some(Gender::Male), Preference::Any);
        let matched = engine.find_match(&open).await.unwrap().unwrap();
        assert_eq!(matched.device_id, "x");
    }

    proptest! {
        #[test]
        fn prop_match_predicate_is_symmetric(
            g_a in prop::sample::select(vec![Some(Gender::Male), Some(Gender::Female), None]),
            p_a in prop::sample::select(vec![Preference::Male, Preference::Female, Preference::Any]),
            g_b in prop::sample::select(vec![Some(Gender::Male), Some(Gender::Female), None]),
            p_b in prop::sample::select(vec![Preference::Male, Preference::Female, Preference::Any]),
        ) {
            let a = entry("a", g_a, p_a);
            let b = entry("b", g_b, p_b);
            prop_assert_eq!(is_match(&a, &b), is_match(&b, &a));
        }
    }
}
