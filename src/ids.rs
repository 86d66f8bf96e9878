//! # Public Identifiers
//!
//! Reports and discussion posts are addressed by random 8-digit ids rather
//! than sequential row ids, so public urls do not leak submission volume.
//!
//! An id is drawn from a fixed range with the thread-local CSPRNG, probed
//! against the owning table, and redrawn on collision. At ~90 million
//! candidate values a retry is a safety net, not a normal path. The
//! allocator never reserves the id it hands out: the insert that follows is
//! the authoritative collision check, and callers retry allocation once if
//! that insert reports a duplicate key.

use std::{future::Future, ops::Range};

use rand::{Rng, rng};

/// Fixed 8-digit id space shared by reports and discussion posts.
pub const ID_RANGE: Range<i64> = 10_000_000..100_000_000;

/// Draws random ids from a range until a probe confirms one free.
pub struct IdAllocator {
    range: Range<i64>,
}

impl IdAllocator {
    pub fn new(range: Range<i64>) -> Self {
        Self { range }
    }

    /// Returns the first drawn id for which `probe` reports no existing
    /// record. A probe failure is propagated instead of retried.
    pub async fn allocate<F, Fut, E>(&self, probe: F) -> Result<i64, E>
    where
        F: Fn(i64) -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        loop {
            let id = rng().random_range(self.range.clone());

            if !probe(id).await? {
                return Ok(id);
            }
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(ID_RANGE)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::HashSet,
        future::ready,
    };

    use super::*;

    #[tokio::test]
    async fn allocates_distinct_ids_within_range() {
        let allocator = IdAllocator::default();
        let taken = RefCell::new(HashSet::new());

        for _ in 0..10_000 {
            let id = allocator
                .allocate(|id| ready(Ok::<bool, ()>(taken.borrow().contains(&id))))
                .await
                .unwrap();

            assert!(ID_RANGE.contains(&id), "id {id} outside range");
            assert!(taken.borrow_mut().insert(id), "id {id} handed out twice");
        }

        assert_eq!(taken.borrow().len(), 10_000);
    }

    #[tokio::test]
    async fn redraws_while_probe_reports_taken() {
        let allocator = IdAllocator::default();
        let calls = Cell::new(0);

        let id = allocator
            .allocate(|_| {
                let seen = calls.get();
                calls.set(seen + 1);
                ready(Ok::<bool, ()>(seen < 3))
            })
            .await
            .unwrap();

        assert_eq!(calls.get(), 4);
        assert!(ID_RANGE.contains(&id));
    }

    #[tokio::test]
    async fn propagates_probe_errors() {
        let allocator = IdAllocator::default();

        let result = allocator
            .allocate(|_| ready(Err::<bool, &str>("store unreachable")))
            .await;

        assert_eq!(result, Err("store unreachable"));
    }
}
