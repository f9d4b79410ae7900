//! Deterministic total order over entries (last-write-wins)
//!
//! Every replica derives the same ordering from the same entry set:
//! higher Lamport time is later; ties break on the clock id
//! (lexicographically greater id is later); remaining ties fall back to
//! the byte-wise content hash, which is unique per entry. The same
//! comparator drives `values`, head display, and traversal priority.

use std::cmp::Ordering;

use crate::entry::Entry;

/// Strict total order over entries: clock time, then clock id, then hash.
pub fn last_write_wins(a: &Entry, b: &Entry) -> Ordering {
    a.clock()
        .cmp(&b.clock())
        .then_with(|| a.hash().cmp(&b.hash()))
}

/// Sort entries oldest-first under [`last_write_wins`].
pub fn sort_ascending(entries: &mut [Entry]) {
    entries.sort_by(last_write_wins);
}

/// Sort entries newest-first under [`last_write_wins`].
pub fn sort_descending(entries: &mut [Entry]) {
    entries.sort_by(|a, b| last_write_wins(b, a));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::MemoryStore;
    use braid_model::{Keypair, LamportClock};

    async fn entry(store: &MemoryStore, keypair: &Keypair, time: u64, payload: &[u8]) -> Entry {
        Entry::create(
            store,
            keypair,
            "logX",
            payload.to_vec(),
            vec![],
            LamportClock::new(keypair.public_key(), time),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn higher_time_is_later() {
        let store = MemoryStore::new();
        let keypair = Keypair::generate();

        let early = entry(&store, &keypair, 1, b"a").await;
        let late = entry(&store, &keypair, 2, b"b").await;

        assert_eq!(last_write_wins(&early, &late), Ordering::Less);
        assert_eq!(last_write_wins(&late, &early), Ordering::Greater);
    }

    #[tokio::test]
    async fn equal_time_breaks_on_id() {
        let store = MemoryStore::new();
        let a = Keypair::generate();
        let b = Keypair::generate();

        let ea = entry(&store, &a, 1, b"a").await;
        let eb = entry(&store, &b, 1, b"b").await;

        let expected = a.public_key().cmp(&b.public_key());
        assert_eq!(last_write_wins(&ea, &eb), expected);
    }

    #[tokio::test]
    async fn equal_clock_breaks_on_hash() {
        let store = MemoryStore::new();
        let keypair = Keypair::generate();

        // Same signer, same time, different payload: clocks tie exactly.
        let ea = entry(&store, &keypair, 1, b"a").await;
        let eb = entry(&store, &keypair, 1, b"b").await;

        assert_eq!(
            last_write_wins(&ea, &eb),
            ea.hash().cmp(&eb.hash()),
            "hash must decide when clocks are identical"
        );
        assert_ne!(last_write_wins(&ea, &eb), Ordering::Equal);
    }

    #[tokio::test]
    async fn sorting_is_stable_across_permutations() {
        let store = MemoryStore::new();
        let a = Keypair::generate();
        let b = Keypair::generate();

        let e1 = entry(&store, &a, 1, b"1").await;
        let e2 = entry(&store, &b, 1, b"2").await;
        let e3 = entry(&store, &a, 2, b"3").await;

        let mut forward = vec![e1.clone(), e2.clone(), e3.clone()];
        let mut backward = vec![e3, e2, e1];
        sort_ascending(&mut forward);
        sort_ascending(&mut backward);

        let fw: Vec<_> = forward.iter().map(Entry::hash).collect();
        let bw: Vec<_> = backward.iter().map(Entry::hash).collect();
        assert_eq!(fw, bw);
    }
}
