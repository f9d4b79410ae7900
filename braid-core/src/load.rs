//! Load entry points: reconstructing logs from the block store
//!
//! Each loader materializes entries with a breadth walk over
//! [`BlockStore::get`], starting from a hash frontier and following
//! `next` references, then hands the result to [`Log::new`]. Blocks the
//! store reports as missing are treated as tail references and skipped;
//! backend failures propagate. Entries passed as `exclude` are already
//! known to the caller: they are folded into the result without being
//! fetched.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use braid_model::{AccessController, BlockStore, Hash, Keypair, StorageError};

use crate::entry::Entry;
use crate::error::LogError;
use crate::log::{Log, LogJson, LogOptions};

/// Breadth walk from `roots`, materializing up to `length` entries.
///
/// `progress` is invoked once per materialized entry, in fetch order.
async fn fetch_entries(
    store: &dyn BlockStore,
    roots: &[Hash],
    length: Option<usize>,
    exclude: &[Entry],
    timeout: Option<Duration>,
    progress: &mut impl FnMut(&Entry),
) -> Result<Vec<Entry>, LogError> {
    let mut seen: HashSet<Hash> = exclude.iter().map(Entry::hash).collect();
    let mut queue: VecDeque<Hash> = VecDeque::new();
    for root in roots {
        if seen.insert(*root) {
            queue.push_back(*root);
        }
    }

    let mut fetched: Vec<Entry> = Vec::new();
    while let Some(hash) = queue.pop_front() {
        if length.is_some_and(|limit| fetched.len() >= limit) {
            break;
        }

        let block = match timeout {
            Some(duration) => tokio::time::timeout(duration, store.get(&hash))
                .await
                .map_err(|_| {
                    LogError::Storage(StorageError::Backend(format!(
                        "fetch of {hash} timed out after {duration:?}"
                    )))
                })?,
            None => store.get(&hash).await,
        };
        let bytes = match block {
            Ok(bytes) => bytes,
            // Dangling reference: the tail of someone's truncated history.
            Err(StorageError::NotFound(_)) => continue,
            Err(err) => return Err(err.into()),
        };

        let entry = Entry::decode(hash, &bytes)?;
        progress(&entry);
        for pred in entry.next() {
            if seen.insert(*pred) {
                queue.push_back(*pred);
            }
        }
        fetched.push(entry);
    }

    Ok(fetched)
}

/// Combine freshly fetched entries with the already-known `exclude` set.
fn with_known(mut fetched: Vec<Entry>, exclude: &[Entry]) -> Vec<Entry> {
    let fetched_hashes: HashSet<Hash> = fetched.iter().map(Entry::hash).collect();
    fetched.extend(
        exclude
            .iter()
            .filter(|e| !fetched_hashes.contains(&e.hash()))
            .cloned(),
    );
    fetched
}

/// Load a log from the content address of its persisted JSON form
/// (see [`Log::to_multihash`]).
pub async fn from_multihash(
    store: Arc<dyn BlockStore>,
    access: Arc<dyn AccessController>,
    keypair: Arc<Keypair>,
    hash: &Hash,
    length: Option<usize>,
    exclude: &[Entry],
    mut progress: impl FnMut(&Entry),
) -> Result<Log, LogError> {
    let bytes = store.get(hash).await?;
    let json: LogJson =
        serde_json::from_slice(&bytes).map_err(|e| LogError::Decode(e.to_string()))?;

    let fetched =
        fetch_entries(store.as_ref(), &json.heads, length, exclude, None, &mut progress).await?;
    let entries = with_known(fetched, exclude);

    let heads: Vec<Entry> = entries
        .iter()
        .filter(|e| json.heads.contains(&e.hash()))
        .cloned()
        .collect();

    Log::new(
        store,
        access,
        keypair,
        LogOptions::new().id(json.id).entries(entries).heads(heads),
    )
}

/// Load a log by walking backwards from a single entry hash.
pub async fn from_entry_hash(
    store: Arc<dyn BlockStore>,
    access: Arc<dyn AccessController>,
    keypair: Arc<Keypair>,
    hash: &Hash,
    id: impl Into<String>,
    length: Option<usize>,
    exclude: &[Entry],
    mut progress: impl FnMut(&Entry),
) -> Result<Log, LogError> {
    let fetched = fetch_entries(
        store.as_ref(),
        std::slice::from_ref(hash),
        length,
        exclude,
        None,
        &mut progress,
    )
    .await?;
    let entries = with_known(fetched, exclude);

    Log::new(
        store,
        access,
        keypair,
        LogOptions::new().id(id).entries(entries),
    )
}

/// Load a log from an in-hand JSON view, bounding each block fetch by
/// `timeout`.
pub async fn from_json(
    store: Arc<dyn BlockStore>,
    access: Arc<dyn AccessController>,
    keypair: Arc<Keypair>,
    json: LogJson,
    length: Option<usize>,
    timeout: Option<Duration>,
    mut progress: impl FnMut(&Entry),
) -> Result<Log, LogError> {
    let fetched =
        fetch_entries(store.as_ref(), &json.heads, length, &[], timeout, &mut progress).await?;

    let heads: Vec<Entry> = fetched
        .iter()
        .filter(|e| json.heads.contains(&e.hash()))
        .cloned()
        .collect();

    Log::new(
        store,
        access,
        keypair,
        LogOptions::new().id(json.id).entries(fetched).heads(heads),
    )
}

/// Load a log from a set of already-materialized entries, fetching their
/// ancestry from the block store.
pub async fn from_entry(
    store: Arc<dyn BlockStore>,
    access: Arc<dyn AccessController>,
    keypair: Arc<Keypair>,
    entries: &[Entry],
    length: Option<usize>,
    exclude: &[Entry],
    mut progress: impl FnMut(&Entry),
) -> Result<Log, LogError> {
    let roots: Vec<Hash> = entries
        .iter()
        .flat_map(|e| e.next().iter().copied())
        .collect();

    // The given entries are known by construction: never refetched.
    let known: Vec<Entry> = with_known(entries.to_vec(), exclude);
    let fetched =
        fetch_entries(store.as_ref(), &roots, length, &known, None, &mut progress).await?;
    let combined = with_known(fetched, &known);

    let id = entries
        .first()
        .map(|e| e.log_id().to_owned())
        .unwrap_or_default();

    Log::new(
        store,
        access,
        keypair,
        LogOptions::new().id(id).entries(combined),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::MemoryStore;
    use braid_model::AllowAll;

    async fn seeded_log(store: &Arc<MemoryStore>, payloads: &[&str]) -> Log {
        let mut log = Log::new(
            store.clone(),
            Arc::new(AllowAll),
            Arc::new(Keypair::generate()),
            LogOptions::new().id("X"),
        )
        .unwrap();
        for payload in payloads {
            log.append(*payload, 1).await.unwrap();
        }
        log
    }

    fn collaborators() -> (Arc<AllowAll>, Arc<Keypair>) {
        (Arc::new(AllowAll), Arc::new(Keypair::generate()))
    }

    #[tokio::test]
    async fn multihash_roundtrip_restores_id_and_heads() {
        let store = Arc::new(MemoryStore::new());
        let log = seeded_log(&store, &["p1", "p2", "p3"]).await;

        let hash = log.to_multihash().await.unwrap();
        let (access, keypair) = collaborators();
        let loaded = from_multihash(store.clone(), access, keypair, &hash, None, &[], |_| {})
            .await
            .unwrap();

        assert_eq!(loaded.id(), log.id());
        assert_eq!(loaded.len(), 3);
        let loaded_heads: Vec<Hash> = loaded.heads().iter().map(Entry::hash).collect();
        let original_heads: Vec<Hash> = log.heads().iter().map(Entry::hash).collect();
        assert_eq!(loaded_heads, original_heads);
        assert_eq!(
            loaded.values().iter().map(Entry::hash).collect::<Vec<_>>(),
            log.values().iter().map(Entry::hash).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn from_entry_hash_walks_ancestry() {
        let store = Arc::new(MemoryStore::new());
        let log = seeded_log(&store, &["p1", "p2", "p3"]).await;
        let head = log.heads()[0].clone();

        let (access, keypair) = collaborators();
        let loaded = from_entry_hash(
            store.clone(),
            access,
            keypair,
            &head.hash(),
            "X",
            None,
            &[],
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.heads()[0].hash(), head.hash());
    }

    #[tokio::test]
    async fn length_bounds_the_fetch() {
        let store = Arc::new(MemoryStore::new());
        let log = seeded_log(&store, &["p1", "p2", "p3"]).await;
        let head = log.heads()[0].clone();

        let (access, keypair) = collaborators();
        let loaded = from_entry_hash(
            store.clone(),
            access,
            keypair,
            &head.hash(),
            "X",
            Some(2),
            &[],
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(loaded.len(), 2);
        assert!(loaded.has(&head.hash()));
    }

    #[tokio::test]
    async fn excluded_entries_are_known_not_fetched() {
        let store = Arc::new(MemoryStore::new());
        let log = seeded_log(&store, &["p1", "p2"]).await;
        let head = log.heads()[0].clone();
        let known = log.values();

        let mut fetched_count = 0usize;
        let (access, keypair) = collaborators();
        let loaded = from_entry_hash(
            store.clone(),
            access,
            keypair,
            &head.hash(),
            "X",
            None,
            &known,
            |_| fetched_count += 1,
        )
        .await
        .unwrap();

        assert_eq!(fetched_count, 0, "everything was already known");
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn progress_reports_each_materialized_entry() {
        let store = Arc::new(MemoryStore::new());
        let log = seeded_log(&store, &["p1", "p2", "p3"]).await;
        let hash = log.to_multihash().await.unwrap();

        let mut seen = Vec::new();
        let (access, keypair) = collaborators();
        from_multihash(store.clone(), access, keypair, &hash, None, &[], |e| {
            seen.push(e.hash())
        })
        .await
        .unwrap();

        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn from_json_restores_log() {
        let store = Arc::new(MemoryStore::new());
        let log = seeded_log(&store, &["p1", "p2"]).await;
        let json = log.to_json();

        let (access, keypair) = collaborators();
        let loaded = from_json(
            store.clone(),
            access,
            keypair,
            json.clone(),
            None,
            Some(Duration::from_secs(5)),
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(loaded.id(), json.id);
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn from_entry_fetches_ancestors_of_given_heads() {
        let store = Arc::new(MemoryStore::new());
        let log = seeded_log(&store, &["p1", "p2", "p3"]).await;
        let heads = log.heads();

        let (access, keypair) = collaborators();
        let loaded = from_entry(store.clone(), access, keypair, &heads, None, &[], |_| {})
            .await
            .unwrap();

        assert_eq!(loaded.id(), "X");
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.heads()[0].hash(), heads[0].hash());
    }

    #[tokio::test]
    async fn missing_multihash_propagates_not_found() {
        let store = Arc::new(MemoryStore::new());
        let (access, keypair) = collaborators();
        let result = from_multihash(
            store.clone(),
            access,
            keypair,
            &Hash([3u8; 32]),
            None,
            &[],
            |_| {},
        )
        .await;

        assert!(matches!(
            result,
            Err(LogError::Storage(StorageError::NotFound(_)))
        ));
    }
}
