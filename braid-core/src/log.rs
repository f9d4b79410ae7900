//! The replicated append-only log
//!
//! A [`Log`] owns three in-memory indices over its entries (by hash, the
//! current heads, and a reverse "is referenced?" oracle) plus the local
//! Lamport clock. Local writes go through [`Log::append`]; entries from
//! other replicas arrive through [`Log::join`], which gates them on
//! access policy and signature validity before integrating them
//! atomically. Two replicas that have observed the same entry set hold
//! identical indices and derive identical orderings, which is what makes
//! the log a CRDT.
//!
//! Suspension points are exactly the collaborator awaits (block store,
//! access controller). Every index mutation happens after the last await
//! of its operation, so the index invariants hold whenever the log is
//! observable.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use braid_model::{
    AccessController, BlockStore, Clock, Ed25519Provider, Hash, IdentityProvider, Keypair,
    LamportClock, SystemClock,
};

use crate::entry::Entry;
use crate::error::LogError;
use crate::order::{sort_ascending, sort_descending};
use crate::traverse::traverse;

// ---------------------------------------------------------------------------
// Construction options
// ---------------------------------------------------------------------------

/// Options for constructing a [`Log`].
///
/// Everything is optional: an absent id is derived from the wall clock,
/// absent heads are computed from the preloaded entries, and an absent
/// clock starts at the greatest preloaded head time.
#[derive(Default)]
pub struct LogOptions {
    id: Option<String>,
    entries: Vec<Entry>,
    heads: Option<Vec<Entry>>,
    clock: Option<LamportClock>,
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log identifier.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Preload entries. Must be internally consistent.
    pub fn entries(mut self, entries: Vec<Entry>) -> Self {
        self.entries = entries;
        self
    }

    /// Preload heads. Each must be one of the preloaded entries.
    pub fn heads(mut self, heads: Vec<Entry>) -> Self {
        self.heads = Some(heads);
        self
    }

    /// Start from an explicit clock.
    pub fn clock(mut self, clock: LamportClock) -> Self {
        self.clock = Some(clock);
        self
    }
}

/// Outcome of a [`Log::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The other log was integrated; `appended` entries were new here.
    Merged { appended: usize },
    /// The other log has a different id; nothing was merged.
    IdMismatch,
}

// ---------------------------------------------------------------------------
// Serialized views
// ---------------------------------------------------------------------------

/// Persisted form of a log: enough to reconstruct it via the block store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogJson {
    pub id: String,
    /// Head hashes, newest-first.
    pub heads: Vec<Hash>,
}

/// Point-in-time materialized view of a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSnapshot {
    pub id: String,
    pub heads: Vec<Entry>,
    pub values: Vec<Entry>,
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// A replicated, append-only, content-addressed log.
pub struct Log {
    id: String,
    keypair: Arc<Keypair>,
    store: Arc<dyn BlockStore>,
    access: Arc<dyn AccessController>,
    provider: Arc<dyn IdentityProvider>,
    /// All known entries, keyed by content address.
    entries: HashMap<Hash, Entry>,
    /// Entries no other known entry references.
    heads: HashMap<Hash, Entry>,
    /// Predecessor hash → one successor that references it.
    nexts: HashMap<Hash, Hash>,
    clock: LamportClock,
}

impl Log {
    /// Construct a log around its collaborators.
    pub fn new(
        store: Arc<dyn BlockStore>,
        access: Arc<dyn AccessController>,
        keypair: Arc<Keypair>,
        options: LogOptions,
    ) -> Result<Self, LogError> {
        let id = options
            .id
            .unwrap_or_else(|| SystemClock.now_ms().to_string());

        let mut entries: HashMap<Hash, Entry> = HashMap::with_capacity(options.entries.len());
        let mut nexts = HashMap::new();
        for entry in options.entries {
            for pred in entry.next() {
                nexts.insert(*pred, entry.hash());
            }
            entries.insert(entry.hash(), entry);
        }

        let heads = match options.heads {
            Some(given) => {
                let mut heads = HashMap::with_capacity(given.len());
                for head in given {
                    if !entries.contains_key(&head.hash()) {
                        return Err(LogError::InvalidHeads(
                            "preloaded head is not among the preloaded entries",
                        ));
                    }
                    heads.insert(head.hash(), head);
                }
                heads
            }
            None => Self::find_heads(&entries.values().cloned().collect::<Vec<_>>())
                .into_iter()
                .map(|e| (e.hash(), e))
                .collect(),
        };

        let clock = options.clock.unwrap_or_else(|| {
            let max_time = heads.values().map(|e| e.clock().time).max().unwrap_or(0);
            LamportClock::new(keypair.public_key(), max_time)
        });

        Ok(Self {
            id,
            keypair,
            store,
            access,
            provider: Arc::new(Ed25519Provider),
            entries,
            heads,
            nexts,
            clock,
        })
    }

    // -- Read API ----------------------------------------------------------

    /// Log identifier. Joins are only permitted between equal ids.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Local Lamport clock.
    pub fn clock(&self) -> LamportClock {
        self.clock
    }

    /// Number of known entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by its content address.
    pub fn get(&self, hash: &Hash) -> Option<&Entry> {
        self.entries.get(hash)
    }

    /// Whether the log holds an entry with this hash.
    pub fn has(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    /// The block store this log persists entries to.
    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    /// Current heads, newest-first under the total order.
    pub fn heads(&self) -> Vec<Entry> {
        let mut heads: Vec<Entry> = self.heads.values().cloned().collect();
        sort_descending(&mut heads);
        heads
    }

    /// All entries, oldest-first under the total order.
    ///
    /// Recomputed on every call; callers cache if they need to.
    pub fn values(&self) -> Vec<Entry> {
        let mut walk = traverse(&self.entries, &self.heads(), None);
        walk.reverse();
        walk
    }

    /// Entries whose predecessors are not all known locally, plus chain
    /// origins.
    pub fn tails(&self) -> Vec<Entry> {
        let all: Vec<Entry> = self.entries.values().cloned().collect();
        Self::find_tails(&all)
    }

    /// The dangling predecessor hashes themselves.
    pub fn tail_hashes(&self) -> Vec<Hash> {
        let values = self.values();
        Self::find_tail_hashes(&values)
    }

    // -- Append ------------------------------------------------------------

    /// Append a payload as a new entry and make it the sole head.
    ///
    /// `pointer_count` widens the predecessor set beyond the current
    /// heads: the entry references the first `max(pointer_count, |heads|)`
    /// entries of the traversal from the heads. After a successful append
    /// the log has exactly one head (the new entry) and the local clock
    /// is strictly greater than every previously observed head time.
    ///
    /// Access denial, signing failure, and storage failure all leave the
    /// log unchanged.
    pub async fn append(
        &mut self,
        payload: impl Into<Vec<u8>>,
        pointer_count: usize,
    ) -> Result<Entry, LogError> {
        let payload = payload.into();

        // New clock time: strictly past the local clock and every head.
        let head_time = self.heads.values().map(|e| e.clock().time).max().unwrap_or(0);
        let clock = self.clock.advance(head_time);

        // Predecessor set: the union of every current head and the
        // bounded walk from them. The union matters: a head can lose
        // every pop of the bounded walk to another branch's ancestors,
        // and an unreferenced head would be orphaned by the head swap
        // below.
        let heads = self.heads();
        let amount = pointer_count.max(heads.len());
        let refs = traverse(&self.entries, &heads, Some(amount));
        let mut next: Vec<Hash> = heads
            .iter()
            .map(Entry::hash)
            .chain(refs.iter().map(Entry::hash))
            .collect();
        next.sort();
        next.dedup();

        // Suspension points: signing + storage, then the access gate.
        let entry = Entry::create(
            self.store.as_ref(),
            &self.keypair,
            &self.id,
            payload,
            next,
            clock,
        )
        .await?;

        if !self
            .access
            .can_append(&entry.author(), entry.payload(), self.provider.as_ref())
            .await
        {
            return Err(LogError::AppendDenied(entry.author()));
        }

        // Commit: non-suspending from here on.
        self.clock = clock;
        for pred in entry.next() {
            self.nexts.insert(*pred, entry.hash());
        }
        self.entries.insert(entry.hash(), entry.clone());
        self.heads.clear();
        self.heads.insert(entry.hash(), entry.clone());

        debug!(
            log_id = %self.id,
            hash = %entry.hash(),
            time = clock.time,
            "appended entry"
        );
        Ok(entry)
    }

    // -- Join --------------------------------------------------------------

    /// Merge another log's entries into this one.
    ///
    /// Every new entry must pass the access controller and carry a valid
    /// signature; any rejection aborts the join with this log unchanged.
    /// With `max_size`, the log is truncated to the newest `max_size`
    /// entries after integration.
    pub async fn join(
        &mut self,
        other: &Log,
        max_size: Option<usize>,
    ) -> Result<JoinOutcome, LogError> {
        if other.id != self.id {
            return Ok(JoinOutcome::IdMismatch);
        }

        // 1. Difference: entries reachable from the other log's heads
        //    that we do not hold. Sorted so the gates run in a
        //    deterministic order.
        let mut new_items: Vec<Entry> = Self::difference(other, self).into_values().collect();
        sort_ascending(&mut new_items);

        // 2. Permission gate (may suspend). No state has changed yet.
        for entry in &new_items {
            if !self
                .access
                .can_append(&entry.author(), entry.payload(), self.provider.as_ref())
                .await
            {
                return Err(LogError::JoinDenied(entry.hash()));
            }
        }

        // 3. Signature gate.
        for entry in &new_items {
            entry
                .verify(self.provider.as_ref())
                .map_err(|_| LogError::SignatureInvalid(entry.hash()))?;
        }

        // 4. Integration: non-suspending and run to completion.
        let appended = new_items.len();
        let mut nexts_from_new: HashSet<Hash> = HashSet::new();
        for entry in &new_items {
            for pred in entry.next() {
                self.nexts.insert(*pred, entry.hash());
                nexts_from_new.insert(*pred);
            }
            self.entries.insert(entry.hash(), entry.clone());
        }

        // 5. Head recomputation: candidates are both logs' heads; keep
        //    those no known entry references.
        let mut candidates: HashMap<Hash, Entry> = HashMap::new();
        for head in self.heads.values().chain(other.heads.values()) {
            candidates.insert(head.hash(), head.clone());
        }
        let candidates: Vec<Entry> = candidates.into_values().collect();
        self.heads = Self::find_heads(&candidates)
            .into_iter()
            .filter(|h| {
                self.entries.contains_key(&h.hash())
                    && !nexts_from_new.contains(&h.hash())
                    && !self.nexts.contains_key(&h.hash())
            })
            .map(|h| (h.hash(), h))
            .collect();

        // 6. Optional truncation.
        if let Some(limit) = max_size {
            self.truncate(limit);
        }

        // 7. Clock catches up to the merged heads without incrementing.
        let head_time = self.heads.values().map(|e| e.clock().time).max().unwrap_or(0);
        self.clock = self.clock.witness(head_time);

        debug!(
            log_id = %self.id,
            appended,
            heads = self.heads.len(),
            len = self.entries.len(),
            "joined log"
        );
        Ok(JoinOutcome::Merged { appended })
    }

    /// Drop everything but the newest `limit` entries of `values`.
    ///
    /// Heads and the reverse-reference oracle are rebuilt from the
    /// retained entries, so no stale successor edge can influence later
    /// head filtering.
    fn truncate(&mut self, limit: usize) {
        if self.entries.len() <= limit {
            return;
        }

        let values = self.values();
        let dropped = values.len() - limit;
        let retained = &values[dropped..];

        self.entries = retained.iter().map(|e| (e.hash(), e.clone())).collect();
        self.nexts.clear();
        for entry in retained {
            for pred in entry.next() {
                self.nexts.insert(*pred, entry.hash());
            }
        }
        self.heads = Self::find_heads(retained)
            .into_iter()
            .map(|e| (e.hash(), e))
            .collect();

        debug!(log_id = %self.id, dropped, retained = limit, "truncated log");
    }

    // -- Static DAG analysis ----------------------------------------------

    /// Entries no other entry in the input references.
    ///
    /// Sorted by clock id descending; the set, not the order, is the
    /// head invariant.
    pub fn find_heads(entries: &[Entry]) -> Vec<Entry> {
        let mut referenced: HashSet<Hash> = HashSet::new();
        for entry in entries {
            for pred in entry.next() {
                referenced.insert(*pred);
            }
        }

        let mut seen: HashSet<Hash> = HashSet::new();
        let mut heads: Vec<Entry> = entries
            .iter()
            .filter(|e| !referenced.contains(&e.hash()) && seen.insert(e.hash()))
            .cloned()
            .collect();
        heads.sort_by(|a, b| b.clock().id.cmp(&a.clock().id));
        heads
    }

    /// Entries whose predecessors are not all present in the input, plus
    /// entries with no predecessors at all (chain origins).
    pub fn find_tails(entries: &[Entry]) -> Vec<Entry> {
        let present: HashSet<Hash> = entries.iter().map(Entry::hash).collect();

        let mut seen: HashSet<Hash> = HashSet::new();
        let mut tails: Vec<Entry> = entries
            .iter()
            .filter(|e| {
                e.next().is_empty() || e.next().iter().any(|pred| !present.contains(pred))
            })
            .filter(|e| seen.insert(e.hash()))
            .cloned()
            .collect();
        sort_ascending(&mut tails);
        tails
    }

    /// The dangling predecessor hashes: referenced by some entry in the
    /// input but not present themselves. Deduplicated, oldest-first.
    pub fn find_tail_hashes(entries: &[Entry]) -> Vec<Hash> {
        let present: HashSet<Hash> = entries.iter().map(Entry::hash).collect();

        let mut seen: HashSet<Hash> = HashSet::new();
        let mut dangling: Vec<Hash> = Vec::new();
        for entry in entries {
            for pred in entry.next() {
                if !present.contains(pred) && seen.insert(*pred) {
                    dangling.push(*pred);
                }
            }
        }
        dangling.reverse();
        dangling
    }

    /// Entries reachable from `a`'s heads that `b` does not hold.
    ///
    /// Breadth walk over `a`, stopping at hashes `b` already knows.
    /// Entries carrying a different log id are ignored.
    pub fn difference(a: &Log, b: &Log) -> HashMap<Hash, Entry> {
        let mut queue: VecDeque<Hash> = VecDeque::new();
        let mut traversed: HashSet<Hash> = HashSet::new();
        let mut missing: HashMap<Hash, Entry> = HashMap::new();

        for head in a.heads.keys() {
            if !b.entries.contains_key(head) && traversed.insert(*head) {
                queue.push_back(*head);
            }
        }

        while let Some(hash) = queue.pop_front() {
            let Some(entry) = a.entries.get(&hash) else {
                continue;
            };
            if entry.log_id() != b.id {
                continue;
            }
            missing.insert(hash, entry.clone());
            for pred in entry.next() {
                if !b.entries.contains_key(pred) && traversed.insert(*pred) {
                    queue.push_back(*pred);
                }
            }
        }

        missing
    }

    // -- Views -------------------------------------------------------------

    /// Persisted form: id plus head hashes, newest-first.
    pub fn to_json(&self) -> LogJson {
        LogJson {
            id: self.id.clone(),
            heads: self.heads().iter().map(Entry::hash).collect(),
        }
    }

    /// Materialized snapshot: id, heads, and all values.
    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            id: self.id.clone(),
            heads: self.heads(),
            values: self.values(),
        }
    }

    /// Persist the JSON form to the block store; the returned hash is
    /// sufficient to reconstruct the log (see `load::from_multihash`).
    pub async fn to_multihash(&self) -> Result<Hash, LogError> {
        let bytes = serde_json::to_vec(&self.to_json())
            .map_err(|e| LogError::Decode(e.to_string()))?;
        Ok(self.store.put(bytes).await?)
    }

    /// Textual tree of the log, newest entries first, each line indented
    /// by the number of ancestors the entry has in the value list.
    pub fn render(&self, mapper: impl Fn(&Entry) -> String) -> String {
        let values = self.values();
        let mut lines = Vec::with_capacity(values.len());
        for entry in values.iter().rev() {
            let parents = traverse(&self.entries, std::slice::from_ref(entry), None).len() - 1;
            let padding = "  ".repeat(parents.saturating_sub(1));
            let elbow = if parents > 0 { "└─" } else { "" };
            lines.push(format!("{padding}{elbow}{}", mapper(entry)));
        }
        lines.join("\n")
    }
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.render(|e| String::from_utf8_lossy(e.payload()).into_owned())
        )
    }
}
