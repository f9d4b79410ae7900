//! Write authorization for log entries
//!
//! The access controller is an external collaborator: the log asks it
//! before admitting any entry, whether locally appended or ingested
//! during a join. The decision is pure; the provider handle lets policy
//! implementations re-verify identities if they need to.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::identity::IdentityProvider;
use crate::types::PubKey;

/// Authorization decision for appending an entry to a log.
///
/// May suspend (e.g. a policy backed by another store), which is why the
/// method is async even though shipped implementations answer directly.
#[async_trait]
pub trait AccessController: Send + Sync {
    /// Can an entry by `author` with this `payload` be admitted?
    async fn can_append(
        &self,
        author: &PubKey,
        payload: &[u8],
        provider: &dyn IdentityProvider,
    ) -> bool;
}

/// Admits every writer. The default controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AccessController for AllowAll {
    async fn can_append(&self, _: &PubKey, _: &[u8], _: &dyn IdentityProvider) -> bool {
        true
    }
}

/// Admits only an explicit set of writer keys.
#[derive(Debug, Clone, Default)]
pub struct AuthorAllowList {
    allowed: HashSet<PubKey>,
}

impl AuthorAllowList {
    pub fn new(authors: impl IntoIterator<Item = PubKey>) -> Self {
        Self {
            allowed: authors.into_iter().collect(),
        }
    }

    /// Admit an additional writer.
    pub fn allow(&mut self, author: PubKey) {
        self.allowed.insert(author);
    }
}

#[async_trait]
impl AccessController for AuthorAllowList {
    async fn can_append(&self, author: &PubKey, _: &[u8], _: &dyn IdentityProvider) -> bool {
        self.allowed.contains(author)
    }
}
