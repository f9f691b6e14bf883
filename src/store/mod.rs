//! Access to the collection-style backend that owns every canonical record.
//!
//! The chat core only ever creates, lists, queries by a case-insensitive field
//! match, and deletes by id. Each call touches exactly one collection.

mod memory;
mod rest;

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ChatError;

pub use memory::MemoryStore;
pub use rest::RestStore;

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Messages,
    ActiveUsers,
    Accounts,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Messages, Collection::ActiveUsers, Collection::Accounts];

    /// Path segment under the store's base url.
    pub fn path(&self) -> &'static str {
        use Collection::*;
        match self {
            Messages => "messages",
            ActiveUsers => "active-users",
            Accounts => "accounts",
        }
    }

    pub fn from_path(path: &str) -> Option<Collection> {
        Collection::ALL.into_iter().find(|c| c.path() == path)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// One stored record: the store-assigned id plus its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: i64,
    #[serde(default)]
    pub attributes: Fields,
}

impl StoreRecord {
    pub fn str_attr(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).and_then(Value::as_str)
    }
}

pub(crate) fn fields<const N: usize>(pairs: [(&str, &str); N]) -> Fields {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), Value::String(v.to_owned())))
        .collect()
}

/// Create/read/delete over named collections.
///
/// Records come back in store order, which is insertion order for every
/// implementation in this crate.
pub trait CollectionStore: Clone + Send + Sync + 'static {
    fn create(
        &self,
        collection: Collection,
        fields: Fields,
    ) -> impl Future<Output = Result<StoreRecord, ChatError>> + Send;

    fn list(&self, collection: Collection) -> impl Future<Output = Result<Vec<StoreRecord>, ChatError>> + Send;

    /// Records whose string `field` equals `value` ignoring case.
    fn find_eqi(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<Vec<StoreRecord>, ChatError>> + Send;

    /// Fails with `NotFound` when no record has this id.
    fn delete(&self, collection: Collection, id: i64) -> impl Future<Output = Result<(), ChatError>> + Send;
}
