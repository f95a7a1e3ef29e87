//! Document store capability set.
//!
//! The engines only talk to clusters through these traits, so the same
//! copy logic runs against MongoDB in production and against the in-memory
//! store in tests.

pub mod memory;
pub mod mongo;

use crate::Result;
use async_trait::async_trait;
use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use std::fmt;
use std::time::Duration;

pub use memory::{MemoryCluster, MemoryConnector};
pub use mongo::MongoConnector;

/// Pool and timeout settings applied to every connection an engine opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub max_pool_size: u32,
    pub max_idle_time: Duration,
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_pool_size: 10,
            max_idle_time: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// A database/collection pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub db: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

/// Document selection understood by every store.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    IdEquals(Bson),
    IdNotIn(Vec<Bson>),
    /// Documents whose `field` holds a datetime strictly after `after`.
    /// Documents without the field, or with a non-datetime value, never match.
    UpdatedAfter { field: String, after: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Full,
    IdOnly,
}

/// Documents delivered one at a time from a server-side cursor.
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// Opens cluster connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection that is ready to serve requests.
    async fn connect(&self, uri: &str, options: &ConnectOptions) -> Result<Box<dyn ClusterConnection>>;
}

/// An open connection to one cluster. Owned by the invocation that opened it.
#[async_trait]
pub trait ClusterConnection: Send + Sync {
    async fn list_database_names(&self) -> Result<Vec<String>>;

    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>>;

    async fn find(&self, ns: &Namespace, filter: &Filter, projection: Projection) -> Result<Vec<Document>>;

    /// Like `find` with a full projection, without buffering the result set.
    async fn find_stream(&self, ns: &Namespace, filter: &Filter) -> Result<DocumentStream>;

    /// Insert new documents, returning how many were written.
    async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64>;

    /// Replace the document with the same `_id`, inserting it when absent.
    async fn upsert(&self, ns: &Namespace, doc: Document) -> Result<()>;

    async fn count_documents(&self, ns: &Namespace, filter: &Filter) -> Result<u64>;

    /// Drop a whole database. Dropping a database that does not exist succeeds.
    async fn drop_database(&self, db: &str) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Identity of a document, required for upserts.
pub fn document_id(doc: &Document) -> Result<&Bson> {
    doc.get("_id")
        .ok_or_else(|| crate::EngineError::InvalidDocument("document has no _id".to_string()))
}

/// Hide credentials embedded in a connection URI.
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://***@{}", scheme, &rest[at + 1..]),
        None => uri.to_string(),
    }
}
