//! In-memory store.
//!
//! Clusters live in process memory and are addressed by URI through
//! [`MemoryConnector`]. Used as the test double for the engines; it keeps
//! count of open connections and can be told to fail writes to a collection.

use super::{document_id, ClusterConnection, ConnectOptions, Connector, DocumentStream, Filter, Namespace, Projection};
use crate::{EngineError, Result};
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

type Collections = BTreeMap<String, Vec<Document>>;

#[derive(Default)]
struct ClusterState {
    databases: BTreeMap<String, Collections>,
    failing_collections: HashSet<String>,
    insert_many_calls: usize,
}

/// Shared handle to one in-memory cluster.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert documents directly, bypassing connections and failure injection.
    pub async fn seed(&self, db: &str, collection: &str, docs: Vec<Document>) {
        let mut state = self.state.lock().await;
        state
            .databases
            .entry(db.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
    }

    /// Create an empty collection.
    pub async fn create_collection(&self, db: &str, collection: &str) {
        self.seed(db, collection, Vec::new()).await;
    }

    pub async fn documents(&self, db: &str, collection: &str) -> Vec<Document> {
        let state = self.state.lock().await;
        state
            .databases
            .get(db)
            .and_then(|collections| collections.get(collection))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn database_names(&self) -> Vec<String> {
        self.state.lock().await.databases.keys().cloned().collect()
    }

    pub async fn collection_names(&self, db: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .databases
            .get(db)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of successful `insert_many` calls made through connections.
    pub async fn insert_many_calls(&self) -> usize {
        self.state.lock().await.insert_many_calls
    }

    /// Make every write to collections with this name fail.
    pub async fn fail_writes_to(&self, collection: &str) {
        self.state.lock().await.failing_collections.insert(collection.to_string());
    }
}

fn check_writable(state: &ClusterState, ns: &Namespace) -> Result<()> {
    if state.failing_collections.contains(&ns.collection) {
        return Err(EngineError::Store(format!("write to {} rejected", ns)));
    }
    Ok(())
}

fn matches(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::All => true,
        Filter::IdEquals(id) => doc.get("_id") == Some(id),
        Filter::IdNotIn(ids) => match doc.get("_id") {
            Some(id) => !ids.contains(id),
            None => true,
        },
        Filter::UpdatedAfter { field, after } => match doc.get(field) {
            Some(Bson::DateTime(value)) => value.timestamp_millis() > after.timestamp_millis(),
            _ => false,
        },
    }
}

fn project(doc: &Document, projection: Projection) -> Document {
    match projection {
        Projection::Full => doc.clone(),
        Projection::IdOnly => {
            let mut out = Document::new();
            if let Some(id) = doc.get("_id") {
                out.insert("_id", id.clone());
            }
            out
        }
    }
}

/// Routes URIs to registered in-memory clusters.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    clusters: HashMap<String, MemoryCluster>,
    open: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(mut self, uri: &str, cluster: MemoryCluster) -> Self {
        self.clusters.insert(uri.to_string(), cluster);
        self
    }

    /// Connections opened through this connector and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, uri: &str, _options: &ConnectOptions) -> Result<Box<dyn ClusterConnection>> {
        let cluster = self.clusters.get(uri).cloned().ok_or_else(|| EngineError::Connection {
            uri: uri.to_string(),
            message: "no such cluster".to_string(),
        })?;
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            cluster,
            open: self.open.clone(),
        }))
    }
}

pub struct MemoryConnection {
    cluster: MemoryCluster,
    open: Arc<AtomicUsize>,
}

#[async_trait]
impl ClusterConnection for MemoryConnection {
    async fn list_database_names(&self) -> Result<Vec<String>> {
        Ok(self.cluster.database_names().await)
    }

    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>> {
        Ok(self.cluster.collection_names(db).await)
    }

    async fn find(&self, ns: &Namespace, filter: &Filter, projection: Projection) -> Result<Vec<Document>> {
        let state = self.cluster.state.lock().await;
        let docs = state
            .databases
            .get(&ns.db)
            .and_then(|collections| collections.get(&ns.collection));
        Ok(docs
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches(doc, filter))
                    .map(|doc| project(doc, projection))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_stream(&self, ns: &Namespace, filter: &Filter) -> Result<DocumentStream> {
        let docs = self.find(ns, filter, Projection::Full).await?;
        Ok(stream::iter(docs.into_iter().map(Ok)).boxed())
    }

    async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64> {
        if docs.is_empty() {
            return Ok(0);
        }
        let mut state = self.cluster.state.lock().await;
        check_writable(&state, ns)?;

        let target = state
            .databases
            .entry(ns.db.clone())
            .or_default()
            .entry(ns.collection.clone())
            .or_default();

        let mut seen: Vec<Bson> = target.iter().filter_map(|d| d.get("_id").cloned()).collect();
        let mut prepared = Vec::with_capacity(docs.len());
        for mut doc in docs {
            if !doc.contains_key("_id") {
                doc.insert("_id", ObjectId::new());
            }
            let id = document_id(&doc)?.clone();
            if seen.contains(&id) {
                return Err(EngineError::Store(format!("duplicate key in {}: _id {}", ns, id)));
            }
            seen.push(id);
            prepared.push(doc);
        }

        let count = prepared.len() as u64;
        target.extend(prepared);
        state.insert_many_calls += 1;
        Ok(count)
    }

    async fn upsert(&self, ns: &Namespace, doc: Document) -> Result<()> {
        let id = document_id(&doc)?.clone();
        let mut state = self.cluster.state.lock().await;
        check_writable(&state, ns)?;

        let target = state
            .databases
            .entry(ns.db.clone())
            .or_default()
            .entry(ns.collection.clone())
            .or_default();
        match target.iter_mut().find(|existing| existing.get("_id") == Some(&id)) {
            Some(existing) => *existing = doc,
            None => target.push(doc),
        }
        Ok(())
    }

    async fn count_documents(&self, ns: &Namespace, filter: &Filter) -> Result<u64> {
        Ok(self.find(ns, filter, Projection::IdOnly).await?.len() as u64)
    }

    async fn drop_database(&self, db: &str) -> Result<()> {
        self.cluster.state.lock().await.databases.remove(db);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
