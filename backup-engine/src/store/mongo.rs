//! MongoDB-backed store.

use super::{
    document_id, redact_uri, ClusterConnection, ConnectOptions, Connector, DocumentStream, Filter, Namespace,
    Projection,
};
use crate::{EngineError, Result};
use async_trait::async_trait;
use bson::{doc, Document};
use futures_util::{StreamExt, TryStreamExt};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::debug;

/// Connects to MongoDB clusters with the official driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self, uri: &str, options: &ConnectOptions) -> Result<Box<dyn ClusterConnection>> {
        let connection_error = |e: mongodb::error::Error| EngineError::Connection {
            uri: redact_uri(uri),
            message: e.to_string(),
        };

        let mut client_options = ClientOptions::parse(uri).await.map_err(connection_error)?;
        client_options.max_pool_size = Some(options.max_pool_size);
        client_options.max_idle_time = Some(options.max_idle_time);
        client_options.connect_timeout = Some(options.connect_timeout);
        client_options.server_selection_timeout = Some(options.connect_timeout);

        let client = Client::with_options(client_options).map_err(connection_error)?;

        // Lazy driver connect: ping so callers get a usable handle or an error now
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(connection_error)?;

        debug!(uri = %redact_uri(uri), "Connected to MongoDB");
        Ok(Box::new(MongoConnection { client }))
    }
}

pub struct MongoConnection {
    client: Client,
}

impl MongoConnection {
    fn collection(&self, ns: &Namespace) -> Collection<Document> {
        self.client.database(&ns.db).collection(&ns.collection)
    }
}

/// Native query document for a filter.
pub fn filter_document(filter: &Filter) -> Document {
    match filter {
        Filter::All => Document::new(),
        Filter::IdEquals(id) => doc! { "_id": id.clone() },
        Filter::IdNotIn(ids) => doc! { "_id": { "$nin": ids.clone() } },
        Filter::UpdatedAfter { field, after } => {
            let after = bson::DateTime::from_millis(after.timestamp_millis());
            let mut query = Document::new();
            query.insert(field.as_str(), doc! { "$gt": after });
            query
        }
    }
}

#[async_trait]
impl ClusterConnection for MongoConnection {
    async fn list_database_names(&self) -> Result<Vec<String>> {
        Ok(self.client.list_database_names().await?)
    }

    async fn list_collection_names(&self, db: &str) -> Result<Vec<String>> {
        Ok(self.client.database(db).list_collection_names().await?)
    }

    async fn find(&self, ns: &Namespace, filter: &Filter, projection: Projection) -> Result<Vec<Document>> {
        let collection = self.collection(ns);
        let find = collection.find(filter_document(filter));
        let cursor = match projection {
            Projection::Full => find.await?,
            Projection::IdOnly => find.projection(doc! { "_id": 1 }).await?,
        };
        Ok(cursor.try_collect().await?)
    }

    async fn find_stream(&self, ns: &Namespace, filter: &Filter) -> Result<DocumentStream> {
        let cursor = self.collection(ns).find(filter_document(filter)).await?;
        Ok(cursor.map_err(EngineError::from).boxed())
    }

    async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>) -> Result<u64> {
        if docs.is_empty() {
            return Ok(0);
        }
        let result = self.collection(ns).insert_many(docs).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn upsert(&self, ns: &Namespace, doc: Document) -> Result<()> {
        let id = document_id(&doc)?.clone();
        self.collection(ns)
            .replace_one(doc! { "_id": id }, doc)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn count_documents(&self, ns: &Namespace, filter: &Filter) -> Result<u64> {
        Ok(self.collection(ns).count_documents(filter_document(filter)).await?)
    }

    async fn drop_database(&self, db: &str) -> Result<()> {
        self.client.database(db).drop().await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_filter_all_is_empty_document() {
        assert_eq!(filter_document(&Filter::All), Document::new());
    }

    #[test]
    fn test_filter_updated_after() {
        let after = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let filter = Filter::UpdatedAfter {
            field: "updatedAt".to_string(),
            after,
        };
        assert_eq!(
            filter_document(&filter),
            doc! { "updatedAt": { "$gt": bson::DateTime::from_millis(after.timestamp_millis()) } }
        );
    }

    #[test]
    fn test_filter_id_not_in() {
        let filter = Filter::IdNotIn(vec![Bson::Int32(1), Bson::String("a".into())]);
        assert_eq!(filter_document(&filter), doc! { "_id": { "$nin": [1, "a"] } });
    }

    #[test]
    fn test_filter_id_equals() {
        let filter = Filter::IdEquals(Bson::String("incremental".into()));
        assert_eq!(filter_document(&filter), doc! { "_id": "incremental" });
    }
}
