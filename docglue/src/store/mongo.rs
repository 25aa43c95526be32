//! [`DocumentStore`] over the official MongoDB driver

use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use mongodb::{
    options::{FindOneAndUpdateOptions, UpdateOptions},
    Client, Collection,
};

use super::backend::{DocumentStore, Namespace, WriteCounts};
use super::error::BackendResult;

/// MongoDB-backed store sharing one pooled [`Client`]
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Wrap a connected client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, ns: &Namespace) -> Collection<Document> {
        self.client.database(&ns.database).collection(&ns.collection)
    }
}

impl From<Client> for MongoStore {
    fn from(client: Client) -> Self {
        Self::new(client)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_one(&self, ns: &Namespace, document: Document) -> BackendResult<bool> {
        // Write-concern failures surface as driver errors
        self.collection(ns).insert_one(document).await?;
        Ok(true)
    }

    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> BackendResult<usize> {
        let result = self.collection(ns).insert_many(documents).await?;
        Ok(result.inserted_ids.len())
    }

    async fn replace_one(
        &self,
        ns: &Namespace,
        filter: Document,
        replacement: Document,
        upsert: bool,
    ) -> BackendResult<WriteCounts> {
        let result = self
            .collection(ns)
            .replace_one(filter, replacement)
            .upsert(upsert)
            .await?;

        Ok(WriteCounts {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted: result.upserted_id.is_some(),
        })
    }

    async fn find_one(&self, ns: &Namespace, filter: Document) -> BackendResult<Option<Document>> {
        Ok(self.collection(ns).find_one(filter).await?)
    }

    async fn find(
        &self,
        ns: &Namespace,
        filter: Document,
        sort: Option<Document>,
    ) -> BackendResult<Vec<Document>> {
        let cursor = match sort {
            Some(sort) if !sort.is_empty() => self.collection(ns).find(filter).sort(sort).await?,
            _ => self.collection(ns).find(filter).await?,
        };
        Ok(cursor.try_collect::<Vec<_>>().await?)
    }

    async fn aggregate(
        &self,
        ns: &Namespace,
        pipeline: Vec<Document>,
    ) -> BackendResult<Vec<Document>> {
        let cursor = self.collection(ns).aggregate(pipeline).await?;
        Ok(cursor.try_collect::<Vec<_>>().await?)
    }

    async fn find_one_and_update(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> BackendResult<Option<Document>> {
        Ok(self
            .collection(ns)
            .find_one_and_update(filter, update)
            .with_options(options)
            .await?)
    }

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> BackendResult<WriteCounts> {
        let result = self
            .collection(ns)
            .update_many(filter, update)
            .with_options(options)
            .await?;

        Ok(WriteCounts {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted: result.upserted_id.is_some(),
        })
    }

    async fn delete_many(&self, ns: &Namespace, filter: Document) -> BackendResult<u64> {
        let result = self.collection(ns).delete_many(filter).await?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_wraps_lazily_connected_client() {
        // Client construction does not touch the network
        let client = Client::with_uri_str("mongodb://localhost:27017").await.unwrap();
        let store = MongoStore::from(client);
        let ns = Namespace::new("shop", "orders");
        assert_eq!(store.collection(&ns).name(), "orders");
        assert_eq!(store.collection(&ns).namespace().db, "shop");
    }
}
