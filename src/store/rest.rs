use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::ChatError;

use super::{Collection, CollectionStore, Fields, StoreRecord};

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Serialize)]
struct CreateRequest {
    data: Fields,
}

/// Client for a Strapi-style REST backend.
///
/// `POST {base}/{collection}` with `{"data": {...}}` creates,
/// `GET {base}/{collection}` lists as `{"data": [{"id", "attributes"}]}`,
/// `filters[field][$eqi]=value` narrows a list and
/// `DELETE {base}/{collection}/{id}` removes.
#[derive(Clone)]
pub struct RestStore {
    http: Client,
    base_url: String,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>) -> RestStore {
        RestStore::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> RestStore {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        RestStore { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, collection: Collection) -> String {
        format!("{}/{}", self.base_url, collection.path())
    }
}

impl CollectionStore for RestStore {
    #[instrument(skip(self, fields), fields(store = %self.base_url))]
    async fn create(&self, collection: Collection, fields: Fields) -> Result<StoreRecord, ChatError> {
        let Envelope { data } = self
            .http
            .post(self.url(collection))
            .json(&CreateRequest { data: fields })
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope<StoreRecord>>()
            .await?;
        debug!(id = data.id, "created");
        Ok(data)
    }

    #[instrument(skip(self), fields(store = %self.base_url))]
    async fn list(&self, collection: Collection) -> Result<Vec<StoreRecord>, ChatError> {
        let Envelope { data } = self
            .http
            .get(self.url(collection))
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope<Vec<StoreRecord>>>()
            .await?;
        Ok(data)
    }

    #[instrument(skip(self), fields(store = %self.base_url))]
    async fn find_eqi(&self, collection: Collection, field: &str, value: &str) -> Result<Vec<StoreRecord>, ChatError> {
        let filter = format!("filters[{field}][$eqi]");
        let Envelope { data } = self
            .http
            .get(self.url(collection))
            .query(&[(filter.as_str(), value)])
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope<Vec<StoreRecord>>>()
            .await?;
        Ok(data)
    }

    #[instrument(skip(self), fields(store = %self.base_url))]
    async fn delete(&self, collection: Collection, id: i64) -> Result<(), ChatError> {
        let response = self
            .http
            .delete(format!("{}/{id}", self.url(collection)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ChatError::NotFound(format!("{collection}/{id}")));
        }
        response.error_for_status()?;
        Ok(())
    }
}
