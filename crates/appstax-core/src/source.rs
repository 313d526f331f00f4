// ── Object source ──
//
// Where watches load from and where relation expansion is fetched. The
// default implementation sits on the REST client; anything that can
// return objects by collection and filter can stand in for it.

use futures_util::future::BoxFuture;
use tracing::debug;

use appstax_api::ObjectClient;

use crate::config::ClientConfig;
use crate::convert::{object_from_json, objects_from_json};
use crate::error::CoreError;
use crate::object::Object;

/// Options for a collection query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Populate relations this many levels deep. `None` or `Some(0)`
    /// leaves them unexpanded.
    pub expand: Option<u32>,
}

impl FindOptions {
    pub fn expand(depth: u32) -> Self {
        Self {
            expand: (depth > 0).then_some(depth),
        }
    }
}

/// Query and expansion capability the model depends on.
///
/// Futures are `'static` so the model can run them on their own tasks;
/// implementations clone whatever handle they need.
pub trait ObjectSource: Send + Sync + 'static {
    /// Objects in `collection` matching the filter expression `query`.
    fn find(
        &self,
        collection: &str,
        query: &str,
        options: FindOptions,
    ) -> BoxFuture<'static, Result<Vec<Object>, CoreError>>;

    /// Every object in `collection`.
    fn find_all(
        &self,
        collection: &str,
        options: FindOptions,
    ) -> BoxFuture<'static, Result<Vec<Object>, CoreError>>;

    /// Re-fetch `object` with its relations populated `depth` levels deep.
    fn expand(&self, object: Object, depth: u32) -> BoxFuture<'static, Result<Object, CoreError>>;
}

/// [`ObjectSource`] backed by the REST object API.
#[derive(Clone)]
pub struct RestObjectSource {
    client: ObjectClient,
}

impl RestObjectSource {
    pub fn new(client: ObjectClient) -> Self {
        Self { client }
    }

    /// REST source for the app described by `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, CoreError> {
        let client = ObjectClient::new(config.base_url.clone(), &config.transport())?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &ObjectClient {
        &self.client
    }
}

impl ObjectSource for RestObjectSource {
    fn find(
        &self,
        collection: &str,
        query: &str,
        options: FindOptions,
    ) -> BoxFuture<'static, Result<Vec<Object>, CoreError>> {
        let client = self.client.clone();
        let collection = collection.to_owned();
        let query = query.to_owned();
        Box::pin(async move {
            debug!(%collection, %query, expand = ?options.expand, "find");
            let raw = client.find(&collection, &query, options.expand).await?;
            objects_from_json(&collection, raw)
        })
    }

    fn find_all(
        &self,
        collection: &str,
        options: FindOptions,
    ) -> BoxFuture<'static, Result<Vec<Object>, CoreError>> {
        let client = self.client.clone();
        let collection = collection.to_owned();
        Box::pin(async move {
            debug!(%collection, expand = ?options.expand, "find all");
            let raw = client.find_all(&collection, options.expand).await?;
            objects_from_json(&collection, raw)
        })
    }

    fn expand(&self, object: Object, depth: u32) -> BoxFuture<'static, Result<Object, CoreError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let Some(id) = object.id() else {
                return Err(CoreError::InvalidObject {
                    reason: "cannot expand an object without an id".into(),
                });
            };
            if object.collection().is_empty() {
                return Err(CoreError::InvalidObject {
                    reason: format!("object {id} has no collection"),
                });
            }
            debug!(collection = object.collection(), %id, depth, "expand");
            let raw = client
                .get(object.collection(), id.as_str(), Some(depth))
                .await
                .map_err(|e| match CoreError::from(e) {
                    CoreError::NotFound { .. } => CoreError::NotFound {
                        collection: object.collection().to_owned(),
                        identifier: id.to_string(),
                    },
                    other => other,
                })?;
            object_from_json(object.collection(), raw)
        })
    }
}
