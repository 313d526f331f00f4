// Object REST API client
//
// Wraps `reqwest::Client` with collection-scoped URL construction and
// envelope unwrapping. Objects are returned as raw JSON; turning them
// into domain objects is `appstax-core`'s job.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Query-string key carrying the relation expansion depth.
const EXPAND_PARAM: &str = "expand";

/// Query-string key carrying the filter expression.
const FILTER_PARAM: &str = "filter";

/// List responses are wrapped as `{"objects": [...]}`.
#[derive(Debug, Deserialize)]
struct ObjectsEnvelope {
    #[serde(default)]
    objects: Vec<serde_json::Value>,
}

/// Error bodies look like `{"errorMessage": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// Raw HTTP client for the object API.
///
/// All methods return unwrapped payloads: list calls strip the
/// `objects` envelope before the caller sees it.
#[derive(Debug, Clone)]
pub struct ObjectClient {
    http: reqwest::Client,
    base_url: Url,
    has_session: bool,
}

impl ObjectClient {
    /// Create a client from a `TransportConfig`. `base_url` is the API
    /// root, e.g. `https://appstax.com/api/latest/`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
            has_session: transport.session_id.is_some(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client` (tests, custom
    /// middleware). No credential headers are added.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            has_session: false,
        })
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET objects/{collection}` -- every object in the collection.
    pub async fn find_all(
        &self,
        collection: &str,
        expand: Option<u32>,
    ) -> Result<Vec<serde_json::Value>, Error> {
        let mut url = self.objects_url(&[collection])?;
        append_expand(&mut url, expand);
        self.get_list(url).await
    }

    /// `GET objects/{collection}?filter=...` -- objects matching a filter
    /// expression.
    pub async fn find(
        &self,
        collection: &str,
        filter: &str,
        expand: Option<u32>,
    ) -> Result<Vec<serde_json::Value>, Error> {
        let mut url = self.objects_url(&[collection])?;
        url.query_pairs_mut().append_pair(FILTER_PARAM, filter);
        append_expand(&mut url, expand);
        self.get_list(url).await
    }

    /// `GET objects/{collection}/{id}?expand=N` -- one object with its
    /// relations populated `depth` levels deep.
    pub async fn get(
        &self,
        collection: &str,
        id: &str,
        expand: Option<u32>,
    ) -> Result<serde_json::Value, Error> {
        let mut url = self.objects_url(&[collection, id])?;
        append_expand(&mut url, expand);
        let body = self.get_body(url).await?;
        parse_json(&body)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/objects/{segments...}` with each segment escaped.
    fn objects_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            path.pop_if_empty().push("objects");
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get_list(&self, url: Url) -> Result<Vec<serde_json::Value>, Error> {
        let body = self.get_body(url).await?;
        let envelope: ObjectsEnvelope = parse_json(&body)?;
        Ok(envelope.objects)
    }

    /// Send a GET request and return the body of a successful response.
    async fn get_body(&self, url: Url) -> Result<String, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(if self.has_session {
                Error::SessionExpired
            } else {
                Error::InvalidAppKey
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error_message)
                .unwrap_or_else(|| preview(&body).to_owned());
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

fn append_expand(url: &mut Url, expand: Option<u32>) {
    if let Some(depth) = expand.filter(|d| *d > 0) {
        url.query_pairs_mut()
            .append_pair(EXPAND_PARAM, &depth.to_string());
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    })
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
