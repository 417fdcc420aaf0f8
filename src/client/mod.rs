//! Content API client
//!
//! A thin handle over the headless content API's REST interface: resolve the
//! master ref, search documents with predicates, look a document up by its
//! uid, and follow `next_page` cursors verbatim.

mod document;
mod predicate;

pub use document::{ApiInfo, ContentRef, Document, SearchResponse};
pub use predicate::{query_string, Predicate};

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::content::PostFields;

/// Errors raised while talking to the content API
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("content API endpoint is not configured (set api.endpoint in _config.yml)")]
    NotConfigured,

    #[error("invalid content API URL {0:?}")]
    InvalidUrl(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("content API returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("content API did not report a master ref")]
    NoMasterRef,
}

/// Most recently published first
pub const NEWEST_FIRST: &str = "[document.first_publication_date desc]";

/// Options for a search query
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Restrict returned `data` to these fields (`type.field`)
    pub fetch: Vec<String>,
    pub page_size: Option<u32>,
    /// e.g. `[document.first_publication_date desc]`
    pub orderings: Option<String>,
    /// Content ref to query; the master ref is resolved when absent
    pub ref_id: Option<String>,
}

impl QueryOptions {
    pub fn fetch<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn orderings(mut self, orderings: impl Into<String>) -> Self {
        self.orderings = Some(orderings.into());
        self
    }

    pub fn at_ref(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }
}

/// Source of listing pages addressed by cursor URL
pub trait PageFetcher {
    fn get_page(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<SearchResponse<PostFields>, ClientError>> + Send;
}

/// Configured handle to the content API
#[derive(Debug, Clone)]
pub struct ContentClient {
    http: Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl ContentClient {
    /// Create a client from the `api` section of the site config
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        if config.endpoint.trim().is_empty() {
            return Err(ClientError::NotConfigured);
        }
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/'))
            .map_err(|_| ClientError::InvalidUrl(config.endpoint.clone()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ClientError::Http {
                url: endpoint.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            endpoint,
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Fetch the ref of currently published content
    pub async fn master_ref(&self) -> Result<String, ClientError> {
        let mut url = self.endpoint.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        let info: ApiInfo = self.get_json(url).await?;
        info.master()
            .map(|r| r.ref_id.clone())
            .ok_or(ClientError::NoMasterRef)
    }

    /// Search documents matching all predicates
    pub async fn query<D: DeserializeOwned + Default>(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<SearchResponse<D>, ClientError> {
        let ref_id = match &options.ref_id {
            Some(r) => r.clone(),
            None => self.master_ref().await?,
        };

        let url = self.query_url(&ref_id, predicates, options);
        tracing::debug!("Querying content API: {}", redact(&url));
        self.get_json(url).await
    }

    /// Search documents of one custom type
    pub async fn query_by_type<D: DeserializeOwned + Default>(
        &self,
        doc_type: &str,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<SearchResponse<D>, ClientError> {
        let mut all = Vec::with_capacity(predicates.len() + 1);
        all.push(Predicate::document_type(doc_type));
        all.extend_from_slice(predicates);
        self.query(&all, options).await
    }

    /// Fetch a single document by its unique identifier
    pub async fn get_by_uid<D: DeserializeOwned + Default>(
        &self,
        doc_type: &str,
        uid: &str,
        options: &QueryOptions,
    ) -> Result<Option<Document<D>>, ClientError> {
        let mut options = options.clone();
        options.page_size = Some(1);
        options.orderings = None;
        let response: SearchResponse<D> = self
            .query(&[Predicate::uid(doc_type, uid)], &options)
            .await?;
        Ok(response.results.into_iter().next())
    }

    /// GET a cursor URL exactly as the API returned it
    pub async fn fetch_page<D: DeserializeOwned + Default>(
        &self,
        url: &str,
    ) -> Result<SearchResponse<D>, ClientError> {
        let url = Url::parse(url).map_err(|_| ClientError::InvalidUrl(url.to_string()))?;
        self.get_json(url).await
    }

    /// Whether a URL points at this client's API origin
    pub fn owns_url(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(url) => {
                url.scheme() == self.endpoint.scheme()
                    && url.host_str() == self.endpoint.host_str()
                    && url.port_or_known_default() == self.endpoint.port_or_known_default()
            }
            Err(_) => false,
        }
    }

    fn query_url(&self, ref_id: &str, predicates: &[Predicate], options: &QueryOptions) -> Url {
        let mut url = self.search_url();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", ref_id);
            pairs.append_pair("q", &query_string(predicates));
            if !options.fetch.is_empty() {
                pairs.append_pair("fetch", &options.fetch.join(","));
            }
            if let Some(page_size) = options.page_size {
                pairs.append_pair("pageSize", &page_size.to_string());
            }
            if let Some(orderings) = &options.orderings {
                pairs.append_pair("orderings", orderings);
            }
            if let Some(token) = &self.access_token {
                pairs.append_pair("access_token", token);
            }
        }
        url
    }

    fn search_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        let path = format!("{}/documents/search", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let display = redact(&url);

        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                url: display.clone(),
                source,
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|source| ClientError::Http {
            url: display.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(ClientError::Status {
                url: display,
                status,
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| ClientError::Decode {
            url: display,
            source,
        })
    }
}

impl PageFetcher for ContentClient {
    fn get_page(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<SearchResponse<PostFields>, ClientError>> + Send {
        self.fetch_page::<PostFields>(url)
    }
}

/// Strip the access token before a URL ends up in logs or errors
fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "access_token") {
        return url.to_string();
    }
    let mut clean = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "access_token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    clean.query_pairs_mut().clear().extend_pairs(pairs);
    clean.to_string()
}
