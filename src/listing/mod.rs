//! Listing page: build-time seed and incremental "load more" pagination
//!
//! The seed is generated with the first page of posts and the API's
//! `next_page` cursor. Each `load_more` follows the cursor verbatim, appends
//! the mapped results and replaces the cursor; once the API stops returning a
//! cursor the listing is exhausted for good.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::client::{
    ClientError, ContentClient, PageFetcher, QueryOptions, SearchResponse, NEWEST_FIRST,
};
use crate::config::SiteConfig;
use crate::content::{PostFields, PostSummary};

/// Posts shown so far plus the cursor to the next page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationState {
    pub posts: Vec<PostSummary>,
    pub next_page: Option<String>,
}

impl PaginationState {
    /// Map a search envelope into a fresh state
    pub fn from_response(response: &SearchResponse<PostFields>) -> Self {
        Self {
            posts: response.results.iter().map(PostSummary::from).collect(),
            next_page: response.next_page.clone(),
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    /// Append a fetched page and replace the cursor; returns posts added
    fn apply(&mut self, response: &SearchResponse<PostFields>) -> usize {
        let before = self.posts.len();
        self.posts
            .extend(response.results.iter().map(PostSummary::from));
        self.next_page = response.next_page.clone();
        self.posts.len() - before
    }
}

/// Props of the generated listing page
#[derive(Debug, Clone, Serialize)]
pub struct ListingProps {
    pub pagination: PaginationState,
    /// Seconds before the page is regenerated
    pub revalidate: u64,
}

/// Query the first page of posts for the listing
pub async fn static_props(
    client: &ContentClient,
    config: &SiteConfig,
    ref_id: Option<&str>,
) -> Result<ListingProps, ClientError> {
    let doc_type = &config.api.document_type;
    let mut options = QueryOptions::default()
        .fetch(
            ["title", "subtitle", "author"]
                .iter()
                .map(|field| format!("{}.{}", doc_type, field)),
        )
        .page_size(config.listing.page_size)
        .orderings(NEWEST_FIRST);
    if let Some(ref_id) = ref_id {
        options = options.at_ref(ref_id);
    }

    let response = client
        .query_by_type::<PostFields>(doc_type, &[], &options)
        .await?;

    tracing::debug!(
        "Listing seed: {} posts, more pages: {}",
        response.results.len(),
        response.next_page.is_some()
    );

    Ok(ListingProps {
        pagination: PaginationState::from_response(&response),
        revalidate: config.revalidate,
    })
}

/// Why a `load_more` call did not append anything
#[derive(Debug, Error)]
pub enum LoadMoreError {
    #[error("there are no more posts to load")]
    Exhausted,

    #[error("a page is already being loaded")]
    InFlight,

    #[error("the listing is no longer active")]
    Closed,

    #[error(transparent)]
    Fetch(#[from] ClientError),
}

/// Owns the pagination state of one listing page instance
pub struct ListingController<F> {
    fetcher: F,
    state: Mutex<PaginationState>,
    last_error: Mutex<Option<String>>,
    in_flight: AtomicBool,
    closed: CancellationToken,
}

impl<F: PageFetcher> ListingController<F> {
    /// Establish the editable state from the generated seed
    pub fn initialize(fetcher: F, seed: PaginationState) -> Self {
        Self {
            fetcher,
            state: Mutex::new(seed),
            last_error: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            closed: CancellationToken::new(),
        }
    }

    /// Fetch the next page and append it
    ///
    /// On failure the posts and cursor are left untouched so the same page
    /// can be retried.
    pub async fn load_more(&self) -> Result<usize, LoadMoreError> {
        if self.closed.is_cancelled() {
            return Err(LoadMoreError::Closed);
        }
        let cursor = self
            .lock_state()
            .next_page
            .clone()
            .ok_or(LoadMoreError::Exhausted)?;

        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(LoadMoreError::InFlight);
        }
        let _in_flight = InFlight(&self.in_flight);

        tracing::debug!("Loading more posts from {}", cursor);
        let result = tokio::select! {
            _ = self.closed.cancelled() => return Err(LoadMoreError::Closed),
            result = self.fetcher.get_page(&cursor) => result,
        };
        if self.closed.is_cancelled() {
            return Err(LoadMoreError::Closed);
        }

        match result {
            Ok(response) => {
                let added = self.lock_state().apply(&response);
                *lock(&self.last_error) = None;
                Ok(added)
            }
            Err(e) => {
                tracing::warn!("Failed to load more posts: {}", e);
                *lock(&self.last_error) = Some(e.to_string());
                Err(LoadMoreError::Fetch(e))
            }
        }
    }

    /// Whether the "load more" control should be offered
    pub fn can_load_more(&self) -> bool {
        !self.closed.is_cancelled()
            && !self.in_flight.load(Ordering::Acquire)
            && self.lock_state().has_more()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PaginationState {
        self.lock_state().clone()
    }

    pub fn posts(&self) -> Vec<PostSummary> {
        self.lock_state().posts.clone()
    }

    pub fn next_page(&self) -> Option<String> {
        self.lock_state().next_page.clone()
    }

    /// Message of the last failed fetch, cleared by the next success
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Detach from the page; in-flight fetches are dropped without applying
    pub fn close(&self) {
        self.closed.cancel();
    }

    fn lock_state(&self) -> MutexGuard<'_, PaginationState> {
        lock(&self.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears the in-flight flag when a load finishes or is dropped
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Serves canned envelopes by URL
    #[derive(Default)]
    struct MockPages {
        pages: HashMap<String, serde_json::Value>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl MockPages {
        fn with(mut self, url: &str, page: serde_json::Value) -> Self {
            self.pages.insert(url.to_string(), page);
            self
        }
    }

    impl PageFetcher for MockPages {
        fn get_page(
            &self,
            url: &str,
        ) -> impl Future<Output = Result<SearchResponse<PostFields>, ClientError>> + Send {
            let page = self.pages.get(url).cloned();
            let gate = self.gate.clone();
            let url = url.to_string();
            self.calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match gate {
                    Some(gate) => gate.notified().await,
                    None => tokio::task::yield_now().await,
                }
                match page {
                    Some(page) => serde_json::from_value(page)
                        .map_err(|source| ClientError::Decode { url, source }),
                    None => Err(ClientError::InvalidUrl(url)),
                }
            }
        }
    }

    fn summary(uid: &str) -> PostSummary {
        PostSummary {
            uid: Some(uid.to_string()),
            first_publication_date: Some("2021-03-25T19:25:28+0000".to_string()),
            title: format!("Title {}", uid),
            subtitle: format!("Subtitle {}", uid),
            author: "Ana".to_string(),
        }
    }

    fn raw(uid: &str) -> serde_json::Value {
        serde_json::json!({
            "uid": uid,
            "first_publication_date": "2021-03-25T19:25:28+0000",
            "data": {
                "title": format!("Title {}", uid),
                "subtitle": format!("Subtitle {}", uid),
                "author": "Ana"
            }
        })
    }

    fn seed(next_page: Option<&str>) -> PaginationState {
        PaginationState {
            posts: vec![summary("p1")],
            next_page: next_page.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_load_more_appends_and_replaces_cursor() {
        let pages = MockPages::default().with(
            "url1",
            serde_json::json!({"results": [raw("p2"), raw("p3")], "next_page": null}),
        );
        let listing = ListingController::initialize(pages, seed(Some("url1")));
        assert!(listing.can_load_more());

        let added = listing.load_more().await.unwrap();
        assert_eq!(added, 2);

        let state = listing.state();
        assert_eq!(
            state.posts,
            vec![summary("p1"), summary("p2"), summary("p3")]
        );
        assert_eq!(state.next_page, None);
        assert!(!listing.can_load_more());
    }

    #[tokio::test]
    async fn test_exhausted_listing_does_not_fetch() {
        let listing = ListingController::initialize(MockPages::default(), seed(None));
        assert!(!listing.can_load_more());
        assert!(matches!(
            listing.load_more().await,
            Err(LoadMoreError::Exhausted)
        ));
        assert_eq!(listing.fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(listing.posts(), vec![summary("p1")]);
    }

    #[tokio::test]
    async fn test_second_load_after_last_page_is_refused() {
        let pages = MockPages::default().with(
            "url1",
            serde_json::json!({"results": [raw("p2"), raw("p3")], "next_page": null}),
        );
        let listing = ListingController::initialize(pages, seed(Some("url1")));
        listing.load_more().await.unwrap();
        assert!(matches!(
            listing.load_more().await,
            Err(LoadMoreError::Exhausted)
        ));
        assert_eq!(listing.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(listing.posts().len(), 3);
    }

    #[tokio::test]
    async fn test_follows_cursor_chain() {
        let pages = MockPages::default()
            .with(
                "url1",
                serde_json::json!({"results": [raw("p2")], "next_page": "url2"}),
            )
            .with(
                "url2",
                serde_json::json!({"results": [raw("p3")], "next_page": null}),
            );
        let listing = ListingController::initialize(pages, seed(Some("url1")));

        listing.load_more().await.unwrap();
        assert_eq!(listing.next_page().as_deref(), Some("url2"));
        listing.load_more().await.unwrap();

        let uids: Vec<_> = listing
            .posts()
            .into_iter()
            .filter_map(|p| p.uid)
            .collect();
        assert_eq!(uids, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_overlapping_load_is_rejected() {
        let gate = Arc::new(Notify::new());
        let pages = MockPages {
            gate: Some(gate.clone()),
            ..MockPages::default()
        }
        .with(
            "url1",
            serde_json::json!({"results": [raw("p2")], "next_page": null}),
        );
        let listing = ListingController::initialize(pages, seed(Some("url1")));

        let (first, second) = tokio::join!(listing.load_more(), async {
            let second = listing.load_more().await;
            assert!(!listing.can_load_more());
            gate.notify_one();
            second
        });

        assert_eq!(first.unwrap(), 1);
        assert!(matches!(second, Err(LoadMoreError::InFlight)));
        assert_eq!(listing.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(listing.posts().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_state_and_allows_retry() {
        let pages = MockPages::default().with(
            "url1",
            serde_json::json!({"next_page": "url2"}),
        );
        let listing = ListingController::initialize(pages, seed(Some("url1")));

        let err = listing.load_more().await.unwrap_err();
        assert!(matches!(err, LoadMoreError::Fetch(ClientError::Decode { .. })));
        assert_eq!(listing.state(), seed(Some("url1")));
        assert!(listing.last_error().is_some());
        assert!(listing.can_load_more());

        assert!(matches!(
            listing.load_more().await,
            Err(LoadMoreError::Fetch(_))
        ));
        assert_eq!(listing.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closed_listing_ignores_late_response() {
        let gate = Arc::new(Notify::new());
        let pages = MockPages {
            gate: Some(gate.clone()),
            ..MockPages::default()
        }
        .with(
            "url1",
            serde_json::json!({"results": [raw("p2")], "next_page": null}),
        );
        let listing = ListingController::initialize(pages, seed(Some("url1")));

        let (result, _) = tokio::join!(listing.load_more(), async {
            listing.close();
            gate.notify_one();
        });

        assert!(matches!(result, Err(LoadMoreError::Closed)));
        assert_eq!(listing.state(), seed(Some("url1")));
        assert!(!listing.can_load_more());
    }

    #[test]
    fn test_state_from_response() {
        let response: SearchResponse<PostFields> = serde_json::from_value(serde_json::json!({
            "results": [raw("p1")],
            "next_page": "url1"
        }))
        .unwrap();
        assert_eq!(PaginationState::from_response(&response), seed(Some("url1")));
    }
}
