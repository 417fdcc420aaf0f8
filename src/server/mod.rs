//! Preview server with on-demand article generation
//!
//! Serves the generated site. Pages older than `revalidate` are still served
//! and rebuilt in the background. In fallback mode, an article that was never
//! generated is built on first request while the reader sees a loading page.

mod error;

pub use error::AppError;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::article::{self, ArticleState, NOT_FOUND_REDIRECT};
use crate::cache;
use crate::client::ContentClient;
use crate::content::{PostFields, PostSummary};
use crate::generator::{Generator, LISTING_ROUTE};
use crate::listing::PaginationState;
use crate::Site;

/// Server state
pub struct ServerState {
    generator: Arc<Generator>,
    client: Option<ContentClient>,
    /// Build unknown articles on request instead of answering 404
    fallback: bool,
    /// Routes with a build running
    building: Mutex<HashSet<String>>,
    /// Slugs that resolved to nothing, with the time they were checked
    not_found: Mutex<HashMap<String, u64>>,
}

impl ServerState {
    pub fn new(generator: Generator, client: Option<ContentClient>, fallback: bool) -> Self {
        Self {
            generator: Arc::new(generator),
            client,
            fallback,
            building: Mutex::new(HashSet::new()),
            not_found: Mutex::new(HashMap::new()),
        }
    }

    fn is_building(&self, route: &str) -> bool {
        lock(&self.building).contains(route)
    }

    /// Whether the slug resolved to nothing within the last `revalidate` seconds
    fn known_missing(&self, slug: &str) -> bool {
        self.known_missing_at(slug, cache::now())
    }

    fn known_missing_at(&self, slug: &str, now: u64) -> bool {
        let mut not_found = lock(&self.not_found);
        self.evict_expired(&mut not_found, now);
        not_found.contains_key(slug)
    }

    fn record_missing(&self, slug: &str) {
        self.record_missing_at(slug, cache::now());
    }

    fn record_missing_at(&self, slug: &str, now: u64) {
        let mut not_found = lock(&self.not_found);
        self.evict_expired(&mut not_found, now);
        not_found.insert(slug.to_string(), now);
    }

    fn evict_expired(&self, not_found: &mut HashMap<String, u64>, now: u64) {
        let revalidate = self.generator.site().config.revalidate;
        not_found.retain(|_, checked_at| now.saturating_sub(*checked_at) < revalidate);
    }
}

#[derive(Debug, Deserialize)]
pub struct LoadMoreQuery {
    cursor: Option<String>,
}

/// Next page of the listing, as data and as a rendered fragment
#[derive(Debug, Serialize)]
pub struct LoadMoreResponse {
    pub posts: Vec<PostSummary>,
    pub html: String,
    pub next_page: Option<String>,
}

/// Build the application router
pub fn router(state: Arc<ServerState>) -> Router {
    let public_dir = state.generator.site().public_dir.clone();

    Router::new()
        .route("/", get(listing_handler))
        .route("/post/:slug", get(article_handler))
        .route("/post/:slug/", get(article_handler))
        .route("/api/posts", get(load_more_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the preview server
pub async fn start(
    site: &Site,
    client: Option<ContentClient>,
    ip: &str,
    port: u16,
    fallback: bool,
    open: bool,
) -> Result<()> {
    let generator = Generator::new(site)?;
    let state = Arc::new(ServerState::new(generator, client, fallback));
    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    if fallback {
        println!("Articles missing from the build are generated on request.");
    }
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn listing_handler(State(state): State<Arc<ServerState>>) -> Result<Response, AppError> {
    let output = state.generator.output_path(LISTING_ROUTE);

    if !output.exists() {
        let Some(client) = state.client.as_ref() else {
            return Err(AppError::NotFound("Site has not been generated".to_string()));
        };
        state.generator.build_listing(client, None).await?;
        state.generator.save_routes()?;
    } else if state.generator.is_stale(LISTING_ROUTE) {
        revalidate(&state, LISTING_ROUTE.to_string(), None);
    }

    serve_file(&output).await
}

async fn article_handler(
    State(state): State<Arc<ServerState>>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    if !article::is_valid_slug(&slug) {
        return Ok(Redirect::temporary(NOT_FOUND_REDIRECT).into_response());
    }

    let route = state.generator.article_route(&slug);
    let output = state.generator.output_path(&route);

    if output.exists() {
        if state.generator.is_stale(&route) {
            revalidate(&state, route, Some(slug));
        }
        return serve_file(&output).await;
    }

    if !state.fallback || state.client.is_none() {
        return Err(AppError::NotFound(format!("No page for {}", route)));
    }
    if state.known_missing(&slug) {
        return Ok(Redirect::temporary(NOT_FOUND_REDIRECT).into_response());
    }

    // Pending: build in the background, the loading page refreshes itself
    if !state.is_building(&route) {
        revalidate(&state, route, Some(slug));
    }
    Ok(Html(state.generator.render_loading()?).into_response())
}

async fn load_more_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<LoadMoreQuery>,
) -> Result<Json<LoadMoreResponse>, AppError> {
    let cursor = query
        .cursor
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing cursor".to_string()))?;

    let client = state
        .client
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Content API is not configured".to_string()))?;

    if !client.owns_url(&cursor) {
        return Err(AppError::BadRequest(
            "Cursor does not belong to the content API".to_string(),
        ));
    }

    let response = client.fetch_page::<PostFields>(&cursor).await?;
    let page = PaginationState::from_response(&response);
    let html = state.generator.render_summaries(&page.posts)?;

    Ok(Json(LoadMoreResponse {
        posts: page.posts,
        html,
        next_page: page.next_page,
    }))
}

/// Rebuild a route in the background, at most once at a time
fn revalidate(state: &Arc<ServerState>, route: String, slug: Option<String>) {
    let Some(client) = state.client.clone() else {
        return;
    };
    if !lock(&state.building).insert(route.clone()) {
        return;
    }

    tracing::debug!("Revalidating {}", route);
    let state = Arc::clone(state);
    tokio::spawn(async move {
        let result = match &slug {
            None => state.generator.build_listing(&client, None).await.map(|_| ()),
            Some(slug) => match state.generator.build_article(&client, slug, None).await {
                Ok(ArticleState::NotFound) => {
                    state.record_missing(slug);
                    Ok(())
                }
                Ok(_) => {
                    lock(&state.not_found).remove(slug);
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        match result.and_then(|_| state.generator.save_routes()) {
            Ok(()) => tracing::info!("Regenerated {}", route),
            Err(e) => tracing::error!("Failed to regenerate {}: {:#}", route, e),
        }
        lock(&state.building).remove(&route);
    });
}

async fn serve_file(path: &std::path::Path) -> Result<Response, AppError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Html(content).into_response()),
        Err(_) => Err(AppError::NotFound("Not found".to_string())),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
