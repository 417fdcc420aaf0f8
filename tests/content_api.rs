//! End-to-end checks against an in-process mock of the content API

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use spacetraveling::article::{self, ArticleState};
use spacetraveling::client::NEWEST_FIRST;
use spacetraveling::commands::generate;
use spacetraveling::generator::Generator;
use spacetraveling::listing::{self, ListingController, LoadMoreError};
use spacetraveling::server::{self, ServerState};
use spacetraveling::Site;

const MASTER_REF: &str = "master-ref";
const UIDS: [&str; 3] = ["one", "two", "three"];

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(rename = "ref")]
    ref_id: String,
    q: String,
    page: Option<usize>,
    #[serde(rename = "pageSize")]
    page_size: Option<usize>,
    orderings: Option<String>,
}

fn document(uid: &str) -> Value {
    json!({
        "id": format!("id-{}", uid),
        "uid": uid,
        "type": "posts",
        "first_publication_date": "2021-03-25T19:25:28+0000",
        "last_publication_date": "2021-03-26T10:00:00+0000",
        "data": {
            "title": format!("Post {}", uid),
            "subtitle": "Pensando em sincronização",
            "author": "Joseph Oliveira",
            "banner": { "url": format!("https://images.test/{}.png", uid) },
            "content": [{
                "heading": "Proin et varius",
                "body": [{
                    "type": "paragraph",
                    "text": "Nullam dolor sapien vulputate eu diam",
                    "spans": [{ "start": 0, "end": 6, "type": "strong" }]
                }]
            }]
        }
    })
}

/// Uid from a `[[at(my.posts.uid, "...")]]` query
fn uid_in(q: &str) -> Option<String> {
    if !q.contains("my.posts.uid") {
        return None;
    }
    let start = q.find('"')? + 1;
    let end = start + q[start..].find('"')?;
    Some(q[start..end].to_string())
}

async fn api_root() -> Json<Value> {
    Json(json!({
        "refs": [
            { "id": "preview", "ref": "preview-ref", "label": "Preview", "isMasterRef": false },
            { "id": "master", "ref": MASTER_REF, "label": "Master", "isMasterRef": true }
        ]
    }))
}

async fn search(State(base): State<Arc<String>>, Query(params): Query<SearchParams>) -> Response {
    if params.ref_id != MASTER_REF {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "unknown ref" }))).into_response();
    }

    if let Some(uid) = uid_in(&params.q) {
        let results: Vec<Value> = UIDS
            .iter()
            .filter(|u| **u == uid)
            .map(|u| document(u))
            .collect();
        return Json(json!({
            "page": 1,
            "total_pages": 1,
            "next_page": null,
            "results": results
        }))
        .into_response();
    }

    // Listing and path queries must ask for newest first explicitly
    if params.orderings.as_deref() != Some(NEWEST_FIRST) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "unordered" }))).into_response();
    }

    let page = params.page.unwrap_or(1).max(1);
    let size = params.page_size.unwrap_or(20).max(1);
    let results: Vec<Value> = UIDS
        .iter()
        .skip((page - 1) * size)
        .take(size)
        .map(|u| document(u))
        .collect();
    let total_pages = UIDS.len().div_ceil(size);

    let next_page = (page < total_pages).then(|| {
        let mut url = Url::parse(&format!("{}/api/v2/documents/search", base)).unwrap();
        url.query_pairs_mut()
            .append_pair("ref", MASTER_REF)
            .append_pair("q", &params.q)
            .append_pair("page", &(page + 1).to_string())
            .append_pair("pageSize", &size.to_string())
            .append_pair("orderings", NEWEST_FIRST);
        url.to_string()
    });

    Json(json!({
        "page": page,
        "results_per_page": size,
        "total_results_size": UIDS.len(),
        "total_pages": total_pages,
        "next_page": next_page,
        "results": results
    }))
    .into_response()
}

/// Start the mock API; returns its `/api/v2` endpoint
async fn mock_api() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let app = Router::new()
        .route("/api/v2", get(api_root))
        .route("/api/v2/documents/search", get(search))
        .with_state(Arc::new(base.clone()));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("{}/api/v2", base)
}

fn site(dir: &std::path::Path, endpoint: &str) -> Site {
    let mut site = Site::new(dir).unwrap();
    site.config.api.endpoint = endpoint.to_string();
    site.config.api.access_token = None;
    site
}

#[tokio::test]
async fn test_master_ref() {
    let endpoint = mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let client = site(dir.path(), &endpoint).client().unwrap();

    assert_eq!(client.master_ref().await.unwrap(), MASTER_REF);
}

#[tokio::test]
async fn test_listing_follows_cursor_until_exhausted() {
    let endpoint = mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let site = site(dir.path(), &endpoint);
    let client = site.client().unwrap();

    let props = listing::static_props(&client, &site.config, None)
        .await
        .unwrap();
    assert_eq!(props.revalidate, 1800);
    assert_eq!(props.pagination.posts.len(), 1);
    assert_eq!(props.pagination.posts[0].title, "Post one");
    assert!(props.pagination.has_more());

    let controller = ListingController::initialize(client, props.pagination);
    assert_eq!(controller.load_more().await.unwrap(), 1);
    assert_eq!(controller.load_more().await.unwrap(), 1);
    assert!(!controller.can_load_more());

    let uids: Vec<_> = controller
        .posts()
        .into_iter()
        .filter_map(|p| p.uid)
        .collect();
    assert_eq!(uids, UIDS);

    assert!(matches!(
        controller.load_more().await,
        Err(LoadMoreError::Exhausted)
    ));
}

#[tokio::test]
async fn test_article_paths_and_resolution() {
    let endpoint = mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let site = site(dir.path(), &endpoint);
    let client = site.client().unwrap();

    let paths = article::enumerate_paths(&client, &site.config, None)
        .await
        .unwrap();
    assert_eq!(paths, UIDS);

    match article::resolve(&client, &site.config, "two", None)
        .await
        .unwrap()
    {
        ArticleState::Resolved(props) => {
            assert_eq!(props.post.title, "Post two");
            assert_eq!(props.post.author, "Joseph Oliveira");
            assert_eq!(
                props.post.banner_url.as_deref(),
                Some("https://images.test/two.png")
            );
            assert_eq!(props.reading_time, 1);
            assert_eq!(props.revalidate, 1800);
        }
        other => panic!("expected a resolved article, got {:?}", other),
    }

    let missing = article::resolve(&client, &site.config, "missing", None)
        .await
        .unwrap();
    assert!(matches!(missing, ArticleState::NotFound));
    assert_eq!(missing.redirect(), Some("/"));
}

#[tokio::test]
async fn test_unknown_ref_is_an_error() {
    let endpoint = mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let site = site(dir.path(), &endpoint);
    let client = site.client().unwrap();

    let result = listing::static_props(&client, &site.config, Some("stale-ref")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_generate_writes_every_page() {
    let endpoint = mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let site = site(dir.path(), &endpoint);
    let client = site.client().unwrap();

    let summary = generate::run_with_client(&site, client).await.unwrap();
    assert_eq!(summary.articles, 3);
    assert_eq!(summary.failed, 0);

    let index = std::fs::read_to_string(dir.path().join("public/index.html")).unwrap();
    assert!(index.contains("Post one"));
    assert!(!index.contains("Post two"));
    assert!(index.contains("id=\"load-more\""));

    let post = std::fs::read_to_string(dir.path().join("public/post/two/index.html")).unwrap();
    assert!(post.contains("<strong>Nullam</strong> dolor"));
    assert!(post.contains("1 min"));

    assert!(dir.path().join(".spacetraveling/routes.json").exists());
}

/// Start the preview server against the mock API; returns its base URL
async fn preview_server(site: &Site) -> String {
    let generator = Generator::new(site).unwrap();
    let state = Arc::new(ServerState::new(generator, Some(site.client().unwrap()), true));
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_load_more_endpoint() {
    let endpoint = mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let site = site(dir.path(), &endpoint);
    let base = preview_server(&site).await;
    let http = http();

    let props = listing::static_props(&site.client().unwrap(), &site.config, None)
        .await
        .unwrap();
    let cursor = props.pagination.next_page.unwrap();

    let body: Value = http
        .get(format!("{}/api/posts", base))
        .query(&[("cursor", cursor.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["posts"][0]["uid"], "two");
    assert!(body["html"].as_str().unwrap().contains("Post two"));
    assert!(body["next_page"].as_str().is_some());

    let foreign = http
        .get(format!("{}/api/posts", base))
        .query(&[("cursor", "http://evil.test/api/v2/documents/search")])
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status(), reqwest::StatusCode::BAD_REQUEST);

    let missing = http
        .get(format!("{}/api/posts", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_article_fallback() {
    let endpoint = mock_api().await;
    let dir = tempfile::tempdir().unwrap();
    let site = site(dir.path(), &endpoint);
    let base = preview_server(&site).await;
    let http = http();

    let invalid = http
        .get(format!("{}/post/Not%20A%20Slug", base))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(invalid.headers()["location"], "/");

    // First request shows the loading page while the article builds
    let first = http.get(format!("{}/post/three", base)).send().await.unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);
    assert!(first.text().await.unwrap().contains("Carregando..."));

    let output = dir.path().join("public/post/three/index.html");
    for _ in 0..100 {
        if output.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let built = http.get(format!("{}/post/three", base)).send().await.unwrap();
    assert!(built.text().await.unwrap().contains("Post three"));

    // A slug with no document ends up redirecting home
    let mut redirected = false;
    for _ in 0..100 {
        let res = http.get(format!("{}/post/missing", base)).send().await.unwrap();
        if res.status() == reqwest::StatusCode::TEMPORARY_REDIRECT {
            assert_eq!(res.headers()["location"], "/");
            redirected = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(redirected);
}
