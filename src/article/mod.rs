//! Article pages: path enumeration and per-slug resolution

use serde::Serialize;

use crate::client::{ClientError, ContentClient, QueryOptions, NEWEST_FIRST};
use crate::config::SiteConfig;
use crate::content::{reading_time, Post, PostFields};

/// Where a missing article sends the reader
pub const NOT_FOUND_REDIRECT: &str = "/";

/// Props of a generated article page
#[derive(Debug, Clone, Serialize)]
pub struct ArticleProps {
    pub post: Post,
    /// Estimated minutes, derived from the content and never stored upstream
    pub reading_time: usize,
    /// Seconds before the page is regenerated
    pub revalidate: u64,
}

impl ArticleProps {
    pub fn new(post: Post, revalidate: u64) -> Self {
        let reading_time = reading_time(&post.content);
        Self {
            post,
            reading_time,
            revalidate,
        }
    }
}

/// Resolution state of one article
#[derive(Debug, Clone)]
pub enum ArticleState {
    /// Being fetched on demand; render the loading page
    Pending,
    Resolved(Box<ArticleProps>),
    /// No document for the slug; redirect to [`NOT_FOUND_REDIRECT`]
    NotFound,
}

impl ArticleState {
    /// Redirect target, if this state renders as a redirect
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::NotFound => Some(NOT_FOUND_REDIRECT),
            _ => None,
        }
    }
}

/// Uids of the articles to prebuild, capped at `paths.page_size`
pub async fn enumerate_paths(
    client: &ContentClient,
    config: &SiteConfig,
    ref_id: Option<&str>,
) -> Result<Vec<String>, ClientError> {
    // `uid` is not a data field, so `data` comes back empty
    let mut options = QueryOptions::default()
        .fetch([format!("{}.uid", config.api.document_type)])
        .page_size(config.paths.page_size)
        .orderings(NEWEST_FIRST);
    if let Some(ref_id) = ref_id {
        options = options.at_ref(ref_id);
    }

    let response = client
        .query_by_type::<serde_json::Value>(&config.api.document_type, &[], &options)
        .await?;

    let uids: Vec<String> = response
        .results
        .into_iter()
        .filter_map(|doc| doc.uid)
        .collect();
    tracing::debug!("Enumerated {} article paths", uids.len());
    Ok(uids)
}

/// Fetch one article by slug
pub async fn resolve(
    client: &ContentClient,
    config: &SiteConfig,
    slug: &str,
    ref_id: Option<&str>,
) -> Result<ArticleState, ClientError> {
    if !is_valid_slug(slug) {
        tracing::debug!("Rejecting malformed slug {:?}", slug);
        return Ok(ArticleState::NotFound);
    }

    let mut options = QueryOptions::default();
    if let Some(ref_id) = ref_id {
        options = options.at_ref(ref_id);
    }

    let document = client
        .get_by_uid::<PostFields>(&config.api.document_type, slug, &options)
        .await?;

    Ok(match document {
        Some(doc) => {
            let post = Post::from(&doc);
            ArticleState::Resolved(Box::new(ArticleProps::new(post, config.revalidate)))
        }
        None => {
            tracing::info!("No article for slug {:?}, redirecting", slug);
            ArticleState::NotFound
        }
    })
}

/// Uids are used as directory names; only allow slug characters
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 200
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}
