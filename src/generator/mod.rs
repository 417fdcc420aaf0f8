//! Generator module - renders page props to static HTML using built-in Tera templates

use anyhow::{Context as _, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tera::Context;
use walkdir::WalkDir;

use crate::article::{self, ArticleProps, ArticleState};
use crate::cache::RouteCache;
use crate::client::ContentClient;
use crate::content::{richtext, Post, PostSummary};
use crate::helpers::{self, Helpers};
use crate::listing::{self, ListingProps};
use crate::templates::{ArticleData, BlockData, ConfigData, SummaryData, TemplateRenderer};
use crate::Site;

/// Route of the listing page
pub const LISTING_ROUTE: &str = "/";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Static page generator
pub struct Generator {
    site: Site,
    renderer: TemplateRenderer,
    routes: Mutex<RouteCache>,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &Site) -> Result<Self> {
        let renderer = TemplateRenderer::new()?;
        let routes = RouteCache::load(&site.base_dir);

        Ok(Self {
            site: site.clone(),
            renderer,
            routes: Mutex::new(routes),
        })
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    /// Fetch the listing seed and write `index.html`
    pub async fn build_listing(
        &self,
        client: &ContentClient,
        ref_id: Option<&str>,
    ) -> Result<PathBuf> {
        let props = listing::static_props(client, &self.site.config, ref_id)
            .await
            .context("Failed to query listing posts")?;
        let html = self.render_listing(&props)?;
        let output = self.write_route(LISTING_ROUTE, &html)?;
        tracing::info!(
            "Generated listing with {} posts",
            props.pagination.posts.len()
        );
        Ok(output)
    }

    /// Resolve one article and write its page
    ///
    /// A slug without a document has its stale page (if any) removed so the
    /// server falls back to a redirect.
    pub async fn build_article(
        &self,
        client: &ContentClient,
        slug: &str,
        ref_id: Option<&str>,
    ) -> Result<ArticleState> {
        let state = article::resolve(client, &self.site.config, slug, ref_id)
            .await
            .with_context(|| format!("Failed to resolve article {:?}", slug))?;

        match &state {
            ArticleState::Resolved(props) => {
                let html = self.render_article(props)?;
                let output = self.write_route(&self.article_route(slug), &html)?;
                tracing::debug!("Generated post: {:?}", output);
            }
            ArticleState::NotFound => self.remove_article(slug)?,
            ArticleState::Pending => {}
        }

        Ok(state)
    }

    /// Render the listing page
    pub fn render_listing(&self, props: &ListingProps) -> Result<String> {
        let mut context = self.create_base_context();
        context.insert("posts", &self.summaries(&props.pagination.posts));
        context.insert("next_page", &props.pagination.next_page);
        context.insert(
            "load_more_url",
            &helpers::load_more_path(&self.site.config),
        );
        self.renderer.render("index.html", &context)
    }

    /// Render an article page
    pub fn render_article(&self, props: &ArticleProps) -> Result<String> {
        let mut context = self.create_base_context();
        context.insert("article", &self.article_data(&props.post, props.reading_time));
        self.renderer.render("post.html", &context)
    }

    /// Render the placeholder shown while an article resolves
    pub fn render_loading(&self) -> Result<String> {
        let context = self.create_base_context();
        self.renderer.render("loading.html", &context)
    }

    /// Render summaries as an HTML fragment for "load more"
    pub fn render_summaries(&self, posts: &[PostSummary]) -> Result<String> {
        let mut context = Context::new();
        context.insert("posts", &self.summaries(posts));
        self.renderer.render("summaries.html", &context)
    }

    /// URL path of an article
    pub fn article_route(&self, slug: &str) -> String {
        format!("/post/{}", slug)
    }

    /// Output file of a route, inside the public directory
    pub fn output_path(&self, route: &str) -> PathBuf {
        let clean = route.trim_matches('/');
        if clean.is_empty() {
            self.site.public_dir.join("index.html")
        } else {
            self.site.public_dir.join(clean).join("index.html")
        }
    }

    /// Whether a route was generated longer than `revalidate` seconds ago
    pub fn is_stale(&self, route: &str) -> bool {
        self.lock_routes()
            .is_stale(route, self.site.config.revalidate)
    }

    /// Persist the route manifest
    pub fn save_routes(&self) -> Result<()> {
        self.lock_routes().save(&self.site.base_dir)
    }

    /// Copy static assets from the source directory to the public directory
    pub fn copy_source_assets(&self) -> Result<()> {
        let source_dir = &self.site.source_dir;
        if !source_dir.exists() {
            return Ok(());
        }

        let mut copied = 0;
        for entry in WalkDir::new(source_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            // Skip hidden files
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
            {
                continue;
            }

            let relative = path.strip_prefix(source_dir)?;
            let dest = self.site.public_dir.join(relative);

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::copy(path, &dest)?;
            copied += 1;
        }

        tracing::debug!("Copied {} source assets", copied);
        Ok(())
    }

    fn remove_article(&self, slug: &str) -> Result<()> {
        let route = self.article_route(slug);
        let output = self.output_path(&route);
        if output.exists() {
            fs::remove_file(&output)
                .with_context(|| format!("Failed to remove {:?}", output))?;
            tracing::info!("Removed unpublished post: {:?}", output);
        }
        self.lock_routes().remove(&route);
        Ok(())
    }

    fn write_route(&self, route: &str, html: &str) -> Result<PathBuf> {
        let output_path = self.output_path(route);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {:?}", parent))?;
        }

        // Write then rename so readers never see a half-written page; the
        // temp name is unique so overlapping builds of one route don't collide
        let tmp = output_path.with_extension(format!(
            "html.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, html).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &output_path)
            .with_context(|| format!("Failed to write {:?}", output_path))?;

        let relative = output_path
            .strip_prefix(&self.site.public_dir)
            .unwrap_or(&output_path)
            .to_string_lossy()
            .to_string();
        self.lock_routes().record(route, &relative);

        Ok(output_path)
    }

    /// Create a base context with common variables
    fn create_base_context(&self) -> Context {
        let config = &self.site.config;
        let mut context = Context::new();
        context.insert(
            "config",
            &ConfigData {
                title: config.title.clone(),
                description: config.description.clone(),
                lang: config.language.replace('_', "-"),
                root: helpers::url_for(config, ""),
                url: config.url.clone(),
                load_more_label: config.labels.load_more.clone(),
                loading_label: config.labels.loading.clone(),
                minutes_label: config.labels.minutes.clone(),
            },
        );
        context
    }

    fn summaries(&self, posts: &[PostSummary]) -> Vec<SummaryData> {
        let helper = Helpers::new(&self.site.config);
        posts
            .iter()
            .map(|p| SummaryData {
                path: match &p.uid {
                    Some(uid) => helper.post_path(uid),
                    None => helper.url_for(""),
                },
                title: p.title.clone(),
                subtitle: p.subtitle.clone(),
                author: p.author.clone(),
                date: helper.date(p.first_publication_date.as_deref()),
                datetime: helpers::date_xml(p.first_publication_date.as_deref()),
            })
            .collect()
    }

    fn article_data(&self, post: &Post, reading_time: usize) -> ArticleData {
        let helper = Helpers::new(&self.site.config);
        ArticleData {
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date: helper.date(post.first_publication_date.as_deref()),
            datetime: helpers::date_xml(post.first_publication_date.as_deref()),
            banner_url: post.banner_url.clone(),
            reading_time,
            blocks: post
                .content
                .iter()
                .map(|block| BlockData {
                    heading: block.heading.clone(),
                    html: richtext::as_html(&block.body),
                })
                .collect(),
        }
    }

    fn lock_routes(&self) -> MutexGuard<'_, RouteCache> {
        self.routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
