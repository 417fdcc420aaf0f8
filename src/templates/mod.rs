//! Built-in theme templates using the Tera template engine
//!
//! Templates are embedded in the binary. Autoescaping stays on for every
//! template; only pre-rendered rich text is marked `safe`.

use anyhow::Result;
use serde::Serialize;
use tera::{Context, Tera};

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all theme templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("theme/layout.html")),
            ("index.html", include_str!("theme/index.html")),
            ("post.html", include_str!("theme/post.html")),
            ("loading.html", include_str!("theme/loading.html")),
            ("summaries.html", include_str!("theme/summaries.html")),
            (
                "partials/header.html",
                include_str!("theme/partials/header.html"),
            ),
        ])?;

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub description: String,
    /// `lang` attribute, e.g. `pt-BR`
    pub lang: String,
    pub root: String,
    pub url: String,
    pub load_more_label: String,
    pub loading_label: String,
    pub minutes_label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryData {
    pub path: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: Option<String>,
    pub datetime: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleData {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: Option<String>,
    pub datetime: Option<String>,
    pub banner_url: Option<String>,
    pub reading_time: usize,
    pub blocks: Vec<BlockData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockData {
    pub heading: String,
    /// Rendered rich text
    pub html: String,
}
