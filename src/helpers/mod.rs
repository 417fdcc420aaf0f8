//! Helper functions for templates
//!
//! URL generation and date display shared by the generator and the server.

mod date;
mod url;

pub use date::*;
pub use url::*;

use crate::config::SiteConfig;

/// Helpers bound to one site configuration
pub struct Helpers<'a> {
    config: &'a SiteConfig,
    tz: chrono_tz::Tz,
}

impl<'a> Helpers<'a> {
    /// Create a new helpers instance
    pub fn new(config: &'a SiteConfig) -> Self {
        Self {
            config,
            tz: config.tz(),
        }
    }

    /// Get url_for helper
    pub fn url_for(&self, path: &str) -> String {
        url_for(self.config, path)
    }

    /// Get post_path helper
    pub fn post_path(&self, uid: &str) -> String {
        post_path(self.config, uid)
    }

    /// Publication date in the site's format, locale and timezone
    pub fn date(&self, value: Option<&str>) -> Option<String> {
        format_publication_date(
            value,
            &self.config.date_format,
            self.tz,
            &self.config.language,
        )
    }
}
