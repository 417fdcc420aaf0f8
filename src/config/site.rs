//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable that overrides `api.access_token`
pub const ACCESS_TOKEN_ENV: &str = "SPACETRAVELING_ACCESS_TOKEN";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub language: String,
    pub timezone: String,
    pub date_format: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub source_dir: String,
    pub public_dir: String,

    // Content API
    #[serde(default)]
    pub api: ApiConfig,

    // Pages
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub paths: PathsConfig,

    /// Seconds after which a generated page is regenerated in the background
    pub revalidate: u64,

    #[serde(default)]
    pub generate: GenerateConfig,

    #[serde(default)]
    pub labels: LabelsConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            description: String::new(),
            language: "pt_BR".to_string(),
            timezone: "America/Sao_Paulo".to_string(),
            date_format: "%d %b %Y".to_string(),

            url: "http://localhost:4000".to_string(),
            root: "/".to_string(),

            source_dir: "source".to_string(),
            public_dir: "public".to_string(),

            api: ApiConfig::default(),

            listing: ListingConfig::default(),
            paths: PathsConfig::default(),

            revalidate: 60 * 30,

            generate: GenerateConfig::default(),
            labels: LabelsConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {:?}", path.as_ref()))?;
        let mut config: SiteConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path.as_ref()))?;
        config.apply_env();
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                tracing::debug!("Using access token from {}", ACCESS_TOKEN_ENV);
                self.api.access_token = Some(token);
            }
        }
    }

    /// Parse the configured timezone, falling back to UTC
    pub fn tz(&self) -> chrono_tz::Tz {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                if !self.timezone.is_empty() {
                    tracing::warn!("Unknown timezone {:?}, using UTC", self.timezone);
                }
                chrono_tz::UTC
            }
        }
    }
}

/// Headless content API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API entry point, e.g. `https://my-repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: Option<String>,
    /// Custom type holding blog posts
    pub document_type: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "posts".to_string(),
            timeout: 30,
        }
    }
}

/// Listing page configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Posts per API page, both for the generated seed and for "load more"
    pub page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self { page_size: 1 }
    }
}

/// Article path enumeration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Maximum number of article paths prebuilt by `generate`
    pub page_size: u32,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

/// Generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Article pages fetched and rendered in parallel
    pub concurrency: usize,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// User facing strings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub load_more: String,
    pub loading: String,
    pub minutes: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            load_more: "Carregar mais posts".to_string(),
            loading: "Carregando...".to_string(),
            minutes: "min".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.api.document_type, "posts");
        assert_eq!(config.listing.page_size, 1);
        assert_eq!(config.paths.page_size, 100);
        assert_eq!(config.revalidate, 1800);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: My Blog
api:
  endpoint: https://blog.cdn.prismic.io/api/v2
listing:
  page_size: 5
revalidate: 60
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "My Blog");
        assert_eq!(config.api.endpoint, "https://blog.cdn.prismic.io/api/v2");
        assert_eq!(config.api.document_type, "posts");
        assert_eq!(config.listing.page_size, 5);
        assert_eq!(config.paths.page_size, 100);
        assert_eq!(config.revalidate, 60);
    }

    #[test]
    fn test_timezone_fallback() {
        let mut config = SiteConfig::default();
        assert_eq!(config.tz(), chrono_tz::America::Sao_Paulo);
        config.timezone = "Not/AZone".to_string();
        assert_eq!(config.tz(), chrono_tz::UTC);
    }
}
