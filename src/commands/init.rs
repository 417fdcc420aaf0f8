//! Initialize a new site

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::CONFIG_FILE;

const DEFAULT_CONFIG: &str = r#"# spacetraveling configuration

# Site
title: spacetraveling
description: ''
language: pt_BR
timezone: America/Sao_Paulo
date_format: '%d %b %Y'

# URL
url: http://localhost:4000
root: /

# Directory
source_dir: source
public_dir: public

# Content API
api:
  endpoint: ''
  # Prefer the SPACETRAVELING_ACCESS_TOKEN environment variable
  access_token:
  document_type: posts
  timeout: 30

# Posts per page on the listing
listing:
  page_size: 1

# Articles prebuilt by `generate`
paths:
  page_size: 100

# Seconds before a page is regenerated
revalidate: 1800

generate:
  concurrency: 4

labels:
  load_more: Carregar mais posts
  loading: Carregando...
  minutes: min
"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join(CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!("{:?} already exists", config_path);
    }

    fs::create_dir_all(target_dir.join("source"))?;
    fs::write(&config_path, DEFAULT_CONFIG)?;

    let gitignore = target_dir.join(".gitignore");
    if !gitignore.exists() {
        fs::write(&gitignore, "public/\n.spacetraveling/\n")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    #[test]
    fn test_default_config_parses() {
        let config: SiteConfig = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.revalidate, defaults.revalidate);
        assert_eq!(config.listing.page_size, defaults.listing.page_size);
        assert_eq!(config.date_format, defaults.date_format);
        assert!(config.api.access_token.is_none());
    }

    #[test]
    fn test_init_site() {
        let dir = tempfile::tempdir().unwrap();
        init_site(dir.path()).unwrap();
        assert!(dir.path().join("source").is_dir());
        assert!(dir.path().join(CONFIG_FILE).exists());

        assert!(init_site(dir.path()).is_err());
    }
}
