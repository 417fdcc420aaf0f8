//! Generate static files

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::article::{self, ArticleState};
use crate::client::ContentClient;
use crate::generator::Generator;
use crate::Site;

/// Counts from one generation pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenerateSummary {
    pub articles: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// Generate the listing and every enumerated article
pub async fn run(site: &Site) -> Result<GenerateSummary> {
    let client = site.client()?;
    run_with_client(site, client).await
}

/// Generate against an explicit client
pub async fn run_with_client(site: &Site, client: ContentClient) -> Result<GenerateSummary> {
    let start = std::time::Instant::now();
    let generator = Arc::new(Generator::new(site)?);
    let client = Arc::new(client);

    // Pin one ref so every page sees the same content
    let ref_id = client
        .master_ref()
        .await
        .context("Failed to fetch the master ref")?;
    tracing::debug!("Using content ref {}", ref_id);

    generator.copy_source_assets()?;
    generator.build_listing(&client, Some(&ref_id)).await?;

    let slugs = article::enumerate_paths(&client, &site.config, Some(&ref_id))
        .await
        .context("Failed to enumerate article paths")?;
    tracing::info!("Generating {} articles", slugs.len());

    let semaphore = Arc::new(Semaphore::new(site.config.generate.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for slug in slugs {
        let generator = Arc::clone(&generator);
        let client = Arc::clone(&client);
        let semaphore = Arc::clone(&semaphore);
        let ref_id = ref_id.clone();

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let state = generator.build_article(&client, &slug, Some(&ref_id)).await;
            Ok::<_, anyhow::Error>((slug, state))
        });
    }

    let mut summary = GenerateSummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok((_, Ok(ArticleState::Resolved(_)))) => summary.articles += 1,
            Ok((slug, Ok(_))) => {
                tracing::warn!("Article {:?} disappeared while generating", slug);
                summary.not_found += 1;
            }
            Ok((slug, Err(e))) => {
                tracing::error!("Failed to generate {:?}: {:#}", slug, e);
                summary.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    generator.save_routes()?;

    let duration = start.elapsed();
    tracing::info!(
        "Generated {} articles in {:.2}s",
        summary.articles,
        duration.as_secs_f64()
    );

    if summary.failed > 0 {
        anyhow::bail!("{} articles failed to generate", summary.failed);
    }
    Ok(summary)
}
