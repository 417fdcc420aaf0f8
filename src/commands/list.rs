//! List posts from the content API

use anyhow::Result;

use crate::client::ContentClient;
use crate::listing::{self, ListingController, LoadMoreError};
use crate::Site;

/// Print the listing seed, or every page with `all`
pub async fn run(site: &Site, all: bool) -> Result<()> {
    let client = site.client()?;
    let props = listing::static_props(&client, &site.config, None).await?;
    let controller = ListingController::initialize(client, props.pagination);

    if all {
        drain(&controller).await?;
    }

    let posts = controller.posts();
    println!("Posts ({}):", posts.len());
    for post in posts {
        println!(
            "  {} - {} by {} [{}]",
            post.first_publication_date.as_deref().unwrap_or("unpublished"),
            post.title,
            post.author,
            post.uid.as_deref().unwrap_or("-")
        );
    }
    if let Some(next) = controller.next_page() {
        println!("More posts at: {}", next);
    }

    Ok(())
}

/// Follow the cursor until the listing is exhausted
async fn drain(controller: &ListingController<ContentClient>) -> Result<()> {
    loop {
        match controller.load_more().await {
            Ok(added) => tracing::debug!("Loaded {} more posts", added),
            Err(LoadMoreError::Exhausted) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}
