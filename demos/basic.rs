use std::time::Duration;

use content_api_client::{ApiClient, RequestOptions};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Article {
    slug: String,
    title: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api = ApiClient::from_env().map_err(anyhow::Error::msg)?;

    let page = api
        .get::<Vec<Article>>(
            "articles",
            RequestOptions::new()
                .param("page", 1)
                .cache(Duration::from_secs(30)),
        )
        .await?;
    println!(
        "{} articles (total {:?}, cached: {})",
        page.data.len(),
        page.meta.total,
        page.meta.cached
    );
    for article in &page.data {
        println!("{}: {}", article.slug, article.title);
    }

    let again = api
        .get::<Vec<Article>>("articles", RequestOptions::new().param("page", 1))
        .await?;
    println!("second fetch cached: {}", again.meta.cached);

    Ok(())
}
