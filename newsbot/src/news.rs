use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{BotError, Result};

/// A news article as returned by the World News API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub authors: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub source_country: Option<String>,
    #[serde(default)]
    pub sentiment: Option<f64>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Politics,
    Sports,
    Business,
    Technology,
    Entertainment,
    Health,
    Science,
    Lifestyle,
    Travel,
    Culture,
    Education,
    Environment,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Politics,
        Category::Sports,
        Category::Business,
        Category::Technology,
        Category::Entertainment,
        Category::Health,
        Category::Science,
        Category::Lifestyle,
        Category::Travel,
        Category::Culture,
        Category::Education,
        Category::Environment,
    ];

    /// Uniformly random category.
    pub fn random() -> Self {
        *Self::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&Category::Politics)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Sports => "sports",
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Entertainment => "entertainment",
            Category::Health => "health",
            Category::Science => "science",
            Category::Lifestyle => "lifestyle",
            Category::Travel => "travel",
            Category::Culture => "culture",
            Category::Education => "education",
            Category::Environment => "environment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one news search.
#[derive(Debug, Clone)]
pub struct NewsQuery {
    pub category: Category,
    pub country: String,
    pub count: u32,
}

/// Anything that can answer a news search.
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn search(&self, query: &NewsQuery) -> Result<Vec<Article>>;
}

/// Client for `GET /search-news` of the World News API.
pub struct WorldNewsClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl WorldNewsClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("newsbot/0.1.0")
            .build()?;

        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchNewsResponse {
    #[serde(default)]
    news: Vec<Article>,
}

#[async_trait::async_trait]
impl NewsSource for WorldNewsClient {
    async fn search(&self, query: &NewsQuery) -> Result<Vec<Article>> {
        let url = format!("{}/search-news", self.base_url.trim_end_matches('/'));
        let number = query.count.to_string();

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&[
                ("source-country", query.country.as_str()),
                ("language", "en"),
                ("categories", query.category.as_str()),
                ("sort", "publish-time"),
                ("sort-direction", "desc"),
                ("number", number.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::News(format!("{}: {}", status, body)));
        }

        let body: SearchNewsResponse = response.json().await?;
        Ok(body.news)
    }
}

/// Fetch `count` recent English articles from `country` in a random category.
///
/// Fails soft: any error is logged and an empty list is returned, so callers must
/// handle zero articles.
pub async fn fetch_random_news(source: &dyn NewsSource, count: u32, country: &str) -> Vec<Article> {
    let query = NewsQuery {
        category: Category::random(),
        country: country.to_string(),
        count,
    };
    info!(count, country, category = %query.category, "Fetching news articles");

    match source.search(&query).await {
        Ok(articles) => {
            info!("Retrieved {} articles", articles.len());
            articles
        }
        Err(e) => {
            warn!(error = %e, "Error fetching news, continuing with no articles");
            Vec::new()
        }
    }
}
