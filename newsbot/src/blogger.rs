use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::auth::CredentialManager;
use crate::error::{BotError, Result};

/// Input of one publish call.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub labels: Vec<String>,
    pub image_url: Option<String>,
}

/// The parts of Blogger's post resource the bot cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
}

#[derive(Debug, Serialize)]
struct PostImage<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct InsertPostBody<'a> {
    title: &'a str,
    content: &'a str,
    labels: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<PostImage<'a>>>,
}

impl<'a> From<&'a PostDraft> for InsertPostBody<'a> {
    fn from(draft: &'a PostDraft) -> Self {
        Self {
            title: &draft.title,
            content: &draft.content,
            labels: &draft.labels,
            images: draft
                .image_url
                .as_deref()
                .map(|url| vec![PostImage { url }]),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BlogResource {
    id: String,
}

/// Thin client over the Blogger v3 REST API.
pub struct BloggerClient {
    base_url: String,
    client: Client,
}

impl BloggerClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("newsbot/0.1.0")
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// `blogs.getByUrl`
    pub async fn get_blog_id(&self, access_token: &str, blog_url: &str) -> Result<String> {
        info!(blog_url, "Getting blog ID");
        let response = self
            .client
            .get(format!("{}/blogs/byurl", self.base_url))
            .bearer_auth(access_token)
            .query(&[("url", blog_url)])
            .send()
            .await?;

        let blog: BlogResource = check_status(response, "blogs.getByUrl").await?.json().await?;
        info!(blog_id = %blog.id, "Blog ID resolved");
        Ok(blog.id)
    }

    /// `posts.insert`
    pub async fn insert_post(&self, access_token: &str, blog_id: &str, draft: &PostDraft) -> Result<PublishedPost> {
        let body = InsertPostBody::from(draft);
        let response = self
            .client
            .post(format!("{}/blogs/{}/posts/", self.base_url, blog_id))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;

        let post: PublishedPost = check_status(response, "posts.insert").await?.json().await?;
        Ok(post)
    }
}

async fn check_status(response: Response, operation: &'static str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BotError::Blogger {
        operation,
        message: format!("{}: {}", status, body),
    })
}

/// Destination of a generated post.
#[async_trait::async_trait]
pub trait BlogPublisher: Send + Sync {
    async fn publish(&self, draft: PostDraft) -> Result<PublishedPost>;
}

/// Publishes to the configured Blogger blog, authorizing on every call.
pub struct BloggerPublisher {
    credentials: Arc<CredentialManager>,
    client: BloggerClient,
    blog_url: String,
}

impl BloggerPublisher {
    pub fn new(credentials: Arc<CredentialManager>, client: BloggerClient, blog_url: impl Into<String>) -> Self {
        Self {
            credentials,
            client,
            blog_url: blog_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl BlogPublisher for BloggerPublisher {
    async fn publish(&self, draft: PostDraft) -> Result<PublishedPost> {
        let credential = self.credentials.obtain_credential().await?;
        let blog_id = self
            .client
            .get_blog_id(&credential.access_token, &self.blog_url)
            .await?;

        info!(
            title = %draft.title,
            labels = draft.labels.len(),
            with_image = draft.image_url.is_some(),
            "Posting to Blogger"
        );
        let post = self
            .client
            .insert_post(&credential.access_token, &blog_id, &draft)
            .await?;
        info!(url = %post.url, "Post published");
        Ok(post)
    }
}
