// Post synthesizer: articles -> prompt -> model -> GeneratedPost
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{BotError, Result};
use crate::llm::{extract_json_from_text, LlmProvider, LlmRequest};
use crate::news::Article;

/// Blog post written by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPost {
    pub title: String,
    /// HTML body
    pub content: String,
    #[serde(default, deserialize_with = "lenient_labels")]
    pub labels: Vec<String>,
    /// Id of the source article whose image should illustrate the post (string or number)
    #[serde(default)]
    pub image_source_id: Option<Value>,
}

impl GeneratedPost {
    /// `image_source_id` normalised to the textual form of an article id.
    pub fn image_source_key(&self) -> Option<String> {
        match self.image_source_id.as_ref()? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Strings are trimmed and blank ones dropped; numbers and booleans are stringified;
/// anything else is skipped.
fn lenient_labels<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .filter(|label| !label.is_empty())
        .collect())
}

/// Which path produced the parsed JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePath {
    Direct,
    Extracted,
}

/// Prompt asking the model for a JSON post built from `articles`.
pub fn build_prompt(articles: &[Article]) -> Result<String> {
    let articles_json = serde_json::to_string_pretty(articles)?;
    Ok(format!(
        r#"You are a news editor. Using the following {count} articles:

{articles_json}

Write a NEW detailed news post, with in-depth content and a catchy, click-worthy title.
If one of the articles has an image that suits the post, set "image_source_id" to that
article's "id"; otherwise set it to null.

STRICTLY return valid JSON in this format:

{{
  "title": "Catchy blog title",
  "content": "<p>Full HTML formatted blog content...</p>",
  "labels": ["tag1", "tag2", "tag3"],
  "image_source_id": null
}}
"#,
        count = articles.len(),
        articles_json = articles_json,
    ))
}

/// Parse model output as JSON, falling back to the first `{...}` span only when the
/// whole text is not valid JSON. Without such a span the original parse error is returned.
pub fn parse_json_output(text: &str) -> Result<(Value, ParsePath)> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok((value, ParsePath::Direct)),
        Err(direct_err) => match extract_json_from_text(text) {
            Some(span) => {
                let value = serde_json::from_str::<Value>(span)?;
                Ok((value, ParsePath::Extracted))
            }
            None => Err(direct_err.into()),
        },
    }
}

/// Parse and validate a post: `title` and `content` must be non-empty strings.
pub fn parse_generated_post(text: &str) -> Result<GeneratedPost> {
    let (value, path) = parse_json_output(text)?;
    match path {
        ParsePath::Direct => info!("Model JSON parsed directly"),
        ParsePath::Extracted => warn!("Extracted JSON object from surrounding model output"),
    }

    if !value.is_object() {
        return Err(BotError::MalformedPost("expected a JSON object".to_string()));
    }

    let post: GeneratedPost = serde_json::from_value(value).map_err(|e| BotError::MalformedPost(e.to_string()))?;

    if post.title.trim().is_empty() {
        return Err(BotError::MalformedPost("empty title".to_string()));
    }
    if post.content.trim().is_empty() {
        return Err(BotError::MalformedPost("empty content".to_string()));
    }
    Ok(post)
}

/// Ask the model for a new post about `articles`. An empty list still produces a prompt.
pub async fn synthesize<P: LlmProvider + ?Sized>(provider: &P, articles: &[Article]) -> Result<GeneratedPost> {
    info!("Generating post from {} articles", articles.len());
    let prompt = build_prompt(articles)?;

    let response = provider
        .generate(LlmRequest::new(prompt))
        .await
        .map_err(BotError::Generation)?;
    info!(
        model = %response.model,
        total_tokens = response.usage.total_tokens,
        "Model response received"
    );

    parse_generated_post(&response.content)
}

/// Image of the article named by `image_source_id`. The first article whose id matches
/// decides; no match, or a match without an image, yields `None`.
pub fn select_image_url(post: &GeneratedPost, articles: &[Article]) -> Option<String> {
    let wanted = post.image_source_key()?;
    articles
        .iter()
        .find(|a| a.id.to_string() == wanted)
        .and_then(|a| a.image.clone())
        .filter(|url| !url.trim().is_empty())
}
