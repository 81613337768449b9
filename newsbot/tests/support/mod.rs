#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result as AnyResult;
use newsbot::blogger::{BlogPublisher, PostDraft, PublishedPost};
use newsbot::error::{BotError, Result};
use newsbot::llm::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};
use newsbot::news::{Article, NewsQuery, NewsSource};
use newsbot::pipeline::{NewsBot, RunSettings};
use tokio::sync::Notify;

pub fn article(id: i64, image: Option<&str>) -> Article {
    Article {
        id,
        title: Some(format!("Story {}", id)),
        text: Some(format!("Full text of story {}.", id)),
        summary: Some(format!("Summary {}", id)),
        url: Some(format!("https://news.example/{}", id)),
        image: image.map(str::to_string),
        video: None,
        publish_date: Some("2025-06-01 08:30:00".to_string()),
        authors: vec!["Staff".to_string()],
        language: Some("en".to_string()),
        source_country: Some("in".to_string()),
        sentiment: Some(0.0),
    }
}

/// News source returning a fixed list, or failing.
pub struct StubNews {
    pub articles: Option<Vec<Article>>,
    pub queries: Mutex<Vec<NewsQuery>>,
}

impl StubNews {
    pub fn ok(articles: Vec<Article>) -> Self {
        Self {
            articles: Some(articles),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            articles: None,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl NewsSource for StubNews {
    async fn search(&self, query: &NewsQuery) -> Result<Vec<Article>> {
        self.queries.lock().unwrap().push(query.clone());
        self.articles
            .clone()
            .ok_or_else(|| BotError::News("503 Service Unavailable".to_string()))
    }
}

/// Model returning a fixed answer and recording prompts. With `gate` set, the call
/// signals `entered` and waits for `release` before answering.
pub struct StubLlm {
    pub answer: String,
    pub prompts: Mutex<Vec<String>>,
    pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl StubLlm {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(answer: &str, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            gate: Some((entered, release)),
            ..Self::answering(answer)
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for StubLlm {
    async fn generate(&self, request: LlmRequest) -> AnyResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt);
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        Ok(LlmResponse {
            content: self.answer.clone(),
            usage: UsageMetadata::default(),
            model: "stub".to_string(),
        })
    }
}

/// Publisher recording drafts; fails when `fail` is set.
#[derive(Default)]
pub struct RecordingPublisher {
    pub drafts: Mutex<Vec<PostDraft>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl BlogPublisher for RecordingPublisher {
    async fn publish(&self, draft: PostDraft) -> Result<PublishedPost> {
        self.drafts.lock().unwrap().push(draft);
        if self.fail {
            return Err(BotError::Blogger {
                operation: "posts.insert",
                message: "500 Internal Server Error: backend error".to_string(),
            });
        }
        Ok(PublishedPost {
            id: "1".to_string(),
            url: "https://chaibuzz.blogspot.com/2025/06/post.html".to_string(),
            title: None,
            published: None,
        })
    }
}

pub fn bot(news: Arc<StubNews>, llm: Arc<StubLlm>, publisher: Arc<RecordingPublisher>) -> NewsBot {
    NewsBot::new(
        news,
        llm,
        publisher,
        RunSettings {
            count: 30,
            country: "in".to_string(),
        },
    )
}
