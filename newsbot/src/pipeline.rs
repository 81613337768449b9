use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::blogger::{BlogPublisher, PostDraft, PublishedPost};
use crate::error::{BotError, Result};
use crate::llm::LlmProvider;
use crate::news::{fetch_random_news, NewsSource};
use crate::synthesizer::{select_image_url, synthesize};

/// Per-run news selection.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub count: u32,
    pub country: String,
}

/// Outcome of one successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub articles_fetched: usize,
    pub image_url: Option<String>,
    pub post: PublishedPost,
}

/// fetch -> synthesize -> publish, one run at a time.
///
/// Clients are built once at startup and shared; a trigger that arrives while a run is
/// in flight is rejected with [`BotError::AlreadyRunning`] instead of posting twice.
pub struct NewsBot {
    news: Arc<dyn NewsSource>,
    llm: Arc<dyn LlmProvider>,
    publisher: Arc<dyn BlogPublisher>,
    settings: RunSettings,
    running: Mutex<()>,
}

impl NewsBot {
    pub fn new(
        news: Arc<dyn NewsSource>,
        llm: Arc<dyn LlmProvider>,
        publisher: Arc<dyn BlogPublisher>,
        settings: RunSettings,
    ) -> Self {
        Self {
            news,
            llm,
            publisher,
            settings,
            running: Mutex::new(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    pub async fn run(&self) -> Result<RunReport> {
        let _guard = self.running.try_lock().map_err(|_| BotError::AlreadyRunning)?;
        info!("=== Starting news bot run ===");

        let articles = fetch_random_news(self.news.as_ref(), self.settings.count, &self.settings.country).await;
        let generated = synthesize(self.llm.as_ref(), &articles).await?;

        let image_url = select_image_url(&generated, &articles);
        if let Some(url) = &image_url {
            info!(image_url = %url, "Attaching source image");
        }

        let draft = PostDraft {
            title: generated.title,
            content: generated.content,
            labels: generated.labels,
            image_url: image_url.clone(),
        };
        let post = self.publisher.publish(draft).await?;

        info!(url = %post.url, "=== News bot run finished ===");
        Ok(RunReport {
            articles_fetched: articles.len(),
            image_url,
            post,
        })
    }
}
