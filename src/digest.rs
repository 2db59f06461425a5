//! The digest pipeline: collect, summarise, notify.

use crate::config::Config;
use crate::feed::{FeedCollector, FeedItem};
use crate::notifier::Notifier;
use crate::summarizer::Summarizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
}

/// Response for one digest run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestReport {
    pub status: Status,
    pub summary: String,
}

/// One `title (link)` line per item; empty when there are no items
pub fn build_digest(items: &[FeedItem]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs the three steps in order for every request
pub struct DigestService {
    collector: FeedCollector,
    summarizer: Summarizer,
    notifier: Notifier,
}

impl DigestService {
    pub fn new(config: Arc<Config>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            collector: FeedCollector::new(Arc::clone(&config))?,
            summarizer: Summarizer::new(Arc::clone(&config))?,
            notifier: Notifier::new(config),
        })
    }

    /// Produce and mail one digest.
    ///
    /// Always reports `ok`; degraded steps only show up as fallback text and in the logs.
    pub async fn run(&self) -> DigestReport {
        let collection = self.collector.collect().await;
        tracing::info!(
            items = collection.items.len(),
            skipped = collection.skipped.len(),
            aborted = collection.aborted.is_some(),
            "feeds collected"
        );

        let text = build_digest(&collection.items);
        let summary = self.summarizer.summarize_or_fallback(&text).await;
        self.notifier.notify(&summary).await;

        DigestReport {
            status: Status::Ok,
            summary,
        }
    }
}
