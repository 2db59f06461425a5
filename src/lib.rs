//! # news-digest
//!
//! A small service that turns the day's IT headlines into an emailed summary.
//!
//! ## Pipeline
//!
//! - **Collect**: the first few entries of each configured RSS/Atom feed
//! - **Summarise**: one chat-completion call over the joined headlines, with fixed fallback texts
//! - **Notify**: the summary is mailed as HTML through a STARTTLS relay, best effort
//!
//! A `GET /` request runs the pipeline and answers `{"status": "ok", "summary": ...}`.

pub mod config;
pub mod digest;
pub mod feed;
pub mod notifier;
pub mod server;
pub mod summarizer;

pub use config::Config;
pub use digest::{DigestReport, DigestService};
pub use feed::FeedItem;
