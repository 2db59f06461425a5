//! Feed collection module.
//!
//! Uses reqwest for fetching and quick-xml for parsing RSS 2.0, RSS 1.0 (RDF) and Atom documents.
//! Text is decoded with the charset declared in the XML prolog (UTF-8 when absent).

use crate::config::Config;
use quick_xml::encoding::Decoder;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// User-Agent string identifying this collector
const USER_AGENT: &str = concat!("news-digest/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("failed to fetch feed: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("feed returned HTTP {0}")]
    Status(StatusCode),
    #[error("XML parse error: {0}")]
    XmlError(#[from] quick_xml::Error),
    #[error("not a syndication feed: {0}")]
    Structure(String),
    #[error("feed entry has no {0}")]
    MissingField(&'static str),
}

/// A single headline taken from a feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
}

impl fmt::Display for FeedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.link)
    }
}

/// An entry as it appears in the document, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
}

impl TryFrom<FeedEntry> for FeedItem {
    type Error = FeedError;

    /// An absent element is an error; a present but empty one is kept as `""`.
    fn try_from(entry: FeedEntry) -> Result<Self, Self::Error> {
        let title = entry.title.ok_or(FeedError::MissingField("title"))?;
        let link = entry.link.ok_or(FeedError::MissingField("link"))?;
        Ok(FeedItem {
            title: title.trim().to_string(),
            link: link.trim().to_string(),
        })
    }
}

/// Outcome of one pass over the configured feeds
#[derive(Debug, Default)]
pub struct Collection {
    /// Items in feed order, then entry order
    pub items: Vec<FeedItem>,
    /// Feeds that were skipped, with the reason
    pub skipped: Vec<(String, FeedError)>,
    /// The fault that stopped collection early, if any
    pub aborted: Option<FeedError>,
}

/// Fetches the configured feeds one after another
pub struct FeedCollector {
    client: Client,
    config: Arc<Config>,
}

impl FeedCollector {
    pub fn new(config: Arc<Config>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.feeds.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch a single feed and return its entries in document order
    pub async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>, FeedError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }

        let bytes = response.bytes().await?;
        parse_feed(&bytes)
    }

    /// Collect up to `per_feed_limit` items from every feed.
    ///
    /// A feed that cannot be fetched or parsed is skipped. An entry without a
    /// title or link stops the collection, keeping what was gathered so far.
    pub async fn collect(&self) -> Collection {
        let mut collection = Collection::default();
        let limit = self.config.feeds.per_feed_limit;

        for url in &self.config.feeds.urls {
            let entries = match self.fetch_entries(url).await {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(feed = %url, error = %err, "skipping feed with unusable structure");
                    collection.skipped.push((url.clone(), err));
                    continue;
                }
            };

            let before = collection.items.len();
            for entry in entries.into_iter().take(limit) {
                match FeedItem::try_from(entry) {
                    Ok(item) => collection.items.push(item),
                    Err(err) => {
                        tracing::error!(
                            feed = %url,
                            error = %err,
                            collected = collection.items.len(),
                            "feed collection aborted"
                        );
                        collection.aborted = Some(err);
                        return collection;
                    }
                }
            }
            tracing::debug!(feed = %url, items = collection.items.len() - before, "collected feed");
        }

        collection
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Rss,
    Atom,
}

impl Format {
    fn from_root(name: &[u8]) -> Option<Self> {
        match name {
            b"rss" | b"RDF" => Some(Format::Rss),
            b"feed" => Some(Format::Atom),
            _ => None,
        }
    }

    fn entry_tag(self) -> &'static [u8] {
        match self {
            Format::Rss => b"item",
            Format::Atom => b"entry",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
}

impl FeedEntry {
    fn push_text(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    /// Handle a direct child element of the entry, returning the field whose text follows.
    ///
    /// Only unprefixed `title`/`link` count, and only their first occurrence.
    fn start_child(&mut self, format: Format, element: &BytesStart, decoder: Decoder) -> Option<Field> {
        // itunes:title, dc:title, atom:link and friends are matched by their full name and skipped
        match (format, element.name().as_ref()) {
            (_, b"title") if self.title.is_none() => {
                self.title = Some(String::new());
                Some(Field::Title)
            }
            (Format::Rss, b"link") if self.link.is_none() => {
                self.link = Some(String::new());
                Some(Field::Link)
            }
            (Format::Atom, b"link") => {
                if self.link.is_none() {
                    self.link = atom_link(element, decoder);
                }
                None
            }
            _ => None,
        }
    }
}

/// `href` of an Atom `<link>` pointing at the article itself
fn atom_link(element: &BytesStart, decoder: Decoder) -> Option<String> {
    if let Ok(Some(rel)) = element.try_get_attribute("rel") {
        if rel.value.as_ref() != b"alternate" {
            return None;
        }
    }
    let href = element.try_get_attribute("href").ok().flatten()?;
    Some(decode_text(decoder, &href.value))
}

/// Decode raw bytes in the document's charset
fn decode(decoder: Decoder, bytes: &[u8]) -> String {
    match decoder.decode(bytes) {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Decode raw bytes and resolve any escapes left in them
fn decode_text(decoder: Decoder, bytes: &[u8]) -> String {
    let raw = decode(decoder, bytes);
    match unescape(&raw) {
        Ok(text) => text.into_owned(),
        Err(_) => raw,
    }
}

/// Resolve `&name;` where `name` is a predefined entity or a character reference
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(code) = name.strip_prefix('#') {
        let code = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}

/// Parse a syndication document into its entries.
///
/// Fails when the document is not XML or its root is not `<rss>`, `<rdf:RDF>` or `<feed>`.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<FeedEntry>, FeedError> {
    // The `encoding` feature switches the decoder once the prolog declares a charset
    let mut reader = Reader::from_reader(xml);

    let mut format: Option<Format> = None;
    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut field: Option<Field> = None;
    let mut depth = 0usize;
    let mut entry_depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                match format {
                    None => format = Some(root_format(&e)?),
                    Some(fmt) => {
                        if let Some(entry) = current.as_mut() {
                            if depth == entry_depth + 1 {
                                field = entry.start_child(fmt, &e, reader.decoder());
                            }
                        } else if e.local_name().as_ref() == fmt.entry_tag() {
                            current = Some(FeedEntry::default());
                            entry_depth = depth;
                        }
                    }
                }
            }
            Event::Empty(e) => match format {
                None => format = Some(root_format(&e)?),
                Some(fmt) => {
                    if let Some(entry) = current.as_mut() {
                        // Self-closing children sit at the entry's own depth
                        if depth == entry_depth {
                            entry.start_child(fmt, &e, reader.decoder());
                        }
                    }
                }
            },
            Event::End(_) => {
                if depth == entry_depth + 1 {
                    field = None;
                }
                // Closing the entry itself
                if depth == entry_depth {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(e) => {
                if let (Some(entry), Some(field)) = (current.as_mut(), field) {
                    entry.push_text(field, &decode_text(reader.decoder(), &e.into_inner()));
                }
            }
            Event::CData(e) => {
                if let (Some(entry), Some(field)) = (current.as_mut(), field) {
                    entry.push_text(field, &decode(reader.decoder(), &e.into_inner()));
                }
            }
            Event::GeneralRef(e) => {
                if let (Some(entry), Some(field)) = (current.as_mut(), field) {
                    let name = decode(reader.decoder(), &e.into_inner());
                    let text = resolve_reference(&name).unwrap_or_else(|| format!("&{};", name));
                    entry.push_text(field, &text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if format.is_none() {
        return Err(FeedError::Structure("document has no root element".to_string()));
    }
    Ok(entries)
}

fn root_format(root: &BytesStart) -> Result<Format, FeedError> {
    let name = root.local_name();
    Format::from_root(name.as_ref()).ok_or_else(|| {
        FeedError::Structure(format!(
            "unrecognised root element <{}>",
            String::from_utf8_lossy(name.as_ref())
        ))
    })
}
