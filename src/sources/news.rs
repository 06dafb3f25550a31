//! Headlines from the Le Monde RSS feed.

use regex::Regex;
use roxmltree::{Document, Node};
use serde::Serialize;
use thiserror::Error;

use crate::config;
use crate::prim::client::PrimClient;
use crate::prim::error::PrimError;

const MAX_ITEMS: usize = 10;
const MAX_DESCRIPTION_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum NewsError {
    #[error(transparent)]
    Http(#[from] PrimError),
    #[error("RSS parse error: {0}")]
    Xml(String),
}

pub type NewsResult<T> = Result<T, NewsError>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub link: Option<String>,
    pub published: Option<String>,
    pub description: Option<String>,
}

fn child_text(item: Node, tag: &str) -> Option<String> {
    item.children()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Owns the compiled markup-stripping pattern; construct once per process.
pub struct FeedParser {
    tags: Regex,
}

impl FeedParser {
    pub fn new() -> Self {
        FeedParser {
            tags: Regex::new("<[^>]*>").expect("valid tag pattern"),
        }
    }

    /// Descriptions often embed markup; the board wants plain text, capped.
    fn clean_description(&self, raw: &str) -> String {
        let text = self.tags.replace_all(raw, "");
        let text = text.trim();
        if text.chars().count() <= MAX_DESCRIPTION_CHARS {
            return text.to_string();
        }
        let truncated: String = text.chars().take(MAX_DESCRIPTION_CHARS).collect();
        format!("{}…", truncated.trim_end())
    }

    /// The first [MAX_ITEMS] feed items. Items without a title are dropped.
    pub fn parse(&self, xml: &str) -> NewsResult<Vec<NewsItem>> {
        let document = Document::parse(xml).map_err(|e| NewsError::Xml(e.to_string()))?;

        let items = document
            .descendants()
            .filter(|n| n.has_tag_name("item"))
            .filter_map(|item| {
                let title = child_text(item, "title")?;
                Some(NewsItem {
                    title,
                    link: child_text(item, "link"),
                    published: child_text(item, "pubDate"),
                    description: child_text(item, "description")
                        .map(|d| self.clean_description(&d)),
                })
            })
            .take(MAX_ITEMS)
            .collect();

        Ok(items)
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        FeedParser::new()
    }
}

pub async fn fetch(client: &PrimClient, parser: &FeedParser) -> NewsResult<Vec<NewsItem>> {
    let body = client.get_proxied_text(config::NEWS_FEED_URL).await?;
    parser.parse(&body)
}
