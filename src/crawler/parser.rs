//! Listing page parser
//!
//! This module turns raw listing content into [`Asset`] records and extracts
//! the human formatted item count from the summary page.

use crate::crawler::{FetchError, ParseError};
use crate::model::Asset;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// Turns the raw content of one listing page into assets
///
/// Implementations leave `inv_popularity` at zero; the orchestrator tags it
/// with the page number.
pub trait PageParser: Send + Sync {
    fn parse(&self, content: &str) -> Result<Vec<Asset>, ParseError>;
}

/// Parses the HTML grid of asset cells served by the listing
///
/// # Extraction Rules
///
/// Each `.game_cell` yields one asset:
/// - `game_id` from the `data-game_id` attribute
/// - `title` from `.title`
/// - `author` from the first child of `.game_author`
/// - `description` from `.game_text`
/// - `link` from the `href` of `.thumb_link`
/// - `thumb_url` from the `data-lazy_src` of the first child of `.thumb_link`
///
/// Cells without a game id are skipped.
#[derive(Debug, Clone, Default)]
pub struct HtmlAssetParser;

impl HtmlAssetParser {
    pub fn new() -> Self {
        Self
    }
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::Selector(css.to_string()))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_element_child(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.children().find_map(ElementRef::wrap)
}

impl PageParser for HtmlAssetParser {
    fn parse(&self, content: &str) -> Result<Vec<Asset>, ParseError> {
        let document = Html::parse_fragment(content);

        let cell_selector = selector(".game_cell")?;
        let title_selector = selector(".title")?;
        let author_selector = selector(".game_author")?;
        let text_selector = selector(".game_text")?;
        let link_selector = selector(".thumb_link")?;

        let mut assets = Vec::new();
        for cell in document.select(&cell_selector) {
            let game_id = cell
                .value()
                .attr("data-game_id")
                .map(str::trim)
                .unwrap_or_default();
            if game_id.is_empty() {
                tracing::debug!("Skipping asset cell without a game id");
                continue;
            }

            let title = cell
                .select(&title_selector)
                .next()
                .map(element_text)
                .unwrap_or_default();
            let author = cell
                .select(&author_selector)
                .next()
                .and_then(first_element_child)
                .map(element_text)
                .unwrap_or_default();
            let description = cell
                .select(&text_selector)
                .next()
                .map(element_text)
                .unwrap_or_default();

            let link_node = cell.select(&link_selector).next();
            let link = link_node
                .and_then(|node| node.value().attr("href"))
                .unwrap_or_default()
                .to_string();
            let thumb_url = link_node
                .and_then(first_element_child)
                .and_then(|img| img.value().attr("data-lazy_src"))
                .unwrap_or_default()
                .to_string();

            assets.push(Asset {
                game_id: game_id.to_string(),
                title,
                author,
                description,
                link,
                thumb_url,
                inv_popularity: 0,
            });
        }

        Ok(assets)
    }
}

fn count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d[\d,]*").expect("count pattern is a valid regex"))
}

/// Normalizes a human formatted count such as `"(53,665 results)"` to `53665`
pub fn parse_item_count(text: &str) -> Result<u64, FetchError> {
    let missing = || FetchError::MissingCount {
        text: text.trim().to_string(),
    };

    let digits: String = count_pattern()
        .find(text)
        .ok_or_else(missing)?
        .as_str()
        .chars()
        .filter(|c| *c != ',')
        .collect();

    digits.parse().map_err(|_| missing())
}

/// Finds the count element of a summary page and normalizes its text
pub fn extract_item_count(html: &str, count_selector: &str) -> Result<u64, FetchError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(count_selector).map_err(|_| FetchError::MissingCount {
        text: format!("invalid selector '{}'", count_selector),
    })?;

    let text = document
        .select(&selector)
        .next()
        .map(element_text)
        .unwrap_or_default();

    parse_item_count(&text)
}
