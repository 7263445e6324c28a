//! Chapter and page link resolution for the source site.
//!
//! The resolver turns a chapter-index URL into an ordered list of
//! [`Chapter`]s, and a chapter URL into the ordered list of page-image URLs
//! that the download pipeline consumes. Both operations fail with an explicit
//! [`Error::Resolver`] instead of yielding an empty result, so the caller can
//! skip or abort cleanly.

use std::time::Duration;

use scraper::{Html, Selector};

use crate::error::{Error, Result};
use crate::types::Chapter;

/// CSS selector matching the chapter anchors on the index page.
const CHAPTER_SELECTOR: &str = "a.chapter-name.text-nowrap";
/// CSS selector matching the page images inside the chapter reader.
const PAGE_SELECTOR: &str = "div.container-chapter-reader img";

/// Resolves chapter and page links by scraping the source site.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    client: reqwest::Client,
}

impl LinkResolver {
    /// Creates a resolver with its own HTTP client.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches the chapter index and returns every chapter in document order.
    pub async fn chapter_links(&self, index_url: &str) -> Result<Vec<Chapter>> {
        let body = self.get_html(index_url, "chapter index").await?;
        parse_chapter_links(&body)
    }

    /// Fetches a chapter's reader page and returns its page-image URLs in
    /// document order.
    pub async fn page_links(&self, chapter_url: &str) -> Result<Vec<String>> {
        let body = self.get_html(chapter_url, "chapter page").await?;
        parse_page_links(&body)
    }

    async fn get_html(&self, url: &str, what: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Resolver(format!("{} unreachable: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Resolver(format!(
                "{} returned HTTP {}: {}",
                what, status, url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Resolver(format!("{} body unreadable: {}", what, e)))
    }
}

fn parse_chapter_links(body: &str) -> Result<Vec<Chapter>> {
    let selector = Selector::parse(CHAPTER_SELECTOR)
        .map_err(|e| Error::Resolver(format!("invalid chapter selector: {}", e)))?;

    let document = Html::parse_document(body);
    let chapters: Vec<Chapter> = document
        .select(&selector)
        .filter_map(|anchor| {
            let url = anchor.value().attr("href")?.to_string();
            let name = anchor.text().collect::<String>().trim().to_string();
            Some(Chapter { name, url })
        })
        .collect();

    if chapters.is_empty() {
        return Err(Error::Resolver(
            "no chapter links found on the index page".to_string(),
        ));
    }
    Ok(chapters)
}

fn parse_page_links(body: &str) -> Result<Vec<String>> {
    let selector = Selector::parse(PAGE_SELECTOR)
        .map_err(|e| Error::Resolver(format!("invalid page selector: {}", e)))?;

    let document = Html::parse_document(body);
    let pages: Vec<String> = document
        .select(&selector)
        .filter_map(|img| img.value().attr("src").map(str::to_string))
        .collect();

    if pages.is_empty() {
        return Err(Error::Resolver(
            "no page images found in the chapter reader".to_string(),
        ));
    }
    Ok(pages)
}
