// src/services/links.rs

//! Meeting links recovered from the HTML timetable page.
//!
//! The JSON export rarely carries meeting URLs. The HTML timetable shows
//! them as `<div class="link"><a href=...>` blocks placed right after the
//! teacher's name, so links are keyed by the surname found in the nearest
//! preceding text.

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use super::extract::extract_surname;
use crate::error::{AppError, Result};
use crate::utils::resolve_url;

/// Hosts accepted as meeting links.
const MEETING_HOSTS: [&str; 4] = ["google.com", "zoom.us", "teams", "webex"];

/// Siblings inspected before a link block when looking for a surname.
const MAX_SIBLINGS: usize = 5;

/// Surname to meeting link mapping, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkMap {
    entries: Vec<(String, String)>,
}

impl LinkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the link for a surname, keeping first-seen order.
    pub fn insert(&mut self, surname: impl Into<String>, link: impl Into<String>) {
        let surname = surname.into();
        let link = link.into();
        match self.entries.iter_mut().find(|(s, _)| *s == surname) {
            Some(entry) => entry.1 = link,
            None => self.entries.push((surname, link)),
        }
    }

    /// First link whose surname occurs in the teacher string.
    pub fn find_for_teacher(&self, teacher: &str) -> Option<&str> {
        if teacher.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(surname, _)| teacher.contains(surname.as_str()))
            .map(|(_, link)| link.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extract surname-keyed meeting links from a timetable HTML page.
pub fn parse_links_page(html: &str, base_url: &Url) -> Result<LinkMap> {
    let document = Html::parse_document(html);
    let block_sel = parse_selector("div.link")?;
    let anchor_sel = parse_selector("a[href]")?;

    let mut links = LinkMap::new();
    for block in document.select(&block_sel) {
        let Some(href) = block
            .select(&anchor_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };

        let url = resolve_url(base_url, href);
        if !MEETING_HOSTS.iter().any(|host| url.contains(host)) {
            continue;
        }

        if let Some(surname) = preceding_surname(block) {
            links.insert(surname, url);
        }
    }

    log::debug!("Recovered {} meeting links from timetable page", links.len());
    Ok(links)
}

/// Walk back over the siblings of a link block looking for `Surname I`.
fn preceding_surname(block: ElementRef<'_>) -> Option<String> {
    for node in block.prev_siblings().take(MAX_SIBLINGS) {
        let text = match node.value() {
            Node::Text(text) => text.trim().to_string(),
            Node::Element(_) => ElementRef::wrap(node)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };

        if text.chars().count() > 3 {
            if let Some(surname) = extract_surname(&text) {
                return Some(surname);
            }
        }
    }
    None
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::parse(format!("selector '{s}'"), format!("{e:?}")))
}
