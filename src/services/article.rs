use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::{AppError, Result};

/// Average reading speed used for read time estimates.
const WORDS_PER_MINUTE: f64 = 285.0;

const MAX_EXCERPT_CHARS: usize = 300;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedArticle {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub excerpt: Option<String>,
    pub content_html: String,
    pub text_content: String,
    pub image: Option<String>,
    pub published_time: Option<DateTime<Utc>>,
}

pub trait ArticleExtractor: Send + Sync {
    fn extract(&self, html: &str, url: &Url) -> Result<ExtractedArticle>;
}

/// Readability-style extractor: metadata from `<meta>` tags, main content
/// from `<article>`/`<main>` or the element holding the most paragraph text.
#[derive(Debug, Default)]
pub struct ReadabilityExtractor;

impl ArticleExtractor for ReadabilityExtractor {
    fn extract(&self, html: &str, url: &Url) -> Result<ExtractedArticle> {
        let doc = Html::parse_document(html);

        let title = meta_content(&doc, &["og:title", "twitter:title"])
            .or_else(|| first_text(&doc, "title"))
            .or_else(|| first_text(&doc, "h1"));

        let byline = meta_content(&doc, &["author", "article:author", "byl"])
            .or_else(|| first_text(&doc, "[rel=\"author\"], .byline, .author"));

        let image = meta_content(&doc, &["og:image", "twitter:image"])
            .and_then(|src| url.join(&src).ok())
            .map(|u| u.to_string());

        let published_time = meta_content(
            &doc,
            &["article:published_time", "og:published_time", "date", "pubdate"],
        )
        .or_else(|| first_attr(&doc, "time[datetime]", "datetime"))
        .and_then(|raw| parse_published(&raw));

        let content_html = main_content(&doc)
            .map(|node| strip_noise(&node.inner_html()))
            .unwrap_or_default();

        if content_html.trim().is_empty() {
            return Err(AppError::Input(
                "failed to parse webpage content: no readable content".to_string(),
            ));
        }

        let text_content = html_to_text(&content_html);

        let excerpt = meta_content(&doc, &["og:description", "description", "twitter:description"])
            .or_else(|| {
                let fragment = Html::parse_fragment(&content_html);
                first_text(&fragment, "p")
            })
            .map(|e| truncate_chars(&e, MAX_EXCERPT_CHARS));

        Ok(ExtractedArticle {
            title,
            byline,
            excerpt,
            content_html,
            text_content,
            image,
            published_time,
        })
    }
}

/// Returns `(read_time_seconds, read_time_display)`.
pub fn read_time(text: &str) -> (i64, String) {
    let words = text.split_whitespace().count() as f64;
    let minutes = words / WORDS_PER_MINUTE;
    let seconds = (minutes * 60.0).round() as i64;
    (seconds, format!("{} min", minutes.round() as i64))
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    let text = doc
        .select(&sel)
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty());
    text
}

fn first_attr(doc: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    let value = doc
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty());
    value
}

/// First non-empty `<meta>` content whose `property`, `name` or `itemprop` matches one of `keys`.
fn meta_content(doc: &Html, keys: &[&str]) -> Option<String> {
    let sel = selector("meta[content]")?;
    let metas: Vec<_> = doc.select(&sel).collect();
    keys.iter().find_map(|key| {
        metas.iter().find_map(|el| {
            let meta = el.value();
            let matches = ["property", "name", "itemprop"]
                .iter()
                .filter_map(|attr| meta.attr(attr))
                .any(|v| v.eq_ignore_ascii_case(key));
            if !matches {
                return None;
            }
            meta.attr("content")
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
        })
    })
}

fn main_content(doc: &Html) -> Option<ElementRef<'_>> {
    for css in ["article", "[role=\"main\"]", "main", "body"] {
        let Some(sel) = selector(css) else {
            continue;
        };
        let node = doc.select(&sel).next();
        if let Some(node) = node {
            if css == "body" {
                return best_scoring_container(doc).or(Some(node));
            }
            return Some(node);
        }
    }
    best_scoring_container(doc)
}

/// The `div`/`section` whose direct `<p>` children carry the most text.
fn best_scoring_container(doc: &Html) -> Option<ElementRef<'_>> {
    let containers = selector("div, section")?;
    doc.select(&containers)
        .map(|el| {
            let score: usize = el
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == "p")
                .map(|p| p.text().map(str::len).sum::<usize>())
                .sum();
            (score, el)
        })
        .filter(|(score, _)| *score > 0)
        .max_by_key(|(score, _)| *score)
        .map(|(_, el)| el)
}

fn noise_pattern() -> &'static Regex {
    static NOISE: OnceLock<Regex> = OnceLock::new();
    NOISE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript|iframe|form|nav)\b[^>]*>.*?</(script|style|noscript|iframe|form|nav)>")
            .expect("noise pattern is valid")
    })
}

fn strip_noise(html: &str) -> String {
    noise_pattern().replace_all(html, "").trim().to_string()
}

/// Elements that start a new line in the plain-text rendering.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "ol",
    "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Plain text of an HTML fragment: text nodes only, one line per block
/// element, no markup or link targets.
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut raw = String::new();
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => raw.push('\n'),
            _ => {}
        }
    }

    raw.lines()
        .map(normalize_whitespace)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", s[..idx].trim_end()),
        None => s.to_string(),
    }
}
