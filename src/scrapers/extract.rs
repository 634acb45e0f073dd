//! Field extraction from a rendered fact-check page.
//!
//! Each field has its own cascade: an ordered list of matchers (CSS selector
//! plus where to read the value) and a validator. Matches are tried in
//! order and the first value the validator accepts wins. Fields degrade
//! independently; only a missing title discards the whole record.

use crate::dates::{date_from_url, parse_date};
use crate::models::{ArticleRecord, VerificationCategory};
use crate::text::{cap_chars, char_len, clean, clean_capped, collapse_whitespace, is_boilerplate, trim_quotes};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

pub const TITLE_MAX: usize = 250;
pub const CLAIM_MIN: usize = 20;
pub const CLAIM_MAX: usize = 500;
pub const AUTHOR_MIN: usize = 2;
pub const AUTHOR_MAX: usize = 100;
pub const PARAGRAPH_MIN: usize = 40;
pub const CONTENT_MAX: usize = 10_000;

/// Verdict classes on the highlighted span, checked in this order.
pub const CATEGORY_CLASSES: [(&str, VerificationCategory); 4] = [
    ("card-text-marked-red", VerificationCategory::Falso),
    ("card-text-marked-orange", VerificationCategory::Enganoso),
    ("card-text-marked-yellow", VerificationCategory::VerdadAMedias),
    ("card-text-marked-green", VerificationCategory::Verdadero),
];

/// Paragraphs mentioning any of these move to the front of the content.
/// Matched against the lowercased paragraph.
const EVIDENCE_KEYWORDS: &[&str] = &[
    "datos",
    "según",
    "fuente",
    "estudio",
    "informe",
    "estadística",
    "cifras",
    "porcentaje",
    "%",
    "eurostat",
    "hemos consultado",
    "ha consultado",
    "evidencia",
    "verificado",
];

const NAME: &str = r"\p{Lu}[\p{L}.'-]*(?:\s+(?:(?:de|del|la|los)\s+)?\p{Lu}[\p{L}.'-]*){0,4}";

static REPORTING_VERBS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?P<name>{NAME}),?\s+(?:dijo|afirmó|aseguró|declaró|señaló)\b"),
        format!(r"\b[Ss]egún\s+(?:(?:el|la|los|las)\s+)?(?P<name>{NAME})"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("reporting-verb pattern is valid"))
    .collect()
});

/// The statistics institute, matched as a case-sensitive word so that
/// "cine" or "línea" do not count.
static EVIDENCE_ACRONYM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bINE\b").expect("valid regex"));

static BYLINE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:por|by|autor(?:a)?:?)\s+").expect("valid regex"));

static EMBEDDED_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\d{1,2}\s+de\s+\p{L}+\s+del?\s+\d{4}|\d{4}-\d{2}-\d{2}|\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}|\p{L}+\s+\d{1,2},\s+\d{4}",
    )
    .expect("valid regex")
});

static TRAILING_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s|·,–-]+$").expect("valid regex"));

/// Where a matcher reads its raw value from.
#[derive(Debug, Clone, Copy)]
enum Read {
    Text,
    Attr(&'static str),
}

#[derive(Debug)]
struct Matcher {
    selector: Selector,
    read: Read,
}

/// Ordered matchers for one field, plus the validator every candidate must
/// pass.
#[derive(Debug)]
struct Cascade {
    matchers: Vec<Matcher>,
    validate: fn(&str) -> Option<String>,
}

impl Cascade {
    fn new(steps: &[(&str, Read)], validate: fn(&str) -> Option<String>) -> Self {
        let matchers = steps
            .iter()
            .map(|(css, read)| Matcher {
                selector: Selector::parse(css).expect("cascade selector is valid"),
                read: *read,
            })
            .collect();
        Self { matchers, validate }
    }

    /// Raw candidate values in cascade order.
    fn candidates<'a>(&'a self, doc: &'a Html) -> impl Iterator<Item = String> + 'a {
        self.matchers.iter().flat_map(move |m| {
            doc.select(&m.selector).filter_map(move |el| match m.read {
                Read::Text => Some(element_text(el)),
                Read::Attr(name) => el.value().attr(name).map(str::to_string),
            })
        })
    }

    fn first(&self, doc: &Html) -> Option<String> {
        self.candidates(doc).find_map(|raw| (self.validate)(&raw))
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

fn valid_title(raw: &str) -> Option<String> {
    let title = clean_capped(raw, TITLE_MAX);
    (!title.is_empty()).then_some(title)
}

fn valid_claim(raw: &str) -> Option<String> {
    let claim = collapse_whitespace(trim_quotes(&clean(raw)));
    let len = char_len(&claim);
    (CLAIM_MIN..=CLAIM_MAX).contains(&len).then_some(claim)
}

fn valid_name(raw: &str) -> Option<String> {
    let name = clean(raw);
    let len = char_len(&name);
    (AUTHOR_MIN..=AUTHOR_MAX).contains(&len).then_some(name)
}

fn valid_author(raw: &str) -> Option<String> {
    let cleaned = clean(raw);
    let without_prefix = BYLINE_PREFIX.replace(&cleaned, "");
    let without_dates = EMBEDDED_DATE.replace_all(&without_prefix, " ");
    let collapsed = collapse_whitespace(&without_dates);
    let author = TRAILING_SEPARATORS.replace(&collapsed, "");
    valid_name(&author)
}

fn valid_tag(raw: &str) -> Option<String> {
    let tag = clean(raw);
    (!tag.is_empty()).then_some(tag)
}

fn valid_raw(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Turns a rendered article document into an [`ArticleRecord`].
#[derive(Debug)]
pub struct FieldExtractor {
    title: Cascade,
    date: Cascade,
    claim: Cascade,
    claim_source: Cascade,
    tags: Vec<Cascade>,
    author: Cascade,
    image: Cascade,
    content_containers: Vec<Selector>,
    paragraph: Selector,
    body: Selector,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor {
    pub fn new() -> Self {
        use Read::{Attr, Text};
        Self {
            title: Cascade::new(
                &[
                    ("h1.c-detail__title", Text),
                    ("h1.c-article__title", Text),
                    ("h1.entry-title", Text),
                    ("article h1", Text),
                    ("meta[property='og:title']", Attr("content")),
                    ("h1", Text),
                ],
                valid_title,
            ),
            date: Cascade::new(
                &[
                    ("time[datetime]", Attr("datetime")),
                    (".c-detail__date", Text),
                    (".c-article__date", Text),
                    (".entry-date", Text),
                    ("meta[property='article:published_time']", Attr("content")),
                    ("time", Text),
                    (".date", Text),
                ],
                valid_raw,
            ),
            claim: Cascade::new(
                &[
                    (".c-card__verification__quote", Text),
                    (".c-detail__claim", Text),
                    (".card-text-claim", Text),
                    ("blockquote p", Text),
                    ("blockquote", Text),
                    ("q", Text),
                    ("article strong", Text),
                    ("article em", Text),
                    ("strong", Text),
                ],
                valid_claim,
            ),
            claim_source: Cascade::new(
                &[
                    (".c-card__author a", Text),
                    (".c-card__verification__author a", Text),
                    (".claim-author a", Text),
                    (".c-card__author", Text),
                ],
                valid_name,
            ),
            tags: vec![
                Cascade::new(&[(".c-detail__tags a", Text)], valid_tag),
                Cascade::new(&[(".c-tags a, .c-tags span", Text)], valid_tag),
                Cascade::new(&[(".tags a", Text)], valid_tag),
                Cascade::new(&[("a[rel~='tag']", Text)], valid_tag),
            ],
            author: Cascade::new(
                &[
                    (".c-detail__author a", Text),
                    (".c-detail__author", Text),
                    (".c-article__author", Text),
                    (".author-name", Text),
                    ("[rel='author']", Text),
                    (".byline", Text),
                    ("meta[name='author']", Attr("content")),
                ],
                valid_author,
            ),
            image: Cascade::new(
                &[
                    ("meta[property='og:image']", Attr("content")),
                    ("meta[name='twitter:image']", Attr("content")),
                    ("figure img", Attr("src")),
                    ("figure img", Attr("data-src")),
                    ("article img", Attr("src")),
                ],
                valid_raw,
            ),
            content_containers: [".c-detail__body", ".c-article__body", ".entry-content", "article"]
                .iter()
                .map(|css| Selector::parse(css).expect("container selector is valid"))
                .collect(),
            paragraph: Selector::parse("p").expect("valid selector"),
            body: Selector::parse("body").expect("valid selector"),
        }
    }

    /// Parse `html` and extract a record for `url`.
    pub fn extract_html(&self, html: &str, url: &str) -> Option<ArticleRecord> {
        let document = Html::parse_document(html);
        self.extract(&document, url)
    }

    /// Extract every field. Returns `None` only when no title is found.
    #[instrument(level = "debug", skip(self, document))]
    pub fn extract(&self, document: &Html, url: &str) -> Option<ArticleRecord> {
        let Some(title) = self.title(document) else {
            debug!("No title found; discarding page");
            return None;
        };

        let paragraphs = self.paragraphs(document);
        let mut record = ArticleRecord::new(url, title);
        record.verification_category = self.category(document);
        record.publish_date = self.publish_date(document, url);
        record.claim = self.claim(document);
        record.claim_source = self.claim_source(document, &paragraphs);
        record.content = content_from(&paragraphs);
        record.tags = self.tags(document);
        record.author = self.author(document);
        record.image_url = self.image_url(document, url);

        debug!(
            category = ?record.verification_category,
            date = ?record.publish_date,
            has_claim = record.claim.is_some(),
            has_content = record.content.is_some(),
            tags = record.tags.len(),
            has_image = record.image_url.is_some(),
            "Extracted fields"
        );
        Some(record)
    }

    pub fn title(&self, document: &Html) -> Option<String> {
        self.title.first(document)
    }

    /// Class mapping first; the literal-label text search only runs when no
    /// verdict class is present.
    pub fn category(&self, document: &Html) -> Option<VerificationCategory> {
        category_from_classes(document).or_else(|| self.category_from_text(document))
    }

    fn category_from_text(&self, document: &Html) -> Option<VerificationCategory> {
        let text = document
            .select(&self.body)
            .next()
            .map(element_text)
            .unwrap_or_else(|| element_text(document.root_element()));
        VerificationCategory::ALL
            .into_iter()
            .find(|c| text.contains(c.as_str()))
    }

    /// URL date token first, then the page's date element.
    pub fn publish_date(&self, document: &Html, url: &str) -> Option<NaiveDate> {
        date_from_url(url).or_else(|| {
            self.date
                .candidates(document)
                .filter_map(|raw| (self.date.validate)(&raw))
                .find_map(|raw| parse_date(&raw))
        })
    }

    pub fn claim(&self, document: &Html) -> Option<String> {
        self.claim.first(document)
    }

    /// Author-card link first, then reporting verbs in the opening paragraph.
    pub fn claim_source(&self, document: &Html, paragraphs: &[String]) -> Option<String> {
        self.claim_source
            .first(document)
            .or_else(|| paragraphs.first().and_then(|p| source_from_reporting_verbs(p)))
    }

    /// Tags from the first tags section that yields any, in document order.
    pub fn tags(&self, document: &Html) -> Vec<String> {
        self.tags
            .iter()
            .map(|c| {
                c.candidates(document)
                    .filter_map(|raw| (c.validate)(&raw))
                    .collect::<Vec<_>>()
            })
            .find(|tags| !tags.is_empty())
            .unwrap_or_default()
    }

    pub fn author(&self, document: &Html) -> Option<String> {
        self.author.first(document)
    }

    /// Lead image, resolved against the article URL. Only `http(s)` results
    /// are kept, so `data:` placeholders fall through to the next candidate.
    pub fn image_url(&self, document: &Html, url: &str) -> Option<String> {
        let base = Url::parse(url).ok();
        self.image
            .candidates(document)
            .filter_map(|raw| (self.image.validate)(&raw))
            .find_map(|raw| {
                let resolved = match &base {
                    Some(base) => base.join(&raw).ok()?,
                    None => Url::parse(&raw).ok()?,
                };
                matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
            })
    }

    /// Usable paragraphs from the main container, or from the whole document
    /// when the container has none.
    pub fn paragraphs(&self, document: &Html) -> Vec<String> {
        let from_container = self
            .content_containers
            .iter()
            .find_map(|sel| document.select(sel).next())
            .map(|container| usable_paragraphs(container.select(&self.paragraph)))
            .unwrap_or_default();
        if !from_container.is_empty() {
            return from_container;
        }
        usable_paragraphs(document.select(&self.paragraph))
    }
}

fn category_from_classes(document: &Html) -> Option<VerificationCategory> {
    CATEGORY_CLASSES.iter().find_map(|(class, category)| {
        let selector = Selector::parse(&format!(".{class}")).ok()?;
        document.select(&selector).next().map(|_| *category)
    })
}

fn usable_paragraphs<'a>(paragraphs: impl Iterator<Item = ElementRef<'a>>) -> Vec<String> {
    paragraphs
        .filter_map(|p| {
            let raw = element_text(p);
            if is_boilerplate(&raw) {
                return None;
            }
            let text = clean(&raw);
            (char_len(&text) >= PARAGRAPH_MIN).then_some(text)
        })
        .collect()
}

fn is_evidence(paragraph: &str) -> bool {
    let lower = paragraph.to_lowercase();
    EVIDENCE_KEYWORDS.iter().any(|k| lower.contains(k)) || EVIDENCE_ACRONYM.is_match(paragraph)
}

/// Evidence paragraphs first (stable), joined and capped.
fn content_from(paragraphs: &[String]) -> Option<String> {
    if paragraphs.is_empty() {
        return None;
    }
    let (evidence, rest): (Vec<&String>, Vec<&String>) =
        paragraphs.iter().partition(|p| is_evidence(p));
    let joined = evidence
        .into_iter()
        .chain(rest)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n");
    Some(cap_chars(&joined, CONTENT_MAX))
}

fn source_from_reporting_verbs(paragraph: &str) -> Option<String> {
    REPORTING_VERBS.iter().find_map(|pattern| {
        pattern
            .captures(paragraph)
            .and_then(|caps| caps.name("name"))
            .and_then(|m| valid_name(m.as_str()))
    })
}
