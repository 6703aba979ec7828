//! HTML extraction for Marktplaats pages.
//!
//! Every function works on a `Document` snapshot and fails with
//! `SiteError::ElementNotFound` when the markup it relies on is missing, or
//! `SiteError::Payload` when an embedded JSON blob does not have the expected
//! shape.

use crate::error::SiteError;
use crate::models::Category;
use crate::scrapers::types::{Document, NextData, RawListing};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeSet, HashMap, HashSet};

pub const SELECT_ELEM_ID: &str = "categoryId";
pub const CONTENT_ID: &str = "content";
pub const LISTING_ROOT_ID: &str = "listing-root";
pub const FORBIDDEN_URL: &str = "https://www.marktplaats.nl/403/";

const REQUEST_OPTS: &str = "#sortBy:SORT_INDEX|sortOrder:DECREASING";
const ALL_CATEGORIES_ID: i64 = 0;
const TYPE_LABEL: &str = "type";
const SERVICE_LABEL: &str = "service";

/// Description and attribute lists scraped from a listing page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListingAttributes {
    pub description: String,
    pub types: BTreeSet<String>,
    pub services: BTreeSet<String>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("selectors are built from static patterns")
}

/// `get_text(strip=True)`: stripped text nodes joined without a separator
fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect::<Vec<_>>().join("")
}

fn spaced_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Search URL for `page` of a category, newest first
pub fn search_url(category_url: &str, page: u32) -> String {
    let mut url = category_url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }

    format!("{}p/{}/{}", url, page, REQUEST_OPTS)
}

pub fn parent_categories(doc: &Document, base_url: &str) -> Result<Vec<Category>, SiteError> {
    let html = Html::parse_document(&doc.html);
    let item_selector = selector("li.CategoriesBlock-listItem");
    let link_selector = selector("a.hz-Link--navigation");

    let mut seen = HashSet::new();
    let mut categories = Vec::new();

    for item in html.select(&item_selector) {
        let link = item
            .select(&link_selector)
            .next()
            .ok_or_else(|| SiteError::missing("a", &[("class", "hz-Link--navigation")]))?;
        let href = link
            .value()
            .attr("href")
            .ok_or_else(|| SiteError::missing("a", &[("href", "")]))?;

        // "/cp/<id>/<slug>/"
        let parts: Vec<&str> = href.split('/').collect();
        let (id, slug) = match (parts.get(2), parts.get(3)) {
            (Some(id), Some(slug)) if !slug.is_empty() => (*id, *slug),
            _ => {
                return Err(SiteError::payload(
                    "category link",
                    format!("unexpected href {:?}", href),
                ))
            }
        };
        let id: i64 = id.parse().map_err(|_| {
            SiteError::payload("category link", format!("non-numeric id in {:?}", href))
        })?;

        if seen.insert(id) {
            categories.push(Category::new(id, format!("{}/l/{}", base_url, slug)));
        }
    }

    Ok(categories)
}

pub fn subcategories(
    doc: &Document,
    parent: &Category,
    base_url: &str,
) -> Result<Vec<Category>, SiteError> {
    let html = Html::parse_document(&doc.html);

    let select = html
        .select(&selector(&format!("select[id=\"{}\"]", SELECT_ELEM_ID)))
        .next()
        .ok_or_else(|| SiteError::missing("select", &[("id", SELECT_ELEM_ID)]))?;

    let parent_id = parent.id.to_string();
    if html
        .select(&selector(&format!("div[id=\"{}\"]", parent_id)))
        .next()
        .is_none()
    {
        return Err(SiteError::missing("div", &[("id", parent_id.as_str())]));
    }

    let mut hrefs: HashMap<String, String> = HashMap::new();
    for link in html.select(&selector("a.category-name")) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let name = link.text().next().unwrap_or_default().trim().to_string();
        hrefs.insert(name, href.to_string());
    }

    let mut seen = HashSet::new();
    let mut subcategories = Vec::new();

    for option in select.select(&selector("option")) {
        let Some(value) = option.value().attr("value") else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        let id: i64 = value.trim().parse().map_err(|_| {
            SiteError::payload("category option", format!("non-numeric value {:?}", value))
        })?;
        if id == parent.id || id == ALL_CATEGORIES_ID {
            continue;
        }

        let name = stripped_text(option);
        let href = hrefs.get(&name).ok_or_else(|| {
            SiteError::missing("a", &[("class", "category-name"), ("text", name.as_str())])
        })?;

        if seen.insert(id) {
            subcategories.push(Category::new(id, format!("{}{}", base_url, href)));
        }
    }

    Ok(subcategories)
}

/// Total listing count the site reports for the "any time" filter
pub fn listings_count(doc: &Document) -> Result<usize, SiteError> {
    let html = Html::parse_document(&doc.html);

    let label = html
        .select(&selector("label[for=\"offeredSince-Altijd\"]"))
        .next()
        .ok_or_else(|| SiteError::missing("label", &[("for", "offeredSince-Altijd")]))?;
    let counter = label
        .select(&selector("span.hz-Text"))
        .next()
        .ok_or_else(|| SiteError::missing("span", &[("class", "hz-Text")]))?;

    let count_text: String = stripped_text(counter)
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '(' | ')'))
        .collect();

    count_text
        .trim()
        .parse()
        .map_err(|_| SiteError::payload("listing count", format!("unparseable {:?}", count_text)))
}

/// Raw listings embedded in a search page
pub fn search_listings(doc: &Document) -> Result<Vec<RawListing>, SiteError> {
    let html = Html::parse_document(&doc.html);

    let select = html
        .select(&selector(&format!("select[id=\"{}\"]", SELECT_ELEM_ID)))
        .next()
        .ok_or_else(|| SiteError::missing("select", &[("id", SELECT_ELEM_ID)]))?;
    if select.select(&selector("option[selected]")).next().is_none() {
        return Err(SiteError::missing("option", &[("selected", "")]));
    }

    let script = html
        .select(&selector("script#__NEXT_DATA__"))
        .next()
        .ok_or_else(|| SiteError::missing("script", &[("id", "__NEXT_DATA__")]))?;
    let payload: String = script.text().collect();

    let data: NextData =
        serde_json::from_str(&payload).map_err(|e| SiteError::payload("__NEXT_DATA__", e))?;

    Ok(data.props.page_props.search_request_and_response.listings)
}

pub fn listing_attributes(doc: &Document) -> Result<ListingAttributes, SiteError> {
    let html = Html::parse_document(&doc.html);

    let description = html
        .select(&selector(
            "div.Description-description[data-collapsable=\"description\"]",
        ))
        .next()
        .ok_or_else(|| {
            SiteError::missing(
                "div",
                &[
                    ("class", "Description-description"),
                    ("data-collapsable", "description"),
                ],
            )
        })?;

    let mut attributes = ListingAttributes {
        description: spaced_text(description),
        ..Default::default()
    };

    let label_selector = selector("strong.Attributes-label");
    let value_selector = selector("span.Attributes-value");

    for item in html.select(&selector("div.Attributes-item")) {
        let Some(label) = item.select(&label_selector).next() else {
            continue;
        };
        let Some(value) = item.select(&value_selector).next() else {
            continue;
        };

        let label = stripped_text(label).to_lowercase();
        let value = stripped_text(value);
        let values = value.split(", ").map(str::to_string);

        match label.as_str() {
            TYPE_LABEL => attributes.types.extend(values),
            SERVICE_LABEL => attributes.services.extend(values),
            _ => {}
        }
    }

    Ok(attributes)
}

/// Whether the page embeds the rate-limit iframe
pub fn has_forbidden_frame(html: &str) -> bool {
    Html::parse_document(html)
        .select(&selector(&format!("iframe[src=\"{}\"]", FORBIDDEN_URL)))
        .next()
        .is_some()
}

/// Error text of a marketplace error page, if this is one
pub fn site_error_text(html: &str) -> Result<Option<String>, SiteError> {
    let html = Html::parse_document(html);

    if let Some(alert) = html.select(&selector("p.mp-Alert--error")).next() {
        let text = stripped_text(alert);
        return Ok(Some(text).filter(|t| !t.is_empty()));
    }

    if let Some(page) = html.select(&selector("div.hz-ErrorPage-message")).next() {
        let title = page
            .select(&selector("div.u-textStyleTitle3"))
            .next()
            .ok_or_else(|| SiteError::missing("div", &[("class", "u-textStyleTitle3")]))?;
        let text = stripped_text(title);
        return Ok(Some(text).filter(|t| !t.is_empty()));
    }

    Ok(None)
}

/// Turn error pages into `SiteError`s.
///
/// `frame_html` is the content of the forbidden iframe when one was found.
pub fn check_page(html: &str, frame_html: Option<&str>) -> Result<(), SiteError> {
    if let Some(frame_html) = frame_html {
        if let Some(message) = site_error_text(frame_html)? {
            return Err(SiteError::Forbidden(message));
        }
    }

    match site_error_text(html)? {
        Some(message) => Err(SiteError::Site(message)),
        None => Ok(()),
    }
}
