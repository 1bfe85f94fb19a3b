//! Storefront markup knowledge lives here and nowhere else.
//!
//! Listing pages render one `div.card.cartitem` per product. The card title
//! is the product name, `ul.vps-config` lines describe the plan (and may carry
//! a membership requirement), `p.card-text` holds the stock line and the
//! footer link carries the product id.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{MemberTier, ProductRecord, ProductStatus, RecordMap};

/// Keywords that turn a config line into a membership requirement, checked in order.
const TIER_KEYWORDS: &[(&str, MemberTier)] = &[
    ("成员", MemberTier::Community),
    ("白银会员", MemberTier::Silver),
    ("黄金会员", MemberTier::Gold),
    ("钻石会员", MemberTier::Diamond),
    ("星曜会员", MemberTier::Star),
];

pub struct ProductParser {
    card: Selector,
    name: Selector,
    config_line: Selector,
    stock_line: Selector,
    footer_link: Selector,
    stock_regex: Regex,
}

impl Default for ProductParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductParser {
    pub fn new() -> Self {
        // Selectors and pattern are constants; a failure here is a programming error.
        Self {
            card: Selector::parse("div.card.cartitem").expect("valid card selector"),
            name: Selector::parse("h4").expect("valid name selector"),
            config_line: Selector::parse("ul.vps-config li").expect("valid config selector"),
            stock_line: Selector::parse("p.card-text").expect("valid stock selector"),
            footer_link: Selector::parse("div.card-footer a[href]").expect("valid link selector"),
            stock_regex: Regex::new(r"(?i)(?:库存|stock)\s*[：:]\s*(\d+)").expect("valid stock pattern"),
        }
    }

    /// Parses every product card on a listing page. Bad cards are skipped;
    /// an unrecognizable page yields an empty map.
    pub fn parse(&self, html: &str, page_url: &str, region: &str) -> RecordMap {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();
        let mut products = RecordMap::new();

        for card in document.select(&self.card) {
            match self.parse_card(card, page_url, base.as_ref(), region) {
                Some(record) => {
                    products.insert(record.key(), record);
                }
                None => tracing::debug!("[{}] Skipping card without a name", region),
            }
        }

        products
    }

    fn parse_card(
        &self,
        card: ElementRef<'_>,
        page_url: &str,
        base: Option<&Url>,
        region: &str,
    ) -> Option<ProductRecord> {
        let name = card
            .select(&self.name)
            .next()
            .map(|el| collect_text(el, ""))
            .filter(|name| !name.is_empty())?;

        let mut member_only = MemberTier::None;
        let mut config_lines = Vec::new();
        for line in card.select(&self.config_line) {
            let text = collect_text(line, " ");
            match tier_for_line(&text) {
                Some(tier) => member_only = tier,
                None => config_lines.push(text),
            }
        }

        let stock = card
            .select(&self.stock_line)
            .next()
            .map(|el| self.parse_stock(&collect_text(el, "")))
            .unwrap_or(0);

        let href = card
            .select(&self.footer_link)
            .next()
            .and_then(|a| a.value().attr("href"));
        let link = href.and_then(|href| resolve_link(base, href));
        let pid = href.and_then(|href| extract_pid(link.as_ref(), href));

        Some(ProductRecord {
            name,
            region: region.to_string(),
            stock,
            status: Some(ProductStatus::from_stock(stock)),
            member_only,
            config: config_lines.join("\n"),
            url: Some(link.map(String::from).unwrap_or_else(|| page_url.to_string())),
            pid,
        })
    }

    /// Reads "库存：N" / "stock: N"; anything unreadable counts as zero.
    pub fn parse_stock(&self, text: &str) -> u32 {
        self.stock_regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    }
}

pub fn tier_for_line(text: &str) -> Option<MemberTier> {
    TIER_KEYWORDS
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, tier)| *tier)
}

fn collect_text(element: ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn resolve_link(base: Option<&Url>, href: &str) -> Option<Url> {
    match base {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    }
}

fn extract_pid(link: Option<&Url>, href: &str) -> Option<String> {
    if let Some(link) = link {
        if let Some((_, pid)) = link.query_pairs().find(|(k, _)| k == "pid") {
            return Some(pid.into_owned()).filter(|pid| !pid.is_empty());
        }
    }
    href.split_once("pid=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(rest).to_string())
        .filter(|pid| !pid.is_empty())
}
