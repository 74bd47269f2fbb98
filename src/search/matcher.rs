//! Keyword matching over canonical products.
//!
//! Two strategies live side by side and are selected per request:
//!
//! - [`KeywordMatcher`]: the query is split on whitespace and every token must
//!   appear as a substring of the record's labeled haystack (logical AND).
//! - [`AccentInsensitiveMatcher`]: the whole query, with diacritics stripped,
//!   must appear as a single substring of the record's plain haystack.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::types::{MatchMode, Product};

/// Which product fields feed the haystack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaystackFields {
    /// name, brand, category, color, size
    Base,
    /// Base fields plus stock and price, with size/color/stock/price labeled
    Exhaustive,
}

/// Split a free-text query into lowercase, trimmed, non-empty tokens
pub fn keywords(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Build the lowercase searchable text of a product.
///
/// Field order is fixed. Absent fields contribute nothing. In exhaustive mode
/// the size, color, stock and price values carry their storefront labels so a
/// query such as "talle 42" can match a product whose size is "42".
/// The labels are plain words of the haystack, so a lone "color" or "stock"
/// token matches every product that has that field set. Tokens are not
/// paired with the value after them, which keeps token order irrelevant.
pub fn haystack(product: &Product, fields: HaystackFields) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(7);

    for text in [&product.name, &product.brand, &product.category] {
        if let Some(text) = text {
            parts.push(text.clone());
        }
    }

    match fields {
        HaystackFields::Base => {
            for text in [&product.color, &product.size] {
                if let Some(text) = text {
                    parts.push(text.clone());
                }
            }
        }
        HaystackFields::Exhaustive => {
            if let Some(color) = &product.color {
                parts.push(format!("color {}", color));
            }
            if let Some(size) = &product.size {
                parts.push(format!("talle {}", size));
            }
            if let Some(stock) = product.stock {
                parts.push(format!("stock {}", stock));
            }
            if let Some(price) = product.price {
                parts.push(format!("precio {}", format_number(price)));
            }
        }
    }

    parts.join(" ").to_lowercase()
}

/// Decompose accented characters and drop the combining marks
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Render whole prices without a trailing `.0`
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

/// Multi-keyword AND matcher
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    tokens: Vec<String>,
}

impl KeywordMatcher {
    pub fn new(query: &str) -> Self {
        Self {
            tokens: keywords(query),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// True iff every token is a substring of `haystack`
    pub fn matches_text(&self, haystack: &str) -> bool {
        self.tokens.iter().all(|token| haystack.contains(token.as_str()))
    }

    pub fn matches(&self, product: &Product) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        self.matches_text(&haystack(product, HaystackFields::Exhaustive))
    }
}

/// Whole-query substring matcher that ignores case and diacritics
#[derive(Debug, Clone)]
pub struct AccentInsensitiveMatcher {
    needle: String,
}

impl AccentInsensitiveMatcher {
    pub fn new(query: &str) -> Self {
        Self {
            needle: strip_diacritics(&query.trim().to_lowercase()),
        }
    }

    pub fn matches_text(&self, haystack: &str) -> bool {
        strip_diacritics(haystack).contains(self.needle.as_str())
    }

    pub fn matches(&self, product: &Product) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        self.matches_text(&haystack(product, HaystackFields::Base))
    }
}

/// Matcher selected by [`MatchMode`]
#[derive(Debug, Clone)]
pub enum Matcher {
    Keywords(KeywordMatcher),
    AccentInsensitive(AccentInsensitiveMatcher),
}

impl Matcher {
    pub fn for_mode(mode: MatchMode, query: &str) -> Self {
        match mode {
            MatchMode::Keywords => Matcher::Keywords(KeywordMatcher::new(query)),
            MatchMode::AccentInsensitive => {
                Matcher::AccentInsensitive(AccentInsensitiveMatcher::new(query))
            }
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Matcher::Keywords(matcher) => matcher.matches(product),
            Matcher::AccentInsensitive(matcher) => matcher.matches(product),
        }
    }
}
