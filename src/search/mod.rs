/// Local search building blocks
///
/// This module contains:
/// - Keyword matching strategies over canonical products
/// - Slicing of match lists into pages

pub mod matcher;
pub mod paginate;

pub use matcher::{haystack, keywords, strip_diacritics, AccentInsensitiveMatcher, HaystackFields, KeywordMatcher, Matcher};
pub use paginate::{paginate, Page};
