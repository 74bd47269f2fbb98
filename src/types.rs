use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default page size for local search
pub const DEFAULT_SEARCH_PER_PAGE: usize = 50;

/// Canonical product record served by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Source-provided identifier, unique within one aggregation pass
    pub id: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    /// Category label
    pub category: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    /// Canonical storefront URL
    pub url: Option<String>,
    pub image_url: Option<String>,
}

impl Product {
    /// Product with only an identifier set
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            brand: None,
            category: None,
            color: None,
            size: None,
            price: None,
            stock: None,
            url: None,
            image_url: None,
        }
    }
}

/// Canonical category record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Option<i64>,
    /// Display name in the preferred language
    pub name: String,
    pub description: Option<String>,
    /// Bare parent identifier, whatever shape upstream used
    pub parent_id: Option<i64>,
    pub handle: Option<String>,
    pub position: Option<i64>,
    pub created_at: Option<String>,
}

/// One page of search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub query: String,
    pub page: usize,
    pub per_page: usize,
    /// Records on this page
    pub results_count: usize,
    /// Total matched records
    pub total_found: usize,
    pub has_more: bool,
    pub products: Vec<Product>,
}

/// Response for the all-products operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllProductsResponse {
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<usize>,
    pub count: usize,
    pub products: Vec<Product>,
}

/// Response for the categories operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub count: usize,
    pub categories: Vec<Category>,
}

/// Sidecar metadata written next to the local mirror shards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardMetadata {
    pub total_products: u64,
    pub chunks: u64,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Keyword matching strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every whitespace token must be a substring of the labeled haystack
    #[default]
    Keywords,
    /// The whole query, diacritics stripped, must be a substring of the haystack
    AccentInsensitive,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Keywords => "keywords",
            MatchMode::AccentInsensitive => "accent_insensitive",
        }
    }
}

impl std::str::FromStr for MatchMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "keywords" | "and" => Ok(MatchMode::Keywords),
            "accent_insensitive" | "accents" | "flexible" => Ok(MatchMode::AccentInsensitive),
            other => Err(ValidationError::InvalidMode(other.to_string())),
        }
    }
}

/// Raw query string for the search endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub mode: Option<String>,
}

/// Validated search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub page: usize,
    pub per_page: usize,
    pub mode: MatchMode,
}

impl SearchParams {
    /// Validate the raw parameters before any I/O happens
    pub fn validate(self) -> Result<SearchRequest, ValidationError> {
        let query = self.query.ok_or(ValidationError::MissingParameter("query"))?;
        let page = positive(self.page, 1).map_err(ValidationError::InvalidPage)?;
        let per_page =
            positive(self.per_page, DEFAULT_SEARCH_PER_PAGE).map_err(ValidationError::InvalidPerPage)?;
        let mode = match self.mode {
            Some(mode) => mode.parse()?,
            None => MatchMode::default(),
        };

        Ok(SearchRequest {
            query,
            page,
            per_page,
            mode,
        })
    }
}

/// Raw query string for the all-products endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllProductsParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub filter: Option<String>,
    pub use_cache: Option<bool>,
}

/// Validated all-products request
#[derive(Debug, Clone, PartialEq)]
pub struct ProductsRequest {
    /// Fetch a single upstream page instead of draining everything
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    /// Keyword filter applied after the cache lookup
    pub filter: Option<String>,
    pub use_cache: bool,
}

impl Default for ProductsRequest {
    fn default() -> Self {
        Self {
            page: None,
            per_page: None,
            filter: None,
            use_cache: true,
        }
    }
}

impl AllProductsParams {
    pub fn validate(self) -> Result<ProductsRequest, ValidationError> {
        let page = match self.page {
            Some(page) => Some(positive(Some(page), 1).map_err(ValidationError::InvalidPage)?),
            None => None,
        };
        let per_page = match self.per_page {
            Some(per_page) => {
                Some(positive(Some(per_page), 1).map_err(ValidationError::InvalidPerPage)?)
            }
            None => None,
        };

        Ok(ProductsRequest {
            page,
            per_page,
            filter: self.filter.filter(|f| !f.trim().is_empty()),
            use_cache: self.use_cache.unwrap_or(true),
        })
    }
}

fn positive(value: Option<i64>, default: usize) -> Result<usize, String> {
    match value {
        None => Ok(default),
        Some(v) if v >= 1 => Ok(v as usize),
        Some(v) => Err(format!("must be at least 1, got {}", v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_defaults() {
        let request = SearchParams {
            query: Some("nike".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert_eq!(request.page, 1);
        assert_eq!(request.per_page, DEFAULT_SEARCH_PER_PAGE);
        assert_eq!(request.mode, MatchMode::Keywords);
    }

    #[test]
    fn test_search_params_require_query() {
        let err = SearchParams::default().validate().unwrap_err();
        assert!(matches!(err, ValidationError::MissingParameter("query")));
    }

    #[test]
    fn test_search_params_reject_non_positive_page() {
        let params = SearchParams {
            query: Some("x".to_string()),
            page: Some(0),
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(ValidationError::InvalidPage(_))));

        let params = SearchParams {
            query: Some("x".to_string()),
            per_page: Some(-3),
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(ValidationError::InvalidPerPage(_))));
    }

    #[test]
    fn test_match_mode_parsing() {
        assert_eq!("accent_insensitive".parse::<MatchMode>().unwrap(), MatchMode::AccentInsensitive);
        assert_eq!("Keywords".parse::<MatchMode>().unwrap(), MatchMode::Keywords);
        assert!("fuzzy".parse::<MatchMode>().is_err());
    }

    #[test]
    fn test_all_products_params() {
        let request = AllProductsParams {
            page: Some(2),
            per_page: Some(50),
            filter: Some("   ".to_string()),
            use_cache: Some(false),
        }
        .validate()
        .unwrap();

        assert_eq!(request.page, Some(2));
        assert_eq!(request.per_page, Some(50));
        assert_eq!(request.filter, None);
        assert!(!request.use_cache);
    }

    #[test]
    fn test_product_serializes_absent_fields_as_null() {
        let value = serde_json::to_value(Product::with_id("SKU-1")).unwrap();
        assert_eq!(value["id"], "SKU-1");
        assert!(value["brand"].is_null());
    }
}
