//! Normalization from raw store records to the canonical [`Product`] and
//! [`Category`] shapes.
//!
//! Three product shapes are accepted:
//! - the store API shape (`name` keyed by locale, `variants`, `images`, ...),
//! - the spreadsheet export used by the local mirror (`Nombre`, `Marca`, ...),
//! - canonical records, as written back by a previous aggregation pass.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{Category, Product};

/// Locales tried, in order, when a field is keyed by language
pub const PREFERRED_LANGUAGES: [&str; 3] = ["es", "en", "pt"];

/// Display name used when a category has no name in any preferred language
pub const UNNAMED_CATEGORY: &str = "Sin nombre";

const LOCAL_ID_KEYS: [&str; 7] = ["ID", "Id", "id", "SKU", "sku", "Código", "Codigo"];
const LOCAL_URL_KEYS: [&str; 4] = ["URL", "Url", "url", "Enlace"];
const LOCAL_IMAGE_KEYS: [&str; 4] = ["Imagen", "Image", "image_url", "Imagen URL"];

/// Parent category as sent upstream: a bare id, or a nested category object
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParentRef {
    Id(i64),
    Text(String),
    Nested {
        #[serde(default)]
        id: Option<Value>,
    },
    Other(Value),
}

impl ParentRef {
    /// Resolve to a bare identifier
    pub fn id(&self) -> Option<i64> {
        match self {
            ParentRef::Id(id) => Some(*id),
            ParentRef::Text(text) => text.trim().parse().ok(),
            ParentRef::Nested { id } => id.as_ref().and_then(as_i64),
            ParentRef::Other(_) => None,
        }
    }
}

/// Category exactly as the store API returns it
#[derive(Debug, Clone, Deserialize)]
struct RawCategory {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: Value,
    #[serde(default)]
    description: Value,
    #[serde(default)]
    parent: Option<ParentRef>,
    #[serde(default)]
    handle: Value,
    #[serde(default)]
    position: Value,
    #[serde(default)]
    created_at: Value,
}

/// Normalize one raw category. Returns `None` when the record is not an object.
pub fn normalize_category(raw: &Value) -> Option<Category> {
    if !raw.is_object() {
        return None;
    }
    let raw: RawCategory = serde_json::from_value(raw.clone()).ok()?;

    Some(Category {
        id: as_i64(&raw.id),
        name: localized_in(&raw.name, &["es", "en"]).unwrap_or_else(|| UNNAMED_CATEGORY.to_string()),
        description: localized_in(&raw.description, &["es", "en"]),
        parent_id: raw.parent.as_ref().and_then(ParentRef::id),
        handle: localized(&raw.handle),
        position: as_i64(&raw.position),
        created_at: text(&raw.created_at),
    })
}

/// Normalize one raw product of any accepted shape.
///
/// `fallback_id` is used when the record carries no identifier of its own.
/// Returns `None` when the record is not an object.
pub fn normalize_product(raw: &Value, fallback_id: &str) -> Option<Product> {
    let object = raw.as_object()?;
    if is_local_export(object) {
        Some(normalize_local_product(object, fallback_id))
    } else {
        Some(normalize_store_product(object, fallback_id))
    }
}

fn is_local_export(object: &Map<String, Value>) -> bool {
    object.contains_key("Nombre") || object.contains_key("Marca") || object.contains_key("Talle")
}

fn normalize_local_product(object: &Map<String, Value>, fallback_id: &str) -> Product {
    let id = first_key(object, &LOCAL_ID_KEYS)
        .and_then(text)
        .unwrap_or_else(|| fallback_id.to_string());

    let field = |key: &str| object.get(key).and_then(text);

    Product {
        id,
        name: field("Nombre"),
        brand: field("Marca"),
        category: field("Categoría").or_else(|| field("Categoria")),
        color: field("Color"),
        size: field("Talle"),
        price: object.get("Precio").and_then(as_f64),
        stock: object.get("Stock").and_then(as_i64),
        url: first_key(object, &LOCAL_URL_KEYS).and_then(text),
        image_url: first_key(object, &LOCAL_IMAGE_KEYS).and_then(text),
    }
}

fn normalize_store_product(object: &Map<String, Value>, fallback_id: &str) -> Product {
    let id = object
        .get("id")
        .and_then(text)
        .unwrap_or_else(|| fallback_id.to_string());

    let variants: &[Value] = object
        .get("variants")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let first_variant = variants.first().and_then(Value::as_object);

    let attributes: Vec<String> = object
        .get("attributes")
        .and_then(Value::as_array)
        .map(|attrs| {
            attrs
                .iter()
                .map(|attr| localized(attr).unwrap_or_default().to_lowercase())
                .collect()
        })
        .unwrap_or_default();

    let variant_value = |names: &[&str]| -> Option<String> {
        let index = attributes.iter().position(|attr| names.contains(&attr.as_str()))?;
        let values = first_variant?.get("values")?.as_array()?;
        values.get(index).and_then(localized)
    };

    let price = first_variant
        .and_then(|v| v.get("promotional_price").filter(|p| !p.is_null()).or_else(|| v.get("price")))
        .and_then(as_f64)
        .or_else(|| object.get("price").and_then(as_f64));

    // `stock: null` on any variant means unlimited stock upstream
    let stock = if variants.is_empty() {
        object.get("stock").and_then(as_i64)
    } else {
        variants
            .iter()
            .map(|v| v.get("stock").and_then(as_i64))
            .sum::<Option<i64>>()
    };

    let category = object
        .get("categories")
        .and_then(Value::as_array)
        .and_then(|cats| cats.iter().find_map(|c| c.get("name").and_then(localized)))
        .or_else(|| object.get("category").and_then(localized));

    let image_url = object
        .get("images")
        .and_then(Value::as_array)
        .and_then(|images| images.first())
        .and_then(|image| image.get("src"))
        .and_then(text)
        .or_else(|| object.get("image_url").and_then(text));

    Product {
        id,
        name: object.get("name").and_then(localized),
        brand: object.get("brand").and_then(localized),
        category,
        color: variant_value(&["color", "colour", "cor"])
            .or_else(|| object.get("color").and_then(localized)),
        size: variant_value(&["talle", "talla", "size", "tamaño", "tamanho"])
            .or_else(|| object.get("size").and_then(localized)),
        price,
        stock,
        url: object
            .get("canonical_url")
            .and_then(text)
            .or_else(|| object.get("url").and_then(text)),
        image_url,
    }
}

fn first_key<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key).filter(|v| !v.is_null()))
}

/// Text in the first preferred language, or the plain string itself
pub fn localized(value: &Value) -> Option<String> {
    localized_in(value, &PREFERRED_LANGUAGES).or_else(|| match value {
        Value::Object(map) => map.values().find_map(text),
        _ => None,
    })
}

fn localized_in(value: &Value, languages: &[&str]) -> Option<String> {
    match value {
        Value::Object(map) => languages.iter().find_map(|lang| map.get(*lang).and_then(text)),
        other => text(other),
    }
}

/// Scalar rendered as trimmed, non-empty text
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok().or_else(|| parse_decimal(s).map(|f| f as i64)),
        _ => None,
    }
}

/// Parse "12999.00", "$ 12999" or "12999,50"
fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.contains(',') && !cleaned.contains('.') {
        cleaned.replace(',', ".").parse().ok()
    } else {
        cleaned.replace(',', "").parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_prefers_spanish_then_english() {
        let es = normalize_category(&json!({"id": 1, "name": {"es": "Zapatillas", "en": "Sneakers"}})).unwrap();
        assert_eq!(es.name, "Zapatillas");

        let en = normalize_category(&json!({"id": 2, "name": {"es": "", "en": "Sneakers"}})).unwrap();
        assert_eq!(en.name, "Sneakers");

        let none = normalize_category(&json!({"id": 3, "name": {"pt": "Tênis"}})).unwrap();
        assert_eq!(none.name, UNNAMED_CATEGORY);

        let missing = normalize_category(&json!({"id": 4})).unwrap();
        assert_eq!(missing.name, UNNAMED_CATEGORY);
        assert_eq!(missing.description, None);
    }

    #[test]
    fn test_category_parent_union() {
        let bare = normalize_category(&json!({"id": 10, "parent": 7})).unwrap();
        assert_eq!(bare.parent_id, Some(7));

        let nested = normalize_category(&json!({"id": 11, "parent": {"id": 8, "name": {"es": "Calzado"}}})).unwrap();
        assert_eq!(nested.parent_id, Some(8));

        let null = normalize_category(&json!({"id": 12, "parent": null})).unwrap();
        assert_eq!(null.parent_id, None);

        let empty = normalize_category(&json!({"id": 13, "parent": {}})).unwrap();
        assert_eq!(empty.parent_id, None);

        let text = normalize_category(&json!({"id": 14, "parent": "9"})).unwrap();
        assert_eq!(text.parent_id, Some(9));
    }

    #[test]
    fn test_category_optional_fields() {
        let category = normalize_category(&json!({
            "id": 5,
            "name": {"es": "Remeras"},
            "description": {"es": "Remeras de algodón"},
            "handle": {"es": "remeras"},
            "position": 3,
            "created_at": "2024-01-10T12:00:00+0000",
            "subcategories": [6, 7]
        }))
        .unwrap();

        assert_eq!(category.id, Some(5));
        assert_eq!(category.description.as_deref(), Some("Remeras de algodón"));
        assert_eq!(category.handle.as_deref(), Some("remeras"));
        assert_eq!(category.position, Some(3));
        assert_eq!(category.created_at.as_deref(), Some("2024-01-10T12:00:00+0000"));
    }

    #[test]
    fn test_category_rejects_non_objects() {
        assert!(normalize_category(&json!("Zapatillas")).is_none());
        assert!(normalize_category(&json!(42)).is_none());
    }

    #[test]
    fn test_store_product_is_trimmed_to_canonical_fields() {
        let raw = json!({
            "id": 1234,
            "name": {"es": "Zapatilla Nike", "en": "Nike Sneaker"},
            "brand": "Nike",
            "description": {"es": "<p>long html</p>"},
            "canonical_url": "https://tienda.example/productos/zapatilla-nike",
            "categories": [{"id": 1, "name": {"es": "Calzado"}}],
            "attributes": [{"es": "Color"}, {"es": "Talle"}],
            "variants": [
                {"price": "59999.00", "promotional_price": null, "stock": 2, "values": [{"es": "Negro"}, {"es": "42"}]},
                {"price": "59999.00", "stock": 3, "values": [{"es": "Negro"}, {"es": "43"}]}
            ],
            "images": [{"src": "https://cdn.example/1.jpg"}, {"src": "https://cdn.example/2.jpg"}]
        });

        let product = normalize_product(&raw, "fallback").unwrap();
        assert_eq!(product.id, "1234");
        assert_eq!(product.name.as_deref(), Some("Zapatilla Nike"));
        assert_eq!(product.brand.as_deref(), Some("Nike"));
        assert_eq!(product.category.as_deref(), Some("Calzado"));
        assert_eq!(product.color.as_deref(), Some("Negro"));
        assert_eq!(product.size.as_deref(), Some("42"));
        assert_eq!(product.price, Some(59999.0));
        assert_eq!(product.stock, Some(5));
        assert_eq!(product.url.as_deref(), Some("https://tienda.example/productos/zapatilla-nike"));
        assert_eq!(product.image_url.as_deref(), Some("https://cdn.example/1.jpg"));
    }

    #[test]
    fn test_store_product_unlimited_stock() {
        let raw = json!({
            "id": 1,
            "variants": [{"price": "10.00", "stock": 4}, {"price": "10.00", "stock": null}]
        });
        let product = normalize_product(&raw, "x").unwrap();
        assert_eq!(product.stock, None);
        assert_eq!(product.price, Some(10.0));
    }

    #[test]
    fn test_store_product_promotional_price_wins() {
        let raw = json!({"id": 1, "variants": [{"price": "100.00", "promotional_price": "80.00"}]});
        assert_eq!(normalize_product(&raw, "x").unwrap().price, Some(80.0));
    }

    #[test]
    fn test_local_export_product() {
        let raw = json!({
            "SKU": "SKU-1",
            "Nombre": "Zapatilla Nike",
            "Marca": "Nike",
            "Categoría": "Calzado",
            "Color": "Negro",
            "Talle": 42,
            "Stock": 3.0,
            "Precio": "$ 59999,50"
        });

        let product = normalize_product(&raw, "products_1.json#0").unwrap();
        assert_eq!(product.id, "SKU-1");
        assert_eq!(product.size.as_deref(), Some("42"));
        assert_eq!(product.stock, Some(3));
        assert_eq!(product.price, Some(59999.5));
        assert_eq!(product.url, None);
    }

    #[test]
    fn test_fallback_id() {
        let product = normalize_product(&json!({"Nombre": "Gorra"}), "products_2.json#7").unwrap();
        assert_eq!(product.id, "products_2.json#7");
    }

    #[test]
    fn test_canonical_records_round_trip() {
        let mut canonical = Product::with_id("77");
        canonical.name = Some("Buzo".to_string());
        canonical.color = Some("Gris".to_string());
        canonical.size = Some("M".to_string());
        canonical.price = Some(1500.0);
        canonical.stock = Some(2);
        canonical.category = Some("Abrigos".to_string());
        canonical.url = Some("https://tienda.example/buzo".to_string());

        let raw = serde_json::to_value(&canonical).unwrap();
        assert_eq!(normalize_product(&raw, "x").unwrap(), canonical);
    }

    #[test]
    fn test_non_object_products_are_skipped() {
        assert!(normalize_product(&json!(["a"]), "x").is_none());
        assert!(normalize_product(&json!(null), "x").is_none());
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("12999.00"), Some(12999.0));
        assert_eq!(parse_decimal("$ 1,299.50"), Some(1299.5));
        assert_eq!(parse_decimal("99,9"), Some(99.9));
        assert_eq!(parse_decimal("n/a"), None);
    }
}
