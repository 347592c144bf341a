// Dataset module
// Loads the support Record Set (FAQs, product catalog, contact info) from JSON


use anyhow::{Context, Result};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// The loaded dataset. Every key is optional and defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordSet {
    pub faqs: Vec<FaqEntry>,
    /// Product categories in document order
    #[serde(deserialize_with = "ordered_categories")]
    pub bikes: Vec<ProductCategory>,
    pub customer_service: CustomerService,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FaqEntry {
    #[serde(deserialize_with = "lenient_text")]
    pub category: String,
    #[serde(deserialize_with = "lenient_text")]
    pub question: String,
    #[serde(deserialize_with = "lenient_text")]
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductCategory {
    pub name: String,
    pub products: Vec<ProductEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProductEntry {
    #[serde(deserialize_with = "lenient_text")]
    pub model: String,
    #[serde(deserialize_with = "lenient_text")]
    pub engine_cc: String,
    #[serde(deserialize_with = "lenient_text")]
    pub power_ps: String,
    #[serde(deserialize_with = "lenient_text")]
    pub torque_nm: String,
    #[serde(deserialize_with = "lenient_text")]
    pub starting_price_inr: String,
    /// `None` when absent or null
    #[serde(deserialize_with = "lenient_optional_text")]
    pub on_road_price_hyderabad_inr: Option<String>,
    #[serde(deserialize_with = "lenient_text_list")]
    pub available_colors: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub key_features: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CustomerService {
    pub contact_info: ContactInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
    #[serde(deserialize_with = "lenient_text")]
    pub toll_free_number: String,
    #[serde(deserialize_with = "lenient_text")]
    pub email: String,
    #[serde(deserialize_with = "lenient_text")]
    pub whatsapp_number: String,
}

impl RecordSet {
    #[inline]
    pub fn product_count(&self) -> usize {
        self.bikes.iter().map(|c| c.products.len()).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faqs.is_empty() && self.product_count() == 0
    }
}

/// Load the Record Set from `path`. A missing file yields an empty Record Set.
#[inline]
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<RecordSet> {
    let path = path.as_ref();

    if !path.exists() {
        info!(
            "Dataset {} not found, continuing with an empty dataset",
            path.display()
        );
        return Ok(RecordSet::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

    let record_set = parse_dataset(&content)
        .with_context(|| format!("Failed to parse dataset: {}", path.display()))?;

    debug!(
        "Loaded dataset with {} FAQs and {} products in {} categories",
        record_set.faqs.len(),
        record_set.product_count(),
        record_set.bikes.len()
    );

    Ok(record_set)
}

#[inline]
pub fn parse_dataset(content: &str) -> Result<RecordSet> {
    // A JSON `null` document is treated like a missing file
    let value: Value = serde_json::from_str(content).context("Dataset is not valid JSON")?;
    if value.is_null() {
        return Ok(RecordSet::default());
    }
    serde_json::from_value(value).context("Dataset does not have the expected shape")
}

/// Render any JSON value as display text
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(render_value(&value))
}

fn lenient_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(if value.is_null() {
        None
    } else {
        Some(render_value(&value))
    })
}

fn lenient_text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(render_value).collect(),
        other => vec![render_value(&other)],
    })
}

/// Collect the category map as a list so categories keep their document order
fn ordered_categories<'de, D>(deserializer: D) -> Result<Vec<ProductCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    struct CategoriesVisitor;

    impl<'de> Visitor<'de> for CategoriesVisitor {
        type Value = Vec<ProductCategory>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a map of category name to product list")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut categories = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, products)) = map.next_entry::<String, Option<Vec<ProductEntry>>>()? {
                categories.push(ProductCategory {
                    name,
                    products: products.unwrap_or_default(),
                });
            }
            Ok(categories)
        }
    }

    deserializer.deserialize_any(CategoriesVisitor)
}
