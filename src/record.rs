//! The uniform output contract.
//!
//! Every extraction strategy — specialized, generic, or AI — funnels into
//! [`ProductRecord`]. Absence is always the empty string or empty vec, never
//! `None`: downstream consumers (the Shopify product-creation layer) branch
//! on the outcome tag, not on field presence.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized product record, ready for downstream import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductRecord {
    /// Cleaned title, free of markdown artifacts and repeated punctuation.
    pub product_name: String,
    /// Description as an HTML snippet.
    pub description: String,
    /// Selling price as a decimal string, currency symbol stripped where the
    /// source provides one separately.
    pub price: String,
    /// Pre-discount / MRP price. When both prices are numeric this is >= the
    /// selling price (enforced by normalization, never by extractors).
    pub compare_at_price: String,
    /// Deduplicated absolute http(s) image URLs, in page order.
    pub images: Vec<String>,
    pub vendor: String,
    pub product_type: String,
    pub tags: String,
    pub sku: String,
    pub barcode: String,
    pub weight: String,
    pub weight_unit: WeightUnit,
    pub options: Vec<ProductOption>,
    pub variants: Vec<ProductVariant>,
}

impl ProductRecord {
    /// Whether the record carries any usable data at all.
    ///
    /// A specialized extractor that produced neither a name nor a single
    /// image is treated as a miss and the pipeline falls back.
    pub fn has_meaningful_data(&self) -> bool {
        !self.product_name.is_empty() || !self.images.is_empty()
    }
}

/// A product option axis, e.g. `Size: [S, M, L]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductOption {
    pub name: String,
    pub values: Vec<String>,
}

/// A purchasable variant row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductVariant {
    pub title: String,
    pub price: String,
    pub sku: String,
    pub barcode: String,
    pub quantity: u32,
}

/// Weight unit of the output contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    Kg,
    #[default]
    G,
    Lb,
    Oz,
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WeightUnit::Kg => "kg",
            WeightUnit::G => "g",
            WeightUnit::Lb => "lb",
            WeightUnit::Oz => "oz",
        };
        f.write_str(s)
    }
}

/// Terminal result of one `extract` call.
///
/// Callers branch on the tag. `ManualHtmlRequired` is an escalation, not an
/// error: the caller re-invokes with pasted page source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Success { record: ProductRecord },
    ManualHtmlRequired {
        message: String,
        instructions: Vec<String>,
    },
    Failure { reason: String },
}

impl ExtractionOutcome {
    pub fn success(record: ProductRecord) -> Self {
        ExtractionOutcome::Success { record }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success { .. })
    }
}

/// Response from the plain-HTTP fetch stage.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_empty_not_null() {
        let r = ProductRecord::default();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["productName"], "");
        assert_eq!(v["compareAtPrice"], "");
        assert_eq!(v["images"], serde_json::json!([]));
        assert_eq!(v["weightUnit"], "g");
    }

    #[test]
    fn meaningful_data_is_name_or_images() {
        let mut r = ProductRecord::default();
        assert!(!r.has_meaningful_data());
        r.images.push("http://a.com/1.jpg".into());
        assert!(r.has_meaningful_data());
        r.images.clear();
        r.product_name = "Widget".into();
        assert!(r.has_meaningful_data());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let o = ExtractionOutcome::Failure {
            reason: "nope".into(),
        };
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["outcome"], "failure");
        assert_eq!(v["reason"], "nope");
    }
}
