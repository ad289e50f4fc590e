//! AI-assisted extraction via a text-completion service.
//!
//! Last automated resort, and the only strategy used on the manual-paste
//! path (pattern parsing is too fragile for arbitrary pasted markup). The
//! service is treated as an opaque, rate-limited, occasionally-malformed
//! text generator: this module owns prompt construction and response-JSON
//! parsing, nothing else.

use crate::error::ExtractError;
use crate::normalize;
use crate::record::{ProductOption, ProductRecord, ProductVariant, WeightUnit};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Character budget for HTML sent to the model, to stay under context limits.
pub const MAX_HTML_CHARS: usize = 60_000;

/// Backoff schedule for rate-limited attempts. Transport-level only;
/// malformed model output is never retried.
const RETRY_DELAYS_MS: [u64; 3] = [1_000, 2_000, 4_000];

/// An opaque `(prompt) -> text` completion service.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ExtractError>;
}

/// OpenAI-compatible `/chat/completions` client.
///
/// Base URL, key, and model come from `PRODEX_AI_BASE_URL`,
/// `PRODEX_AI_API_KEY`, and `PRODEX_AI_MODEL`.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("PRODEX_AI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            std::env::var("PRODEX_AI_API_KEY").unwrap_or_default(),
            std::env::var("PRODEX_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
        )
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, ExtractError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let payload = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut attempt = 0usize;
        loop {
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await?;

            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();

            // Rate limiting gets the backoff schedule; everything else
            // fails immediately. The marker scan only applies to error
            // responses: a successful completion may legitimately quote
            // either phrase.
            let rate_limited = status == 429
                || (!(200..300).contains(&status)
                    && (body.contains("RESOURCE_EXHAUSTED")
                        || body.to_lowercase().contains("resource exhausted")));
            if rate_limited {
                if attempt < RETRY_DELAYS_MS.len() {
                    let delay = RETRY_DELAYS_MS[attempt];
                    attempt += 1;
                    warn!(attempt, delay_ms = delay, "completion rate-limited, backing off");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    continue;
                }
                return Err(ExtractError::Network(
                    "completion service rate limit: retries exhausted".into(),
                ));
            }

            if !(200..300).contains(&status) {
                return Err(ExtractError::Network(format!(
                    "completion service returned status {status}"
                )));
            }

            let value: Value = serde_json::from_str(&body)
                .map_err(|e| ExtractError::Malformed(format!("completion envelope: {e}")))?;
            let text = value["choices"][0]["message"]["content"]
                .as_str()
                .ok_or_else(|| {
                    ExtractError::Malformed("completion envelope missing content".into())
                })?;
            return Ok(text.to_string());
        }
    }
}

/// The AI extraction strategy.
pub struct AiExtractor {
    service: Arc<dyn CompletionService>,
}

impl AiExtractor {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Ask the model for a product record from `html`.
    ///
    /// Unparsable model output is a hard failure for this attempt; only
    /// transport-level rate limiting is retried, inside the service.
    pub async fn extract(&self, html: &str, url: &str) -> Result<ProductRecord, ExtractError> {
        let context = truncate_chars(html, MAX_HTML_CHARS);
        let prompt = build_prompt(url, context);

        let text = self.service.complete(&prompt).await?;
        debug!(chars = text.len(), "completion response received");

        let json = strip_code_fence(&text);
        let value: Value = parse_json_lenient(json)?;
        Ok(normalize::normalize_record(record_from_json(&value)))
    }
}

fn build_prompt(url: &str, html: &str) -> String {
    format!(
        r#"You are a product data extraction expert. Extract product information from this e-commerce page HTML.

Return ONLY a JSON object, no prose, with exactly these keys:
  productName (string), description (string, short HTML allowed),
  price (decimal string, no currency symbol), compareAtPrice (decimal string or ""),
  images (array of absolute http(s) URLs), vendor (string), productType (string),
  tags (comma-separated string), sku (string), barcode (string),
  weight (decimal string), weightUnit (one of "kg","g","lb","oz"),
  options (array of {{name, values}}), variants (array of {{title, price, sku, barcode, quantity}}).

Use "" or [] for anything not present on the page. Never invent prices.

PAGE URL: {url}

PAGE HTML:
{html}"#
    )
}

/// Truncate on a char boundary, never mid-codepoint.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Strip a markdown code-fence wrapper (```json ... ```), if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse model output as JSON; if the direct parse fails, retry on the
/// largest brace-delimited substring (models sometimes wrap JSON in prose).
fn parse_json_lenient(text: &str) -> Result<Value, ExtractError> {
    match serde_json::from_str(text) {
        Ok(v) => Ok(v),
        Err(first_err) => {
            if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
                if start < end {
                    if let Ok(v) = serde_json::from_str(&text[start..=end]) {
                        return Ok(v);
                    }
                }
            }
            Err(ExtractError::Malformed(format!(
                "completion JSON: {first_err}"
            )))
        }
    }
}

/// Map the model's JSON object onto the output contract, tolerating numbers
/// where strings are expected and skipping anything malformed.
fn record_from_json(v: &Value) -> ProductRecord {
    let mut record = ProductRecord {
        product_name: str_field(v, "productName"),
        description: str_field(v, "description"),
        price: str_field(v, "price"),
        compare_at_price: str_field(v, "compareAtPrice"),
        vendor: str_field(v, "vendor"),
        product_type: str_field(v, "productType"),
        tags: str_field(v, "tags"),
        sku: str_field(v, "sku"),
        barcode: str_field(v, "barcode"),
        weight: str_field(v, "weight"),
        weight_unit: parse_weight_unit(&str_field(v, "weightUnit")),
        ..Default::default()
    };

    if let Some(images) = v.get("images").and_then(|i| i.as_array()) {
        for img in images {
            if let Some(s) = img.as_str() {
                let s = s.trim();
                if (s.starts_with("http://") || s.starts_with("https://"))
                    && !record.images.contains(&s.to_string())
                {
                    record.images.push(s.to_string());
                }
            }
        }
    }

    if let Some(options) = v.get("options").and_then(|o| o.as_array()) {
        for opt in options {
            let name = str_field(opt, "name");
            if name.is_empty() {
                continue;
            }
            let values = opt
                .get("values")
                .and_then(|vs| vs.as_array())
                .map(|vs| {
                    vs.iter()
                        .filter_map(|x| x.as_str())
                        .map(|s| s.to_string())
                        .collect()
                })
                .unwrap_or_default();
            record.options.push(ProductOption { name, values });
        }
    }

    if let Some(variants) = v.get("variants").and_then(|o| o.as_array()) {
        for var in variants {
            let title = str_field(var, "title");
            if title.is_empty() {
                continue;
            }
            record.variants.push(ProductVariant {
                title,
                price: str_field(var, "price"),
                sku: str_field(var, "sku"),
                barcode: str_field(var, "barcode"),
                quantity: var
                    .get("quantity")
                    .and_then(|q| q.as_u64())
                    .unwrap_or(0) as u32,
            });
        }
    }

    record
}

fn str_field(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn parse_weight_unit(s: &str) -> WeightUnit {
    match s.trim().to_lowercase().as_str() {
        "kg" | "kgs" | "kilogram" | "kilograms" => WeightUnit::Kg,
        "lb" | "lbs" | "pound" | "pounds" => WeightUnit::Lb,
        "oz" | "ounce" | "ounces" => WeightUnit::Oz,
        _ => WeightUnit::G,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCompletion(String);

    #[async_trait]
    impl CompletionService for FixedCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, ExtractError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn code_fence_stripping() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "é".repeat(10);
        assert_eq!(truncate_chars(&s, 3), "ééé");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn lenient_parse_recovers_embedded_json() {
        let v = parse_json_lenient("Here you go: {\"price\": \"9.99\"} hope that helps").unwrap();
        assert_eq!(v["price"], "9.99");
        assert!(parse_json_lenient("no json at all").is_err());
    }

    #[tokio::test]
    async fn extract_parses_and_normalizes() {
        let response = r#"```json
        {"productName": "**AI Widget**", "price": "19.99", "compareAtPrice": "",
         "images": ["http://a.com/1.jpg", "not-a-url", "http://a.com/1.jpg"],
         "weightUnit": "pounds", "weight": "1.5",
         "variants": [{"title": "Small", "price": "19.99", "quantity": 3}]}
        ```"#;
        let extractor = AiExtractor::new(Arc::new(FixedCompletion(response.into())));
        let record = extractor.extract("<html></html>", "http://x.com").await.unwrap();

        assert_eq!(record.product_name, "AI Widget");
        assert_eq!(record.compare_at_price, "23.99");
        assert_eq!(record.images, vec!["http://a.com/1.jpg"]);
        assert_eq!(record.weight_unit, WeightUnit::Lb);
        assert_eq!(record.variants.len(), 1);
        assert_eq!(record.variants[0].quantity, 3);
    }

    #[tokio::test]
    async fn malformed_output_is_a_hard_failure() {
        let extractor = AiExtractor::new(Arc::new(FixedCompletion("not json".into())));
        let err = extractor.extract("<html></html>", "http://x.com").await.unwrap_err();
        assert!(matches!(err, ExtractError::Malformed(_)));
    }
}
