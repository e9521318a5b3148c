// ABOUTME: Grading pipeline that turns a product record into an LLM health verdict
// ABOUTME: Builds the product context payload, issues the JSON-mode completion, parses the verdict
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

//! # Grading Pipeline
//!
//! One call, one verdict: a fixed subset of the product record is serialized
//! as the user message, the grading rubric rides along as the system prompt,
//! and the assistant's JSON payload is parsed into a [`Verdict`].

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::errors::AppError;
use crate::llm::{prompts, ChatMessage, ChatRequest, LlmProvider};
use crate::models::{ProductRecord, Verdict};

/// The fixed product field subset sent to the model
///
/// Only these fields influence the verdict; everything else in the record
/// is presentation data.
#[derive(Debug, Serialize)]
struct ProductContext<'a> {
    name: Option<&'a str>,
    brands: Option<&'a str>,
    nutriments: NutrimentContext,
    ingredients: Option<&'a str>,
    additives: &'a [String],
}

/// Nutriment subset with prompt-friendly key names
#[derive(Debug, Serialize)]
struct NutrimentContext {
    energy_kcal: Option<f64>,
    sugar: Option<f64>,
    salt: Option<f64>,
    fat: Option<f64>,
    protein: Option<f64>,
    fiber: Option<f64>,
}

impl<'a> ProductContext<'a> {
    fn from_record(product: &'a ProductRecord) -> Self {
        Self {
            name: product.product_name.as_deref(),
            brands: product.brands.as_deref(),
            nutriments: NutrimentContext {
                energy_kcal: product.nutriments.energy_kcal_100g,
                sugar: product.nutriments.sugars_100g,
                salt: product.nutriments.salt_100g,
                fat: product.nutriments.saturated_fat_100g,
                protein: product.nutriments.proteins_100g,
                fiber: product.nutriments.fiber_100g,
            },
            ingredients: product.ingredients_text.as_deref(),
            additives: &product.additives_original_tags,
        }
    }
}

/// Issues grading requests and parses verdicts
pub struct GradingEngine {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl GradingEngine {
    /// Create a grading engine over a provider with a fixed model id
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Grade a product
    ///
    /// Issues exactly one completion request.
    ///
    /// # Errors
    ///
    /// Returns the provider's error on transport/API failure, or a
    /// serialization error if the model's output is not a valid verdict.
    #[instrument(skip(self, product), fields(product = %product.display_name()))]
    pub async fn grade(&self, product: &ProductRecord) -> Result<Verdict, AppError> {
        let context = ProductContext::from_record(product);
        let payload = serde_json::to_string(&context)
            .map_err(|e| AppError::serialization(format!("product context: {e}")))?;

        let request = ChatRequest::new(vec![
            ChatMessage::system(prompts::grading_system_prompt()),
            ChatMessage::user(payload),
        ])
        .with_model(self.model.clone())
        .with_json_mode();

        let response = self.provider.complete(&request).await?;
        debug!("Grading response: {} chars", response.content.len());

        parse_verdict(&response.content)
    }
}

/// Parse a verdict from the assistant's reply
///
/// Tolerates a fenced code block and surrounding prose around the JSON
/// object; anything without a parseable object is a serialization error.
///
/// # Errors
///
/// Returns `SerializationError` for malformed JSON or out-of-set grades.
pub fn parse_verdict(content: &str) -> Result<Verdict, AppError> {
    let json = extract_json_object(content).ok_or_else(|| {
        AppError::serialization(format!(
            "no JSON object in grading response: {:?}",
            content.chars().take(120).collect::<String>()
        ))
    })?;

    serde_json::from_str(json)
        .map_err(|e| AppError::serialization(format!("malformed verdict: {e}")))
}

/// Slice the first top-level JSON object out of a reply
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}
