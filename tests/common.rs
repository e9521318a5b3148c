// ABOUTME: Shared test utilities and fixtures for integration tests
// ABOUTME: Provides quiet logging setup, config fixtures, and sample products
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge
#![allow(dead_code)]

//! Shared test utilities for `nutrijudge`

use std::sync::Once;

use nutrijudge::config::LlmConfig;
use nutrijudge::models::{Nutriments, ProductRecord};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN, // Default to WARN for quiet tests
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// LLM configuration fixture with distinct model ids per call type
pub fn test_llm_config() -> LlmConfig {
    LlmConfig {
        base_url: "https://example.test/v1".to_owned(),
        api_key: "test-key".to_owned(),
        grading_model: "grader-model".to_owned(),
        chat_model: "chat-model".to_owned(),
        vision_model: "vision-model".to_owned(),
    }
}

/// A sugary cereal with additives and palm oil
pub fn cereal_product() -> ProductRecord {
    ProductRecord {
        code: Some("7622300336738".to_owned()),
        product_name: Some("Choco Crunch Cereal".to_owned()),
        brands: Some("Morning Foods".to_owned()),
        nutriments: Nutriments {
            energy_kcal_100g: Some(410.0),
            sugars_100g: Some(28.0),
            salt_100g: Some(0.6),
            saturated_fat_100g: Some(3.1),
            proteins_100g: Some(6.0),
            fiber_100g: Some(4.2),
            ..Nutriments::default()
        },
        ingredients_text: Some("Cereal flours, sugar, palm oil, cocoa".to_owned()),
        additives_tags: vec!["en:e322".to_owned(), "en:e500".to_owned()],
        additives_original_tags: vec!["E322".to_owned(), "E500".to_owned()],
        ..ProductRecord::default()
    }
}

/// A scripted verdict reply for the given grade letter
pub fn verdict_reply(grade: &str) -> String {
    format!(
        r#"{{"grade": "{grade}", "reasoning": "Graded {grade}.", "health_risks": ["Risk one", "Risk two"]}}"#
    )
}
