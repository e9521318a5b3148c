// ABOUTME: System prompts and context templates for LLM interactions
// ABOUTME: Provides the grading rubric prompt and chat persona contexts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

//! # System Prompts
//!
//! System prompts and per-call context templates. The static grading rubric
//! is loaded at compile time from a markdown file; chat contexts are built
//! at runtime from the current product and verdict.

use crate::models::{ChatTopic, ProductRecord, Verdict};

/// Grading rubric and persona for the verdict call
///
/// Instructs the model to act as a strict nutritionist, grade on the S-F
/// scale, and emit JSON only.
pub const GRADING_SYSTEM_PROMPT: &str = include_str!("grading_system.md");

/// Get the system prompt for the grading call
#[must_use]
pub const fn grading_system_prompt() -> &'static str {
    GRADING_SYSTEM_PROMPT
}

/// System context for chat turns about a scanned product
#[must_use]
pub fn product_chat_context(product: &ProductRecord, verdict: &Verdict) -> String {
    format!(
        "CONTEXT: User is asking about {name}. NUTRITION DATA: {nutriments}. \
         VERDICT: {verdict}. PERSONA: Blunt food critic. Short answers. No fluff.",
        name = product.display_name(),
        nutriments = to_json(&product.nutriments),
        verdict = to_json(verdict),
    )
}

/// System context for a free-standing chat with no scanned product
#[must_use]
pub const fn freestyle_chat_context() -> &'static str {
    "CONTEXT: User uploaded food image or is asking generally. PERSONA: Identify food, \
     estimate calories, grade it (S-F). Short, confident."
}

/// System context for a topic kickoff fired from a result-card tile
#[must_use]
pub fn topic_chat_context(product: &ProductRecord, verdict: &Verdict, topic: ChatTopic) -> String {
    format!(
        "Current Product Context: {nutriments}. Analysis: {verdict}. Focus on health \
         impacts. The user is specifically interested in {topic}.",
        nutriments = to_json(&product.nutriments),
        verdict = to_json(verdict),
        topic = topic.as_str(),
    )
}

/// The user-visible prompt fired automatically for a selected topic
#[must_use]
pub const fn topic_kickoff_prompt(topic: ChatTopic) -> &'static str {
    match topic {
        ChatTopic::Nutrition => "Analyze the nutritional values (macros, calories) in detail.",
        ChatTopic::Health => {
            "What are the specific health risks, additives, or harmful ingredients?"
        }
        ChatTopic::Ingredients => "Analyze the ingredient quality and origin.",
        ChatTopic::Alternatives => "Suggest healthier alternatives to this product.",
    }
}

/// Caption attached to an uploaded image turn
#[must_use]
pub const fn image_analysis_prompt() -> &'static str {
    "Analyze this image for nutritional value and grade it."
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_owned())
}
