// ABOUTME: Main library entry point for the NutriJudge nutrition grader
// ABOUTME: Wires the scan controller, product lookup, grading pipeline, and chat session
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

#![deny(unsafe_code)]

//! # NutriJudge
//!
//! Barcode-to-verdict nutrition grading: scan a product barcode, pull its
//! nutritional data from Open Food Facts, ask a hosted LLM for a letter-grade
//! health verdict, then chat about the result.
//!
//! ## Features
//!
//! - **Screen-flow controller**: home → scan → confirm → analyzing → result
//!   card → chat, with alert and haptic effects surfaced as typed values
//! - **Product lookup**: Open Food Facts client with caching and rate limiting
//! - **Grading pipeline**: JSON-mode completion parsed into a strict verdict
//! - **Chat**: append-only conversation with topic kickoffs and image turns
//!   (inlined base64 for vision models)
//!
//! ## Architecture
//!
//! The crate follows a modular architecture:
//! - **Session**: the view-state controller driving the flow
//! - **External**: the Open Food Facts barcode client
//! - **LLM**: provider abstraction over OpenAI-compatible endpoints
//! - **Grading**: product-context assembly and verdict parsing
//! - **Chat**: conversation state and completion plumbing
//! - **Config**: environment-only configuration management
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nutrijudge::config::AppConfig;
//! use nutrijudge::errors::AppResult;
//! use nutrijudge::external::OpenFoodFactsClient;
//! use nutrijudge::llm::OpenAiCompatibleProvider;
//! use nutrijudge::session::ScanSession;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = AppConfig::from_env()?;
//!     let products = Arc::new(OpenFoodFactsClient::new(config.lookup.clone())?);
//!     let provider = Arc::new(OpenAiCompatibleProvider::from_llm_config(&config.llm)?);
//!
//!     let session = ScanSession::new(products, provider, &config.llm);
//!     session.start_scanning();
//!     let effects = session.submit_barcode("3017620422003").await;
//!     println!("{effects:?}");
//!     Ok(())
//! }
//! ```

/// Chat session management for follow-up conversations
pub mod chat;

/// Configuration management (environment-only)
pub mod config;

/// Unified error handling system with standard error codes
pub mod errors;

/// External API clients (Open Food Facts)
pub mod external;

/// Grading pipeline from product record to verdict
pub mod grading;

/// Result-card derivations (topic summaries, verdict checklist)
pub mod insights;

/// LLM provider abstraction and OpenAI-compatible client
pub mod llm;

/// Structured logging configuration
pub mod logging;

/// Core domain types (product, grade, verdict)
pub mod models;

/// Screen-flow controller for the scan-to-verdict session
pub mod session;
