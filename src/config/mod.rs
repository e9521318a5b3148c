// ABOUTME: Configuration management module for centralized application settings
// ABOUTME: Environment-only configuration covering the LLM endpoint and the product lookup client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

//! Configuration module for NutriJudge
//!
//! Centralized, environment-only configuration management: `AppConfig` is
//! parsed from environment variables along with the strongly typed log
//! level and deployment environment enums.

/// Environment and application configuration
pub mod environment;

pub use environment::{AppConfig, Environment, LlmConfig, LogLevel, ProductLookupConfig};
