// ABOUTME: External API clients for product data retrieval
// ABOUTME: Currently hosts the Open Food Facts barcode lookup client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

//! External API clients

/// Open Food Facts product-by-barcode client
pub mod open_food_facts;

pub use open_food_facts::{MockProductSource, OpenFoodFactsClient, ProductSource};
