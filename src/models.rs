// ABOUTME: Core domain types for scanned products and LLM verdicts
// ABOUTME: Contains ProductRecord, Nutriments, Grade, and Verdict structures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

//! # Core Data Models
//!
//! Domain types shared across the lookup client, the grading pipeline, and
//! the session controller. `ProductRecord` mirrors the Open Food Facts
//! product object and is deliberately loose: every field is optional and
//! missing values are defaulted at the point of use, never normalized.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// Per-100g nutrient values as reported by Open Food Facts
///
/// Field names follow the upstream wire keys, which mix hyphens and
/// underscores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Nutriments {
    /// Energy in kcal per 100g
    #[serde(rename = "energy-kcal_100g")]
    pub energy_kcal_100g: Option<f64>,
    /// Sugars in g per 100g
    #[serde(rename = "sugars_100g")]
    pub sugars_100g: Option<f64>,
    /// Salt in g per 100g
    #[serde(rename = "salt_100g")]
    pub salt_100g: Option<f64>,
    /// Saturated fat in g per 100g
    #[serde(rename = "saturated-fat_100g")]
    pub saturated_fat_100g: Option<f64>,
    /// Protein in g per 100g
    #[serde(rename = "proteins_100g")]
    pub proteins_100g: Option<f64>,
    /// Fiber in g per 100g
    #[serde(rename = "fiber_100g")]
    pub fiber_100g: Option<f64>,
}

/// A product as returned by the Open Food Facts database
///
/// Treated as an opaque bag of fields; no local validation beyond
/// deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product barcode (EAN/UPC)
    #[serde(default)]
    pub code: Option<String>,
    /// Product display name
    #[serde(default)]
    pub product_name: Option<String>,
    /// Brand list as a comma-separated string
    #[serde(default)]
    pub brands: Option<String>,
    /// Product image URL
    #[serde(default)]
    pub image_url: Option<String>,
    /// Per-100g nutrient values
    #[serde(default)]
    pub nutriments: Nutriments,
    /// Free-text ingredient list
    #[serde(default)]
    pub ingredients_text: Option<String>,
    /// Normalized additive tags (e.g. "en:e330")
    #[serde(default)]
    pub additives_tags: Vec<String>,
    /// Additive tags as printed on the label
    #[serde(default)]
    pub additives_original_tags: Vec<String>,
}

impl ProductRecord {
    /// Display name with fallback for unnamed products
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or("Unknown product")
    }

    /// Brand string with empty fallback
    #[must_use]
    pub fn brand_label(&self) -> &str {
        self.brands.as_deref().unwrap_or("")
    }
}

/// Letter grade assigned by the nutritionist model
///
/// Closed set; anything else in a model response is a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    /// Exceptional
    S,
    /// Good
    A,
    /// Decent
    B,
    /// Mediocre
    C,
    /// Poor
    D,
    /// Avoid
    F,
}

impl Grade {
    /// All grades, best to worst
    pub const ALL: [Self; 6] = [Self::S, Self::A, Self::B, Self::C, Self::D, Self::F];

    /// String representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }

    /// Whether this grade triggers the bad-grade feedback path (C, D, F)
    #[must_use]
    pub const fn is_poor(&self) -> bool {
        matches!(self, Self::C | Self::D | Self::F)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "S" => Ok(Self::S),
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "F" => Ok(Self::F),
            other => Err(AppError::serialization(format!(
                "unknown grade letter {other:?}"
            ))),
        }
    }
}

/// Chat topic selected from a result-card tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatTopic {
    /// Macros and calories
    Nutrition,
    /// Health risks, additives, harmful ingredients
    Health,
    /// Ingredient quality and origin
    Ingredients,
    /// Healthier swaps
    Alternatives,
}

impl ChatTopic {
    /// String representation used in prompt templates
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nutrition => "nutrition",
            Self::Health => "health",
            Self::Ingredients => "ingredients",
            Self::Alternatives => "alternatives",
        }
    }
}

impl fmt::Display for ChatTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The model's health verdict for a scanned product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Letter grade
    pub grade: Grade,
    /// Short free-text reasoning
    pub reasoning: String,
    /// Short list of identified risks
    #[serde(default)]
    pub health_risks: Vec<String>,
}
