// ABOUTME: Result-card derivations: topic tile summaries and the verdict checklist
// ABOUTME: Pure functions over a product record and its verdict
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge

//! # Result-Card Insights
//!
//! Small derived facts shown on the result card: two-line summaries for each
//! topic tile and the pass/fail checklist under the verdict. Pure functions;
//! no I/O.

use crate::models::{ChatTopic, ProductRecord, Verdict};

/// Sugar above this many grams per 100g is flagged
pub const HIGH_SUGAR_THRESHOLD_G: f64 = 10.0;

/// Protein above this many grams per 100g passes the checklist
pub const PROTEIN_PASS_THRESHOLD_G: f64 = 5.0;

/// More than this many additives fails the checklist
pub const ADDITIVE_FAIL_COUNT: usize = 1;

/// Risk strings are clipped to this many characters on the card
const RISK_DISPLAY_MAX_CHARS: usize = 15;

/// Two summary points for a topic tile
#[must_use]
pub fn topic_points(product: &ProductRecord, verdict: &Verdict, topic: ChatTopic) -> [String; 2] {
    match topic {
        ChatTopic::Nutrition => {
            let kcal = product.nutriments.energy_kcal_100g.unwrap_or(0.0);
            let sugar = product.nutriments.sugars_100g.unwrap_or(0.0);
            [
                format!("{kcal:.0} calories"),
                if sugar > HIGH_SUGAR_THRESHOLD_G {
                    "High Sugar".to_owned()
                } else {
                    "Low Sugar".to_owned()
                },
            ]
        }
        ChatTopic::Ingredients => {
            let additives = product.additives_tags.len();
            let palm_oil = product
                .ingredients_text
                .as_deref()
                .is_some_and(|text| text.to_lowercase().contains("palm"));
            [
                format!("{additives} Additives"),
                if palm_oil {
                    "Contains Palm Oil".to_owned()
                } else {
                    "No Palm Oil".to_owned()
                },
            ]
        }
        ChatTopic::Health => [
            clip_risk(
                verdict
                    .health_risks
                    .first()
                    .map_or("None detected", String::as_str),
            ),
            clip_risk(
                verdict
                    .health_risks
                    .get(1)
                    .map_or("Safe to consume", String::as_str),
            ),
        ],
        ChatTopic::Alternatives => ["Better options".to_owned(), "Healthier swaps".to_owned()],
    }
}

/// Outcome of one checklist row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Requirement met
    Pass,
    /// Requirement failed
    Fail,
    /// Not decisive either way
    Neutral,
}

/// One row of the verdict checklist
#[derive(Debug, Clone)]
pub struct VerdictCheck {
    /// Row label
    pub label: &'static str,
    /// Pass/fail/neutral
    pub status: CheckStatus,
    /// Display value (e.g. "12g", "3 found")
    pub value: String,
}

/// Checklist rows shown under the verdict
#[must_use]
pub fn verdict_checks(product: &ProductRecord) -> Vec<VerdictCheck> {
    let sugar = product.nutriments.sugars_100g.unwrap_or(0.0);
    let protein = product.nutriments.proteins_100g.unwrap_or(0.0);
    let additives = product.additives_tags.len();

    vec![
        VerdictCheck {
            label: "Sugar Level",
            status: if sugar > HIGH_SUGAR_THRESHOLD_G {
                CheckStatus::Fail
            } else {
                CheckStatus::Pass
            },
            value: format!("{sugar:.0}g"),
        },
        VerdictCheck {
            label: "Additives",
            status: if additives > ADDITIVE_FAIL_COUNT {
                CheckStatus::Fail
            } else {
                CheckStatus::Pass
            },
            value: format!("{additives} found"),
        },
        VerdictCheck {
            label: "Protein",
            status: if protein > PROTEIN_PASS_THRESHOLD_G {
                CheckStatus::Pass
            } else {
                CheckStatus::Neutral
            },
            value: format!("{protein:.0}g"),
        },
    ]
}

/// Clip a risk string for card display
fn clip_risk(risk: &str) -> String {
    if risk.chars().count() > RISK_DISPLAY_MAX_CHARS {
        let clipped: String = risk.chars().take(RISK_DISPLAY_MAX_CHARS).collect();
        format!("{clipped}...")
    } else {
        risk.to_owned()
    }
}
