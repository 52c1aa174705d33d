//! Display buckets for bias and relevance scores.
//!
//! A bucket's lower edge is inclusive: a score sitting exactly on a threshold
//! belongs to the higher bucket.

use serde::Serialize;

pub const BIAS_MODERATE_THRESHOLD: f64 = 0.3;
pub const BIAS_HIGH_THRESHOLD: f64 = 0.6;

pub const RELEVANCE_MEDIUM_THRESHOLD: f64 = 0.6;
pub const RELEVANCE_HIGH_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasLevel {
    Low,
    Moderate,
    High,
}

impl BiasLevel {
    pub fn from_score(score: f64) -> Self {
        if score < BIAS_MODERATE_THRESHOLD {
            BiasLevel::Low
        } else if score < BIAS_HIGH_THRESHOLD {
            BiasLevel::Moderate
        } else {
            BiasLevel::High
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BiasLevel::Low => "Low bias",
            BiasLevel::Moderate => "Moderate bias",
            BiasLevel::High => "High bias",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            BiasLevel::Low => "#16a34a",
            BiasLevel::Moderate => "#ca8a04",
            BiasLevel::High => "#dc2626",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceLevel {
    Low,
    Medium,
    High,
}

impl RelevanceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= RELEVANCE_HIGH_THRESHOLD {
            RelevanceLevel::High
        } else if score >= RELEVANCE_MEDIUM_THRESHOLD {
            RelevanceLevel::Medium
        } else {
            RelevanceLevel::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RelevanceLevel::Low => "Low relevance",
            RelevanceLevel::Medium => "Relevant",
            RelevanceLevel::High => "Highly relevant",
        }
    }
}

pub fn bias_label(score: f64) -> &'static str {
    BiasLevel::from_score(score).label()
}

pub fn bias_color(score: f64) -> &'static str {
    BiasLevel::from_score(score).color()
}

pub fn relevance_label(score: f64) -> &'static str {
    RelevanceLevel::from_score(score).label()
}
