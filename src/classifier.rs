//! Stress classification
//!
//! A fixed, auditable rule set: every feature is mapped onto a 0-100 stress
//! subscore by piecewise-linear interpolation against three clinical
//! boundaries, optionally blended with a baseline-relative score, and the
//! subscores are combined with fixed weights.
//!
//! Zones of the piecewise mapping:
//!
//! | Zone | Range of raw value (inverted / direct) | Subscore |
//! |------|----------------------------------------|----------|
//! | relaxed  | ≥ relaxed / ≤ relaxed        | 0-12   |
//! | normal   | normal..relaxed / relaxed..normal | 13-37  |
//! | elevated | elevated..normal / normal..elevated | 38-62 |
//! | high     | < elevated / > elevated      | 63-100 |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{MetricsSnapshot, PersonalBaseline, StressFeature, StressLevel, StressResult};

/// Weight of the baseline-relative score when blending
pub const BASELINE_BLEND_WEIGHT: f64 = 0.4;

/// Baseline-relative mapping: `offset + deviation * gain`
const RELATIVE_OFFSET: f64 = 25.0;
const RELATIVE_GAIN: f64 = 120.0;

/// (start, span) of each zone's output range
const ZONES: [(f64, f64); 4] = [(0.0, 12.0), (13.0, 24.0), (38.0, 24.0), (63.0, 37.0)];

/// Spread of subscores at which feature agreement bottoms out
const AGREEMENT_SPREAD: f64 = 80.0;

/// Relationship between a raw feature value and stress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Higher value means lower stress
    Inverted,
    /// Higher value means higher stress
    Direct,
}

impl Direction {
    /// Map a raw value onto an axis along which stress increases
    fn orient(self, value: f64) -> f64 {
        match self {
            Direction::Inverted => -value,
            Direction::Direct => value,
        }
    }
}

/// Boundary values between the four zones
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub relaxed: f64,
    pub normal: f64,
    pub elevated: f64,
}

impl Thresholds {
    pub const fn new(relaxed: f64, normal: f64, elevated: f64) -> Self {
        Self {
            relaxed,
            normal,
            elevated,
        }
    }
}

/// Population-norm boundaries
pub const RMSSD_THRESHOLDS: Thresholds = Thresholds::new(60.0, 40.0, 20.0);
pub const SDNN_THRESHOLDS: Thresholds = Thresholds::new(80.0, 50.0, 30.0);
pub const PNN50_THRESHOLDS: Thresholds = Thresholds::new(25.0, 10.0, 3.0);
pub const STRESS_INDEX_THRESHOLDS: Thresholds = Thresholds::new(100.0, 250.0, 500.0);
pub const LF_HF_THRESHOLDS: Thresholds = Thresholds::new(0.5, 2.0, 4.0);
pub const HF_POWER_THRESHOLDS: Thresholds = Thresholds::new(400.0, 150.0, 40.0);
pub const HEART_RATE_THRESHOLDS: Thresholds = Thresholds::new(65.0, 80.0, 95.0);

/// Scoring rule for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRule {
    pub feature: StressFeature,
    pub direction: Direction,
    pub thresholds: Thresholds,
    pub weight: f64,
}

/// The clinical rule set. Weights sum to 1.
pub const CLINICAL_RULES: [FeatureRule; 7] = [
    FeatureRule {
        feature: StressFeature::Rmssd,
        direction: Direction::Inverted,
        thresholds: RMSSD_THRESHOLDS,
        weight: 0.25,
    },
    FeatureRule {
        feature: StressFeature::Sdnn,
        direction: Direction::Inverted,
        thresholds: SDNN_THRESHOLDS,
        weight: 0.15,
    },
    FeatureRule {
        feature: StressFeature::Pnn50,
        direction: Direction::Inverted,
        thresholds: PNN50_THRESHOLDS,
        weight: 0.10,
    },
    FeatureRule {
        feature: StressFeature::StressIndex,
        direction: Direction::Direct,
        thresholds: STRESS_INDEX_THRESHOLDS,
        weight: 0.15,
    },
    FeatureRule {
        feature: StressFeature::LfHfRatio,
        direction: Direction::Direct,
        thresholds: LF_HF_THRESHOLDS,
        weight: 0.15,
    },
    FeatureRule {
        feature: StressFeature::HfPower,
        direction: Direction::Inverted,
        thresholds: HF_POWER_THRESHOLDS,
        weight: 0.10,
    },
    FeatureRule {
        feature: StressFeature::MeanHeartRate,
        direction: Direction::Direct,
        thresholds: HEART_RATE_THRESHOLDS,
        weight: 0.10,
    },
];

/// Piecewise-linear stress subscore (0-100) of a raw value.
pub fn piecewise_score(value: f64, thresholds: &Thresholds, direction: Direction) -> f64 {
    let v = direction.orient(value);
    let relaxed = direction.orient(thresholds.relaxed);
    let normal = direction.orient(thresholds.normal);
    let elevated = direction.orient(thresholds.elevated);

    let (zone, fraction) = if v <= relaxed {
        let scale = thresholds.relaxed.abs();
        let fraction = if scale > 0.0 {
            1.0 - (relaxed - v) / scale
        } else {
            0.0
        };
        (0, fraction.clamp(0.0, 1.0))
    } else if v <= normal {
        (1, (v - relaxed) / (normal - relaxed))
    } else if v <= elevated {
        (2, (v - normal) / (elevated - normal))
    } else {
        let scale = thresholds.elevated.abs();
        let fraction = if scale > 0.0 {
            (v - elevated) / scale
        } else {
            1.0
        };
        (3, fraction.clamp(0.0, 1.0))
    };

    let (start, span) = ZONES[zone];
    (start + span * fraction).clamp(0.0, 100.0)
}

/// Subscore for a feature where higher values mean less stress
pub fn score_inverted(value: f64, thresholds: &Thresholds) -> f64 {
    piecewise_score(value, thresholds, Direction::Inverted)
}

/// Subscore for a feature where higher values mean more stress
pub fn score_direct(value: f64, thresholds: &Thresholds) -> f64 {
    piecewise_score(value, thresholds, Direction::Direct)
}

/// Subscore from the deviation against the personal baseline.
///
/// Returns `None` for features without a baseline or a non-positive baseline.
pub fn relative_score(
    feature: StressFeature,
    current: f64,
    baseline: &PersonalBaseline,
) -> Option<f64> {
    let deviation = match feature {
        StressFeature::Rmssd if baseline.rmssd > 0.0 => 1.0 - current / baseline.rmssd,
        StressFeature::Sdnn if baseline.sdnn > 0.0 => 1.0 - current / baseline.sdnn,
        StressFeature::MeanHeartRate if baseline.mean_hr > 0.0 => current / baseline.mean_hr - 1.0,
        _ => return None,
    };
    Some((RELATIVE_OFFSET + deviation * RELATIVE_GAIN).clamp(0.0, 100.0))
}

/// Step function of sample count
pub fn data_sufficiency(sample_count: usize) -> f64 {
    match sample_count {
        0..=9 => 0.3,
        10..=19 => 0.5,
        20..=29 => 0.7,
        30..=49 => 0.85,
        _ => 0.95,
    }
}

/// Agreement between subscores: low spread means high agreement (0.5-1.0).
/// Callers pass at least one subscore.
fn feature_agreement(subscores: &[f64]) -> f64 {
    let n = subscores.len() as f64;
    let mean = subscores.iter().sum::<f64>() / n;
    let variance = subscores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    (1.0 - variance.sqrt() / AGREEMENT_SPREAD).clamp(0.5, 1.0)
}

/// Weighted multi-feature classifier
#[derive(Debug, Clone)]
pub struct StressClassifier {
    rules: Vec<FeatureRule>,
    blend_weight: f64,
}

impl Default for StressClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StressClassifier {
    /// Classifier with the clinical rule set
    pub fn new() -> Self {
        Self {
            rules: CLINICAL_RULES.to_vec(),
            blend_weight: BASELINE_BLEND_WEIGHT,
        }
    }

    pub fn rules(&self) -> &[FeatureRule] {
        &self.rules
    }

    /// Classify a snapshot, blending in the personal baseline when given.
    pub fn evaluate(
        &self,
        metrics: &MetricsSnapshot,
        baseline: Option<&PersonalBaseline>,
    ) -> StressResult {
        if !metrics.is_sufficient() {
            return StressResult::insufficient();
        }

        let mut subscores = BTreeMap::new();
        let mut composite = 0.0;

        for rule in &self.rules {
            let value = rule.feature.value_in(metrics);
            let absolute = piecewise_score(value, &rule.thresholds, rule.direction);

            let score = match baseline.and_then(|b| relative_score(rule.feature, value, b)) {
                Some(relative) => {
                    absolute * (1.0 - self.blend_weight) + relative * self.blend_weight
                }
                None => absolute,
            };

            composite += score * rule.weight;
            subscores.insert(rule.feature, score);
        }

        let composite_score = composite.round().clamp(0.0, 100.0) as u8;
        let confidence = Self::confidence(metrics.sample_count, &subscores);

        tracing::debug!(
            composite_score,
            confidence,
            blended = baseline.is_some(),
            "classified snapshot"
        );

        StressResult {
            composite_score,
            subscores,
            confidence,
            level: Some(StressLevel::from_score(composite_score)),
        }
    }

    fn confidence(sample_count: usize, subscores: &BTreeMap<StressFeature, f64>) -> f64 {
        let sufficiency = data_sufficiency(sample_count);
        if subscores.is_empty() {
            return sufficiency * 0.5;
        }
        let values: Vec<f64> = subscores.values().copied().collect();
        (0.6 * sufficiency + 0.4 * feature_agreement(&values)).clamp(0.0, 1.0)
    }
}
