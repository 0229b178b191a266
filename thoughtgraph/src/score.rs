//! Multi-criterion vertex scoring.
//!
//! [`ScoreEngine`] is a pure function of (vertex probe, problem, assessment) →
//! [`ScoreBreakdown`]. The controller snapshots what it needs under the graph lock,
//! asks the generator for an [`Assessment`] off-lock (or uses the local heuristics
//! here), and commits `overall` back onto the vertex.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph::GraphConfig;

/// Weights for the five sub-scores. `overall` is the weight-normalised sum, so
/// weights need not add up to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub confidence: f64,
    pub validity: f64,
    pub relevance: f64,
    pub novelty: f64,
    pub depth_factor: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            validity: 0.30,
            relevance: 0.25,
            novelty: 0.10,
            depth_factor: 0.10,
        }
    }
}

impl ScoreWeights {
    fn as_array(&self) -> [f64; 5] {
        [
            self.confidence,
            self.validity,
            self.relevance,
            self.novelty,
            self.depth_factor,
        ]
    }

    pub fn validate(&self) -> Result<(), String> {
        let w = self.as_array();
        if w.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err("score weights must be finite and non-negative".to_string());
        }
        if w.iter().sum::<f64>() <= 0.0 {
            return Err("score weights must not all be zero".to_string());
        }
        Ok(())
    }
}

/// Content-quality judgement for one vertex, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub validity: f64,
    pub relevance: f64,
    pub novelty: f64,
}

/// Who assesses validity/relevance/novelty during Score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessMode {
    /// Ask the generator's `assess` hook; fall back to heuristics when it has no opinion.
    #[default]
    Auto,
    /// Local heuristics only; never calls out.
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub confidence: f64,
    pub validity: f64,
    pub relevance: f64,
    pub novelty: f64,
    pub depth_factor: f64,
    pub overall: f64,
}

/// What the engine needs to know about a vertex, detached from the graph lock.
#[derive(Debug, Clone)]
pub struct VertexProbe {
    pub content: String,
    pub depth: u32,
    pub confidence: f64,
    /// Contents of vertices sharing a parent with the probed one.
    pub siblings: Vec<String>,
}

const MIN_WORD_LEN: usize = 4;
const DEPTH_FACTOR_AT_ROOT: f64 = 0.5;
const DEPTH_FACTOR_FLOOR: f64 = 0.2;

const REASONING_MARKERS: &[&str] = &[
    "because",
    "therefore",
    "however",
    "first",
    "second",
    "then",
    "next",
    "example",
    "specifically",
    "consider",
    "approach",
    "1.",
    "2.",
];

#[derive(Debug, Clone)]
pub struct ScoreEngine {
    weights: ScoreWeights,
    preferred_depth: u32,
    max_depth: u32,
    diversity_penalty: f64,
}

impl ScoreEngine {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            weights: config.score_weights.clone(),
            preferred_depth: config.preferred_depth,
            max_depth: config.max_depth,
            diversity_penalty: config.diversity_penalty,
        }
    }

    /// Full breakdown for a probe. `assessment` comes from the generator when it
    /// offered one; otherwise the heuristics fill in.
    pub fn score(
        &self,
        probe: &VertexProbe,
        problem: &str,
        assessment: Option<Assessment>,
    ) -> ScoreBreakdown {
        let assessment = assessment
            .unwrap_or_else(|| self.heuristic_assessment(&probe.content, problem, &probe.siblings));
        self.breakdown(probe.confidence, assessment, probe.depth)
    }

    /// Combines the sub-scores. Every component is clamped into [0, 1] (NaN → 0), so
    /// `overall` is as well.
    pub fn breakdown(&self, confidence: f64, assessment: Assessment, depth: u32) -> ScoreBreakdown {
        let confidence = clamp_unit(confidence);
        let validity = clamp_unit(assessment.validity);
        let relevance = clamp_unit(assessment.relevance);
        let novelty = clamp_unit(assessment.novelty);
        let depth_factor = self.depth_factor(depth);

        let w = &self.weights;
        let total = w.confidence + w.validity + w.relevance + w.novelty + w.depth_factor;
        let weighted = confidence * w.confidence
            + validity * w.validity
            + relevance * w.relevance
            + novelty * w.novelty
            + depth_factor * w.depth_factor;
        let overall = if total > 0.0 {
            clamp_unit(weighted / total)
        } else {
            0.0
        };

        ScoreBreakdown {
            confidence,
            validity,
            relevance,
            novelty,
            depth_factor,
            overall,
        }
    }

    /// Structural term: rises from 0.5 at the root to 1.0 at `preferred_depth`, then
    /// decays linearly to a floor of 0.2 at `max_depth` and stays there.
    pub fn depth_factor(&self, depth: u32) -> f64 {
        let preferred = self.preferred_depth.max(1) as f64;
        let d = depth as f64;
        if d <= preferred {
            return DEPTH_FACTOR_AT_ROOT + (1.0 - DEPTH_FACTOR_AT_ROOT) * d / preferred;
        }
        let span = (self.max_depth as f64 - preferred).max(1.0);
        let over = (d - preferred) / span;
        (1.0 - (1.0 - DEPTH_FACTOR_FLOOR) * over).max(DEPTH_FACTOR_FLOOR)
    }

    /// Local, call-free assessment.
    ///
    /// - relevance: share of the problem's significant words found in the content
    ///   (0.5 when the problem has none)
    /// - validity: length band plus reasoning markers
    /// - novelty: 1 − highest word-set overlap with any sibling, sharpened by
    ///   `diversity_penalty`
    pub fn heuristic_assessment(&self, content: &str, problem: &str, siblings: &[String]) -> Assessment {
        let words = significant_words(content);
        Assessment {
            validity: validity_heuristic(content),
            relevance: relevance_heuristic(&words, problem),
            novelty: self.novelty_heuristic(&words, siblings),
        }
    }

    fn novelty_heuristic(&self, words: &HashSet<String>, siblings: &[String]) -> f64 {
        let max_overlap = siblings
            .iter()
            .map(|s| jaccard(words, &significant_words(s)))
            .fold(0.0_f64, f64::max);
        clamp_unit(1.0 - max_overlap * (1.0 + self.diversity_penalty))
    }

    /// Confidence of a merged vertex: mean of its sources.
    pub fn merge_confidence(confidences: &[f64]) -> f64 {
        if confidences.is_empty() {
            return 0.0;
        }
        clamp_unit(confidences.iter().copied().map(clamp_unit).sum::<f64>() / confidences.len() as f64)
    }
}

fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

fn significant_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        .map(str::to_lowercase)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    inter / union
}

fn relevance_heuristic(words: &HashSet<String>, problem: &str) -> f64 {
    let wanted = significant_words(problem);
    if wanted.is_empty() {
        return 0.5;
    }
    let hits = wanted.iter().filter(|w| words.contains(*w)).count();
    hits as f64 / wanted.len() as f64
}

fn validity_heuristic(content: &str) -> f64 {
    let len = content.chars().count();
    let mut v: f64 = 0.4;
    if (100..=500).contains(&len) {
        v += 0.2;
    } else if (50..=800).contains(&len) {
        v += 0.1;
    } else if len < 20 {
        v -= 0.2;
    }
    let lower = content.to_lowercase();
    let markers = REASONING_MARKERS.iter().filter(|m| lower.contains(*m)).count();
    v += (markers as f64 * 0.05).min(0.3);
    clamp_unit(v)
}
