//! Risk scores, classification and admission decisions.
//!
//! Everything in this module operates on already-decoded plaintext values.

use serde::{Deserialize, Serialize};

/// Scores below this are considered safe.
pub const THRESHOLD_SAFE: f64 = 800.0;

/// Scores below this (and at least [`THRESHOLD_SAFE`]) call for caution.
pub const THRESHOLD_CAUTION: f64 = 1200.0;

/// Risk classification for a single infection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Safe,
    Caution,
    High,
}

impl RiskLevel {
    /// Classify a decoded score. Thresholds are inclusive-exclusive.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < THRESHOLD_SAFE {
            Self::Safe
        } else if score < THRESHOLD_CAUTION {
            Self::Caution
        } else {
            Self::High
        }
    }

    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Safe => "Safe to attend gatherings",
            Self::Caution => "Exercise caution; avoid large gatherings",
            Self::High => "High risk; should not attend gatherings",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "SAFE"),
            Self::Caution => write!(f, "CAUTION"),
            Self::High => write!(f, "HIGH RISK"),
        }
    }
}

/// Admission decision derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Allowed,
    AvoidLargeGatherings,
    NotAllowed,
}

impl Verdict {
    /// Decide admission from a composite score, using the same thresholds as
    /// [`RiskLevel::from_score`].
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        match RiskLevel::from_score(score) {
            RiskLevel::Safe => Self::Allowed,
            RiskLevel::Caution => Self::AvoidLargeGatherings,
            RiskLevel::High => Self::NotAllowed,
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Allowed => "Person is allowed to attend gatherings.",
            Self::AvoidLargeGatherings => "Person should avoid large gatherings.",
            Self::NotAllowed => "Person is NOT allowed to attend gatherings.",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowed => write!(f, "ALLOWED"),
            Self::AvoidLargeGatherings => write!(f, "AVOID LARGE GATHERINGS"),
            Self::NotAllowed => write!(f, "NOT ALLOWED"),
        }
    }
}

/// Per-infection severity weights, normalized to sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityWeights(Vec<f64>);

impl SeverityWeights {
    /// Normalize raw positive severities.
    ///
    /// # Errors
    /// Fails on an empty input or when any severity is non-positive or
    /// non-finite.
    pub fn normalize(raw: &[f64]) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("at least one severity is required".into());
        }
        if raw.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err("severities must be finite and positive".into());
        }
        let total: f64 = raw.iter().sum();
        Ok(Self(raw.iter().map(|s| s / total).collect()))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weighted sum `Σ scores[m] · weight[m]`.
    ///
    /// # Errors
    /// Fails when `scores` does not have one entry per weight.
    pub fn composite(&self, scores: &[f64]) -> Result<f64, String> {
        if scores.len() != self.0.len() {
            return Err(format!(
                "expected {} scores, got {}",
                self.0.len(),
                scores.len()
            ));
        }
        Ok(scores.iter().zip(&self.0).map(|(s, w)| s * w).sum())
    }
}

/// Decoded score of a single infection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InfectionScore {
    /// Zero-based infection index
    pub infection: usize,
    pub score: f64,
    pub weight: f64,
    pub level: RiskLevel,
}

/// Outcome of one risk query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Unique identifier
    pub id: String,

    /// Queried person
    pub person: usize,

    pub scores: Vec<InfectionScore>,

    /// Severity-weighted composite score
    pub composite: f64,

    pub verdict: Verdict,

    /// People reached by the traversal, in visiting order (origin first)
    pub visited: Vec<usize>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl RiskAssessment {
    /// Build an assessment from a decoded score vector.
    ///
    /// # Errors
    /// Fails when the decoded vector does not match the weights or contains
    /// non-finite values.
    pub fn from_decoded(
        person: usize,
        decoded: &[f64],
        weights: &SeverityWeights,
        visited: Vec<usize>,
    ) -> Result<Self, String> {
        if let Some(bad) = decoded.iter().position(|v| !v.is_finite()) {
            return Err(format!("decoded score {bad} is not finite"));
        }
        let composite = weights.composite(decoded)?;

        let scores = decoded
            .iter()
            .zip(weights.as_slice())
            .enumerate()
            .map(|(infection, (&score, &weight))| InfectionScore {
                infection,
                score,
                weight,
                level: RiskLevel::from_score(score),
            })
            .collect();

        Ok(Self {
            id: assessment_id(),
            person,
            scores,
            composite,
            verdict: Verdict::from_score(composite),
            visited,
            created_at: chrono::Utc::now(),
        })
    }
}

/// Random UUID v4 string from a CSPRNG.
fn assessment_id() -> String {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}
