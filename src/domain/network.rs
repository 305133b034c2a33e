//! Contact network types.
//!
//! A network is an N×N matrix. Off-diagonal cells hold plaintext contact
//! weights; the diagonal holds each person's encrypted infection status.

use super::crypto::EncryptedVector;

/// Largest weight the generator produces (exclusive).
pub const MAX_CONTACT_WEIGHT: f64 = 10.0;

/// One cell of the contact matrix.
#[derive(Debug, Clone)]
pub enum Cell {
    /// Plaintext interaction propensity between two distinct people.
    Weight(f64),
    /// Encrypted infection-status vector of the person on the diagonal.
    Status(EncryptedVector),
}

impl Cell {
    /// Plaintext weight, if this cell holds one.
    #[must_use]
    pub fn as_weight(&self) -> Option<f64> {
        match self {
            Self::Weight(w) => Some(*w),
            Self::Status(_) => None,
        }
    }

    /// Encrypted status, if this cell holds one.
    #[must_use]
    pub fn as_status(&self) -> Option<&EncryptedVector> {
        match self {
            Self::Weight(_) => None,
            Self::Status(s) => Some(s),
        }
    }
}

/// Plaintext infection-status vector (one 0/1 indicator per infection).
///
/// Only available at generation time; everything downstream sees the
/// ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfectionStatus(pub Vec<bool>);

impl InfectionStatus {
    /// Indicators as the real values that get encoded.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.0.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rule deciding whether a plaintext contact weight counts as an active edge.
///
/// Only ever evaluated on plaintext weights; encrypted values are never
/// branched on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeActivation {
    /// Active only for whole, strictly positive weights.
    ///
    /// Continuous generated weights never satisfy this, so propagation stays
    /// at the origin. Kept as the default to reproduce reference scores.
    IntegerOnly,
    /// Active when the weight is at least the given threshold.
    Threshold(f64),
}

impl EdgeActivation {
    #[must_use]
    pub fn is_active(&self, weight: f64) -> bool {
        if !weight.is_finite() {
            return false;
        }
        match *self {
            Self::IntegerOnly => weight > 0.0 && weight.fract() == 0.0,
            Self::Threshold(t) => weight >= t,
        }
    }
}

impl Default for EdgeActivation {
    fn default() -> Self {
        Self::IntegerOnly
    }
}

impl std::fmt::Display for EdgeActivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IntegerOnly => write!(f, "integer"),
            Self::Threshold(t) => write!(f, "threshold({t})"),
        }
    }
}

/// N×N contact matrix with encrypted statuses on the diagonal.
#[derive(Debug, Clone)]
pub struct ContactNetwork {
    persons: usize,
    infections: usize,
    /// Row-major cells.
    cells: Vec<Cell>,
}

impl ContactNetwork {
    /// Assemble a network from plaintext weights and per-person statuses.
    ///
    /// `weights` is row-major N×N; diagonal entries are ignored and replaced
    /// by `statuses[i]`.
    ///
    /// # Errors
    /// Returns a description of the first shape problem found.
    pub fn from_parts(
        weights: Vec<f64>,
        statuses: Vec<EncryptedVector>,
    ) -> Result<Self, String> {
        let persons = statuses.len();
        if persons == 0 {
            return Err("network must contain at least one person".into());
        }
        if weights.len() != persons * persons {
            return Err(format!(
                "expected {} weights for {persons} persons, got {}",
                persons * persons,
                weights.len()
            ));
        }
        let infections = statuses[0].len();
        if infections == 0 {
            return Err("status vectors must track at least one infection".into());
        }
        if let Some(bad) = statuses.iter().position(|s| s.len() != infections) {
            return Err(format!(
                "status vector of person {bad} has {} slots, expected {infections}",
                statuses[bad].len()
            ));
        }
        if let Some(bad) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!(
                "weight ({}, {}) must be a finite non-negative number",
                bad / persons,
                bad % persons
            ));
        }

        let mut statuses = statuses.into_iter();
        let cells = weights
            .into_iter()
            .enumerate()
            .map(|(idx, w)| {
                if idx / persons == idx % persons {
                    // Length checked above: exactly one status per diagonal cell.
                    statuses.next().map(Cell::Status).unwrap_or(Cell::Weight(w))
                } else {
                    Cell::Weight(w)
                }
            })
            .collect();

        Ok(Self {
            persons,
            infections,
            cells,
        })
    }

    /// Number of people (N).
    #[must_use]
    pub fn persons(&self) -> usize {
        self.persons
    }

    /// Number of tracked infections (K).
    #[must_use]
    pub fn infections(&self) -> usize {
        self.infections
    }

    #[must_use]
    pub fn contains(&self, person: usize) -> bool {
        person < self.persons
    }

    /// Raw cell access.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        if row >= self.persons || col >= self.persons {
            return None;
        }
        self.cells.get(row * self.persons + col)
    }

    /// Plaintext weight of the directed edge `from -> to`.
    ///
    /// `None` for the diagonal or out-of-range indices.
    #[must_use]
    pub fn weight(&self, from: usize, to: usize) -> Option<f64> {
        self.cell(from, to).and_then(Cell::as_weight)
    }

    /// Encrypted status of a person.
    #[must_use]
    pub fn status(&self, person: usize) -> Option<&EncryptedVector> {
        self.cell(person, person).and_then(Cell::as_status)
    }

    /// Overwrite the plaintext weight of `from -> to`.
    ///
    /// # Errors
    /// Fails on the diagonal, out-of-range indices or invalid weights.
    pub fn set_weight(&mut self, from: usize, to: usize, weight: f64) -> Result<(), String> {
        if from >= self.persons || to >= self.persons {
            return Err(format!("edge ({from}, {to}) outside network of {}", self.persons));
        }
        if from == to {
            return Err("diagonal cells hold encrypted statuses, not weights".into());
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(format!("weight {weight} must be a finite non-negative number"));
        }
        self.cells[from * self.persons + to] = Cell::Weight(weight);
        Ok(())
    }

    /// Rows of cells, for inspection output.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.persons)
    }

    /// Encrypted statuses in person order.
    pub fn statuses(&self) -> impl Iterator<Item = &EncryptedVector> {
        (0..self.persons).filter_map(move |p| self.status(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(len: usize) -> EncryptedVector {
        EncryptedVector::new(vec![0u8; 8], len, 1, 1.0, "ctx")
    }

    #[test]
    fn test_integer_only_predicate() {
        let rule = EdgeActivation::IntegerOnly;
        assert!(rule.is_active(3.0));
        assert!(!rule.is_active(0.0));
        assert!(!rule.is_active(7.5));
        assert!(!rule.is_active(9.999_999));
        assert!(!rule.is_active(f64::NAN));
        assert!(!rule.is_active(f64::INFINITY));
    }

    #[test]
    fn test_threshold_predicate() {
        let rule = EdgeActivation::Threshold(5.0);
        assert!(rule.is_active(7.5));
        assert!(rule.is_active(5.0));
        assert!(!rule.is_active(4.99));
    }

    #[test]
    fn test_from_parts_places_statuses_on_diagonal() {
        let weights = vec![0.0, 1.5, 2.5, 0.0];
        let network = ContactNetwork::from_parts(weights, vec![status(3), status(3)])
            .expect("valid network");

        assert_eq!(network.persons(), 2);
        assert_eq!(network.infections(), 3);
        assert_eq!(network.weight(0, 1), Some(1.5));
        assert_eq!(network.weight(1, 0), Some(2.5));
        assert!(network.weight(0, 0).is_none());
        assert!(network.status(1).is_some());
        assert!(network.cell(0, 1).and_then(Cell::as_status).is_none());
        assert_eq!(network.statuses().count(), 2);
    }

    #[test]
    fn test_from_parts_rejects_bad_shapes() {
        assert!(ContactNetwork::from_parts(vec![], vec![]).is_err());
        assert!(ContactNetwork::from_parts(vec![0.0; 3], vec![status(1), status(1)]).is_err());
        assert!(ContactNetwork::from_parts(vec![0.0; 4], vec![status(1), status(2)]).is_err());
        assert!(ContactNetwork::from_parts(vec![0.0, -1.0, 0.0, 0.0], vec![status(1), status(1)]).is_err());
    }

    #[test]
    fn test_set_weight_refuses_diagonal() {
        let mut network =
            ContactNetwork::from_parts(vec![0.0; 4], vec![status(1), status(1)]).expect("valid");
        assert!(network.set_weight(0, 0, 1.0).is_err());
        assert!(network.set_weight(0, 2, 1.0).is_err());
        network.set_weight(0, 1, 7.5).expect("off-diagonal");
        assert_eq!(network.weight(0, 1), Some(7.5));
    }
}
