//! Encrypted risk propagation.
//!
//! A bounded breadth-first walk from the queried person. Every active contact
//! adds `status ⊗ contribution` to an encrypted accumulator, where the
//! contribution is a plaintext, distance-decayed severity term encoded on the
//! fly. Activation and visitation are decided on plaintext weights only; no
//! ciphertext is decrypted until the caller decodes the final accumulator.

use std::collections::VecDeque;
use std::ops::{Range, RangeInclusive};

use rand::Rng;

use crate::domain::{ContactNetwork, EdgeActivation, EncryptedVector, SeverityWeights};
use crate::ports::VectorCodec;
use crate::IvsError;

/// Risk every person starts from, per infection.
pub const BASE_RISK: f64 = 5.0;

const SUSCEPTIBILITY: RangeInclusive<f64> = 0.5..=2.0;
const SEVERITY_FACTOR: Range<f64> = 0.1..2.0;
const RAW_SEVERITY: Range<f64> = 0.1..1.0;
const INTERACTION_WEIGHT: RangeInclusive<f64> = 0.5..=1.0;

/// Result of one traversal.
#[derive(Debug, Clone)]
pub struct Propagation {
    /// Encrypted per-infection score; decode exactly once.
    pub accumulator: EncryptedVector,

    pub weights: SeverityWeights,

    /// People processed, in breadth-first order (origin first)
    pub visited: Vec<usize>,

    /// Number of encrypted contributions folded into the accumulator
    pub contributions: usize,
}

/// Runs risk queries against a network with a fixed activation rule.
pub struct RiskPropagator<'a, C: VectorCodec + ?Sized> {
    codec: &'a C,
    activation: EdgeActivation,
}

impl<'a, C: VectorCodec + ?Sized> RiskPropagator<'a, C> {
    pub fn new(codec: &'a C, activation: EdgeActivation) -> Self {
        Self { codec, activation }
    }

    /// Compute the encrypted risk vector of `origin`.
    ///
    /// Severity factors, severity weights, susceptibility and interaction
    /// weights are drawn fresh from `rng` for this query.
    ///
    /// A person may be reached from several nodes before it is processed;
    /// each of those contacts contributes.
    ///
    /// # Errors
    /// Returns `IvsError::InvalidPersonIndex` for an origin outside the
    /// network, `IvsError::ContextMismatch` if a status was encrypted under
    /// another key context, or any other codec failure.
    pub fn compute_risk<R: Rng>(
        &self,
        network: &ContactNetwork,
        origin: usize,
        max_distance: usize,
        rng: &mut R,
    ) -> Result<Propagation, IvsError> {
        let persons = network.persons();
        let infections = network.infections();
        if !network.contains(origin) {
            return Err(IvsError::InvalidPersonIndex {
                index: i64::try_from(origin).unwrap_or(i64::MAX),
                persons,
            });
        }

        let susceptibility = rng.gen_range(SUSCEPTIBILITY);
        let severity: Vec<Vec<f64>> = (0..persons)
            .map(|_| (0..infections).map(|_| rng.gen_range(SEVERITY_FACTOR)).collect())
            .collect();
        let raw: Vec<f64> = (0..infections).map(|_| rng.gen_range(RAW_SEVERITY)).collect();
        let weights = SeverityWeights::normalize(&raw).map_err(IvsError::Validation)?;

        let mut accumulator = self.codec.encode(&vec![BASE_RISK; infections])?;
        let mut contributions = 0;

        let mut seen = vec![false; persons];
        let mut visited = Vec::new();
        let mut queue = VecDeque::from([(origin, 0usize)]);

        tracing::debug!(
            "Propagating from person {origin} (max_distance={max_distance}, activation={})",
            self.activation
        );

        while let Some((person, distance)) = queue.pop_front() {
            if distance > max_distance || seen[person] {
                continue;
            }
            seen[person] = true;
            visited.push(person);

            let decay_exponent = i32::try_from(distance).unwrap_or(i32::MAX);

            for neighbor in 0..persons {
                if neighbor == person || seen[neighbor] {
                    continue;
                }
                let Some(weight) = network.weight(person, neighbor) else {
                    continue;
                };
                if !self.activation.is_active(weight) {
                    continue;
                }

                let status = network.status(neighbor).ok_or_else(|| {
                    IvsError::Validation(format!("person {neighbor} has no encrypted status"))
                })?;

                let interaction = rng.gen_range(INTERACTION_WEIGHT);
                let contribution: Vec<f64> = severity[neighbor]
                    .iter()
                    .map(|ci| interaction * (1.0 / ci.powi(decay_exponent)) * susceptibility)
                    .collect();

                let encoded = self.codec.encode(&contribution)?;
                let term = self.codec.multiply(status, &encoded)?;
                accumulator = self.codec.add(&accumulator, &term)?;
                contributions += 1;

                tracing::trace!("Folded contact {person}->{neighbor} at distance {distance}");
                queue.push_back((neighbor, distance + 1));
            }
        }

        tracing::debug!(
            "Propagation finished: visited={}, contributions={contributions}",
            visited.len()
        );

        Ok(Propagation {
            accumulator,
            weights,
            visited,
            contributions,
        })
    }
}
