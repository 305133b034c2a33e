//! Risk service: Orchestrates a risk query end to end.
//!
//! This service coordinates:
//! - Query validation
//! - Encrypted propagation
//! - The single decode of the aggregate
//! - Classification and the admission decision

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::generator::{GeneratedNetwork, NetworkGenerator};
use super::propagation::{Propagation, RiskPropagator};
use crate::config::EngineConfig;
use crate::domain::{ContactNetwork, EdgeActivation, RiskAssessment};
use crate::ports::VectorCodec;
use crate::IvsError;

/// Service answering risk queries against one contact network.
///
/// The network and codec are shared read-only; each query draws its own
/// randomness and owns its accumulator, so a service can be queried from
/// several threads at once.
pub struct RiskService<C: VectorCodec> {
    codec: Arc<C>,
    network: ContactNetwork,
    activation: EdgeActivation,
    max_distance: usize,
}

impl<C: VectorCodec> RiskService<C> {
    /// Create a service over an existing network.
    pub fn new(
        codec: Arc<C>,
        network: ContactNetwork,
        activation: EdgeActivation,
        max_distance: usize,
    ) -> Self {
        Self {
            codec,
            network,
            activation,
            max_distance,
        }
    }

    /// Generate a network from `config` and wrap it in a service.
    ///
    /// Also returns the plaintext statuses used for the ciphertexts, for
    /// inspection by the caller.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or encoding fails.
    pub fn bootstrap<R: Rng>(
        codec: Arc<C>,
        config: &EngineConfig,
        rng: &mut R,
    ) -> Result<(Self, GeneratedNetwork), IvsError> {
        config.validate()?;
        let generated =
            NetworkGenerator::new(codec.as_ref()).generate(config.persons, config.infections, rng)?;
        let service = Self::new(
            codec,
            generated.network.clone(),
            config.edge_activation,
            config.max_distance,
        );
        Ok((service, generated))
    }

    #[must_use]
    pub fn network(&self) -> &ContactNetwork {
        &self.network
    }

    #[must_use]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    #[must_use]
    pub fn persons(&self) -> usize {
        self.network.persons()
    }

    /// Parse a person index typed by a user.
    ///
    /// # Errors
    /// Returns `IvsError::InvalidInput` for anything that is not an integer
    /// and `IvsError::InvalidPersonIndex` for integers outside `[0, N)`,
    /// including ones too large for `i64`.
    pub fn parse_person(&self, input: &str) -> Result<usize, IvsError> {
        let trimmed = input.trim();
        match trimmed.parse::<i64>() {
            Ok(index) => self.check_person(index),
            Err(_) => {
                let digits = trimmed
                    .strip_prefix(|c: char| c == '-' || c == '+')
                    .unwrap_or(trimmed);
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    let index = if trimmed.starts_with('-') { i64::MIN } else { i64::MAX };
                    return Err(IvsError::InvalidPersonIndex {
                        index,
                        persons: self.persons(),
                    });
                }
                Err(IvsError::InvalidInput(format!(
                    "{trimmed:?} is not an integer person index"
                )))
            }
        }
    }

    /// Validate an integer person index.
    ///
    /// # Errors
    /// Returns `IvsError::InvalidPersonIndex` when outside `[0, N)`.
    pub fn check_person(&self, index: i64) -> Result<usize, IvsError> {
        usize::try_from(index)
            .ok()
            .filter(|&i| self.network.contains(i))
            .ok_or(IvsError::InvalidPersonIndex {
                index,
                persons: self.persons(),
            })
    }

    /// Assess a person with fresh entropy-seeded randomness.
    ///
    /// # Errors
    /// See [`RiskService::assess_with_rng`].
    pub fn assess(&self, person: usize) -> Result<RiskAssessment, IvsError> {
        let mut rng = ChaCha20Rng::from_entropy();
        self.assess_with_rng(person, &mut rng)
    }

    /// Run the full query pipeline: [`RiskService::propagate`] then
    /// [`RiskService::conclude`].
    ///
    /// # Errors
    /// `InvalidPersonIndex` for a bad index; `ContextMismatch` or
    /// `DecodeFailure` abort the query instead of yielding a score.
    pub fn assess_with_rng<R: Rng>(
        &self,
        person: usize,
        rng: &mut R,
    ) -> Result<RiskAssessment, IvsError> {
        tracing::info!("Starting encrypted risk query...");
        let propagation = self.propagate(person, rng)?;
        self.conclude(person, propagation)
    }

    /// Encrypted traversal from `person`. Nothing is decrypted.
    ///
    /// # Errors
    /// `InvalidPersonIndex` for a bad index, or any codec failure.
    pub fn propagate<R: Rng>(&self, person: usize, rng: &mut R) -> Result<Propagation, IvsError> {
        tracing::debug!("Step 1: Propagating encrypted statuses...");
        RiskPropagator::new(self.codec.as_ref(), self.activation).compute_risk(
            &self.network,
            person,
            self.max_distance,
            rng,
        )
    }

    /// Decode the aggregate of a traversal (the only decryption of the
    /// query), classify per infection and decide admission.
    ///
    /// # Errors
    /// `ContextMismatch` or `DecodeFailure` when the aggregate cannot be
    /// turned into finite scores, one per infection.
    pub fn conclude(
        &self,
        person: usize,
        propagation: Propagation,
    ) -> Result<RiskAssessment, IvsError> {
        tracing::debug!(
            "Step 2: Decoding aggregate ({} bytes)...",
            propagation.accumulator.size_bytes()
        );
        let decoded = self.codec.decode(&propagation.accumulator)?;
        if decoded.len() != self.network.infections() {
            return Err(IvsError::DecodeFailure(format!(
                "decoded {} scores for {} infections",
                decoded.len(),
                self.network.infections()
            )));
        }

        tracing::debug!("Step 3: Classifying...");
        let assessment = RiskAssessment::from_decoded(
            person,
            &decoded,
            &propagation.weights,
            propagation.visited,
        )
        .map_err(IvsError::DecodeFailure)?;

        tracing::info!(
            "Assessment complete: person={}, composite={:.2}, verdict={}, visited={}",
            assessment.person,
            assessment.composite,
            assessment.verdict,
            assessment.visited.len()
        );

        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clear::ClearCodec;
    use crate::application::propagation::BASE_RISK;
    use crate::domain::{RiskLevel, Verdict};
    use approx::assert_abs_diff_eq;

    fn create_test_service(config: &EngineConfig) -> RiskService<ClearCodec> {
        let codec = Arc::new(ClearCodec::new("ctx"));
        let mut rng = ChaCha20Rng::seed_from_u64(1234);
        let (service, _) = RiskService::bootstrap(codec, config, &mut rng).expect("bootstrap");
        service
    }

    fn small_config() -> EngineConfig {
        EngineConfig {
            persons: 6,
            infections: 3,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_parse_person() {
        let service = create_test_service(&small_config());

        assert_eq!(service.parse_person(" 4 \n").expect("valid"), 4);
        assert!(matches!(service.parse_person("abc"), Err(IvsError::InvalidInput(_))));
        assert!(matches!(service.parse_person("2.5"), Err(IvsError::InvalidInput(_))));
        assert!(matches!(service.parse_person(""), Err(IvsError::InvalidInput(_))));
        assert!(matches!(
            service.parse_person("6"),
            Err(IvsError::InvalidPersonIndex { index: 6, persons: 6 })
        ));
        assert!(matches!(
            service.parse_person("-1"),
            Err(IvsError::InvalidPersonIndex { index: -1, .. })
        ));
    }

    #[test]
    fn test_parse_person_beyond_i64() {
        let service = create_test_service(&small_config());

        for input in ["99999999999999999999", "+99999999999999999999", "-99999999999999999999"] {
            let err = service.parse_person(input).expect_err("out of range");
            assert!(
                matches!(err, IvsError::InvalidPersonIndex { persons: 6, .. }),
                "{input} gave {err:?}"
            );
            assert!(err.is_recoverable());
        }
        assert!(matches!(service.parse_person("-"), Err(IvsError::InvalidInput(_))));
        assert!(matches!(service.parse_person("1e30"), Err(IvsError::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_index_leaves_service_usable() {
        let service = create_test_service(&small_config());
        let codec_encodes = service.codec().encodes();

        let err = service.parse_person("6").expect_err("out of range");
        assert!(err.is_recoverable());
        assert_eq!(service.codec().encodes(), codec_encodes);

        let assessment = service.assess(5).expect("next query still works");
        assert_eq!(assessment.person, 5);
    }

    #[test]
    fn test_default_rule_yields_base_risk_assessment() {
        let service = create_test_service(&small_config());
        let assessment = service.assess(2).expect("assess");

        assert_eq!(assessment.visited, vec![2]);
        assert_eq!(assessment.scores.len(), 3);
        for score in &assessment.scores {
            assert_abs_diff_eq!(score.score, BASE_RISK, epsilon = 1e-9);
            assert_eq!(score.level, RiskLevel::Safe);
        }
        assert_abs_diff_eq!(assessment.composite, BASE_RISK, epsilon = 1e-9);
        assert_eq!(assessment.verdict, Verdict::Allowed);
    }

    #[test]
    fn test_threshold_rule_reaches_contacts() {
        let config = EngineConfig {
            edge_activation: EdgeActivation::Threshold(0.0),
            ..small_config()
        };
        let service = create_test_service(&config);
        let assessment = service.assess(0).expect("assess");

        // A zero threshold activates every edge, so the whole network is reached.
        assert_eq!(assessment.visited.len(), 6);
        assert_eq!(assessment.visited[0], 0);
    }

    #[test]
    fn test_staged_query_matches_assess_with_rng() {
        let config = EngineConfig {
            edge_activation: EdgeActivation::Threshold(2.0),
            ..small_config()
        };
        let service = create_test_service(&config);

        let propagation = service
            .propagate(3, &mut ChaCha20Rng::seed_from_u64(8))
            .expect("propagate");
        let staged = service.conclude(3, propagation).expect("conclude");
        let direct = service
            .assess_with_rng(3, &mut ChaCha20Rng::seed_from_u64(8))
            .expect("assess");

        assert_eq!(staged.visited, direct.visited);
        assert_abs_diff_eq!(staged.composite, direct.composite, epsilon = 1e-12);
    }

    #[test]
    fn test_assessment_serializes() {
        let service = create_test_service(&small_config());
        let assessment = service.assess(1).expect("assess");
        let json = serde_json::to_string(&assessment).expect("serialize");
        assert!(json.contains("\"verdict\":\"Allowed\""));
    }

    #[test]
    fn test_foreign_network_fails_decode_path() {
        let owner = ClearCodec::new("owner");
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let generated = NetworkGenerator::new(&owner)
            .generate(3, 2, &mut rng)
            .expect("generate");

        let service = RiskService::new(
            Arc::new(ClearCodec::new("stranger")),
            generated.network,
            EdgeActivation::Threshold(0.0),
            5,
        );
        let err = service.assess(0).expect_err("mismatched context");
        assert!(matches!(err, IvsError::ContextMismatch { .. }));
        assert!(!err.is_recoverable());
    }
}
