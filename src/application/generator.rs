//! Contact network generation.
//!
//! Builds an N-person network with random directed contact weights and an
//! encrypted random infection status per person.

use rand::Rng;

use crate::domain::{ContactNetwork, EncryptedVector, InfectionStatus, MAX_CONTACT_WEIGHT};
use crate::ports::VectorCodec;
use crate::IvsError;

/// Output of [`NetworkGenerator::generate`].
///
/// `statuses` are the plaintext vectors the ciphertexts were built from; they
/// exist for inspection and tests only.
#[derive(Debug, Clone)]
pub struct GeneratedNetwork {
    pub network: ContactNetwork,
    pub statuses: Vec<InfectionStatus>,
}

impl GeneratedNetwork {
    /// Per-person encrypted statuses, borrowed from the network diagonal.
    #[must_use]
    pub fn encrypted_statuses(&self) -> Vec<&EncryptedVector> {
        self.network.statuses().collect()
    }
}

/// Random network generator bound to a codec.
pub struct NetworkGenerator<'a, C: VectorCodec + ?Sized> {
    codec: &'a C,
}

impl<'a, C: VectorCodec + ?Sized> NetworkGenerator<'a, C> {
    pub fn new(codec: &'a C) -> Self {
        Self { codec }
    }

    /// Generate a network of `persons` people tracking `infections` infections.
    ///
    /// Off-diagonal weights are i.i.d. uniform in `[0, MAX_CONTACT_WEIGHT)`;
    /// each status indicator is a fair coin.
    ///
    /// # Errors
    /// Returns `IvsError::Validation` for zero sizes, or the codec's error if
    /// encoding fails.
    pub fn generate<R: Rng>(
        &self,
        persons: usize,
        infections: usize,
        rng: &mut R,
    ) -> Result<GeneratedNetwork, IvsError> {
        if persons == 0 || infections == 0 {
            return Err(IvsError::Validation(format!(
                "network needs at least one person and one infection (got {persons}x{infections})"
            )));
        }

        tracing::info!("Generating contact network: {persons} persons, {infections} infections");

        let weights: Vec<f64> = (0..persons * persons)
            .map(|idx| {
                if idx / persons == idx % persons {
                    0.0
                } else {
                    rng.gen_range(0.0..MAX_CONTACT_WEIGHT)
                }
            })
            .collect();

        let statuses: Vec<InfectionStatus> = (0..persons)
            .map(|_| InfectionStatus((0..infections).map(|_| rng.gen_bool(0.5)).collect()))
            .collect();

        let mut encrypted = Vec::with_capacity(persons);
        for (person, status) in statuses.iter().enumerate() {
            encrypted.push(self.codec.encode(&status.to_vec())?);
            tracing::trace!("Encrypted status of person {person}");
        }

        let network = ContactNetwork::from_parts(weights, encrypted).map_err(IvsError::Validation)?;
        tracing::info!("Contact network ready ({} encrypted statuses)", network.persons());

        Ok(GeneratedNetwork { network, statuses })
    }
}
