//! # Ed25519 Signature Adapter
//!
//! Identities are Ed25519 verifying keys. `Ed25519Verifier` authenticates
//! signed instructions; `Ed25519Signer` builds them (clients and tests).

use crate::domain::value_objects::{Identity, Signature};
use crate::errors::EscrowError;
use crate::ports::inbound::{signing_message, Instruction, SignedInstruction};
use crate::ports::outbound::SignatureVerifier;
use crate::replay::unix_timestamp;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use uuid::Uuid;

/// Validity window `sign_instruction` gives new instructions, in seconds.
pub const DEFAULT_VALIDITY_SECS: u64 = 60;

/// Ed25519 signature verification.
///
/// Uses strict verification: small-order keys and non-canonical `R` are
/// rejected, so no signature verifies under more than one key.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    /// Create a new verifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, identity: &Identity, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(identity.as_bytes()) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        key.verify_strict(message, &sig).is_ok()
    }
}

/// Ed25519 keypair that signs instructions for one program.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Keypair from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Identity (verifying key) of this signer.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign raw bytes.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::new(self.signing_key.sign(message).to_bytes())
    }

    /// Sign `instruction` for `program_id` under a fresh random nonce,
    /// valid for [`DEFAULT_VALIDITY_SECS`].
    pub fn sign_instruction(
        &self,
        program_id: &[u8; 32],
        instruction: Instruction,
    ) -> Result<SignedInstruction, EscrowError> {
        let valid_until = unix_timestamp().saturating_add(DEFAULT_VALIDITY_SECS);
        self.sign_instruction_with(program_id, Uuid::new_v4(), valid_until, instruction)
    }

    /// Sign `instruction` for `program_id` under an explicit nonce and expiry.
    pub fn sign_instruction_with(
        &self,
        program_id: &[u8; 32],
        nonce: Uuid,
        valid_until: u64,
        instruction: Instruction,
    ) -> Result<SignedInstruction, EscrowError> {
        let signer = self.identity();
        let message = signing_message(program_id, &signer, &nonce, valid_until, &instruction)?;
        Ok(SignedInstruction {
            signer,
            nonce,
            valid_until,
            instruction,
            signature: self.sign(&message),
        })
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}
