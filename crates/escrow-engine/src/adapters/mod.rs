//! # Adapters Layer (Outer Hexagon)
//!
//! Reference implementations of the driven ports.
//!
//! - `InMemoryLedger`: asset ledger held in process memory
//! - `KeccakAddressSpace`: record address derivation
//! - `Ed25519Verifier` / `Ed25519Signer`: signer authentication

pub mod address_space;
pub mod ledger;
pub mod signature;

pub use address_space::*;
pub use ledger::*;
pub use signature::*;
