//! # Address Space Adapter
//!
//! Keccak-based record address derivation bound to one program id.

use crate::domain::services::{default_program_id, derive_address};
use crate::domain::value_objects::Address;
use crate::ports::outbound::AddressSpace;

/// Derives record addresses as `keccak256(program_id ++ seeds)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeccakAddressSpace {
    program_id: [u8; 32],
}

impl KeccakAddressSpace {
    /// Address space of the program `program_id`.
    #[must_use]
    pub const fn new(program_id: [u8; 32]) -> Self {
        Self { program_id }
    }

    /// Program id this space derives under.
    #[must_use]
    pub const fn program_id(&self) -> &[u8; 32] {
        &self.program_id
    }
}

impl Default for KeccakAddressSpace {
    fn default() -> Self {
        Self::new(default_program_id())
    }
}

impl AddressSpace for KeccakAddressSpace {
    fn derive(&self, seeds: &[&[u8]]) -> Address {
        derive_address(&self.program_id, seeds)
    }
}
