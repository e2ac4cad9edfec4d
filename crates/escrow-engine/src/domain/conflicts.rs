//! # Record Conflict Detection
//!
//! Which records an instruction reads and writes, and which pairs of
//! instructions contend for the same record.
//!
//! Instructions over disjoint participant records are independent. Anything
//! that writes the escrow record contends with every other instruction that
//! touches it.

use crate::domain::value_objects::Address;
use serde::{Deserialize, Serialize};

/// Records read and written by one instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPattern {
    /// Records read.
    pub reads: Vec<Address>,
    /// Records written.
    pub writes: Vec<Address>,
}

impl AccessPattern {
    /// Empty pattern.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the records read.
    #[must_use]
    pub fn with_reads(mut self, reads: Vec<Address>) -> Self {
        self.reads = reads;
        self
    }

    /// Set the records written.
    #[must_use]
    pub fn with_writes(mut self, writes: Vec<Address>) -> Self {
        self.writes = writes;
        self
    }

    /// First record over which `self` and `other` conflict, if any.
    pub fn conflict_with(&self, other: &AccessPattern) -> Option<(ConflictType, Address)> {
        if let Some(addr) = self.writes.iter().find(|a| other.writes.contains(*a)) {
            return Some((ConflictType::WriteWrite, *addr));
        }
        if let Some(addr) = self.reads.iter().find(|a| other.writes.contains(*a)) {
            return Some((ConflictType::ReadWrite, *addr));
        }
        if let Some(addr) = self.writes.iter().find(|a| other.reads.contains(*a)) {
            return Some((ConflictType::ReadWrite, *addr));
        }
        None
    }
}

/// Conflict type between instructions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictType {
    /// One reads a record the other writes.
    ReadWrite,
    /// Both write the same record.
    WriteWrite,
}

/// Conflict information
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    /// Index of the earlier instruction.
    pub first_index: usize,
    /// Index of the later instruction.
    pub second_index: usize,
    /// Kind of overlap.
    pub conflict_type: ConflictType,
    /// First contended record.
    pub conflicting_address: Address,
}

/// Detect conflicts between every pair of access patterns
pub fn detect_conflicts(patterns: &[AccessPattern]) -> Vec<ConflictInfo> {
    let mut conflicts = Vec::new();

    for i in 0..patterns.len() {
        for j in (i + 1)..patterns.len() {
            if let Some((conflict_type, address)) = patterns[i].conflict_with(&patterns[j]) {
                conflicts.push(ConflictInfo {
                    first_index: i,
                    second_index: j,
                    conflict_type,
                    conflicting_address: address,
                });
            }
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESCROW: Address = Address::new([0xE5; 32]);
    const ALICE: Address = Address::new([0xA1; 32]);
    const BOB: Address = Address::new([0xB0; 32]);

    #[test]
    fn test_detect_write_write_conflict() {
        let patterns = vec![
            AccessPattern::new().with_reads(vec![ALICE]).with_writes(vec![ESCROW]),
            AccessPattern::new().with_reads(vec![BOB]).with_writes(vec![ESCROW]),
        ];

        let conflicts = detect_conflicts(&patterns);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::WriteWrite);
        assert_eq!(conflicts[0].conflicting_address, ESCROW);
    }

    #[test]
    fn test_detect_read_write_conflict() {
        let patterns = vec![
            AccessPattern::new().with_writes(vec![ESCROW]),
            AccessPattern::new().with_reads(vec![ESCROW]).with_writes(vec![ALICE]),
        ];

        let conflicts = detect_conflicts(&patterns);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::ReadWrite);
    }

    #[test]
    fn test_no_conflict_disjoint_participants() {
        let patterns = vec![
            AccessPattern::new().with_writes(vec![ALICE]),
            AccessPattern::new().with_writes(vec![BOB]),
        ];

        assert!(detect_conflicts(&patterns).is_empty());
    }

    #[test]
    fn test_shared_reads_do_not_conflict() {
        let patterns = vec![
            AccessPattern::new().with_reads(vec![ESCROW]).with_writes(vec![ALICE]),
            AccessPattern::new().with_reads(vec![ESCROW]).with_writes(vec![BOB]),
        ];

        assert!(detect_conflicts(&patterns).is_empty());
    }
}
