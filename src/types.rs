//! Core types for the canopy manifest index.

/// Hash: 256-bit content digest or combined subtree digest
pub type Hash = [u8; 32];

/// NodeIx: index of a node slot inside a tree's arena
pub type NodeIx = usize;
