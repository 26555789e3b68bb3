//! GGM-tree vector commitments with compact openings.
//!
//! A committer expands a single root seed into `N` leaf seeds using a
//! length-doubling [PRG](prg::Prg) arranged as a binary tree, and commits to
//! all leaves at once. An opening hides a few leaves, typically one per group
//! of a batched all-but-one vector commitment, and reveals everything else.
//! Instead of one co-path per hidden leaf, the opening reveals the Octopus
//! [cover](cover::Cover): the few subtree roots whose leaves are exactly the
//! leaves to be opened, sharing ancestors between the hidden leaves' paths.
//!
//! ```
//! use ggm_octopus::prelude::*;
//!
//! let root_seed = Seed::new([42; Seed::BYTES]);
//! let committer = Committer::commit(Shake256Prg::default(), MerkleCombiner, 5, root_seed)?;
//! let proof = committer.open([3])?;
//!
//! let verifier = Verifier::new(Shake256Prg::default(), MerkleCombiner, 5)?;
//! verifier.verify(&committer.root(), &[0, 1, 2, 4], &proof)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Leaf counts need not be powers of two. The leaves are split into perfect
//! binary trees along the binary representation of `N`; see [`tree`].

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod codec;
pub mod commitment;
pub mod committer;
pub mod config;
pub mod cover;
pub mod digest;
pub mod error;
pub mod hidden_set;
pub mod prelude;
pub mod prg;
pub mod proof;
pub mod seed;
pub mod tree;
pub mod verifier;

pub(crate) mod ggm;

#[cfg(test)]
pub(crate) mod test_shared;
