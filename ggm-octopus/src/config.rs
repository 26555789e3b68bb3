//! Tuning knobs for tree expansion and verification. They decide when work
//! moves to the rayon thread pool and never change a commitment or a proof.
//!
//! Settings are thread-local. If `GGM_OCTOPUS_EXPANSION_PARALLELIZATION_CUTOFF`
//! is set, it wins over [`set_expansion_parallelization_cutoff`].

use std::cell::RefCell;

use arbitrary::Arbitrary;

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::new());
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Arbitrary)]
struct Config {
    pub expansion_parallelization_cutoff: ExpansionParallelizationCutoff,
}

impl Config {
    fn new() -> Self {
        let expansion_parallelization_cutoff = ExpansionParallelizationCutoff::new(None);

        Self {
            expansion_parallelization_cutoff,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Arbitrary)]
struct ExpansionParallelizationCutoff(usize);

impl ExpansionParallelizationCutoff {
    const ENV_VAR: &'static str = "GGM_OCTOPUS_EXPANSION_PARALLELIZATION_CUTOFF";
    const DEFAULT: usize = 1024;
    const MINIMUM: usize = 2;

    /// The environment variable, else the given value, else the default.
    fn new(config_value: Option<usize>) -> Self {
        let cutoff = std::env::var(Self::ENV_VAR)
            .ok()
            .and_then(|s| s.parse().ok())
            .or(config_value)
            .unwrap_or(Self::DEFAULT)
            .max(Self::MINIMUM);

        Self(cutoff)
    }
}

/// Sets the cutoff for parallelizing the expansion of GGM trees.
///
/// For example, if the cutoff is set to 1024, then a layer of the GGM tree
/// with fewer than 1024 nodes is expanded sequentially. Layers with 1024 or
/// more nodes are expanded in parallel. The same cutoff applies to the number
/// of subtrees a verifier expands from an opening proof, and to the number of
/// leaves of a peak whose Merkle root is computed by the
/// [`MerkleCombiner`](crate::commitment::MerkleCombiner).
///
/// Can also be set via the environment variable
/// `GGM_OCTOPUS_EXPANSION_PARALLELIZATION_CUTOFF`. The environment variable
/// has higher precedence than this function.
///
/// The default is 1024. The minimum is always 2.
pub fn set_expansion_parallelization_cutoff(cutoff: usize) {
    let cutoff = ExpansionParallelizationCutoff::new(Some(cutoff));
    CONFIG.with(|c| c.borrow_mut().expansion_parallelization_cutoff = cutoff);
}

pub(crate) fn expansion_parallelization_cutoff() -> usize {
    CONFIG
        .with(|c| c.borrow().expansion_parallelization_cutoff)
        .0
}
