//! Expansion of seeds down the GGM tree.

use rayon::prelude::*;

use crate::config;
use crate::digest::LeafCommitment;
use crate::prg::Prg;
use crate::seed::Seed;
use crate::tree::NodeId;
use crate::tree::TreeShape;

/// Expand the seed of `node` down to the leaves, layer by layer. Returns the
/// seeds of all leaves in the node's leaf range, in order.
///
/// Children outside the tree are never derived, or are dropped right after
/// being derived. Only the seeds of the current layer are kept in memory;
/// everything else is zeroized as soon as it is no longer needed.
pub(crate) fn expand_subtree<P: Prg + ?Sized>(
    prg: &P,
    shape: &TreeShape,
    node: NodeId,
    seed: Seed,
) -> Vec<Seed> {
    let cutoff = config::expansion_parallelization_cutoff();

    let mut layer = vec![seed];
    let mut first_index = node.index();
    for depth in node.depth()..shape.height() {
        let expand = |(offset, seed): (usize, &Seed)| {
            let parent = NodeId::new(depth, first_index + offset as u64);
            let (left, right) = prg.expand(seed, parent);
            [left, right]
        };
        let mut next_layer: Vec<Seed> = if layer.len() >= cutoff {
            layer.par_iter().enumerate().flat_map_iter(expand).collect()
        } else {
            layer.iter().enumerate().flat_map(expand).collect()
        };

        // the left child of a node in the domain is in the domain, too
        first_index *= 2;
        let num_present = shape.layer_size(depth + 1) - first_index;
        if num_present < next_layer.len() as u64 {
            next_layer.truncate(num_present as usize);
        }
        layer = next_layer;
    }

    log::trace!("expanded node {node} to {} leaves", layer.len());
    layer
}

/// Commit to consecutive leaf seeds, the first of which belongs to leaf
/// `first_leaf`.
pub(crate) fn commit_leaves<P: Prg + ?Sized>(
    prg: &P,
    first_leaf: u64,
    leaf_seeds: &[Seed],
) -> Vec<LeafCommitment> {
    let commit = |(offset, seed): (usize, &Seed)| prg.commit(seed, first_leaf + offset as u64);
    if leaf_seeds.len() >= config::expansion_parallelization_cutoff() {
        leaf_seeds.par_iter().enumerate().map(commit).collect()
    } else {
        leaf_seeds.iter().enumerate().map(commit).collect()
    }
}

/// Expand the seed of `node` and commit to all leaves below it.
pub(crate) fn subtree_commitments<P: Prg + ?Sized>(
    prg: &P,
    shape: &TreeShape,
    node: NodeId,
    seed: Seed,
) -> Vec<LeafCommitment> {
    let first_leaf = shape.range(node).start();
    let leaf_seeds = expand_subtree(prg, shape, node, seed);
    commit_leaves(prg, first_leaf, &leaf_seeds)
}
