use crate::commitment::Combiner;
use crate::commitment::MerkleCombiner;
use crate::cover::Cover;
use crate::cover::compute_batched_cover;
use crate::cover::compute_cover;
use crate::digest::CommitmentRoot;
use crate::digest::LeafCommitment;
use crate::error::OpeningError;
use crate::ggm;
use crate::hidden_set::GroupLayout;
use crate::prg::Prg;
use crate::prg::Shake256Prg;
use crate::proof::OpeningProof;
use crate::proof::build_proof;
use crate::seed::Seed;
use crate::tree::TreeShape;

/// The committing party of a GGM-tree vector commitment.
///
/// Committing expands the root seed into all leaves once. Of the expansion,
/// only the public leaf commitments are kept; leaf seeds are wiped right after
/// being committed to. Openings re-derive the few seeds they reveal from the
/// root seed.
#[derive(Debug, Clone)]
pub struct Committer<P = Shake256Prg, C = MerkleCombiner> {
    prg: P,
    combiner: C,
    shape: TreeShape,
    root_seed: Seed,
    leaf_commitments: Vec<LeafCommitment>,
    root: CommitmentRoot,
}

impl<P: Prg, C: Combiner> Committer<P, C> {
    pub fn commit(
        prg: P,
        combiner: C,
        num_leaves: u64,
        root_seed: Seed,
    ) -> Result<Self, OpeningError> {
        let shape = TreeShape::new(num_leaves)?;
        let leaf_commitments =
            ggm::subtree_commitments(&prg, &shape, shape.root_node(), root_seed.clone());
        let root = combiner.combine(&shape, &leaf_commitments)?;
        log::debug!("committed to {num_leaves} leaves");

        Ok(Self {
            prg,
            combiner,
            shape,
            root_seed,
            leaf_commitments,
            root,
        })
    }

    pub fn root(&self) -> CommitmentRoot {
        self.root
    }

    pub fn shape(&self) -> &TreeShape {
        &self.shape
    }

    pub fn prg(&self) -> &P {
        &self.prg
    }

    pub fn combiner(&self) -> &C {
        &self.combiner
    }

    /// The commitments of all leaves, in order.
    pub fn leaf_commitments(&self) -> &[LeafCommitment] {
        &self.leaf_commitments
    }

    /// Open all leaves except for the hidden ones.
    pub fn open(
        &self,
        hidden_indices: impl IntoIterator<Item = u64>,
    ) -> Result<OpeningProof, OpeningError> {
        let cover = compute_cover(&self.shape, hidden_indices)?;
        self.assemble(&cover)
    }

    /// Open all leaves except for exactly one hidden leaf per group of the
    /// layout.
    pub fn open_batched(
        &self,
        layout: &GroupLayout,
        hidden_indices: impl IntoIterator<Item = u64>,
    ) -> Result<OpeningProof, OpeningError> {
        let cover = compute_batched_cover(&self.shape, layout, hidden_indices)?;
        self.assemble(&cover)
    }

    fn assemble(&self, cover: &Cover) -> Result<OpeningProof, OpeningError> {
        build_proof(
            &self.prg,
            &self.shape,
            &self.root_seed,
            cover,
            &self.leaf_commitments,
        )
    }
}
