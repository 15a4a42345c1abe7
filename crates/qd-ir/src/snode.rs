//! The data-structure hierarchy ("SNode tree") describing a sparse/dense
//! layout, distinct from the kernel-body IR that reads and writes it.

use crate::entities::SNodeId;
use crate::types::DataType;
use qd_entity::PrimaryMap;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The classification of an SNode, matching the closed set named in the
/// data model: root, dense, pointer, bitmasked, dynamic, hash, bit_struct,
/// bit_array, place.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum SNodeTag {
    Root,
    Dense,
    Pointer,
    Bitmasked,
    Dynamic,
    Hash,
    BitStruct,
    BitArray,
    Place,
}

impl SNodeTag {
    /// `place` nodes are the only ones carrying a leaf data type; all
    /// others carry axis extractors instead.
    pub fn is_leaf(&self) -> bool {
        matches!(self, SNodeTag::Place)
    }

    /// A node tag that requires a materialized child list before a
    /// struct-for may iterate it (everything except a dense/place leaf).
    pub fn requires_list_gen(&self) -> bool {
        !matches!(self, SNodeTag::Dense | SNodeTag::Place)
    }

    /// Nodes whose active elements may be deallocated and therefore need a
    /// trailing `gc` task after a kernel that touches them.
    pub fn is_gc_eligible(&self) -> bool {
        matches!(self, SNodeTag::Pointer | SNodeTag::Dynamic | SNodeTag::Hash)
    }
}

/// A single physical axis extractor: whether an axis participates in this
/// SNode's indexing and how many bits of the flat index it consumes.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Extractor {
    pub active: bool,
    pub num_bits: u8,
}

/// A node in the SNode tree. Immutable once built; lives for the lifetime
/// of its containing tree.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct SNode {
    pub tag: SNodeTag,
    pub parent: Option<SNodeId>,
    pub children: Vec<SNodeId>,
    /// One extractor per physical axis; only meaningful for non-leaf tags.
    pub extractors: Vec<Extractor>,
    /// Only `place` nodes carry a data type.
    pub data_type: Option<DataType>,
    pub tree_id: u32,
    pub is_path_all_dense: bool,
    pub num_active_indices: u32,
    /// Per-axis shape (chunk size along each participating axis).
    pub shape: Vec<u32>,
    /// Marks this node as a candidate for the `make_block_local` pass.
    pub block_local_annotated: bool,
}

impl SNode {
    pub fn new_leaf(parent: SNodeId, data_type: DataType) -> Self {
        SNode {
            tag: SNodeTag::Place,
            parent: Some(parent),
            children: Vec::new(),
            extractors: Vec::new(),
            data_type: Some(data_type),
            tree_id: 0,
            is_path_all_dense: true,
            num_active_indices: 0,
            shape: Vec::new(),
            block_local_annotated: false,
        }
    }

    pub fn max_num_elements(&self) -> u32 {
        self.shape.iter().product::<u32>().max(1)
    }
}

/// The rooted forest of SNodes for one data-structure tree, identified by a
/// tree id and backed (conceptually) by one device allocation.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct SNodeTree {
    pub tree_id: u32,
    pub nodes: PrimaryMap<SNodeId, SNode>,
    pub root: Option<SNodeId>,
}

impl SNodeTree {
    pub fn new(tree_id: u32) -> Self {
        let mut nodes = PrimaryMap::new();
        let root = nodes.push(SNode {
            tag: SNodeTag::Root,
            parent: None,
            children: Vec::new(),
            extractors: Vec::new(),
            data_type: None,
            tree_id,
            is_path_all_dense: true,
            num_active_indices: 0,
            shape: Vec::new(),
            block_local_annotated: false,
        });
        SNodeTree {
            tree_id,
            nodes,
            root: Some(root),
        }
    }

    pub fn push_child(&mut self, parent: SNodeId, node: SNode) -> SNodeId {
        let id = self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    /// Acyclicity is structural by construction (children always post-date
    /// their parent in `PrimaryMap` allocation order); this verifies it for
    /// IR coming from elsewhere (e.g. deserialized from cache metadata).
    pub fn is_acyclic(&self) -> bool {
        for (id, node) in self.nodes.iter() {
            if let Some(parent) = node.parent {
                if parent.index() >= id.index() {
                    return false;
                }
            }
        }
        true
    }
}

use qd_entity::EntityRef;
