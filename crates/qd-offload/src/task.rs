//! The unit of device dispatch produced by the offloader (§3
//! `OffloadedTask`), grounded on the reference `OffloadedStmt`/
//! `OffloadedTaskType` pair (`ir/offloaded_task_type.h`).

use qd_ir::{BlockId, SNodeId};
use rustc_hash::FxHashMap;

/// The closed set of dispatch kinds an `OffloadedTask` may take.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum OffloadedTaskKind {
    Serial,
    RangeFor,
    StructFor,
    MeshFor,
    ListGen,
    Gc,
}

/// Mesh-for accompanying metadata: the patch count and, per mesh element
/// type tag, the number of locally-owned elements (`owned_num_local` in
/// the reference CUDA/LLVM mesh lowering).
#[derive(Clone, Debug, Default)]
pub struct MeshMeta {
    pub patch_count: u32,
    pub owned_counts_by_element_type: FxHashMap<u32, u32>,
}

/// One dispatch unit, in program order, produced by [`crate::offload`].
#[derive(Clone, Debug)]
pub struct OffloadedTask {
    pub kind: OffloadedTaskKind,
    pub body: BlockId,

    /// Staged-in values a task reads from statements defined by an earlier
    /// task (§4.4 "explicit parameter-passing through the task's
    /// thread-local buffer"); populated by
    /// [`crate::offloader::relay_cross_task_values`].
    pub tls_prologue: Option<BlockId>,
    pub tls_epilogue: Option<BlockId>,

    /// Populated by `make_block_local`/`insert_scratch_pad`.
    pub bls_prologue: Option<BlockId>,
    pub bls_epilogue: Option<BlockId>,

    pub mesh_prologue: Option<BlockId>,
    pub mesh_meta: Option<MeshMeta>,

    /// Target SNode for `struct_for`/`list_gen`/`gc`.
    pub target_snode: Option<SNodeId>,

    /// Bounds for `range_for`.
    pub begin: Option<i64>,
    pub end: Option<i64>,
    pub reversed: bool,

    pub block_dim: u32,
    pub num_cpu_threads: u32,
    pub tls_size: u32,
    pub bls_size: u32,
}

impl OffloadedTask {
    pub fn new(kind: OffloadedTaskKind, body: BlockId) -> Self {
        OffloadedTask {
            kind,
            body,
            tls_prologue: None,
            tls_epilogue: None,
            bls_prologue: None,
            bls_epilogue: None,
            mesh_prologue: None,
            mesh_meta: None,
            target_snode: None,
            begin: None,
            end: None,
            reversed: false,
            block_dim: 1,
            num_cpu_threads: 1,
            tls_size: 0,
            bls_size: 0,
        }
    }
}
