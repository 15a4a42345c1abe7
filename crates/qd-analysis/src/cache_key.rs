//! Offline-cache-key hashing: a stable byte-string fingerprint of an IR
//! subtree, independent of `StmtId`/`SNodeId` identity and of any map
//! insertion order, because entity indices are re-numbered positionally
//! (first occurrence in a preorder walk) before encoding.

use qd_ir::{BlockId, KernelIr, SNodeTree, StmtId, StmtKind};
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use std::collections::hash_map::Entry;

/// A canonical byte encoder: ids are rewritten to "order of first
/// definition" local indices so that two structurally identical IRs -
/// built through different statement-allocation orders, or differing only
/// in unused entity numbering - produce byte-identical output.
struct Canonicalizer {
    local_ids: FxHashMap<StmtId, u32>,
    buf: Vec<u8>,
}

impl Canonicalizer {
    fn new() -> Self {
        Canonicalizer {
            local_ids: FxHashMap::default(),
            buf: Vec::new(),
        }
    }

    fn local_id(&mut self, stmt: StmtId) -> u32 {
        let next = self.local_ids.len() as u32;
        match self.local_ids.entry(stmt) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                e.insert(next);
                next
            }
        }
    }

    fn tag(&mut self, t: u8) {
        self.buf.push(t);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    fn bytes(&mut self, b: &[u8]) {
        self.u32(b.len() as u32);
        self.buf.extend_from_slice(b);
    }

    fn stmt_ref(&mut self, s: StmtId) {
        let id = self.local_id(s);
        self.u32(id);
    }

    fn walk_block(&mut self, ir: &KernelIr, block: BlockId) {
        let stmts = ir.block(block).stmts.clone();
        self.u32(stmts.len() as u32);
        for s in stmts {
            self.walk_stmt(ir, s);
        }
    }

    fn walk_stmt(&mut self, ir: &KernelIr, stmt: StmtId) {
        // Assign (or reuse) this statement's local id before encoding its
        // body, so self-references inside e.g. a loop that reads a value
        // defined before it resolve to an already-known id.
        self.local_id(stmt);
        match ir.stmt(stmt).kind.clone() {
            StmtKind::BinaryOp { op, lhs, rhs } => {
                self.tag(1);
                self.u32(op as u32);
                self.stmt_ref(lhs);
                self.stmt_ref(rhs);
            }
            StmtKind::UnaryOp { op, operand } => {
                self.tag(2);
                self.u32(op as u32);
                self.stmt_ref(operand);
            }
            StmtKind::ConstI64(v) => {
                self.tag(3);
                self.i64(v);
            }
            StmtKind::ConstF64(v) => {
                self.tag(4);
                self.f64(v);
            }
            StmtKind::Cast { operand, to } => {
                self.tag(5);
                self.stmt_ref(operand);
                self.bytes(format!("{to:?}").as_bytes());
            }
            StmtKind::GlobalPtr { snode, indices } => {
                self.tag(6);
                self.u32(snode.index() as u32);
                self.u32(indices.len() as u32);
                for i in indices {
                    self.stmt_ref(i);
                }
            }
            StmtKind::PtrOffset { base, offset } => {
                self.tag(7);
                self.stmt_ref(base);
                self.stmt_ref(offset);
            }
            StmtKind::GlobalLoad { ptr } => {
                self.tag(8);
                self.stmt_ref(ptr);
            }
            StmtKind::GlobalStore { ptr, value } => {
                self.tag(9);
                self.stmt_ref(ptr);
                self.stmt_ref(value);
            }
            StmtKind::AtomicRmw { op, ptr, value } => {
                self.tag(10);
                self.u32(op as u32);
                self.stmt_ref(ptr);
                self.stmt_ref(value);
            }
            StmtKind::SNodeOp {
                kind,
                snode,
                indices,
                value,
            } => {
                self.tag(11);
                self.u32(kind as u32);
                self.u32(snode.index() as u32);
                self.u32(indices.len() as u32);
                for i in indices {
                    self.stmt_ref(i);
                }
                self.tag(value.is_some() as u8);
                if let Some(v) = value {
                    self.stmt_ref(v);
                }
            }
            StmtKind::AllocaLocal { ty } => {
                self.tag(12);
                self.bytes(format!("{ty:?}").as_bytes());
            }
            StmtKind::LocalLoad { alloca } => {
                self.tag(13);
                self.stmt_ref(alloca);
            }
            StmtKind::LocalStore { alloca, value } => {
                self.tag(14);
                self.stmt_ref(alloca);
                self.stmt_ref(value);
            }
            StmtKind::RangeFor {
                begin,
                end,
                reversed,
                body,
            } => {
                self.tag(15);
                self.stmt_ref(begin);
                self.stmt_ref(end);
                self.tag(reversed as u8);
                self.walk_block(ir, body);
            }
            StmtKind::StructFor { snode, body } => {
                self.tag(16);
                self.u32(snode.index() as u32);
                self.walk_block(ir, body);
            }
            StmtKind::WhileLoop { body } => {
                self.tag(17);
                self.walk_block(ir, body);
            }
            StmtKind::IfStmt {
                cond,
                then_block,
                else_block,
            } => {
                self.tag(18);
                self.stmt_ref(cond);
                self.walk_block(ir, then_block);
                self.tag(else_block.is_some() as u8);
                if let Some(e) = else_block {
                    self.walk_block(ir, e);
                }
            }
            StmtKind::RangeAssumption { input, low, high } => {
                self.tag(19);
                self.stmt_ref(input);
                self.i64(low);
                self.i64(high);
            }
            StmtKind::LoopUnique { input } => {
                self.tag(20);
                self.stmt_ref(input);
            }
            StmtKind::ExternalCall {
                symbol,
                args,
                has_result,
            } => {
                self.tag(21);
                self.bytes(symbol.as_bytes());
                self.u32(args.len() as u32);
                for a in args {
                    self.stmt_ref(a);
                }
                self.tag(has_result as u8);
            }
            StmtKind::OffloadedMarker { task_index } => {
                self.tag(22);
                self.u32(task_index);
            }
            StmtKind::KernelArg { index, ty } => {
                self.tag(23);
                self.u32(index);
                self.bytes(format!("{ty:?}").as_bytes());
            }
            StmtKind::KernelReturn { value } => {
                self.tag(24);
                self.stmt_ref(value);
            }
        }
    }
}

/// A structural hash of one `SNode` (ignoring its entity index), combined
/// into the overall key per §4.2/§4.7's "per-SNode structural hash"
/// requirement.
fn hash_snode_tree(tree: &SNodeTree, hasher: &mut Sha256) {
    for (_, node) in tree.nodes.iter() {
        hasher.update([node.tag as u8]);
        hasher.update(node.tree_id.to_le_bytes());
        hasher.update(node.num_active_indices.to_le_bytes());
        for e in &node.extractors {
            hasher.update([e.active as u8, e.num_bits]);
        }
        if let Some(ty) = &node.data_type {
            hasher.update(format!("{ty:?}").as_bytes());
        }
        for s in &node.shape {
            hasher.update(s.to_le_bytes());
        }
    }
}

/// Produce a stable fingerprint for `ir`, combined with the referenced
/// SNode trees' structural hashes and a config/capability fingerprint
/// supplied by the caller (`qd-core` mixes in `CompileConfig` and
/// `DeviceCapabilityConfig`, since those affect codegen and must
/// participate in the cache key per §4.7).
pub fn offline_cache_key(
    ir: &KernelIr,
    snode_trees: &[&SNodeTree],
    extra_config_bytes: &[u8],
) -> [u8; 32] {
    let mut canon = Canonicalizer::new();
    canon.walk_block(ir, ir.root_block);

    let mut hasher = Sha256::new();
    hasher.update(&canon.buf);
    for tree in snode_trees {
        hash_snode_tree(tree, &mut hasher);
    }
    hasher.update(extra_config_bytes);
    hasher.finalize().into()
}

use qd_entity::EntityRef;
