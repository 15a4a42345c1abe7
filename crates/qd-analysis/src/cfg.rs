//! Control-flow graph construction and the two required CFG-level rewrites:
//! store-to-load forwarding and dead-store elimination.

use qd_entity::{entity_impl, PrimaryMap};
use qd_ir::{BlockId, KernelIr, StmtId, StmtKind};
use rustc_hash::FxHashSet;

/// A node in the control-flow graph: a maximal straight-line run of
/// statements from one `qd_ir::Block`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasicBlockId(u32);
entity_impl!(BasicBlockId, "bb");

#[derive(Clone, Default)]
pub struct CfgNode {
    pub ir_block: Option<BlockId>,
    /// Half-open `[start, end)` index range into `ir_block`'s statement
    /// list covered by this node. `None` for the synthetic exit node.
    pub range: Option<(usize, usize)>,
    pub preds: Vec<BasicBlockId>,
    pub succs: Vec<BasicBlockId>,
}

/// The control-flow graph derived from a kernel body. Reachability is
/// strictly forward from `entry`.
pub struct ControlFlowGraph {
    pub nodes: PrimaryMap<BasicBlockId, CfgNode>,
    pub entry: BasicBlockId,
}

impl ControlFlowGraph {
    fn new_node(&mut self, ir_block: Option<BlockId>, range: Option<(usize, usize)>) -> BasicBlockId {
        self.nodes.push(CfgNode {
            ir_block,
            range,
            preds: Vec::new(),
            succs: Vec::new(),
        })
    }

    fn add_edge(&mut self, from: BasicBlockId, to: BasicBlockId) {
        if !self.nodes[from].succs.contains(&to) {
            self.nodes[from].succs.push(to);
        }
        if !self.nodes[to].preds.contains(&from) {
            self.nodes[to].preds.push(from);
        }
    }

    /// Statements covered by `node`, in program order.
    pub fn stmts_of(&self, ir: &KernelIr, node: BasicBlockId) -> Vec<StmtId> {
        match (self.nodes[node].ir_block, self.nodes[node].range) {
            (Some(block), Some((start, end))) => ir.block(block).stmts[start..end].to_vec(),
            _ => Vec::new(),
        }
    }

    /// `simplify_graph`: merge a node with its unique successor when that
    /// successor has no other predecessor. Returns whether anything merged.
    pub fn simplify_graph(&mut self) -> bool {
        let mut modified = false;
        loop {
            let mut merged_any = false;
            let ids: Vec<BasicBlockId> = self.nodes.iter().map(|(k, _)| k).collect();
            for id in ids {
                let succs = self.nodes[id].succs.clone();
                if succs.len() == 1 {
                    let only = succs[0];
                    if only != id && self.nodes[only].preds.len() == 1 {
                        let (succ_ir_block, succ_range) =
                            (self.nodes[only].ir_block, self.nodes[only].range);
                        let (my_ir_block, my_range) = (self.nodes[id].ir_block, self.nodes[id].range);
                        if let (Some(mb), Some((ms, me)), Some(sb), Some((ss, se))) =
                            (my_ir_block, my_range, succ_ir_block, succ_range)
                        {
                            if mb == sb && me == ss {
                                // Contiguous same-block ranges: fold into one node.
                                self.nodes[id].range = Some((ms, se));
                                let new_succs = self.nodes[only].succs.clone();
                                self.nodes[id].succs = new_succs.clone();
                                for s in new_succs {
                                    for p in self.nodes[s].preds.iter_mut() {
                                        if *p == only {
                                            *p = id;
                                        }
                                    }
                                }
                                self.nodes[only].preds.clear();
                                self.nodes[only].succs.clear();
                                merged_any = true;
                                modified = true;
                            }
                        }
                    }
                }
            }
            if !merged_any {
                break;
            }
        }
        modified
    }

    /// Store-to-load forwarding: a `GlobalLoad`/`LocalLoad` from a pointer
    /// whose most recent same-block write is a known value is replaced by
    /// that value. Returns whether the IR was modified.
    pub fn store_to_load_forwarding(&self, ir: &mut KernelIr) -> bool {
        let mut modified = false;
        for (id, _) in self.nodes.iter() {
            let stmts = self.stmts_of(ir, id);
            let mut last_store: std::collections::HashMap<StmtId, StmtId> =
                std::collections::HashMap::new();
            for stmt in stmts {
                match ir.stmt(stmt).kind.clone() {
                    StmtKind::GlobalStore { ptr, value } | StmtKind::LocalStore { alloca: ptr, value } => {
                        last_store.insert(ptr, value);
                    }
                    StmtKind::GlobalLoad { ptr } | StmtKind::LocalLoad { alloca: ptr } => {
                        if let Some(&value) = last_store.get(&ptr) {
                            ir.replace_usages_with(stmt, value);
                            modified = true;
                        }
                    }
                    _ => {}
                }
            }
        }
        modified
    }

    /// Dead-store elimination: a store to a pointer that is unconditionally
    /// overwritten by a later store in the same node, with no intervening
    /// load, is removed.
    pub fn dead_store_elimination(&self, ir: &mut KernelIr) -> bool {
        let mut modified = false;
        for (id, _) in self.nodes.iter() {
            let stmts = self.stmts_of(ir, id);
            let mut pending: std::collections::HashMap<StmtId, StmtId> =
                std::collections::HashMap::new();
            let mut to_erase = Vec::new();
            for stmt in stmts {
                match ir.stmt(stmt).kind.clone() {
                    StmtKind::GlobalStore { ptr, .. } | StmtKind::LocalStore { alloca: ptr, .. } => {
                        if let Some(&prev) = pending.get(&ptr) {
                            to_erase.push(prev);
                        }
                        pending.insert(ptr, stmt);
                    }
                    StmtKind::GlobalLoad { ptr } | StmtKind::LocalLoad { alloca: ptr } => {
                        pending.remove(&ptr);
                    }
                    _ => {}
                }
            }
            for stmt in to_erase {
                ir.erase(stmt);
                modified = true;
            }
        }
        modified
    }

    /// Dump a Graphviz `dot` rendering of this graph for debugging (the
    /// `QD_DUMP_CFG`/`TI_DUMP_CFG` env switches in the external interface
    /// trigger calls to this).
    pub fn dump_graph_to_file(&self, path: &std::path::Path) -> std::io::Result<()> {
        use std::fmt::Write as _;
        let mut s = String::from("digraph cfg {\n");
        for (id, node) in self.nodes.iter() {
            for &succ in &node.succs {
                let _ = writeln!(s, "  bb{} -> bb{};", id.0, succ.0);
            }
        }
        s.push_str("}\n");
        std::fs::write(path, s)
    }
}

/// Build the CFG for an entire kernel body.
pub fn build_cfg(ir: &KernelIr) -> ControlFlowGraph {
    let mut cfg = ControlFlowGraph {
        nodes: PrimaryMap::new(),
        entry: BasicBlockId::new(0),
    };
    let entry = cfg.new_node(None, None);
    cfg.entry = entry;
    let exits = build_region(ir, &mut cfg, ir.root_block, vec![entry]);
    let final_exit = cfg.new_node(None, None);
    for exit in exits {
        cfg.add_edge(exit, final_exit);
    }
    cfg
}

/// Lower one `qd_ir::Block`'s statement list into a chain of CFG nodes,
/// wiring `preds` as the predecessors of its first segment. Returns the set
/// of nodes that may flow out of this block (its exit predecessors).
fn build_region(
    ir: &KernelIr,
    cfg: &mut ControlFlowGraph,
    block: BlockId,
    preds: Vec<BasicBlockId>,
) -> Vec<BasicBlockId> {
    let stmts = &ir.block(block).stmts;
    let mut current_preds = preds;
    let mut seg_start = 0usize;

    let mut i = 0usize;
    while i < stmts.len() {
        let is_container = ir.stmt(stmts[i]).kind.is_container();
        if is_container {
            // Flush the straight-line segment seen so far, if non-empty.
            if i > seg_start {
                let seg = cfg.new_node(Some(block), Some((seg_start, i)));
                for p in &current_preds {
                    cfg.add_edge(*p, seg);
                }
                current_preds = vec![seg];
            }
            let exits = match ir.stmt(stmts[i]).kind.clone() {
                StmtKind::RangeFor { body, .. } | StmtKind::StructFor { body, .. } => {
                    // Loop: the pre-loop predecessors also flow past the loop
                    // directly (the zero-iteration path), alongside the body's
                    // exit (the last-iteration path).
                    let body_exits = build_region(ir, cfg, body, current_preds.clone());
                    let mut out = current_preds.clone();
                    out.extend(body_exits);
                    out
                }
                StmtKind::WhileLoop { body } => {
                    let body_exits = build_region(ir, cfg, body, current_preds.clone());
                    let mut out = current_preds.clone();
                    out.extend(body_exits);
                    out
                }
                StmtKind::IfStmt {
                    then_block,
                    else_block,
                    ..
                } => {
                    let then_exits = build_region(ir, cfg, then_block, current_preds.clone());
                    let else_exits = match else_block {
                        Some(eb) => build_region(ir, cfg, eb, current_preds.clone()),
                        None => current_preds.clone(),
                    };
                    let mut out = then_exits;
                    out.extend(else_exits);
                    out
                }
                _ => unreachable!(),
            };
            current_preds = exits;
            seg_start = i + 1;
        }
        i += 1;
    }
    if seg_start < stmts.len() || stmts.is_empty() {
        let seg = cfg.new_node(Some(block), Some((seg_start, stmts.len())));
        for p in &current_preds {
            cfg.add_edge(*p, seg);
        }
        current_preds = vec![seg];
    }
    current_preds
}

/// Deactivation-only helper retained for live-variable analysis: defs/uses
/// per node, expressed over `StmtId`.
pub fn defs_uses(ir: &KernelIr, cfg: &ControlFlowGraph, node: BasicBlockId) -> (FxHashSet<StmtId>, FxHashSet<StmtId>) {
    let mut defs = FxHashSet::default();
    let mut uses = FxHashSet::default();
    for stmt in cfg.stmts_of(ir, node) {
        for operand in ir.stmt(stmt).kind.operands() {
            if !defs.contains(&operand) {
                uses.insert(operand);
            }
        }
        if !ir.stmt(stmt).kind.result_type(|_| qd_ir::ResultType::None).is_none() {
            defs.insert(stmt);
        }
    }
    (defs, uses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_ir::StmtKind;

    #[test]
    fn straight_line_builds_single_node_plus_exit() {
        let mut ir = KernelIr::new();
        ir.push_stmt(ir.root_block, StmtKind::ConstI64(1));
        ir.push_stmt(ir.root_block, StmtKind::ConstI64(2));
        let cfg = build_cfg(&ir);
        // entry -> segment -> exit
        assert_eq!(cfg.nodes.len(), 3);
    }

    #[test]
    fn range_for_creates_back_and_exit_edges() {
        let mut ir = KernelIr::new();
        let body = ir.new_block(None);
        ir.push_stmt(body, StmtKind::ConstI64(42));
        let begin = ir.push_stmt(ir.root_block, StmtKind::ConstI64(0));
        let end = ir.push_stmt(ir.root_block, StmtKind::ConstI64(10));
        ir.push_stmt(
            ir.root_block,
            StmtKind::RangeFor {
                begin,
                end,
                reversed: false,
                body,
            },
        );
        let cfg = build_cfg(&ir);
        assert!(cfg.nodes.len() >= 3);
    }
}
