//! Pure analyses over the Quadrants kernel IR. No function in this crate
//! mutates the `KernelIr` it is given (cfg rewrites aside — `qd-pass` is
//! the only crate allowed to commit structural edits).

mod cache_key;
mod cfg;
mod gather;
mod live_var;

pub use cache_key::offline_cache_key;
pub use cfg::{build_cfg, defs_uses, BasicBlockId, CfgNode, ControlFlowGraph};
pub use gather::{
    count_statements, gather_deactivations, gather_snode_read_writes, gather_statements,
    gather_uniquely_accessed_pointers,
};
pub use live_var::{live_variable_analysis, LiveVarAnalysisConfig, LiveVarResult};
