//! Ordered IR transform passes for the Quadrants compiler.
//!
//! Each pass takes `&mut KernelIr` (plus pass-specific arguments) and
//! reports a [`PassOutcome`]. The canonical ordering of these passes is
//! owned by `qd-core`, which also drives the offload step between stages 1
//! and 2 of the pipeline; this crate only supplies the individual passes.

mod cfg_optimization;
mod check_out_of_bound;
mod constant_fold;
mod die;
mod lower_access;
mod outcome;
mod remove_markers;
mod simplify;

pub use cfg_optimization::cfg_optimization;
pub use check_out_of_bound::check_out_of_bound;
pub use constant_fold::constant_fold;
pub use die::die;
pub use lower_access::lower_access;
pub use outcome::PassOutcome;
pub use remove_markers::{remove_loop_unique, remove_range_assumption};
pub use simplify::simplify;
