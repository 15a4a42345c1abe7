//! Entity references into a `KernelIr`.
//!
//! These are opaque `u32`-backed indices, never pointers: a statement's
//! operands, a block's statement list, and a task's target SNode are all
//! expressed this way so the IR stays cheap to clone and easy to reason
//! about across the delayed-modification boundary (see `modifier.rs`).

use qd_entity::entity_impl;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A reference to a statement owned by a `KernelIr`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct StmtId(u32);
entity_impl!(StmtId, "s");

/// A reference to a block owned by a `KernelIr`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BlockId(u32);
entity_impl!(BlockId, "b");

/// A reference to an SNode owned by an `SNodeTree`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct SNodeId(u32);
entity_impl!(SNodeId, "sn");

/// A reference to an `OffloadedTask` within a compiled kernel's task list.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct TaskId(u32);
entity_impl!(TaskId, "t");
