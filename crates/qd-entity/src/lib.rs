//! Compact, typed index references used as mapping keys across the
//! Quadrants compilation pipeline.
//!
//! Every tree node (`Stmt`, `SNode`, `OffloadedTask`, ...) is referenced by a
//! small newtype wrapping a `u32` index rather than a pointer or `Rc`. This
//! keeps the IR cheap to copy and lets use-def edges live as plain indices
//! into a stable pool owned by the enclosing `Function`/`KernelIr`.

mod map;
mod packed_option;
mod primary_map;

pub use map::SecondaryMap;
pub use packed_option::PackedOption;
pub use primary_map::PrimaryMap;

/// A type that can be used as a key in an entity-indexed map.
///
/// Implementors are newtype wrappers over a dense `u32` index space.
pub trait EntityRef: Copy + Eq {
    /// Create a new entity reference from a linear index.
    fn new(index: usize) -> Self;

    /// Get the index of this reference.
    fn index(self) -> usize;
}

/// Defines an `EntityRef` newtype and its boilerplate trait impls.
///
/// Mirrors the `entity_impl!` macro used throughout the reference compiler
/// toolchain to mint one distinct index type per IR entity kind.
#[macro_export]
macro_rules! entity_impl {
    ($entity:ident) => {
        impl $crate::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $entity(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl core::fmt::Debug for $entity {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "{}{}", stringify!($entity), self.0)
            }
        }
    };
    ($entity:ident, $display_prefix:expr) => {
        $crate::entity_impl!($entity);

        impl core::fmt::Display for $entity {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "{}{}", $display_prefix, self.0)
            }
        }
    };
}
