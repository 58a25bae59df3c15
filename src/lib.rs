//! Workspace placeholder crate.
//!
//! Re-exports the workspace crates so that a host process can depend on
//! `catalog-tracker-workspace` alone and wire the tracker from one place.
//! The `native` feature (enabled by default) pulls in the `reqwest` and
//! `git` backed adapters from `bridge-native`.

pub use bridge_traits;
pub use core_runtime;
pub use core_sync;

#[cfg(feature = "native")]
pub use bridge_native;
