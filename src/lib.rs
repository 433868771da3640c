//! Lowering of typed shader ASTs ([`ast`]) into SPIR-V [`Module`]s.
//!
//! The usual flow is: [`scan`] the expressions of a shader for capabilities
//! and interface variables, build functions and blocks on a [`Module`] while
//! [`lower`]ing each expression into the current block, then
//! [`Module::serialize`] the result.

// NOTE(eddyb) all the modules are declared here, but they're documented "inside"
// (i.e. using inner doc comments).
pub mod ast;
pub mod config;
pub mod error;
pub mod layout;
pub mod lower;
pub mod module;
pub mod scan;
pub mod spv;

pub use config::BuildConfig;
pub use error::LowerError;
pub use lower::ExprLowerer;
pub use module::{Block, FuncScope, Function, Module, VariableInfo};
pub use scan::ModuleRequirements;

use std::hash::BuildHasherDefault;

// HACK: `indexmap` doesn't default to `rustc-hash`'s hasher.
pub type FxIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<rustc_hash::FxHasher>>;
pub type FxIndexSet<V> = indexmap::IndexSet<V, BuildHasherDefault<rustc_hash::FxHasher>>;
