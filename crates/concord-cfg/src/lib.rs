//! The manifest AST, its compiler, the compiled `Policy` catalog, the fact
//! hash, and the line-oriented config file format.

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fact;
pub mod policy;

pub use ast::{Manifest, Node, PolicyDef, ResourceId};
pub use compiler::compile;
pub use config::Config;
pub use error::{CompileError, Result};
pub use fact::{interpolate, FactHash, Scope};
pub use policy::Policy;
