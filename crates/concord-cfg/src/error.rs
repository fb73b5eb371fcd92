use std::fmt;

use concord_resources::ResourceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// `compile` was asked for a policy name the manifest doesn't define.
    UnknownPolicy(String),
    /// A `Dependency` or implicit dependency named a resource that was
    /// never declared.
    UnknownResource(String, String),
    /// The dependency graph contains a cycle; the tuple names one cycle's
    /// members (spec §4.2: "fails with `CyclicDependency` naming one
    /// cycle").
    CyclicDependency(Vec<String>),
    /// A `set()`/merge error surfaced while flattening a `Resource` node.
    Resource(ResourceError),
    ParseError(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownPolicy(name) => write!(f, "no policy named '{name}'"),
            CompileError::UnknownResource(kind, key) => {
                write!(f, "dependency names undeclared resource {kind}:{key}")
            }
            CompileError::CyclicDependency(cycle) => {
                write!(f, "cyclic dependency among {}", cycle.join(" -> "))
            }
            CompileError::Resource(e) => write!(f, "{e}"),
            CompileError::ParseError(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ResourceError> for CompileError {
    fn from(e: ResourceError) -> Self {
        CompileError::Resource(e)
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
