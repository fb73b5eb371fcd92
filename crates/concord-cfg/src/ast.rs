//! The manifest AST (spec §3, §4.2): op-codes `Prog`, `Policy`, `Host`,
//! `Resource`, `Attribute`, `ResourceId`, `Dependency`, `If`, `Map`,
//! `Include`, `Local`. `Expression` is folded into the two string data
//! cells attribute/local values already carry, since every leaf in this
//! AST is a two-cell string record (spec §3: "Leaves carry two string data
//! cells").

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// Evaluates children in order, concatenating their effects.
    Prog(Vec<Node>),

    /// `If(factname, literal)`: `then` if `facts[factname] == literal`,
    /// otherwise `else_` (itself possibly another `If`, to chain).
    If {
        fact: String,
        literal: String,
        then: Box<Node>,
        else_: Box<Node>,
    },

    /// `Map(factname, {literal -> child, ...})`, falling back to `default`.
    Map {
        fact: String,
        cases: Vec<(String, Node)>,
        default: Option<Box<Node>>,
    },

    /// Introduces (or merges into) a catalog entry.
    Resource {
        type_tag: String,
        key: String,
        children: Vec<Node>,
    },

    /// `name`'s value is interpolated then applied via `Resource::set`.
    Attribute { name: String, value: String },

    /// Records that resource `a` depends on resource `b`; both must name
    /// declared resources once the catalog is flattened.
    Dependency { a: ResourceId, b: ResourceId },

    /// Inlines another named policy at this position.
    Include { policy: String },

    /// Binds a variable in the local scope, visible to later siblings.
    Local { name: String, value: String },

    /// A top-level host entry, outside any policy.
    Host {
        hostname: String,
        ipv4: String,
        ipv6: String,
        aliases: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ResourceId {
    pub type_tag: String,
    pub key: String,
}

impl ResourceId {
    pub fn new(type_tag: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            key: key.into(),
        }
    }
}

/// A named policy entry: a top-level body of nodes the manifest exposes by
/// name, reachable as a compile entry point or via `Include`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PolicyDef {
    pub name: String,
    pub body: Vec<Node>,
}

/// The top-level manifest: a set of named policies plus top-level host
/// definitions (spec §3: "a tree of nodes ... Each policy in a manifest is
/// named; policies may include other policies by reference").
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    pub policies: Vec<PolicyDef>,
    pub hosts: Vec<Node>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy(&self, name: &str) -> Option<&PolicyDef> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub fn add_policy(&mut self, name: impl Into<String>, body: Vec<Node>) -> &mut Self {
        self.policies.push(PolicyDef { name: name.into(), body });
        self
    }
}
