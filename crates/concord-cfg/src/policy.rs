//! The compiled, fact-bound catalog (spec §3 "Policy"): an ordered sequence
//! of resources plus a dependency set, topologically sorted before it ever
//! leaves the compiler.

use concord_pack::{Packer, Unpacker};
use concord_resources::ResourceRecord;

use crate::ast::ResourceId;
use crate::error::{CompileError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Policy {
    pub name: String,
    pub resources: Vec<ResourceRecord>,
    pub dependencies: Vec<(ResourceId, ResourceId)>,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    fn id_of(r: &ResourceRecord) -> ResourceId {
        ResourceId::new(r.type_tag(), r.key())
    }

    fn index_of(&self, id: &ResourceId) -> Option<usize> {
        self.resources
            .iter()
            .position(|r| r.type_tag() == id.type_tag && r.key() == id.key)
    }

    /// Topologically sort `resources` by `dependencies`, with ties broken by
    /// declaration order (spec §4.2: "stable tiebreak by declaration
    /// order"). Fails with `CyclicDependency` naming one cycle.
    pub fn sort(&mut self) -> Result<()> {
        let n = self.resources.len();
        let mut indegree = vec![0usize; n];
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (a, b) in &self.dependencies {
            let ai = self
                .index_of(a)
                .ok_or_else(|| CompileError::UnknownResource(a.type_tag.clone(), a.key.clone()))?;
            let bi = self
                .index_of(b)
                .ok_or_else(|| CompileError::UnknownResource(b.type_tag.clone(), b.key.clone()))?;
            // a depends on b: b must come before a.
            edges[bi].push(ai);
            indegree[ai] += 1;
        }

        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while !ready.is_empty() {
            ready.sort_unstable();
            let i = ready.remove(0);
            order.push(i);
            for &succ in &edges[i] {
                indegree[succ] -= 1;
                if indegree[succ] == 0 {
                    ready.push(succ);
                }
            }
        }

        if order.len() != n {
            let remaining: Vec<String> = (0..n)
                .filter(|i| !order.contains(i))
                .map(|i| self.resources[i].key().to_string())
                .collect();
            return Err(CompileError::CyclicDependency(remaining));
        }

        let sorted: Vec<ResourceRecord> = order.into_iter().map(|i| self.resources[i].clone()).collect();
        self.resources = sorted;
        Ok(())
    }

    pub fn pack(&self) -> String {
        let mut out = Packer::new().prefix("policy").str(&self.name).finish();
        out.push('\n');
        for r in &self.resources {
            out.push_str(&r.pack());
            out.push('\n');
        }
        out
    }

    pub fn unpack(packed: &str) -> Result<Self> {
        let mut lines = packed.lines();
        let header = lines.next().ok_or_else(|| CompileError::ParseError("empty policy".to_string()))?;
        let mut up = Unpacker::new(header);
        up.expect_prefix("policy")
            .map_err(|e| CompileError::ParseError(e.to_string()))?;
        let name = up.str().map_err(|e| CompileError::ParseError(e.to_string()))?;

        let mut policy = Policy::new(name);
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let tag = line
                .split("::")
                .next()
                .ok_or_else(|| CompileError::ParseError("missing prefix".to_string()))?;
            policy.resources.push(ResourceRecord::unpack(tag, line)?);
        }
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_resources::{Resource, User};

    #[test]
    fn sorts_by_dependency_with_stable_tiebreak() {
        let mut policy = Policy::new("p");
        policy.resources.push(ResourceRecord::User(User::new("c")));
        policy.resources.push(ResourceRecord::User(User::new("a")));
        policy.resources.push(ResourceRecord::User(User::new("b")));
        policy.dependencies.push((
            ResourceId::new("res_user", "a"),
            ResourceId::new("res_user", "b"),
        ));
        policy.sort().unwrap();
        let keys: Vec<_> = policy.resources.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
    }

    #[test]
    fn detects_cycle() {
        let mut policy = Policy::new("p");
        policy.resources.push(ResourceRecord::User(User::new("a")));
        policy.resources.push(ResourceRecord::User(User::new("b")));
        policy.dependencies.push((
            ResourceId::new("res_user", "a"),
            ResourceId::new("res_user", "b"),
        ));
        policy.dependencies.push((
            ResourceId::new("res_user", "b"),
            ResourceId::new("res_user", "a"),
        ));
        assert!(matches!(policy.sort(), Err(CompileError::CyclicDependency(_))));
    }

    #[test]
    fn pack_roundtrip() {
        let mut policy = Policy::new("base");
        let mut u = User::new("bourbon");
        u.set("uid", "101").unwrap();
        policy.resources.push(ResourceRecord::User(u));
        let packed = policy.pack();
        let back = Policy::unpack(&packed).unwrap();
        assert_eq!(back, policy);
    }
}
