//! Manifest → policy compilation (spec §4.2).

use concord_resources::{Dir, File, Group, Host as HostResource, Package, Resource, ResourceRecord, Service, Sysctl, User};

use crate::ast::{Manifest, Node, ResourceId};
use crate::error::{CompileError, Result};
use crate::fact::{interpolate, FactHash, Scope};
use crate::policy::Policy;

struct Compiler<'a> {
    manifest: &'a Manifest,
    facts: &'a FactHash,
    next_priority: i32,
    resources: Vec<ResourceRecord>,
    dependencies: Vec<(ResourceId, ResourceId)>,
    /// Names of policies currently being inlined, to reject self-inclusion.
    include_stack: Vec<String>,
}

/// Walk the named policy in `manifest`, binding `facts`, producing a
/// topologically sorted [`Policy`].
pub fn compile(manifest: &Manifest, entry: &str, facts: &FactHash) -> Result<Policy> {
    let def = manifest
        .policy(entry)
        .ok_or_else(|| CompileError::UnknownPolicy(entry.to_string()))?;

    let mut compiler = Compiler {
        manifest,
        facts,
        next_priority: 0,
        resources: Vec::new(),
        dependencies: Vec::new(),
        include_stack: vec![entry.to_string()],
    };

    let mut scope = Scope::new();
    for node in &def.body {
        compiler.walk(node, &mut scope, None)?;
    }

    add_implicit_dependencies(&compiler.resources, &mut compiler.dependencies);

    let mut policy = Policy {
        name: entry.to_string(),
        resources: compiler.resources,
        dependencies: compiler.dependencies,
    };
    policy.sort()?;
    Ok(policy)
}

impl<'a> Compiler<'a> {
    fn walk(&mut self, node: &Node, scope: &mut Scope, current: Option<usize>) -> Result<()> {
        match node {
            Node::Prog(children) => {
                for child in children {
                    self.walk(child, scope, current)?;
                }
                Ok(())
            }

            Node::If { fact, literal, then, else_ } => {
                let actual = self.facts.get(fact).map(String::as_str).unwrap_or("");
                if actual == literal {
                    self.walk(then, scope, current)
                } else {
                    self.walk(else_, scope, current)
                }
            }

            Node::Map { fact, cases, default } => {
                let actual = self.facts.get(fact).map(String::as_str).unwrap_or("");
                if let Some((_, child)) = cases.iter().find(|(k, _)| k == actual) {
                    self.walk(child, scope, current)
                } else if let Some(default) = default {
                    self.walk(default, scope, current)
                } else {
                    Ok(())
                }
            }

            Node::Resource { type_tag, key, children } => {
                let interpolated_key = interpolate(key, self.facts, scope);
                let priority = self.next_priority;
                self.next_priority -= 1;

                let fresh = new_record(type_tag, &interpolated_key)?;
                let idx = match self
                    .resources
                    .iter()
                    .position(|r| r.type_tag() == fresh.type_tag() && r.key() == interpolated_key)
                {
                    Some(existing_idx) => {
                        let mut fresh = fresh;
                        fresh.set_priority(priority);
                        let merged = self.resources[existing_idx].merge(&fresh)?;
                        self.resources[existing_idx] = merged;
                        existing_idx
                    }
                    None => {
                        let mut fresh = fresh;
                        fresh.set_priority(priority);
                        self.resources.push(fresh);
                        self.resources.len() - 1
                    }
                };

                for child in children {
                    self.walk(child, scope, Some(idx))?;
                }
                Ok(())
            }

            Node::Attribute { name, value } => {
                let idx = current.expect("Attribute node must be a child of a Resource node");
                let interpolated = interpolate(value, self.facts, scope);
                self.resources[idx].set(name, &interpolated)?;
                Ok(())
            }

            Node::Dependency { a, b } => {
                self.dependencies.push((a.clone(), b.clone()));
                Ok(())
            }

            Node::Include { policy } => {
                if self.include_stack.contains(policy) {
                    return Err(CompileError::CyclicDependency(self.include_stack.clone()));
                }
                let def = self
                    .manifest
                    .policy(policy)
                    .ok_or_else(|| CompileError::UnknownPolicy(policy.clone()))?;
                self.include_stack.push(policy.clone());
                let mut inner_scope = scope.clone();
                for node in &def.body {
                    self.walk(node, &mut inner_scope, current)?;
                }
                self.include_stack.pop();
                Ok(())
            }

            Node::Local { name, value } => {
                let interpolated = interpolate(value, self.facts, scope);
                scope.bind(name, interpolated);
                Ok(())
            }

            Node::Host { .. } => Ok(()),
        }
    }
}

fn new_record(type_tag: &str, key: &str) -> Result<ResourceRecord> {
    Ok(match type_tag {
        "User" => ResourceRecord::User(User::new(key)),
        "Group" => ResourceRecord::Group(Group::new(key)),
        "File" => ResourceRecord::File(File::new(key)),
        "Dir" => ResourceRecord::Dir(Dir::new(key)),
        "Package" => ResourceRecord::Package(Package::new(key)),
        "Service" => ResourceRecord::Service(Service::new(key)),
        "Host" => ResourceRecord::Host(HostResource::new(key)),
        "Sysctl" => ResourceRecord::Sysctl(Sysctl::new(key)),
        other => return Err(CompileError::ParseError(format!("unknown resource type '{other}'"))),
    })
}

/// File and Dir resources implicitly depend on their declared owner User
/// and group Group (if also declared in this policy) and on their parent
/// Dir (if declared) — spec §4.2.
fn add_implicit_dependencies(resources: &[ResourceRecord], dependencies: &mut Vec<(ResourceId, ResourceId)>) {
    let declared = |tag: &str, key: &str| resources.iter().any(|r| r.type_tag() == tag && r.key() == key);

    for r in resources {
        let (path, owner, group) = match r {
            ResourceRecord::File(f) => (f.key().to_string(), f.attrs().get("owner").cloned(), f.attrs().get("group").cloned()),
            ResourceRecord::Dir(d) => (d.key().to_string(), d.attrs().get("owner").cloned(), d.attrs().get("group").cloned()),
            _ => continue,
        };

        if let Some(owner) = owner.filter(|o| !o.is_empty()) {
            if declared("res_user", &owner) {
                dependencies.push((
                    ResourceId::new(r.type_tag(), r.key()),
                    ResourceId::new("res_user", owner),
                ));
            }
        }
        if let Some(group) = group.filter(|g| !g.is_empty()) {
            if declared("res_group", &group) {
                dependencies.push((
                    ResourceId::new(r.type_tag(), r.key()),
                    ResourceId::new("res_group", group),
                ));
            }
        }

        if let Some(parent) = parent_dir(&path) {
            if declared("res_dir", &parent) {
                dependencies.push((ResourceId::new(r.type_tag(), r.key()), ResourceId::new("res_dir", parent)));
            }
        }
    }
}

fn parent_dir(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        Some("/".to_string())
    } else {
        Some(trimmed[..idx].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PolicyDef;

    fn facts(pairs: &[(&str, &str)]) -> FactHash {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn conditional_compilation_scenario() {
        let mut manifest = Manifest::new();
        manifest.policies.push(PolicyDef {
            name: "base".to_string(),
            body: vec![Node::If {
                fact: "os".to_string(),
                literal: "linux".to_string(),
                then: Box::new(Node::Resource {
                    type_tag: "File".to_string(),
                    key: "/etc/conf".to_string(),
                    children: vec![Node::Attribute {
                        name: "mode".to_string(),
                        value: "0640".to_string(),
                    }],
                }),
                else_: Box::new(Node::Resource {
                    type_tag: "File".to_string(),
                    key: "/etc/conf".to_string(),
                    children: vec![Node::Attribute {
                        name: "mode".to_string(),
                        value: "0600".to_string(),
                    }],
                }),
            }],
        });

        let policy = compile(&manifest, "base", &facts(&[("os", "linux")])).unwrap();
        assert_eq!(policy.resources.len(), 1);
        assert_eq!(policy.resources[0].attrs()["mode"], "640");
    }

    #[test]
    fn dependency_cycle_scenario() {
        let mut manifest = Manifest::new();
        manifest.policies.push(PolicyDef {
            name: "base".to_string(),
            body: vec![
                Node::Resource {
                    type_tag: "File".to_string(),
                    key: "a".to_string(),
                    children: vec![],
                },
                Node::Resource {
                    type_tag: "File".to_string(),
                    key: "b".to_string(),
                    children: vec![],
                },
                Node::Dependency {
                    a: ResourceId::new("res_file", "a"),
                    b: ResourceId::new("res_file", "b"),
                },
                Node::Dependency {
                    a: ResourceId::new("res_file", "b"),
                    b: ResourceId::new("res_file", "a"),
                },
            ],
        });

        let err = compile(&manifest, "base", &FactHash::default()).unwrap_err();
        assert!(matches!(err, CompileError::CyclicDependency(_)));
    }

    #[test]
    fn later_declaration_overrides_on_conflicting_attrs() {
        let mut manifest = Manifest::new();
        manifest.policies.push(PolicyDef {
            name: "base".to_string(),
            body: vec![
                Node::Resource {
                    type_tag: "File".to_string(),
                    key: "a".to_string(),
                    children: vec![Node::Attribute {
                        name: "mode".to_string(),
                        value: "600".to_string(),
                    }],
                },
                Node::Resource {
                    type_tag: "File".to_string(),
                    key: "a".to_string(),
                    children: vec![Node::Attribute {
                        name: "owner".to_string(),
                        value: "root".to_string(),
                    }],
                },
            ],
        });

        let policy = compile(&manifest, "base", &FactHash::default()).unwrap();
        assert_eq!(policy.resources.len(), 1);
        assert_eq!(policy.resources[0].attrs()["mode"], "600");
        assert_eq!(policy.resources[0].attrs()["local-path"], "a");
    }

    #[test]
    fn compilation_is_deterministic() {
        let mut manifest = Manifest::new();
        manifest.policies.push(PolicyDef {
            name: "base".to_string(),
            body: vec![Node::Resource {
                type_tag: "User".to_string(),
                key: "bourbon".to_string(),
                children: vec![Node::Attribute {
                    name: "uid".to_string(),
                    value: "101".to_string(),
                }],
            }],
        });
        let facts = FactHash::default();
        let p1 = compile(&manifest, "base", &facts).unwrap();
        let p2 = compile(&manifest, "base", &facts).unwrap();
        assert_eq!(p1.pack(), p2.pack());
    }
}
