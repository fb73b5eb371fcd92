//! The fact hash: a flat mapping from dotted fact name (`sys.kernel.major`)
//! to its string value, and the `$name`/`${name}` interpolation the
//! compiler applies to attribute values.

use foldhash::HashMap as FoldHashMap;

pub type FactHash = FoldHashMap<String, String>;

/// Bindings visible to a single manifest walk: the fact hash plus whatever
/// `Local` nodes have bound so far, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    locals: FoldHashMap<String, String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: &str, value: String) {
        self.locals.insert(name.to_string(), value);
    }

    fn lookup<'a>(&'a self, facts: &'a FactHash, name: &str) -> &'a str {
        self.locals
            .get(name)
            .map(String::as_str)
            .or_else(|| facts.get(name).map(String::as_str))
            .unwrap_or("")
    }
}

/// Substitute `$name` and `${name}` references from `facts`/`scope` into
/// `template`. Unknown names interpolate as the empty string, matching the
/// fact-lookup fallback (spec §4.2, `If`: "empty string if absent").
pub fn interpolate(template: &str, facts: &FactHash, scope: &Scope) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some((_, '{')) => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c2) in chars.by_ref() {
                    if c2 == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c2);
                }
                if closed {
                    out.push_str(scope.lookup(facts, &name));
                } else {
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some((_, c2)) if c2.is_ascii_alphabetic() || c2 == '_' => {
                let mut name = String::new();
                while let Some((_, c2)) = chars.peek().copied() {
                    if c2.is_ascii_alphanumeric() || c2 == '_' || c2 == '.' {
                        name.push(c2);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(scope.lookup(facts, &name));
            }
            _ => out.push('$'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_braced_and_bare_names() {
        let mut facts = FactHash::default();
        facts.insert("os".to_string(), "linux".to_string());
        let mut scope = Scope::new();
        scope.bind("user", "bourbon".to_string());

        assert_eq!(interpolate("running on ${os} as $user", &facts, &scope), "running on linux as bourbon");
    }

    #[test]
    fn unknown_names_interpolate_empty() {
        let facts = FactHash::default();
        let scope = Scope::new();
        assert_eq!(interpolate("[$missing]", &facts, &scope), "[]");
    }

    #[test]
    fn dotted_fact_names_supported() {
        let mut facts = FactHash::default();
        facts.insert("sys.kernel.major".to_string(), "6".to_string());
        let scope = Scope::new();
        assert_eq!(interpolate("kernel $sys.kernel.major", &facts, &scope), "kernel 6");
    }
}
