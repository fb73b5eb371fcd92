//! Template rendering boundary (spec §1 Non-goals: "the embedded template
//! interpreter... only its interface is specified"; SPEC_FULL §14).

use concord_cfg::FactHash;

use crate::error::Result;

/// Render `template` against `facts` and local `vars`. `File` resources call
/// this when their source reference names a template rather than a static
/// file.
pub trait TemplateRenderer {
    fn render(&self, template: &[u8], facts: &FactHash, vars: &foldhash::HashMap<String, String>) -> Result<Vec<u8>>;
}

/// A pass-through renderer that returns the template unchanged, standing in
/// for a real interpreter in tests and in deployments that only serve
/// static file content.
#[derive(Debug, Default)]
pub struct LiteralRenderer;

impl TemplateRenderer for LiteralRenderer {
    fn render(&self, template: &[u8], _facts: &FactHash, _vars: &foldhash::HashMap<String, String>) -> Result<Vec<u8>> {
        Ok(template.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_renderer_returns_input_unchanged() {
        let renderer = LiteralRenderer;
        let facts = FactHash::default();
        let vars = foldhash::HashMap::default();
        let out = renderer.render(b"hello %n", &facts, &vars).unwrap();
        assert_eq!(out, b"hello %n");
    }
}
