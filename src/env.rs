use std::collections::BTreeMap;

use crate::expr::{is_global_name, CliVariable, Value};

/// The variable environment threaded through the matcher.
///
/// Bindings live in two namespaces: locals, created by capture segments as
/// the input is matched, and globals, created by `-D` definitions or by
/// capturing into a `$`-prefixed name. Rebinding an existing name is legal;
/// the latest binding wins.
///
/// When label scoping is enabled, the checker brackets each label region
/// with [Env::push_scope] / [Env::pop_scope]: a scope push saves the local
/// bindings and starts the region with an empty local namespace, and the
/// matching pop restores the saved snapshot, discarding anything bound
/// inside the region. Globals are unaffected.
#[derive(Debug, Default)]
pub struct Env {
    globals: BTreeMap<String, Value>,
    locals: BTreeMap<String, Value>,
    scopes: Vec<BTreeMap<String, Value>>,
}

impl Env {
    pub fn new(defines: impl IntoIterator<Item = CliVariable>) -> Self {
        let mut env = Self::default();
        for define in defines {
            env.globals.insert(define.name, define.value);
        }
        env
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        if is_global_name(name) {
            self.globals.get(name)
        } else {
            self.locals.get(name).or_else(|| self.globals.get(name))
        }
    }

    pub fn bind(&mut self, name: &str, value: Value) {
        log::trace!(target: "filecheck:check", "binding {name} = {value}");
        if is_global_name(name) {
            self.globals.insert(name.to_string(), value);
        } else {
            self.locals.insert(name.to_string(), value);
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(std::mem::take(&mut self.locals));
    }

    pub fn pop_scope(&mut self) {
        self.locals = self.scopes.pop().unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn latest_binding_wins() {
        let mut env = Env::default();
        env.bind("V", text("a"));
        env.bind("V", text("b"));
        assert_eq!(env.lookup("V"), Some(&text("b")));
    }

    #[test]
    fn scope_pop_discards_region_bindings() {
        let mut env = Env::default();
        env.bind("OUTER", text("o"));
        env.push_scope();
        // locals from before the scope are not visible inside it
        assert_eq!(env.lookup("OUTER"), None);
        env.bind("INNER", text("i"));
        env.bind("$GLOBAL", text("g"));
        assert_eq!(env.lookup("INNER"), Some(&text("i")));
        env.pop_scope();
        assert_eq!(env.lookup("INNER"), None);
        assert_eq!(env.lookup("OUTER"), Some(&text("o")));
        // globals survive the pop
        assert_eq!(env.lookup("$GLOBAL"), Some(&text("g")));
    }

    #[test]
    fn defines_are_global() {
        let env = Env::new(vec!["NAME=value".parse::<CliVariable>().unwrap()]);
        assert_eq!(env.lookup("NAME"), Some(&text("value")));
    }
}
