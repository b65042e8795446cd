use crate::value::Value;

/// Variable names visible at a point in the parse.
///
/// Every template body starts with `$` in scope. Branches record a mark on
/// entry and truncate back to it when their body is done, so declarations
/// never leak out of the `if`/`range`/`with` that made them.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    names: Vec<String>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            names: vec!["$".to_string()],
        }
    }

    pub fn declare(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().rev().any(|declared| declared == name)
    }

    pub fn mark(&self) -> usize {
        self.names.len()
    }

    pub fn truncate(&mut self, mark: usize) {
        self.names.truncate(mark.max(1));
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime variable bindings for one template activation.
#[derive(Debug, Clone)]
pub struct VarStack {
    vars: Vec<(String, Value)>,
}

impl VarStack {
    /// A fresh activation with `$` bound to `dot`.
    pub fn new(dot: Value) -> Self {
        let mut vars = Vec::with_capacity(8);
        vars.push(("$".to_string(), dot));
        Self { vars }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.vars.push((name.into(), value));
    }

    /// Overwrite the nearest binding of `name`. Returns false if there is none.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.vars.iter_mut().rev().find(|(declared, _)| declared == name) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => false,
        }
    }

    /// Rebind the innermost variable, used by `range` on each iteration.
    pub fn set_top(&mut self, value: Value) {
        if let Some(slot) = self.vars.last_mut() {
            slot.1 = value;
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars
            .iter()
            .rev()
            .find(|(declared, _)| declared == name)
            .map(|(_, value)| value)
    }

    pub fn mark(&self) -> usize {
        self.vars.len()
    }

    pub fn pop_to(&mut self, mark: usize) {
        self.vars.truncate(mark.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_starts_with_dollar() {
        let scope = ScopeStack::new();
        assert!(scope.contains("$"));
        assert!(!scope.contains("$x"));
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn test_scope_truncate() {
        let mut scope = ScopeStack::new();
        let mark = scope.mark();
        scope.declare("$x");
        scope.declare("$y");
        assert!(scope.contains("$y"));
        scope.truncate(mark);
        assert!(!scope.contains("$x"));
        scope.truncate(0);
        assert!(scope.contains("$"));
    }

    #[test]
    fn test_var_push_set_pop() {
        let mut vars = VarStack::new(Value::Int(1));
        assert_eq!(vars.get("$"), Some(&Value::Int(1)));

        let mark = vars.mark();
        vars.push("$x", Value::Int(2));
        vars.push("$x", Value::Int(3));
        assert!(vars.set("$x", Value::Int(4)));
        assert_eq!(vars.get("$x"), Some(&Value::Int(4)));
        vars.pop_to(mark);
        assert_eq!(vars.get("$x"), None);
        assert!(!vars.set("$x", Value::Nil));
    }

    #[test]
    fn test_set_reaches_outer_binding() {
        let mut vars = VarStack::new(Value::Nil);
        vars.push("$count", Value::Int(0));
        let mark = vars.mark();
        vars.push("$item", Value::Int(9));
        assert!(vars.set("$count", Value::Int(1)));
        vars.pop_to(mark);
        assert_eq!(vars.get("$count"), Some(&Value::Int(1)));
    }
}
