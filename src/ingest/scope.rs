//! Scope tracking for front ends walking a syntax tree.

use crate::model::{NameElement, NameHierarchy};

/// Stack of enclosing scopes used to build qualified names during traversal.
///
/// # Example
/// ```rust
/// use codetrail::ingest::ScopeStack;
///
/// let mut stack = ScopeStack::new("::");
/// stack.push("engine");
/// stack.push("Renderer");
/// assert_eq!(stack.name_for("draw").qualified_name(), "engine::Renderer::draw");
/// ```
#[derive(Debug, Clone)]
pub struct ScopeStack {
    scopes: Vec<NameElement>,
    delimiter: String,
}

impl ScopeStack {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            scopes: Vec::new(),
            delimiter: delimiter.into(),
        }
    }

    /// Enter a namespace, type or function scope.
    pub fn push(&mut self, scope: impl Into<String>) {
        self.scopes.push(NameElement::new(scope));
    }

    /// Enter a scope whose name carries a signature (e.g. a function body).
    pub fn push_element(&mut self, element: NameElement) {
        self.scopes.push(element);
    }

    pub fn pop(&mut self) -> Option<NameElement> {
        self.scopes.pop()
    }

    /// Hierarchy of the innermost scope itself.
    pub fn current(&self) -> NameHierarchy {
        let mut name = NameHierarchy::new(self.delimiter.as_str());
        for scope in &self.scopes {
            name.push(scope.clone());
        }
        name
    }

    /// Hierarchy for `symbol` declared inside the current scope.
    pub fn name_for(&self, symbol: &str) -> NameHierarchy {
        self.name_for_element(NameElement::new(symbol))
    }

    pub fn name_for_element(&self, element: NameElement) -> NameHierarchy {
        let mut name = self.current();
        name.push(element);
        name
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }
}
