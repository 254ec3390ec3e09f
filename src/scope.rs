//! Lexical scope tree built from a parsed syntax tree
//!
//! Scopes live in a flat arena with integer parent indices so the tree
//! carries no cyclic references. Bindings are flattened out of
//! parameter and declarator patterns; a `{key: local}` pattern binds
//! `local`, not `key`. The immediate body block of a function or arrow
//! does not open its own scope; its bindings belong to the function.

use serde::Serialize;
use tree_sitter::{Node, Tree};

use crate::parse::{is_function_kind, node_text};

/// Kind of a lexical scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeKind {
    Module,
    Function,
    Arrow,
    Class,
    Block,
    For,
    Catch,
}

impl ScopeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Function => "function",
            Self::Arrow => "arrow",
            Self::Class => "class",
            Self::Block => "block",
            Self::For => "for",
            Self::Catch => "catch",
        }
    }

    pub fn is_function_like(&self) -> bool {
        matches!(self, Self::Function | Self::Arrow)
    }
}

/// How a name was introduced into its scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindingKind {
    Param,
    Var,
    Let,
    Const,
    Function,
    Class,
    Catch,
    Destructured,
}

impl BindingKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Param => "param",
            Self::Var => "var",
            Self::Let => "let",
            Self::Const => "const",
            Self::Function => "function",
            Self::Class => "class",
            Self::Catch => "catch",
            Self::Destructured => "destructured",
        }
    }
}

/// A single name bound in a scope
#[derive(Debug, Clone, Serialize)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    pub offset: usize,
}

/// One scope in the arena
#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    pub kind: ScopeKind,
    pub start: usize,
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    pub bindings: Vec<Binding>,
}

impl Scope {
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn extent(&self) -> usize {
        self.end - self.start
    }

    pub fn declares(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

/// Flat arena of scopes; index 0 is always the module scope
#[derive(Debug, Clone, Serialize)]
pub struct ScopeTree {
    pub scopes: Vec<Scope>,
}

impl ScopeTree {
    /// Build the scope tree by walking a parsed syntax tree
    pub fn build(tree: &Tree, source: &str) -> Self {
        let mut builder = Builder {
            source,
            scopes: vec![Scope {
                kind: ScopeKind::Module,
                start: 0,
                end: source.len(),
                parent: None,
                bindings: Vec::new(),
            }],
        };
        builder.walk_children(tree.root_node(), 0);
        ScopeTree {
            scopes: builder.scopes,
        }
    }

    /// Index of the smallest scope containing `offset`; the module
    /// scope when nothing tighter matches.
    pub fn find_scope_at(&self, offset: usize) -> usize {
        self.scopes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.contains(offset))
            .min_by_key(|(_, s)| s.extent())
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn scope(&self, idx: usize) -> &Scope {
        &self.scopes[idx]
    }

    /// Nearest function-like scope at or above `idx`
    pub fn nearest_function_scope(&self, idx: usize) -> Option<usize> {
        let mut cur = Some(idx);
        while let Some(i) = cur {
            if self.scopes[i].kind.is_function_like() {
                return Some(i);
            }
            cur = self.scopes[i].parent;
        }
        None
    }

    /// Walk up from `from` to the first scope declaring `name`
    pub fn resolve(&self, name: &str, from: usize) -> Option<(usize, &Binding)> {
        let mut cur = Some(from);
        while let Some(i) = cur {
            if let Some(binding) = self.scopes[i].declares(name) {
                return Some((i, binding));
            }
            cur = self.scopes[i].parent;
        }
        None
    }

    /// True when `idx` is `ancestor` or sits below it
    pub fn is_within(&self, idx: usize, ancestor: usize) -> bool {
        let mut cur = Some(idx);
        while let Some(i) = cur {
            if i == ancestor {
                return true;
            }
            cur = self.scopes[i].parent;
        }
        false
    }

    /// Upward distance from `from` to `ancestor` (0 = same scope)
    pub fn depth_to(&self, from: usize, ancestor: usize) -> Option<usize> {
        let mut cur = Some(from);
        let mut depth = 0;
        while let Some(i) = cur {
            if i == ancestor {
                return Some(depth);
            }
            depth += 1;
            cur = self.scopes[i].parent;
        }
        None
    }

    /// Scope chain from `idx` up to the module scope
    pub fn chain(&self, idx: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = Some(idx);
        while let Some(i) = cur {
            out.push(i);
            cur = self.scopes[i].parent;
        }
        out
    }
}

struct Builder<'a> {
    source: &'a str,
    scopes: Vec<Scope>,
}

impl<'a> Builder<'a> {
    fn open(&mut self, kind: ScopeKind, node: &Node, parent: usize) -> usize {
        let idx = self.scopes.len();
        self.scopes.push(Scope {
            kind,
            start: node.start_byte(),
            end: node.end_byte(),
            parent: Some(parent),
            bindings: Vec::new(),
        });
        idx
    }

    fn bind(&mut self, scope: usize, name: String, kind: BindingKind, offset: usize) {
        if name.is_empty() {
            return;
        }
        self.scopes[scope].bindings.push(Binding { name, kind, offset });
    }

    fn walk_children(&mut self, node: Node<'a>, current: usize) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, current);
        }
    }

    fn visit(&mut self, node: Node<'a>, current: usize) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.bind(
                        current,
                        node_text(&name, self.source).to_string(),
                        BindingKind::Function,
                        name.start_byte(),
                    );
                }
                self.open_function(node, current, ScopeKind::Function);
            }
            "function_expression" | "function" | "generator_function" | "method_definition" => {
                self.open_function(node, current, ScopeKind::Function);
            }
            "arrow_function" => {
                self.open_function(node, current, ScopeKind::Arrow);
            }
            "class_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.bind(
                        current,
                        node_text(&name, self.source).to_string(),
                        BindingKind::Class,
                        name.start_byte(),
                    );
                }
                let idx = self.open(ScopeKind::Class, &node, current);
                self.walk_children(node, idx);
            }
            "class_expression" | "class" => {
                let idx = self.open(ScopeKind::Class, &node, current);
                self.walk_children(node, idx);
            }
            "statement_block" => {
                let idx = self.open(ScopeKind::Block, &node, current);
                self.walk_children(node, idx);
            }
            "for_statement" => {
                let idx = self.open(ScopeKind::For, &node, current);
                self.walk_children(node, idx);
            }
            "for_in_statement" => {
                // covers both for-in and for-of; a declared loop variable
                // has a `kind` token (`var`/`let`/`const`) next to it
                let idx = self.open(ScopeKind::For, &node, current);
                if let (Some(left), Some(kind)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("kind"),
                ) {
                    let bk = match node_text(&kind, self.source) {
                        "var" => BindingKind::Var,
                        "const" => BindingKind::Const,
                        _ => BindingKind::Let,
                    };
                    self.flatten_pattern(&left, idx, bk, false);
                }
                self.walk_children(node, idx);
            }
            "catch_clause" => {
                let idx = self.open(ScopeKind::Catch, &node, current);
                if let Some(param) = node.child_by_field_name("parameter") {
                    self.flatten_pattern(&param, idx, BindingKind::Catch, false);
                }
                // the body block still opens below the catch scope
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, idx);
                }
            }
            "variable_declaration" => {
                self.bind_declarators(node, current, BindingKind::Var);
                self.walk_children(node, current);
            }
            "lexical_declaration" => {
                let kind = if node_text(&node, self.source).starts_with("const") {
                    BindingKind::Const
                } else {
                    BindingKind::Let
                };
                self.bind_declarators(node, current, kind);
                self.walk_children(node, current);
            }
            _ => self.walk_children(node, current),
        }
    }

    fn open_function(&mut self, node: Node<'a>, parent: usize, kind: ScopeKind) {
        let idx = self.open(kind, &node, parent);

        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.children(&mut cursor) {
                self.flatten_pattern(&param, idx, BindingKind::Param, false);
            }
        } else if let Some(param) = node.child_by_field_name("parameter") {
            // bare single-identifier arrow parameter
            self.flatten_pattern(&param, idx, BindingKind::Param, false);
        }

        // the immediate body block belongs to the function scope
        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "statement_block" {
                self.walk_children(body, idx);
            } else {
                self.visit(body, idx);
            }
        }
    }

    fn bind_declarators(&mut self, node: Node<'a>, scope: usize, kind: BindingKind) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "variable_declarator" {
                if let Some(name) = child.child_by_field_name("name") {
                    self.flatten_pattern(&name, scope, kind, false);
                }
            }
        }
    }

    /// Flatten a binding pattern, recording each bound identifier once.
    /// Identifiers reached through object/array destructuring are
    /// recorded as `Destructured` regardless of the declaration kind.
    fn flatten_pattern(
        &mut self,
        node: &Node,
        scope: usize,
        base: BindingKind,
        destructured: bool,
    ) {
        match node.kind() {
            "identifier" => {
                let kind = if destructured {
                    BindingKind::Destructured
                } else {
                    base
                };
                self.bind(
                    scope,
                    node_text(node, self.source).to_string(),
                    kind,
                    node.start_byte(),
                );
            }
            "shorthand_property_identifier_pattern" => {
                self.bind(
                    scope,
                    node_text(node, self.source).to_string(),
                    BindingKind::Destructured,
                    node.start_byte(),
                );
            }
            "object_pattern" | "array_pattern" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.flatten_pattern(&child, scope, base, true);
                }
            }
            "pair_pattern" => {
                // `{key: local}` binds local, not key
                if let Some(value) = node.child_by_field_name("value") {
                    self.flatten_pattern(&value, scope, base, true);
                }
            }
            "object_assignment_pattern" | "assignment_pattern" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.flatten_pattern(&left, scope, base, destructured);
                }
            }
            "rest_pattern" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.flatten_pattern(&child, scope, base, destructured);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_source;

    fn build(src: &str) -> ScopeTree {
        let tree = parse_source(src).unwrap();
        ScopeTree::build(&tree, src)
    }

    #[test]
    fn test_module_scope_is_root() {
        let scopes = build("var a=1;");
        assert_eq!(scopes.scopes[0].kind, ScopeKind::Module);
        assert!(scopes.scopes[0].declares("a").is_some());
    }

    #[test]
    fn test_function_scope_with_params() {
        let src = "function f(a,b){var c=1;}";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("var").unwrap());
        let scope = scopes.scope(idx);
        assert_eq!(scope.kind, ScopeKind::Function);
        assert_eq!(scope.declares("a").map(|b| b.kind), Some(BindingKind::Param));
        assert_eq!(scope.declares("b").map(|b| b.kind), Some(BindingKind::Param));
        assert_eq!(scope.declares("c").map(|b| b.kind), Some(BindingKind::Var));
    }

    #[test]
    fn test_function_name_binds_in_enclosing_scope() {
        let scopes = build("function outer(){}");
        assert_eq!(
            scopes.scopes[0].declares("outer").map(|b| b.kind),
            Some(BindingKind::Function)
        );
    }

    #[test]
    fn test_body_block_is_not_a_separate_scope() {
        let src = "function f(){let x=1;}";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("let").unwrap());
        assert_eq!(scopes.scope(idx).kind, ScopeKind::Function);
        assert!(scopes.scope(idx).declares("x").is_some());
    }

    #[test]
    fn test_inner_block_opens_scope() {
        let src = "function f(){ {let y=2;} }";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("let").unwrap());
        assert_eq!(scopes.scope(idx).kind, ScopeKind::Block);
        assert!(scopes.scope(idx).declares("y").is_some());
    }

    #[test]
    fn test_smallest_scope_wins() {
        let src = "function a(){function b(){var q=1;}}";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("q=1").unwrap());
        let scope = scopes.scope(idx);
        assert!(scope.declares("q").is_some());
        // containment invariant: every ancestor range contains this one
        let mut cur = scope.parent;
        while let Some(p) = cur {
            let parent = scopes.scope(p);
            assert!(parent.start <= scope.start && scope.end <= parent.end);
            cur = parent.parent;
        }
    }

    #[test]
    fn test_pair_pattern_binds_local_not_key() {
        let src = "function f({key:local}){return local}";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("return").unwrap());
        let scope = scopes.scope(idx);
        assert!(scope.declares("local").is_some());
        assert!(scope.declares("key").is_none());
        assert_eq!(
            scope.declares("local").map(|b| b.kind),
            Some(BindingKind::Destructured)
        );
    }

    #[test]
    fn test_shorthand_and_rest_patterns() {
        let src = "function f({a,...rest},[x,y]){return a}";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("return").unwrap());
        let scope = scopes.scope(idx);
        for name in ["a", "rest", "x", "y"] {
            assert!(scope.declares(name).is_some(), "missing binding {}", name);
        }
    }

    #[test]
    fn test_default_param_binds_identifier() {
        let src = "function f(a=1){return a}";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("return").unwrap());
        assert_eq!(
            scopes.scope(idx).declares("a").map(|b| b.kind),
            Some(BindingKind::Param)
        );
    }

    #[test]
    fn test_catch_scope() {
        let src = "try{x()}catch(e){log(e)}";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("log").unwrap());
        let (decl_idx, binding) = scopes.resolve("e", idx).unwrap();
        assert_eq!(binding.kind, BindingKind::Catch);
        assert_eq!(scopes.scope(decl_idx).kind, ScopeKind::Catch);
    }

    #[test]
    fn test_for_scope() {
        let src = "for(let i=0;i<10;i++){use(i)}";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("use").unwrap());
        let (decl_idx, _) = scopes.resolve("i", idx).unwrap();
        assert_eq!(scopes.scope(decl_idx).kind, ScopeKind::For);
    }

    #[test]
    fn test_resolve_walks_up() {
        let src = "var g=1;function f(){return g}";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("return").unwrap());
        let (decl_idx, binding) = scopes.resolve("g", idx).unwrap();
        assert_eq!(decl_idx, 0);
        assert_eq!(binding.kind, BindingKind::Var);
    }

    #[test]
    fn test_arrow_scope_kind() {
        let src = "const f=(x)=>{return x};";
        let scopes = build(src);
        let idx = scopes.find_scope_at(src.find("return").unwrap());
        assert_eq!(scopes.scope(idx).kind, ScopeKind::Arrow);
    }
}
