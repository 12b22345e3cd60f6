//! Module-level public symbol extraction
//!
//! Walks the direct children of a module node and emits every public class,
//! function, and assigned name. Definitions guarded by module-level `try:` /
//! `if:` blocks are elevated to module scope, matching how Python's
//! conditional-import idiom behaves at import time. Names assigned in more
//! than one branch are reported once per branch; callers dedupe if needed.

use super::parser::ParseHandle;
use tree_sitter::Node;

/// What kind of binding a public name is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Class,
    Function,
    Variable,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Variable => "variable",
        })
    }
}

/// A public module-level name. The name slice borrows the source buffer and
/// lives as long as the parse handle's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol<'a> {
    pub kind: SymbolKind,
    pub name: &'a [u8],
}

impl Symbol<'_> {
    /// Lossy UTF-8 view of the name for display.
    pub fn name_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.name)
    }
}

/// Enumerate the public symbols a module exports.
///
/// Returns an empty list when the root is not a `module` node.
pub fn module_symbols<'a>(handle: &ParseHandle<'a>) -> Vec<Symbol<'a>> {
    let root = handle.root();
    if root.kind_id() != handle.kinds().module {
        return Vec::new();
    }

    let mut symbols = Vec::new();
    collect(root, handle, &mut symbols);
    symbols
}

fn collect<'a>(node: Node<'_>, handle: &ParseHandle<'a>, out: &mut Vec<Symbol<'a>>) {
    let kinds = handle.kinds();
    let mut cursor = node.walk();

    for child in node.children(&mut cursor) {
        let kind = child.kind_id();

        // Module-level control flow: treat the contained statements as if
        // they were written at module scope.
        if kinds.is_scope(kind) {
            collect(child, handle, out);
            continue;
        }

        // A decorated definition wraps the real one as its second child.
        let (kind, definition) = if kind == kinds.decorated_definition {
            match child.child(1) {
                Some(definition) => (definition.kind_id(), definition),
                None => continue,
            }
        } else {
            (kind, child)
        };

        if kind == kinds.class_definition || kind == kinds.function_definition {
            let symbol_kind = if kind == kinds.class_definition {
                SymbolKind::Class
            } else {
                SymbolKind::Function
            };
            if let Some(name) = definition.named_child(0) {
                if name.kind_id() == kinds.identifier {
                    emit(handle, symbol_kind, name, out);
                }
            }
        } else if kind == kinds.expression_statement {
            let assignment = match definition.child(0) {
                Some(first) if first.kind_id() == kinds.assignment => first,
                _ => continue,
            };
            if let Some(target) = assignment.named_child(0) {
                if target.kind_id() == kinds.identifier {
                    emit(handle, SymbolKind::Variable, target, out);
                }
            }
        }
    }
}

fn emit<'a>(
    handle: &ParseHandle<'a>,
    kind: SymbolKind,
    name: Node<'_>,
    out: &mut Vec<Symbol<'a>>,
) {
    let text = &handle.source()[name.byte_range()];
    // Leading underscore marks a private name.
    if text.first() == Some(&b'_') {
        return;
    }
    out.push(Symbol { kind, name: text });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn names(source: &[u8]) -> Vec<(SymbolKind, String)> {
        let handle = parse(source).unwrap();
        module_symbols(&handle)
            .into_iter()
            .map(|s| (s.kind, s.name_lossy().into_owned()))
            .collect()
    }

    #[test]
    fn test_top_level_definitions() {
        let symbols = names(
            b"class A: pass\n\
              def _hidden(): pass\n\
              X = 1\n\
              def pub(): pass\n",
        );
        assert_eq!(
            symbols,
            vec![
                (SymbolKind::Class, "A".to_string()),
                (SymbolKind::Variable, "X".to_string()),
                (SymbolKind::Function, "pub".to_string()),
            ]
        );
    }

    #[test]
    fn test_try_except_branches_are_elevated() {
        let symbols = names(
            b"try:\n\
              \x20   import foo\n\
              \x20   HAS = True\n\
              except:\n\
              \x20   HAS = False\n",
        );
        // Both branches assign HAS; both assignments are reported.
        let has: Vec<_> = symbols.iter().filter(|(_, n)| n == "HAS").collect();
        assert_eq!(has.len(), 2);
        assert!(has.iter().all(|(k, _)| *k == SymbolKind::Variable));
    }

    #[test]
    fn test_if_else_branches_are_elevated() {
        let symbols = names(
            b"if condition:\n\
              \x20   impl = 1\n\
              elif other:\n\
              \x20   impl = 2\n\
              else:\n\
              \x20   impl = 3\n",
        );
        let impls: Vec<_> = symbols.iter().filter(|(_, n)| n == "impl").collect();
        assert_eq!(impls.len(), 3);
    }

    #[test]
    fn test_decorated_definitions_unwrap() {
        let symbols = names(
            b"@decorator\n\
              def wrapped(): pass\n\
              @decorator\n\
              class Wrapped: pass\n",
        );
        assert_eq!(
            symbols,
            vec![
                (SymbolKind::Function, "wrapped".to_string()),
                (SymbolKind::Class, "Wrapped".to_string()),
            ]
        );
    }

    #[test]
    fn test_underscore_names_are_private() {
        let symbols = names(
            b"_internal = {}\n\
              __all__ = []\n\
              def _helper(): pass\n\
              class _Impl: pass\n",
        );
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_nested_definitions_are_not_module_level() {
        let symbols = names(
            b"def outer():\n\
              \x20   def inner(): pass\n\
              \x20   x = 1\n\
              class C:\n\
              \x20   def method(self): pass\n",
        );
        assert_eq!(
            symbols,
            vec![
                (SymbolKind::Function, "outer".to_string()),
                (SymbolKind::Class, "C".to_string()),
            ]
        );
    }

    #[test]
    fn test_only_simple_assignment_targets_count() {
        let symbols = names(
            b"a, b = 1, 2\n\
              obj.attr = 3\n\
              items[0] = 4\n\
              plain = 5\n",
        );
        assert_eq!(symbols, vec![(SymbolKind::Variable, "plain".to_string())]);
    }

    #[test]
    fn test_empty_module() {
        assert!(names(b"").is_empty());
        assert!(names(b"# just a comment\n").is_empty());
    }

    #[test]
    fn test_duplicate_names_kept() {
        let symbols = names(b"X = 1\nX = 2\n");
        assert_eq!(symbols.len(), 2);
    }
}
