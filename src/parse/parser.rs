//! Tree parser facade
//!
//! Wraps the tree-sitter Python grammar behind a single `parse` entry point.
//! Each successful parse yields a [`ParseHandle`] owning the language, the
//! parser, and the tree, and carrying its own cache of the node-kind ids the
//! extractor needs. Keeping the cache per handle (rather than in process
//! globals) makes concurrent parses safe by construction.

use crate::error::{ParseError, ParseResult};
use tree_sitter::{Language, Node, Parser, Tree};

/// Node-kind ids resolved once per parse.
pub(crate) struct NodeKinds {
    pub module: u16,
    pub class_definition: u16,
    pub function_definition: u16,
    pub expression_statement: u16,
    pub assignment: u16,
    pub identifier: u16,
    pub decorated_definition: u16,
    pub block: u16,
    pub try_statement: u16,
    pub except_clause: u16,
    pub if_statement: u16,
    pub else_clause: u16,
    pub elif_clause: u16,
}

impl NodeKinds {
    fn resolve(language: &Language) -> Self {
        let named = |name: &str| language.id_for_node_kind(name, true);
        Self {
            module: named("module"),
            class_definition: named("class_definition"),
            function_definition: named("function_definition"),
            expression_statement: named("expression_statement"),
            assignment: named("assignment"),
            identifier: named("identifier"),
            decorated_definition: named("decorated_definition"),
            block: named("block"),
            try_statement: named("try_statement"),
            except_clause: named("except_clause"),
            if_statement: named("if_statement"),
            else_clause: named("else_clause"),
            elif_clause: named("elif_clause"),
        }
    }

    /// Control-flow containers whose children are elevated to module scope.
    pub(crate) fn is_scope(&self, kind: u16) -> bool {
        kind == self.block
            || kind == self.if_statement
            || kind == self.else_clause
            || kind == self.elif_clause
            || kind == self.try_statement
            || kind == self.except_clause
    }
}

/// Owning bundle of language + parser + tree + source borrow.
///
/// The source bytes must outlive the handle; symbol name slices point into
/// them. Fields release in declaration order: tree, then parser, then
/// language.
pub struct ParseHandle<'a> {
    tree: Tree,
    _parser: Parser,
    language: Language,
    kinds: NodeKinds,
    source: &'a [u8],
}

impl<'a> ParseHandle<'a> {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &'a [u8] {
        self.source
    }

    /// ABI version of the loaded grammar (the bundled grammar reports 14+).
    pub fn abi_version(&self) -> usize {
        self.language.abi_version()
    }

    pub(crate) fn kinds(&self) -> &NodeKinds {
        &self.kinds
    }
}

/// Parse a Python source buffer.
///
/// `TreeNotFound` is the only parse-time failure: the parser declined to
/// produce a tree. Syntactically broken sources still parse (with error
/// nodes) and are fair game for extraction.
pub fn parse(source: &[u8]) -> ParseResult<ParseHandle<'_>> {
    let language = Language::from(tree_sitter_python::LANGUAGE);
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|err| ParseError::Language(err.to_string()))?;

    let tree = parser.parse(source, None).ok_or(ParseError::TreeNotFound)?;
    let kinds = NodeKinds::resolve(&language);

    Ok(ParseHandle {
        tree,
        _parser: parser,
        language,
        kinds,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_produces_module_root() {
        let handle = parse(b"x = 1\n").unwrap();
        assert_eq!(handle.root().kind(), "module");
        assert_eq!(handle.root().kind_id(), handle.kinds().module);
    }

    #[test]
    fn test_kind_ids_are_nonzero() {
        let handle = parse(b"").unwrap();
        let kinds = handle.kinds();
        for id in [
            kinds.module,
            kinds.class_definition,
            kinds.function_definition,
            kinds.expression_statement,
            kinds.assignment,
            kinds.identifier,
            kinds.decorated_definition,
            kinds.block,
            kinds.try_statement,
            kinds.except_clause,
            kinds.if_statement,
            kinds.else_clause,
            kinds.elif_clause,
        ] {
            assert_ne!(id, 0);
        }
    }

    #[test]
    fn test_grammar_abi_is_supported() {
        let handle = parse(b"").unwrap();
        assert!(handle.abi_version() >= 14);
    }

    #[test]
    fn test_broken_source_still_parses() {
        let handle = parse(b"def broken(:\n    pass\n").unwrap();
        assert_eq!(handle.root().kind(), "module");
    }
}
