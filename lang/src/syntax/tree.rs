use std::ops::Range;
use std::sync::Arc;

use smallvec::SmallVec;
use thiserror::Error;

use crate::input::{Input, ParseError, Span};
use crate::syntax::token::{tokenize, Token, TokenKind};

/// Index of a node in the arena of its [`SyntaxTree`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(usize);

#[derive(Error, Debug)]
pub enum SyntaxError {
    #[error("offset {offset} is outside the document (length {len})")]
    OffsetOutOfRange { offset: usize, len: usize },
}

/// One node of the tree: a single token, plus the child nodes matched inside
/// its bracket span (leaf tokens are childless).
///
/// Nodes own their children; `parent` is a back-reference for traversal only.
#[derive(Debug)]
pub struct SyntaxNode {
    token: Token,
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 8]>,
    /// max(own token end, all children's ends); grows as children attach.
    end: usize,
    /// The matching `)` token, once seen. A bracket node without one is an
    /// unterminated bracket at end-of-document.
    closing: Option<Token>,
}

impl SyntaxNode {
    pub fn kind(&self) -> TokenKind {
        self.token.kind
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_bracket(&self) -> bool {
        matches!(self.token.kind, TokenKind::OpenBracket | TokenKind::OpenBracketOperator)
    }

    /// Whether the matching closing bracket of this node has been seen.
    pub fn is_closed(&self) -> bool {
        self.closing.is_some()
    }

    pub fn closing_token(&self) -> Option<&Token> {
        self.closing.as_ref()
    }

    /// Half-open range covered by this node and all its descendants.
    pub fn range(&self) -> Range<usize> {
        self.token.start()..self.end
    }

    pub fn start(&self) -> usize {
        self.token.start()
    }

    pub fn end(&self) -> usize {
        self.end
    }
}

/// Parse tree over a single document, built in one pass and immutable
/// afterwards. Re-parsing a modified document produces a fresh tree.
pub struct SyntaxTree {
    source: Arc<Input>,
    nodes: Vec<SyntaxNode>,
    root: NodeId,
}

impl SyntaxTree {
    /// Tokenizes the source and matches brackets into a tree. Never fails:
    /// unterminated brackets remain open and stray closing brackets attach as
    /// leaves, so diagnostics can be derived from the tree instead of from a
    /// parse abort.
    pub fn parse(source: Arc<Input>) -> SyntaxTree {
        let text = source.text.clone();
        let mut tree = SyntaxTree {
            source,
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.nodes.push(SyntaxNode {
            token: Token::new(TokenKind::Document, 0..text.len()),
            parent: None,
            children: SmallVec::new(),
            end: text.len(),
            closing: None,
        });

        let mut current = tree.root;
        for token in tokenize(&text) {
            match token.kind {
                TokenKind::OpenBracket | TokenKind::OpenBracketOperator => {
                    current = tree.attach(current, token);
                }
                TokenKind::CloseBracket => {
                    match tree.innermost_open_bracket(current) {
                        Some(bracket) => {
                            let end = token.end();
                            tree.nodes[bracket.0].closing = Some(token);
                            tree.extend(bracket, end);
                            current = tree.nodes[bracket.0].parent.unwrap_or(tree.root);
                        }
                        // stray closing bracket, keep it as a leaf
                        None => {
                            tree.attach(current, token);
                        }
                    }
                }
                _ => {
                    tree.attach(current, token);
                }
            }
        }
        tree
    }

    pub fn parse_str(text: &str) -> SyntaxTree {
        SyntaxTree::parse(Arc::new(Input::from_string(text)))
    }

    fn attach(&mut self, parent: NodeId, token: Token) -> NodeId {
        let end = token.end();
        let id = NodeId(self.nodes.len());
        self.nodes.push(SyntaxNode {
            token,
            parent: Some(parent),
            children: SmallVec::new(),
            end,
            closing: None,
        });
        self.nodes[parent.0].children.push(id);
        self.extend(parent, end);
        id
    }

    /// Propagates a new end offset up the ancestor chain.
    fn extend(&mut self, mut node: NodeId, end: usize) {
        loop {
            if self.nodes[node.0].end < end {
                self.nodes[node.0].end = end;
            }
            match self.nodes[node.0].parent {
                Some(p) => node = p,
                None => break,
            }
        }
    }

    /// Nearest unclosed bracket node, starting at `from` and walking up.
    fn innermost_open_bracket(&self, from: NodeId) -> Option<NodeId> {
        let mut node = Some(from);
        while let Some(id) = node {
            let n = &self.nodes[id.0];
            if n.is_bracket() && !n.is_closed() {
                return Some(id);
            }
            node = n.parent;
        }
        None
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    pub fn source(&self) -> &Arc<Input> {
        &self.source
    }

    /// Original text covered by the node and its descendants.
    pub fn text(&self, id: NodeId) -> &str {
        &self.source.text[self.node(id).range()]
    }

    /// Text of the node's own token only.
    pub fn token_text(&self, id: NodeId) -> &str {
        self.node(id).token.text(&self.source.text)
    }

    pub fn span(&self, id: NodeId) -> Span {
        Span::new(&self.source, self.node(id).range())
    }

    /// Text between a bracket node's opening token and its closing bracket
    /// (or the node end when unterminated).
    pub fn inner_text(&self, id: NodeId) -> &str {
        let node = self.node(id);
        let start = node.token.end();
        let end = match &node.closing {
            Some(closing) => closing.start(),
            None => node.end,
        };
        &self.source.text[start..end]
    }

    /// Operator of an `OpenBracketOperator` node, without the leading `(`.
    pub fn operator(&self, id: NodeId) -> Option<&str> {
        let node = self.node(id);
        match node.kind() {
            TokenKind::OpenBracketOperator => Some(&node.token.text(&self.source.text)[1..]),
            _ => None,
        }
    }

    /// Children that carry content: everything but whitespace and comments.
    pub fn content_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id)
            .children()
            .iter()
            .copied()
            .filter(|&c| !matches!(self.node(c).kind(), TokenKind::Whitespace | TokenKind::Comment))
    }

    /// Depth-first pre-order traversal of the subtree rooted at `id`.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: Vec<NodeId> = self.node(id).children().iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(self.node(next).children().iter().rev());
            Some(next)
        })
    }

    /// Localized error for the first bracket left open at end of document,
    /// if any. Parsing itself never fails; this is how callers turn an
    /// unterminated bracket into a diagnostic.
    pub fn check_closed(&self) -> Result<(), ParseError> {
        for id in self.descendants(self.root) {
            let node = self.node(id);
            if node.is_bracket() && !node.is_closed() {
                return Span::new(&self.source, node.token.range())
                    .invalid("bracket is never closed")
                    .failed();
            }
        }
        Ok(())
    }

    /// Deepest node whose own token contains `offset`.
    ///
    /// The descent selects, at each level, the first child whose range
    /// contains the offset, and stops when no child does.
    pub fn node_at(&self, offset: usize) -> Result<NodeId, SyntaxError> {
        if !self.node(self.root).range().contains(&offset) {
            return Err(SyntaxError::OffsetOutOfRange {
                offset,
                len: self.source.text.len(),
            });
        }
        let mut current = self.root;
        'descent: loop {
            for &child in self.node(current).children() {
                if self.node(child).range().contains(&offset) {
                    current = child;
                    continue 'descent;
                }
            }
            return Ok(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_nesting_and_ranges() {
        let text = "(define (domain test))";
        let tree = SyntaxTree::parse_str(text);
        let root = tree.node(tree.root());
        assert_eq!(root.range(), 0..text.len());

        let define = tree.content_children(tree.root()).next().unwrap();
        assert_eq!(tree.operator(define), Some("define"));
        assert!(tree.node(define).is_closed());
        assert_eq!(tree.text(define), text);

        let domain = tree.content_children(define).next().unwrap();
        assert_eq!(tree.text(domain), "(domain test)");
        assert_eq!(tree.node(domain).parent(), Some(define));
    }

    #[test]
    fn node_at_returns_deepest_containing_node() {
        let text = "(define (domain test))";
        let tree = SyntaxTree::parse_str(text);
        // offset 16 is inside the identifier `test`
        let node = tree.node_at(16).unwrap();
        assert_eq!(tree.token_text(node), "test");
        // every offset resolves to a node whose range contains it
        for offset in 0..text.len() {
            let id = tree.node_at(offset).unwrap();
            assert!(tree.node(id).range().contains(&offset));
        }
    }

    #[test]
    fn node_at_rejects_out_of_range_offsets() {
        let tree = SyntaxTree::parse_str("(a)");
        assert!(tree.node_at(3).is_err());
    }

    #[test]
    fn unterminated_bracket_stays_open() {
        let tree = SyntaxTree::parse_str("(define (domain test)");
        let define = tree.content_children(tree.root()).next().unwrap();
        assert!(!tree.node(define).is_closed());
        let domain = tree.content_children(define).next().unwrap();
        assert!(tree.node(domain).is_closed());
        // node still extends to the end of its last child
        assert_eq!(tree.node(define).end(), 21);
    }

    #[test]
    fn whitespace_and_comments_are_preserved() {
        let text = "(and ; note\n  (p))";
        let tree = SyntaxTree::parse_str(text);
        let and = tree.content_children(tree.root()).next().unwrap();
        assert_eq!(tree.text(and), text);
        let kinds: Vec<_> = tree.node(and).children().iter().map(|&c| tree.node(c).kind()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Whitespace,
                TokenKind::Comment,
                TokenKind::Whitespace,
                TokenKind::OpenBracket,
            ]
        );
    }

    #[test]
    fn check_closed_localizes_the_open_bracket() {
        use crate::input::Ctx;

        assert!(SyntaxTree::parse_str("(define (domain d))").check_closed().is_ok());

        let tree = SyntaxTree::parse_str("(define (:predicates (at ?x\n)");
        let err = tree.check_closed().ctx("parsing predicates").unwrap_err();
        let rendered = format!("{err}");
        assert!(rendered.contains("parsing predicates"));
        assert!(rendered.contains("bracket is never closed"));
    }

    #[test]
    fn inner_text_excludes_brackets() {
        let tree = SyntaxTree::parse_str("(:types truck car - vehicle)");
        let types = tree.content_children(tree.root()).next().unwrap();
        assert_eq!(tree.inner_text(types), " truck car - vehicle");
    }
}
