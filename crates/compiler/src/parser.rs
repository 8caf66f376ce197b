//! Hand-written recursive-descent parser over a byte cursor.
//!
//! Produces a [`senie_core::ast::Ast`] that preserves every byte of the
//! original source as child `Whitespace`/`Comment` nodes, so the unparser
//! can reproduce text exactly for the non-altered portions of a program.

use crate::error::ParseError;
use senie_core::ast::{Ast, Node, NodeId, NodeType};
use senie_core::word_table::WordTable;
use tracing::trace;

const IDENT_SYMBOLS: &str = "+-*/=!@#$%^&<>?";

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    ast: Ast,
    words: &'a mut WordTable,
}

pub fn parse(source: &str, words: &mut WordTable) -> Result<Ast, ParseError> {
    words.reset_user_words();
    let mut p = Parser {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
        ast: Ast::new(),
        words,
    };
    p.parse_top_level()?;
    Ok(p.ast)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn parse_top_level(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                None => return Ok(()),
                Some(')') => return Err(ParseError::UnmatchedClose(')', self.pos)),
                Some(']') => return Err(ParseError::UnmatchedClose(']', self.pos)),
                Some('}') => return Err(ParseError::UnmatchedClose('}', self.pos)),
                _ => {
                    let id = self.parse_form()?;
                    self.ast.top_level.push(id);
                }
            }
        }
    }

    /// Parses exactly one form; the caller already knows one is present
    /// (not at EOF, not sitting on a stray closing bracket).
    fn parse_form(&mut self) -> Result<NodeId, ParseError> {
        let c = self.peek().expect("caller checked not at eof");
        match c {
            ' ' | '\t' | '\n' | '\r' | ',' => Ok(self.parse_whitespace()),
            ';' => Ok(self.parse_comment()),
            '(' => self.parse_seq('(', ')', false),
            '[' => self.parse_seq('[', ']', true),
            '{' => self.parse_alterable(),
            '"' => self.parse_string(),
            '\'' => self.parse_quote(),
            ')' => Err(ParseError::UnmatchedClose(')', self.pos)),
            ']' => Err(ParseError::UnmatchedClose(']', self.pos)),
            '}' => Err(ParseError::UnmatchedClose('}', self.pos)),
            _ if self.at_number_start() => Ok(self.parse_number()),
            _ => self.parse_identifier_or_label(),
        }
    }

    fn parse_whitespace(&mut self) -> NodeId {
        let start = self.pos;
        while matches!(self.peek(), Some(' ') | Some('\t') | Some('\n') | Some('\r') | Some(',')) {
            self.advance();
        }
        self.ast.leaf(NodeType::Whitespace, (start, self.pos))
    }

    fn parse_comment(&mut self) -> NodeId {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        self.ast.leaf(NodeType::Comment, (start, self.pos))
    }

    fn parse_seq(&mut self, open: char, close: char, is_vector: bool) -> Result<NodeId, ParseError> {
        let start = self.pos;
        self.advance();
        let mut children = Vec::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnexpectedEof(close)),
                Some(c) if c == close => {
                    self.advance();
                    break;
                }
                Some(c) if c == ')' || c == ']' || c == '}' => {
                    return Err(ParseError::UnmatchedClose(c, self.pos));
                }
                _ => children.push(self.parse_form()?),
            }
        }
        let node_type = if is_vector {
            NodeType::Vector(children)
        } else {
            NodeType::List(children)
        };
        let _ = open;
        Ok(self.ast.leaf(node_type, (start, self.pos)))
    }

    /// `{x …}` — the first non-whitespace/comment item becomes the alterable
    /// value; anything before it is `parameter_prefix`, anything after is
    /// `parameter_ast`.
    fn parse_alterable(&mut self) -> Result<NodeId, ParseError> {
        let open_pos = self.pos;
        self.advance();
        let mut prefix = Vec::new();
        let value_id = loop {
            match self.peek() {
                None => return Err(ParseError::UnexpectedEof('}')),
                Some('}') => return Err(ParseError::IllegalAlterable("(empty)", open_pos)),
                _ => {
                    let id = self.parse_form()?;
                    if matches!(self.ast.get(id).node_type, NodeType::Whitespace | NodeType::Comment) {
                        prefix.push(id);
                        continue;
                    }
                    break id;
                }
            }
        };
        if !self.ast.get(value_id).node_type.can_be_alterable() {
            return Err(ParseError::IllegalAlterable(
                self.ast.get(value_id).node_type.type_name(),
                open_pos,
            ));
        }
        let mut trailer = Vec::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnexpectedEof('}')),
                Some('}') => {
                    self.advance();
                    break;
                }
                _ => trailer.push(self.parse_form()?),
            }
        }
        let node = self.ast.get_mut(value_id);
        node.alterable = true;
        node.parameter_prefix = prefix;
        node.parameter_ast = trailer;
        trace!(node_id = value_id.0, "parsed alterable node");
        Ok(value_id)
    }

    fn parse_string(&mut self) -> Result<NodeId, ParseError> {
        let start = self.pos;
        self.advance();
        let text_start = self.pos;
        loop {
            match self.advance() {
                None => return Err(ParseError::UnterminatedString(start)),
                Some('"') => break,
                Some(_) => {}
            }
        }
        let text_end = self.pos - 1;
        let text = &self.src[text_start..text_end];
        let iname = self.words.intern_user_word(text)?;
        Ok(self.ast.leaf(NodeType::String(iname), (start, self.pos)))
    }

    /// `'x` desugars to `(quote x)`, with a synthetic space node between
    /// `quote` and `x` (not present in the source — the unparser emits a
    /// literal `" "` for any zero-length `Whitespace` node).
    fn parse_quote(&mut self) -> Result<NodeId, ParseError> {
        let start = self.pos;
        self.advance();
        if self.at_eof() {
            return Err(ParseError::UnexpectedEof(')'));
        }
        let inner = self.parse_form()?;
        let quote_name = self.words.intern_user_word("quote")?;
        let quote_node = self.ast.leaf(NodeType::Name(quote_name), (start, start + 1));
        let space_node = self.ast.leaf(NodeType::Whitespace, (self.pos, self.pos));
        let end = self.pos;
        Ok(self
            .ast
            .leaf(NodeType::List(vec![quote_node, space_node, inner]), (start, end)))
    }

    fn at_number_start(&self) -> bool {
        let rest = &self.bytes[self.pos..];
        match rest.first() {
            Some(b) if b.is_ascii_digit() => true,
            Some(b'.') => true,
            Some(b'-') => rest.get(1).is_some_and(u8::is_ascii_digit),
            _ => false,
        }
    }

    fn parse_number(&mut self) -> NodeId {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        let mut saw_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !saw_dot {
                saw_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        let node_type = if saw_dot {
            NodeType::Float(text.parse::<f32>().unwrap_or(0.0))
        } else {
            match text.parse::<i32>() {
                Ok(i) => NodeType::Int(i),
                Err(_) => NodeType::Float(text.parse::<f32>().unwrap_or(0.0)),
            }
        };
        self.ast.leaf(node_type, (start, self.pos))
    }

    fn is_ident_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || IDENT_SYMBOLS.contains(c)
    }

    fn parse_identifier_or_label(&mut self) -> Result<NodeId, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if Self::is_ident_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            // Not whitespace, not a recognized opener, not ident: consume
            // one char so the parser always makes forward progress.
            self.advance();
        }
        let text_end = self.pos;
        let is_label = self.peek() == Some(':');
        let name = &self.src[start..text_end];
        let iname = self.words.intern_user_word(name)?;
        if is_label {
            self.advance();
            Ok(self.ast.leaf(NodeType::Label(iname), (start, self.pos)))
        } else {
            Ok(self.ast.leaf(NodeType::Name(iname), (start, text_end)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> (Ast, WordTable) {
        let mut words = WordTable::new();
        let ast = parse(src, &mut words).unwrap();
        (ast, words)
    }

    #[test]
    fn parses_a_plain_list() {
        let (ast, words) = parse_ok("(rect width: 10)");
        assert_eq!(ast.top_level.len(), 1);
        let list = ast.get(ast.top_level[0]);
        match &list.node_type {
            NodeType::List(children) => {
                assert!(children.len() >= 3);
                let name = ast.get(children[0]);
                match name.node_type {
                    NodeType::Name(id) => assert_eq!(words.lookup("rect"), Some(id)),
                    _ => panic!("expected Name"),
                }
            }
            other => panic!("expected List, got {other:?}"),
        }
    }

    #[test]
    fn literal_vector_has_two_float_children() {
        let (ast, _) = parse_ok("[1 2]");
        let v = ast.get(ast.top_level[0]);
        match &v.node_type {
            NodeType::Vector(children) => {
                let floats: Vec<_> = children
                    .iter()
                    .map(|id| &ast.get(*id).node_type)
                    .filter(|nt| matches!(nt, NodeType::Int(_) | NodeType::Float(_)))
                    .collect();
                assert_eq!(floats.len(), 2);
            }
            other => panic!("expected Vector, got {other:?}"),
        }
    }

    #[test]
    fn quote_desugars_to_quote_list() {
        let (ast, words) = parse_ok("'(a b)");
        let outer = ast.get(ast.top_level[0]);
        match &outer.node_type {
            NodeType::List(children) => {
                assert_eq!(children.len(), 3);
                match ast.get(children[0]).node_type {
                    NodeType::Name(id) => assert_eq!(words.lookup("quote"), Some(id)),
                    _ => panic!("expected Name(quote)"),
                }
                assert_eq!(ast.get(children[1]).node_type, NodeType::Whitespace);
            }
            other => panic!("expected List, got {other:?}"),
        }
    }

    #[test]
    fn alterable_node_captures_prefix_and_trailer() {
        let (ast, _) = parse_ok("{ 100 (gen/2d min: 0 max: 500)}");
        let value_id = ast.top_level[0];
        let node = ast.get(value_id);
        assert!(node.alterable);
        assert_eq!(node.node_type, NodeType::Int(100));
        assert_eq!(node.parameter_prefix.len(), 1);
        assert_eq!(node.parameter_ast.len(), 1);
    }

    #[test]
    fn non_alterable_shape_inside_braces_is_rejected() {
        let mut words = WordTable::new();
        let err = parse("{\"nope\"}", &mut words).unwrap_err();
        assert!(matches!(err, ParseError::IllegalAlterable("STRING", _)));
    }

    #[test]
    fn unmatched_close_is_an_error() {
        let mut words = WordTable::new();
        let err = parse("(a b))", &mut words).unwrap_err();
        assert!(matches!(err, ParseError::UnmatchedClose(')', _)));
    }

    #[test]
    fn negative_number_and_leading_dot_are_recognized() {
        let (ast, _) = parse_ok("(-3 .5)");
        let list = ast.get(ast.top_level[0]);
        match &list.node_type {
            NodeType::List(children) => {
                let nums: Vec<_> = children
                    .iter()
                    .map(|id| ast.get(*id).node_type.clone())
                    .filter(|nt| matches!(nt, NodeType::Int(_) | NodeType::Float(_)))
                    .collect();
                assert_eq!(nums, vec![NodeType::Int(-3), NodeType::Float(0.5)]);
            }
            other => panic!("expected List, got {other:?}"),
        }
    }
}
