use std::fmt;
use std::str::FromStr;

use super::error::ExprError;
use super::lexer::tokenize;
use super::parser::parse;

/// A boolean expression tree over leaves of type `P`
///
/// The parser produces `Node<String>` (see [`Expr`]); compiling the leaves
/// yields a `Node<Matcher>` that the evaluator walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node<P> {
    Pattern(P),
    And(Box<Node<P>>, Box<Node<P>>),
    Or(Box<Node<P>>, Box<Node<P>>),
    Not(Box<Node<P>>),
}

/// A parsed, not yet compiled, expression
pub type Expr = Node<String>;

impl<P> Node<P> {
    pub fn and(left: Node<P>, right: Node<P>) -> Self {
        Node::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Node<P>, right: Node<P>) -> Self {
        Node::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Node<P>) -> Self {
        Node::Not(Box::new(child))
    }

    /// Rebuild the tree with every leaf converted by `f`, stopping at the first error
    pub fn try_map<Q, E>(&self, f: &mut impl FnMut(&P) -> Result<Q, E>) -> Result<Node<Q>, E> {
        Ok(match self {
            Node::Pattern(p) => Node::Pattern(f(p)?),
            Node::And(l, r) => Node::and(l.try_map(f)?, r.try_map(f)?),
            Node::Or(l, r) => Node::or(l.try_map(f)?, r.try_map(f)?),
            Node::Not(c) => Node::not(c.try_map(f)?),
        })
    }

    /// Leaves in left-to-right order
    pub fn leaves(&self) -> Vec<&P> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a P>) {
        match self {
            Node::Pattern(p) => out.push(p),
            Node::And(l, r) | Node::Or(l, r) => {
                l.collect_leaves(out);
                r.collect_leaves(out);
            }
            Node::Not(c) => c.collect_leaves(out),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Node::Pattern(_) => 1,
            Node::And(l, r) | Node::Or(l, r) => 1 + l.depth().max(r.depth()),
            Node::Not(c) => 1 + c.depth(),
        }
    }
}

/// Canonical form: binary nodes fully parenthesised, literals re-escaped.
/// Parsing the output again gives back an identical tree.
impl fmt::Display for Node<String> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Pattern(source) => write_literal(f, source),
            Node::And(l, r) => write!(f, "({l} AND {r})"),
            Node::Or(l, r) => write!(f, "({l} OR {r})"),
            Node::Not(c) => write!(f, "NOT {c}"),
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, source: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in source.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl FromStr for Node<String> {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s)?;
        Ok(parse(&tokens)?)
    }
}
