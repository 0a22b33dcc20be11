use super::ast::Node;
use super::matcher::Matcher;

/// Decide whether `subject` satisfies a compiled expression
pub fn evaluate(node: &Node<Matcher>, subject: &str) -> bool {
    match node {
        Node::Pattern(matcher) => matcher.matches(subject),
        Node::And(l, r) => evaluate(l, subject) && evaluate(r, subject),
        Node::Or(l, r) => evaluate(l, subject) || evaluate(r, subject),
        Node::Not(c) => !evaluate(c, subject),
    }
}
