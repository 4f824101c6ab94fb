//! Tokenizer.
//!
//! Splits raw formula text into tokens and classifies each token as a
//! [`Node`]. Nothing fails here: text that is not recognized becomes a
//! [`Node::Invalid`] and is reported during validation.

use crate::context::ParsingContext;
use crate::node::{BinaryOperator, FunctionCall, Node, Punctuation, UnaryOperator};
use crate::stat_id::{FunctionId, StatId, VariableId, FUNCTION_PREFIX};

/// Symbols that are always a token of their own.
const SINGLE_CHAR_SYMBOLS: &str = "+-*/%(){},&|^";

/// Symbols that combine with each other (`<=`, `~=`).
const COMPOUND_SYMBOLS: &str = "<>=~";

const ARGUMENT_SEPARATOR: &str = ",";

/// Split `raw` into token texts.
///
/// Single-character symbols always stand alone. `<`, `>`, `=` and `~`
/// combine greedily with each other and end at any other character. `$` and
/// whitespace always start a new token.
///
/// ```rust
/// use statexpr::tokenizer::split;
///
/// assert_eq!(split("2+$ABS{-1}"), vec!["2", "+", "$ABS", "{", "-", "1", "}"]);
/// assert_eq!(split("a>=b"), vec!["a", ">=", "b"]);
/// ```
pub fn split(raw: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_compound = false;

    for (i, c) in raw.char_indices() {
        if c.is_whitespace() {
            push_token(&mut tokens, &raw[start..i]);
            start = i + c.len_utf8();
            in_compound = false;
        } else if SINGLE_CHAR_SYMBOLS.contains(c) {
            push_token(&mut tokens, &raw[start..i]);
            let end = i + c.len_utf8();
            tokens.push(&raw[i..end]);
            start = end;
            in_compound = false;
        } else if COMPOUND_SYMBOLS.contains(c) {
            if !in_compound {
                push_token(&mut tokens, &raw[start..i]);
                start = i;
                in_compound = true;
            }
        } else if c == FUNCTION_PREFIX || in_compound {
            push_token(&mut tokens, &raw[start..i]);
            start = i;
            in_compound = false;
        }
    }
    push_token(&mut tokens, &raw[start..]);

    tokens
}

fn push_token<'r>(tokens: &mut Vec<&'r str>, token: &'r str) {
    if !token.is_empty() {
        tokens.push(token);
    }
}

/// Numbers are written with `.` as the decimal separator and must start with
/// a digit or a dot; `inf` and `nan` are identifiers, not numbers.
fn parse_number(token: &str) -> Option<f64> {
    if !token.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    token.parse().ok()
}

/// Classify a single token.
///
/// The order matters: punctuation and operators first, then function ids,
/// variable ids, numbers and finally stat ids.
pub fn classify(token: &str, ctx: &ParsingContext<'_>) -> Node {
    if let Some(punctuation) = Punctuation::from_symbol(token) {
        return Node::Punctuation(punctuation);
    }
    if token == ARGUMENT_SEPARATOR {
        return Node::ArgumentSeparator;
    }
    if let Some(op) = BinaryOperator::from_symbol(token) {
        return Node::Binary(op);
    }
    if token == UnaryOperator::Not.symbol() {
        return Node::Unary(UnaryOperator::Not, None);
    }
    if let Ok(id) = FunctionId::new(token) {
        return Node::Function(FunctionCall::new(id));
    }
    if let Some(id) = VariableId::parse(token, ctx.stat_id()) {
        return Node::Variable(id);
    }
    if let Some(n) = parse_number(token) {
        return Node::Number(n);
    }
    if let Ok(id) = StatId::new(token) {
        return Node::Stat(id);
    }
    Node::Invalid(token.to_string())
}

/// Split and classify `raw`.
pub fn tokenize(raw: &str, ctx: &ParsingContext<'_>) -> Vec<Node> {
    split(raw)
        .into_iter()
        .map(|token| classify(token, ctx))
        .collect()
}
