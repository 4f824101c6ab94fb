//! Formula parser.
//!
//! Parsing runs in five steps:
//!
//! 1. tokenize the raw text into a flat node sequence
//! 2. turn `+`/`-` into unary operators where they cannot be binary. In a
//!    function body, self calls take the arity given by the highest `$N`
//! 3. validate every node against its neighbours, collecting all errors
//! 4. materialize: fold parentheses into groups, attach call arguments and
//!    unary operands
//! 5. wrap the result in an [`Expression`]
//!
//! If step 3 finds anything, no expression is produced.

use crate::context::ParsingContext;
use crate::error::StatError;
use crate::eval::ensure_sufficient_stack;
use crate::expression::Expression;
use crate::node::{pair_punctuation, Node, Punctuation};
use crate::tokenizer::tokenize;
use std::iter::Peekable;
use std::vec::IntoIter;

type Nodes = Peekable<IntoIter<Node>>;

/// Parse `raw` into an expression.
///
/// # Returns
///
/// * `Ok(Expression)` when the formula is valid
/// * `Err(errors)` with every problem found otherwise
///
/// # Examples
///
/// ```rust
/// use statexpr::{parser, ParsingContext, StatService};
///
/// let stats = StatService::new();
/// let ctx = ParsingContext::new(&stats);
///
/// let expression = parser::parse("$MAX{1, 2 * 3}", &ctx).unwrap();
/// assert_eq!(expression.to_string(), "$MAX{1, 2 * 3}");
///
/// let errors = parser::parse("1 + * UNKNOWN", &ctx).unwrap_err();
/// assert_eq!(errors.len(), 3);
/// ```
pub fn parse(raw: &str, ctx: &ParsingContext<'_>) -> Result<Expression, Vec<StatError>> {
    let nodes = tokenize(raw, ctx);
    if nodes.is_empty() {
        return Err(vec![StatError::EmptyExpression]);
    }

    let ctx = &ctx.with_highest_argument(highest_argument(&nodes));
    let nodes = disambiguate(nodes, ctx);
    let errors = validate(&nodes, ctx);
    if !errors.is_empty() {
        tracing::debug!(formula = raw, errors = errors.len(), "formula rejected");
        return Err(errors);
    }

    Ok(Expression::new(materialize(nodes)))
}

fn highest_argument(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .filter_map(|node| match node {
            Node::Function(call) => call.id.argument_index(),
            _ => None,
        })
        .max()
        .unwrap_or(0)
}

fn disambiguate(nodes: Vec<Node>, ctx: &ParsingContext<'_>) -> Vec<Node> {
    let mut result: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let node = node.disambiguate(result.last(), ctx);
        result.push(node);
    }
    result
}

fn validate(nodes: &[Node], ctx: &ParsingContext<'_>) -> Vec<StatError> {
    let pairs = pair_punctuation(nodes);
    (0..nodes.len())
        .flat_map(|index| Node::validate_paired(nodes, &pairs, index, ctx))
        .collect()
}

/// Build the nested node tree from a validated flat sequence.
fn materialize(nodes: Vec<Node>) -> Vec<Node> {
    let mut nodes = nodes.into_iter().peekable();
    take_sequence(&mut nodes)
}

/// Take nodes until the end of the enclosing group or argument.
fn take_sequence(nodes: &mut Nodes) -> Vec<Node> {
    let mut sequence = Vec::new();
    while let Some(node) = nodes.next_if(|n| !n.closes_sequence()) {
        sequence.push(take_node(node, nodes));
    }
    sequence
}

fn take_node(node: Node, nodes: &mut Nodes) -> Node {
    ensure_sufficient_stack(move || match node {
        Node::Punctuation(Punctuation::LeftParenthesis) => {
            let inner = take_sequence(nodes);
            nodes.next_if(|n| n.is_punctuation(Punctuation::RightParenthesis));
            Node::Group(Expression::new(inner))
        }
        Node::Function(mut call) => {
            call.arguments = take_arguments(nodes);
            Node::Function(call)
        }
        Node::Unary(op, None) => {
            let operand = nodes
                .next()
                .map(|next| Box::new(Expression::new(vec![take_node(next, nodes)])));
            Node::Unary(op, operand)
        }
        other => other,
    })
}

/// Arguments of a call: a bracketed list, a single shorthand operand, or
/// nothing.
fn take_arguments(nodes: &mut Nodes) -> Vec<Expression> {
    if nodes
        .next_if(|n| n.is_punctuation(Punctuation::LeftBracket))
        .is_some()
    {
        let mut arguments = Vec::new();
        if nodes
            .next_if(|n| n.is_punctuation(Punctuation::RightBracket))
            .is_some()
        {
            return arguments;
        }
        loop {
            arguments.push(Expression::new(take_sequence(nodes)));
            match nodes.next() {
                Some(Node::ArgumentSeparator) => continue,
                _ => break,
            }
        }
        return arguments;
    }

    match nodes.next_if(Node::is_valid_right_operand) {
        Some(next) => vec![Expression::new(vec![take_node(next, nodes)])],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BinaryOperator, UnaryOperator};
    use crate::stat_id::StatId;
    use crate::stat_service::StatService;

    fn parse_free(stats: &StatService, raw: &str) -> Result<Expression, Vec<StatError>> {
        parse(raw, &ParsingContext::new(stats))
    }

    fn round_trip(raw: &str) -> String {
        let stats = StatService::new();
        parse_free(&stats, raw).unwrap().to_string()
    }

    #[test]
    fn test_parse_precedence_layout() {
        let stats = StatService::new();
        let expression = parse_free(&stats, "2 + 3 * 4").unwrap();
        assert_eq!(expression.nodes().len(), 5);
        assert_eq!(expression.nodes()[1], Node::Binary(BinaryOperator::Add));
    }

    #[test]
    fn test_parse_groups() {
        let stats = StatService::new();
        let expression = parse_free(&stats, "(2 + 3) * 4").unwrap();
        assert_eq!(expression.nodes().len(), 3);
        assert!(matches!(&expression.nodes()[0], Node::Group(inner) if inner.nodes().len() == 3));
        assert_eq!(expression.to_string(), "(2 + 3) * 4");
    }

    #[test]
    fn test_parse_unary() {
        assert_eq!(round_trip("+1"), "+1");
        assert_eq!(round_trip("1 - -2"), "1 - -2");
        assert_eq!(round_trip("~0"), "~0");
        assert_eq!(round_trip("-(1 + 2)"), "-(1 + 2)");

        let stats = StatService::new();
        let expression = parse_free(&stats, "-1").unwrap();
        assert!(matches!(
            &expression.nodes()[0],
            Node::Unary(UnaryOperator::Minus, Some(_))
        ));
    }

    #[test]
    fn test_parse_functions() {
        assert_eq!(round_trip("$MAX{0, 1}"), "$MAX{0, 1}");
        assert_eq!(round_trip("$MAX{0, $MAX{0,1}}"), "$MAX{0, $MAX{0, 1}}");
        assert_eq!(round_trip("$ZERO{}"), "$ZERO");
        assert_eq!(round_trip("$ZERO"), "$ZERO");
        assert_eq!(round_trip("$ABS 1"), "$ABS 1");
        assert_eq!(round_trip("$ABS{1}"), "$ABS 1");
        assert_eq!(
            round_trip("$MAX{$ABS 1, $ZERO, $ABS{$MIN{0,1}}}"),
            "$MAX{$ABS 1, $ZERO, $ABS{$MIN{0, 1}}}"
        );
    }

    #[test]
    fn test_shorthand_call_takes_unary_argument() {
        let stats = StatService::new();
        let expression = parse_free(&stats, "$ABS -2").unwrap();
        assert_eq!(expression.nodes().len(), 1);
        assert_eq!(expression.to_string(), "$ABS -2");
    }

    #[test]
    fn test_binary_after_zero_argument_call() {
        let stats = StatService::new();
        let expression = parse_free(&stats, "$ZERO - 1").unwrap();
        assert_eq!(expression.nodes().len(), 3);
    }

    #[test]
    fn test_parse_with_stat_context() {
        let mut stats = StatService::new();
        stats.add("stat", None).unwrap();
        stats.add_or_update_variable("stat.var", "0").unwrap();
        let owner = StatId::new("stat").unwrap();
        let ctx = ParsingContext::for_stat(&stats, &owner);

        let expression = parse("$MAX{.1, 2} + +3 - -4 * stat / .var", &ctx).unwrap();
        assert_eq!(
            expression.to_string(),
            "$MAX{0.1, 2} + +3 - -4 * stat / stat.var"
        );
    }

    #[test]
    fn test_empty_expression() {
        let stats = StatService::new();
        assert_eq!(parse_free(&stats, "").unwrap_err(), vec![StatError::EmptyExpression]);
        assert_eq!(parse_free(&stats, "   ").unwrap_err(), vec![StatError::EmptyExpression]);
    }

    #[test]
    fn test_arity_errors() {
        let stats = StatService::new();
        assert_eq!(parse_free(&stats, "$ABS").unwrap_err().len(), 1);
        assert_eq!(parse_free(&stats, "$ZERO 1").unwrap_err().len(), 1);
        assert_eq!(parse_free(&stats, "$MIN{1}").unwrap_err().len(), 1);
        assert_eq!(parse_free(&stats, "$D{1, 2, 3, 4}").unwrap_err().len(), 1);
    }

    #[test]
    fn test_unbalanced_brackets() {
        let stats = StatService::new();
        assert_eq!(
            parse_free(&stats, "$MIN{").unwrap_err(),
            vec![StatError::UnclosedBracket(crate::stat_id::FunctionId::new("$MIN").unwrap())]
        );
        let errors = parse_free(&stats, "$ABS}").unwrap_err();
        assert!(errors.contains(&StatError::UnexpectedClosingBracket));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let stats = StatService::new();
        assert_eq!(
            parse_free(&stats, "(1 + 2").unwrap_err(),
            vec![StatError::UnclosedParenthesis]
        );
        assert_eq!(
            parse_free(&stats, "1 + 2)").unwrap_err(),
            vec![StatError::UnexpectedClosingParenthesis]
        );
        assert_eq!(parse_free(&stats, "()").unwrap_err(), vec![StatError::EmptyParenthesis]);
    }

    #[test]
    fn test_crossed_groups() {
        let stats = StatService::new();
        assert_eq!(
            parse_free(&stats, "$ABS{(1})").unwrap_err(),
            vec![
                StatError::UnclosedBracket(crate::stat_id::FunctionId::new("$ABS").unwrap()),
                StatError::UnexpectedClosingBracket,
            ]
        );
        assert_eq!(
            parse_free(&stats, "(1 + $ABS{2)}").unwrap_err(),
            vec![
                StatError::UnclosedParenthesis,
                StatError::UnexpectedClosingParenthesis,
            ]
        );
        assert_eq!(round_trip("$ABS{(1)}"), "$ABS (1)");
    }

    #[test]
    fn test_not_after_value() {
        let stats = StatService::new();
        assert_eq!(
            parse_free(&stats, "1 ~2").unwrap_err(),
            vec![StatError::MissingOperator("~".into())]
        );
        assert!(parse_free(&stats, "(1) ~2").is_err());
        assert_eq!(round_trip("1 & ~2"), "1 & ~2");
    }

    #[test]
    fn test_deeply_nested_groups() {
        let depth = 2_000;
        let raw = format!("{}1 + 1{}", "(".repeat(depth), ")".repeat(depth));
        let mut stats = StatService::new();
        let expression = parse_free(&stats, &raw).unwrap();
        assert_eq!(expression.nodes().len(), 1);
        assert_eq!(stats.evaluate(&expression).unwrap(), 2.0);

        let negated = format!("{}1", "-".repeat(depth));
        let expression = parse_free(&stats, &negated).unwrap();
        assert_eq!(stats.evaluate(&expression).unwrap(), 1.0);
    }

    #[test]
    fn test_missing_operands() {
        let stats = StatService::new();
        assert_eq!(parse_free(&stats, "1 +").unwrap_err().len(), 1);
        assert_eq!(parse_free(&stats, "* 2").unwrap_err().len(), 1);
        assert_eq!(parse_free(&stats, "1 2").unwrap_err(), vec![StatError::MissingOperator("2".into())]);
    }

    #[test]
    fn test_separator_errors() {
        let stats = StatService::new();
        assert!(parse_free(&stats, "1, 2")
            .unwrap_err()
            .contains(&StatError::MisplacedSeparator));
        assert!(parse_free(&stats, "$MAX{1, (2, 3)}")
            .unwrap_err()
            .contains(&StatError::MisplacedSeparator));
        let errors = parse_free(&stats, "$MAX{1,}").unwrap_err();
        assert!(matches!(errors[0], StatError::ArgumentExpectedAfter(_)));
    }

    #[test]
    fn test_invalid_tokens() {
        let stats = StatService::new();
        assert_eq!(
            parse_free(&stats, "1 + @").unwrap_err(),
            vec![
                StatError::MissingRightOperand {
                    operator: "+".into(),
                    found: "'@'".into()
                },
                StatError::InvalidToken("@".into()),
            ]
        );
        assert!(parse_free(&stats, "{1}")
            .unwrap_err()
            .contains(&StatError::UnexpectedBracket));
    }

    #[test]
    fn test_errors_are_collected() {
        let mut stats = StatService::new();
        stats.add("A", None).unwrap();
        stats.add("B", None).unwrap();

        // A.b: missing operator + undefined variable; $ZERO: missing operator +
        // too many arguments; $MIN: missing operator
        let errors = parse_free(&stats, "A A.b $ZERO $ABS 1 $MIN{0,1}").unwrap_err();
        assert_eq!(errors.len(), 5);
    }
}
