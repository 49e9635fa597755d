//! Infix parser for partition filter expressions
//!
//! Grammar: `&&`, `||`, `!`, `==`, `<`, `<=`, `>`, `>=`, parentheses,
//! column references and int/string literals. Parsing uses explicit
//! operator/operand stacks honoring precedence `! > comparison > && > ||`,
//! left-associative at equal precedence. Comparisons expect the column
//! reference on the left and the literal on the right.

use super::{CompareOp, Condition, Literal, LogicOp};

/// Filter expression syntax errors. Abort filter setup, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("invalid filter expression: {0}")]
    InvalidExpression(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Cmp(CompareOp),
    Ident(String),
    Int(i64),
    Str(String),
}

/// Operators pending application, with their precedence.
#[derive(Debug, Clone, Copy, PartialEq)]
enum OpToken {
    LParen,
    Not,
    Cmp(CompareOp),
    And,
    Or,
}

impl OpToken {
    fn precedence(self) -> u8 {
        match self {
            OpToken::LParen => 0,
            OpToken::Or => 1,
            OpToken::And => 2,
            OpToken::Cmp(_) => 3,
            OpToken::Not => 4,
        }
    }
}

/// Partially reduced operands.
#[derive(Debug)]
enum Operand {
    Column(String),
    Lit(Literal),
    Cond(Condition),
}

/// Parse a filter expression into a [`Condition`] tree.
pub fn parse(expr: &str) -> Result<Condition, FilterError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(FilterError::InvalidExpression(
            "empty expression".to_string(),
        ));
    }

    let mut operands: Vec<Operand> = Vec::new();
    let mut operators: Vec<OpToken> = Vec::new();

    for token in tokens {
        match token {
            Token::Ident(name) => operands.push(Operand::Column(name)),
            Token::Int(i) => operands.push(Operand::Lit(Literal::Int(i))),
            Token::Str(s) => operands.push(Operand::Lit(Literal::Str(s))),
            Token::LParen => operators.push(OpToken::LParen),
            Token::Not => operators.push(OpToken::Not),
            Token::Cmp(op) => push_operator(&mut operands, &mut operators, OpToken::Cmp(op))?,
            Token::And => push_operator(&mut operands, &mut operators, OpToken::And)?,
            Token::Or => push_operator(&mut operands, &mut operators, OpToken::Or)?,
            Token::RParen => loop {
                match operators.pop() {
                    Some(OpToken::LParen) => break,
                    Some(op) => apply(&mut operands, op)?,
                    None => {
                        return Err(FilterError::InvalidExpression(
                            "unbalanced parentheses".to_string(),
                        ))
                    }
                }
            },
        }
    }

    while let Some(op) = operators.pop() {
        if op == OpToken::LParen {
            return Err(FilterError::InvalidExpression(
                "unbalanced parentheses".to_string(),
            ));
        }
        apply(&mut operands, op)?;
    }

    match (operands.pop(), operands.is_empty()) {
        (Some(Operand::Cond(cond)), true) => Ok(cond),
        _ => Err(FilterError::InvalidExpression(
            "expression does not reduce to a condition".to_string(),
        )),
    }
}

/// Reduce higher-or-equal precedence operators, then push (left-assoc).
fn push_operator(
    operands: &mut Vec<Operand>,
    operators: &mut Vec<OpToken>,
    op: OpToken,
) -> Result<(), FilterError> {
    while let Some(&top) = operators.last() {
        if top != OpToken::LParen && top.precedence() >= op.precedence() {
            operators.pop();
            apply(operands, top)?;
        } else {
            break;
        }
    }
    operators.push(op);
    Ok(())
}

fn apply(operands: &mut Vec<Operand>, op: OpToken) -> Result<(), FilterError> {
    match op {
        OpToken::LParen => Err(FilterError::InvalidExpression(
            "unbalanced parentheses".to_string(),
        )),
        OpToken::Not => {
            let child = pop_condition(operands, "!")?;
            operands.push(Operand::Cond(Condition::Not(Box::new(child))));
            Ok(())
        }
        OpToken::Cmp(cmp) => {
            let right = operands.pop();
            let left = operands.pop();
            match (left, right) {
                (Some(Operand::Column(column)), Some(Operand::Lit(literal))) => {
                    operands.push(Operand::Cond(Condition::Leaf {
                        op: cmp,
                        column,
                        literal,
                    }));
                    Ok(())
                }
                _ => Err(FilterError::InvalidExpression(
                    "comparison requires a column on the left and a literal on the right"
                        .to_string(),
                )),
            }
        }
        OpToken::And | OpToken::Or => {
            let logic = if op == OpToken::And {
                LogicOp::And
            } else {
                LogicOp::Or
            };
            let right = pop_condition(operands, "logical operator")?;
            let left = pop_condition(operands, "logical operator")?;
            operands.push(Operand::Cond(Condition::Binary {
                op: logic,
                left: Box::new(left),
                right: Box::new(right),
            }));
            Ok(())
        }
    }
}

fn pop_condition(operands: &mut Vec<Operand>, what: &str) -> Result<Condition, FilterError> {
    match operands.pop() {
        Some(Operand::Cond(cond)) => Ok(cond),
        _ => Err(FilterError::InvalidExpression(format!(
            "{} is missing a boolean operand",
            what
        ))),
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>, FilterError> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_none() {
                    return Err(FilterError::InvalidExpression(
                        "unknown token '&'".to_string(),
                    ));
                }
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_none() {
                    return Err(FilterError::InvalidExpression(
                        "unknown token '|'".to_string(),
                    ));
                }
                tokens.push(Token::Or);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    return Err(FilterError::InvalidExpression(
                        "unknown token '!='".to_string(),
                    ));
                }
                tokens.push(Token::Not);
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(FilterError::InvalidExpression(
                        "unknown token '='".to_string(),
                    ));
                }
                tokens.push(Token::Cmp(CompareOp::Eq));
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Cmp(CompareOp::Lte));
                } else {
                    tokens.push(Token::Cmp(CompareOp::Lt));
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Cmp(CompareOp::Gte));
                } else {
                    tokens.push(Token::Cmp(CompareOp::Gt));
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => {
                            return Err(FilterError::InvalidExpression(
                                "unterminated string literal".to_string(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '-' | '0'..='9' => {
                let mut s = String::new();
                if c == '-' {
                    s.push(c);
                    chars.next();
                    if !matches!(chars.peek(), Some('0'..='9')) {
                        return Err(FilterError::InvalidExpression(
                            "unknown token '-'".to_string(),
                        ));
                    }
                }
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        s.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = s.parse::<i64>().map_err(|_| {
                    FilterError::InvalidExpression(format!("integer literal '{}' out of range", s))
                })?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        s.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(s));
            }
            other => {
                return Err(FilterError::InvalidExpression(format!(
                    "unknown token '{}'",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_comparison() {
        let cond = parse("a==1").unwrap();
        assert_eq!(
            cond,
            Condition::Leaf {
                op: CompareOp::Eq,
                column: "a".to_string(),
                literal: Literal::Int(1),
            }
        );
    }

    #[test]
    fn test_parse_all_comparison_operators() {
        for (expr, op) in [
            ("a==1", CompareOp::Eq),
            ("a<1", CompareOp::Lt),
            ("a<=1", CompareOp::Lte),
            ("a>1", CompareOp::Gt),
            ("a>=1", CompareOp::Gte),
        ] {
            match parse(expr).unwrap() {
                Condition::Leaf { op: parsed, .. } => assert_eq!(parsed, op, "{}", expr),
                other => panic!("expected leaf for {}, got {:?}", expr, other),
            }
        }
    }

    #[test]
    fn test_precedence_not_over_and_over_or() {
        // a==1 || b==2 && c==3  ==  a==1 || (b==2 && c==3)
        let cond = parse("a==1 || b==2 && c==3").unwrap();
        match cond {
            Condition::Binary {
                op: LogicOp::Or,
                right,
                ..
            } => match *right {
                Condition::Binary {
                    op: LogicOp::And, ..
                } => {}
                other => panic!("expected AND on the right, got {:?}", other),
            },
            other => panic!("expected OR at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let cond = parse("(a==1 || b==2) && c==3").unwrap();
        match cond {
            Condition::Binary {
                op: LogicOp::And,
                left,
                ..
            } => match *left {
                Condition::Binary { op: LogicOp::Or, .. } => {}
                other => panic!("expected OR on the left, got {:?}", other),
            },
            other => panic!("expected AND at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_not_wraps_parenthesized_expression() {
        let cond = parse("!(a==1 && b==2)").unwrap();
        assert!(matches!(cond, Condition::Not(_)));
    }

    #[test]
    fn test_string_literals_both_quote_styles() {
        assert!(parse("name=='alpha'").is_ok());
        assert!(parse("name==\"alpha\"").is_ok());
    }

    #[test]
    fn test_negative_integer_literal() {
        let cond = parse("a>-5").unwrap();
        assert_eq!(
            cond,
            Condition::Leaf {
                op: CompareOp::Gt,
                column: "a".to_string(),
                literal: Literal::Int(-5),
            }
        );
    }

    #[test]
    fn test_dangling_operator_rejected() {
        assert!(matches!(
            parse("a==1 &&"),
            Err(FilterError::InvalidExpression(_))
        ));
    }

    #[test]
    fn test_unbalanced_parentheses_rejected() {
        assert!(parse("(a==1").is_err());
        assert!(parse("a==1)").is_err());
        assert!(parse("((a==1) && b==2").is_err());
    }

    #[test]
    fn test_unknown_tokens_rejected() {
        assert!(parse("a = 1").is_err());
        assert!(parse("a & b").is_err());
        assert!(parse("a != 1").is_err());
        assert!(parse("a == 1 # comment").is_err());
    }

    #[test]
    fn test_arity_violations_rejected() {
        assert!(parse("!").is_err());
        assert!(parse("&& a==1").is_err());
        assert!(parse("a ==").is_err());
        assert!(parse("== 1").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("1 == a").is_err());
        assert!(parse("").is_err());
        assert!(parse("a").is_err());
    }

    #[test]
    fn test_comparison_chain_rejected() {
        // `a == 1 == 2` reduces the left pair to a condition; the second
        // comparison then has no column operand.
        assert!(parse("a == 1 == 2").is_err());
    }
}
