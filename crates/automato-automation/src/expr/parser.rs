//! Recursive-descent parser

use super::ast::{BinaryOp, Expr};
use super::eval::Value;
use super::lexer::{tokenize, Spanned, Token};
use super::{ExprError, ExprResult};

/// Deepest tree the parser builds
const MAX_DEPTH: usize = 128;

/// Parse expression text into a tree
pub fn parse(text: &str) -> ExprResult<Expr> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: text.len(),
        depth: 0,
    };

    let expr = parser.multiplicative()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(ExprError::Syntax {
            position: extra.position,
            message: format!("unexpected {:?}", extra.token),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.position)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> ExprResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::Syntax {
                position: self.position(),
                message: "expression nested too deeply".to_string(),
            });
        }
        Ok(())
    }

    /// Consume the next token if it maps to one of `ops`
    fn eat_op(&mut self, ops: &[(Token, BinaryOp)]) -> Option<BinaryOp> {
        let next = self.peek()?;
        let op = ops.iter().find(|(t, _)| t == next).map(|(_, op)| *op)?;
        self.pos += 1;
        Some(op)
    }

    fn left_assoc(
        &mut self,
        ops: &[(Token, BinaryOp)],
        operand: fn(&mut Self) -> ExprResult<Expr>,
    ) -> ExprResult<Expr> {
        let depth = self.depth;
        let mut left = operand(self)?;
        while let Some(op) = self.eat_op(ops) {
            self.descend()?;
            let right = operand(self)?;
            left = Expr::binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn multiplicative(&mut self) -> ExprResult<Expr> {
        self.left_assoc(
            &[(Token::Star, BinaryOp::Mul), (Token::Slash, BinaryOp::Div)],
            Self::additive,
        )
    }

    fn additive(&mut self) -> ExprResult<Expr> {
        self.left_assoc(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> ExprResult<Expr> {
        let left = self.or()?;
        let ops = [
            (Token::Eq, BinaryOp::Eq),
            (Token::Gt, BinaryOp::Gt),
            (Token::Ge, BinaryOp::Ge),
            (Token::Lt, BinaryOp::Lt),
            (Token::Le, BinaryOp::Le),
        ];
        match self.eat_op(&ops) {
            Some(op) => {
                self.descend()?;
                let right = self.comparison()?;
                self.depth -= 1;
                Ok(Expr::binary(op, left, right))
            }
            None => Ok(left),
        }
    }

    fn or(&mut self) -> ExprResult<Expr> {
        self.left_assoc(&[(Token::Or, BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> ExprResult<Expr> {
        self.left_assoc(&[(Token::And, BinaryOp::And)], Self::unary)
    }

    fn unary(&mut self) -> ExprResult<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            self.descend()?;
            let operand = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.primary()
    }

    fn primary(&mut self) -> ExprResult<Expr> {
        let position = self.position();
        match self.advance() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.multiplicative()?;
                self.depth -= 1;
                let close = self.position();
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExprError::Syntax {
                        position: close,
                        message: "expected ')'".to_string(),
                    }),
                }
            }
            Some(other) => Err(ExprError::Syntax {
                position,
                message: format!("unexpected {:?}", other),
            }),
            None => Err(ExprError::Syntax {
                position,
                message: "unexpected end of expression".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(text: &str) -> String {
        parse(text).unwrap().to_string()
    }

    #[test]
    fn test_not_binds_tighter_than_and() {
        assert_eq!(shape("not True and False"), "((not true) and false)");
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(shape("a or b and c"), "(a or (b and c))");
    }

    #[test]
    fn test_arithmetic_binds_looser_than_comparison() {
        assert_eq!(shape("1 + 2 > 5"), "(1 + (2 > 5))");
        assert_eq!(shape("2 * 3 + 1"), "(2 * (3 + 1))");
        assert_eq!(shape("a > 1 or b"), "(a > (1 or b))");
    }

    #[test]
    fn test_comparisons_group_right() {
        assert_eq!(shape("2 > 1 and 3 > 2"), "(2 > ((1 and 3) > 2))");
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(shape("1 - 2 - 3"), "((1 - 2) - 3)");
        assert_eq!(shape("8 / 4 / 2"), "((8 / 4) / 2)");
        assert_eq!(shape("a and b and c"), "((a and b) and c)");
    }

    #[test]
    fn test_not_is_right_associative() {
        assert_eq!(shape("not not x"), "(not (not x))");
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(shape("(1 + 2) > 5"), "((1 + 2) > 5)");
        assert_eq!(shape("not (a and b)"), "(not (a and b))");
    }

    #[test]
    fn test_syntax_errors() {
        for text in ["", "1 +", "(1 + 2", "1 2", "and 1", "a > > b", ")"] {
            assert!(
                matches!(parse(text), Err(ExprError::Syntax { .. })),
                "expected syntax error for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(shape(&nested(100)), "1");

        let too_deep = [
            nested(50_000),
            format!("{}true", "not ".repeat(50_000)),
            format!("1{}", " > 1".repeat(50_000)),
            format!("1{}", " + 1".repeat(50_000)),
        ];
        for text in &too_deep {
            match parse(text) {
                Err(ExprError::Syntax { message, .. }) => {
                    assert_eq!(message, "expression nested too deeply")
                }
                other => panic!("expected nesting error, got {:?}", other.map(|e| e.to_string())),
            }
        }
    }

    #[test]
    fn test_error_position() {
        assert_eq!(
            parse("(1 + 2").unwrap_err(),
            ExprError::Syntax {
                position: 6,
                message: "expected ')'".to_string()
            }
        );
    }
}
