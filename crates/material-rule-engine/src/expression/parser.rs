//! 递归下降语法分析
//!
//! 文法：
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := NUMBER | IDENT | '(' expr ')'
//! ```
//!
//! 一元正负号被改写为 `0 ± x`，AST 只保留三种节点。

use super::lexer::{Lexer, SpannedToken, Token};
use super::{BinaryOperator, Expression};
use crate::error::ExpressionError;

/// 表达式最大长度（字符）
pub const MAX_EXPRESSION_LEN: usize = 4096;

/// 括号 / 一元运算最大嵌套深度
pub const MAX_NESTING_DEPTH: usize = 64;

/// 解析表达式
pub fn parse_expression(input: &str) -> Result<Expression, ExpressionError> {
    if input.chars().count() > MAX_EXPRESSION_LEN {
        return Err(ExpressionError::parse(
            MAX_EXPRESSION_LEN,
            format!("表达式超过最大长度 {}", MAX_EXPRESSION_LEN),
        ));
    }

    let tokens = Lexer::new(input).tokenize()?;
    if tokens[0].token == Token::Eof {
        return Err(ExpressionError::parse(0, "表达式为空"));
    }

    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
    };
    let expr = parser.parse_additive()?;

    let trailing = parser.current();
    if trailing.token != Token::Eof {
        return Err(ExpressionError::parse(
            trailing.position,
            format!("多余的符号 '{}'", trailing.token),
        ));
    }

    Ok(expr)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn current(&self) -> &SpannedToken {
        // tokenize 保证末尾是 Eof，index 不会越过它
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ExpressionError::parse(
                self.current().position,
                format!("嵌套深度超过 {}", MAX_NESTING_DEPTH),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_additive(&mut self) -> Result<Expression, ExpressionError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current().token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ExpressionError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current().token {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ExpressionError> {
        let op = match self.current().token {
            Token::Plus => BinaryOperator::Add,
            Token::Minus => BinaryOperator::Subtract,
            _ => return self.parse_primary(),
        };

        self.advance();
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();

        Ok(Expression::binary(Expression::Literal(0.0), op, operand?))
    }

    fn parse_primary(&mut self) -> Result<Expression, ExpressionError> {
        let SpannedToken { token, position } = self.current().clone();

        match token {
            Token::Number(value) => {
                self.advance();
                Ok(Expression::Literal(value))
            }
            Token::Identifier(name) => {
                self.advance();
                Ok(Expression::VarRef(name))
            }
            Token::LeftParen => {
                self.advance();
                self.enter()?;
                let inner = self.parse_additive();
                self.leave();
                let inner = inner?;

                let closing = self.current();
                if closing.token != Token::RightParen {
                    return Err(ExpressionError::parse(
                        closing.position,
                        format!("期望 ')', 实际 '{}'", closing.token),
                    ));
                }
                self.advance();
                Ok(inner)
            }
            Token::Eof => Err(ExpressionError::parse(position, "表达式意外结束")),
            other => Err(ExpressionError::parse(
                position,
                format!("意外的符号 '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> String {
        parse_expression(input).unwrap().to_string()
    }

    fn parse_err(input: &str) -> (usize, String) {
        match parse_expression(input).unwrap_err() {
            ExpressionError::ParseError { position, message } => (position, message),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(parse("(1 + 2) * 3"), "((1 + 2) * 3)");
        assert_eq!(parse("length*(1+waste_pct)"), "(length * (1 + waste_pct))");
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(parse("10 - 4 - 3"), "((10 - 4) - 3)");
        assert_eq!(parse("8 / 4 / 2"), "((8 / 4) / 2)");
    }

    #[test]
    fn test_unary_sign() {
        assert_eq!(parse("-length"), "(0 - length)");
        assert_eq!(parse("2 * -3"), "(2 * (0 - 3))");
        assert_eq!(parse("+area"), "(0 + area)");
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse_err("").1, "表达式为空");
        assert_eq!(parse_err("   ").1, "表达式为空");
        assert_eq!(parse_err("length *"), (8, "表达式意外结束".to_string()));
        assert_eq!(parse_err("(1 + 2"), (6, "期望 ')', 实际 'EOF'".to_string()));
        assert_eq!(parse_err("1 + 2)"), (5, "多余的符号 ')'".to_string()));
        assert_eq!(parse_err("length area").0, 7);
        assert_eq!(parse_err("2 ** 3").1, "意外的符号 '*'");
        assert_eq!(parse_err("1.2.3").0, 3);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(MAX_NESTING_DEPTH + 1), ")".repeat(MAX_NESTING_DEPTH + 1));
        assert!(parse_err(&deep).1.contains("嵌套深度"));

        let ok = format!("{}1{}", "(".repeat(MAX_NESTING_DEPTH), ")".repeat(MAX_NESTING_DEPTH));
        assert!(parse_expression(&ok).is_ok());

        let minus_chain = format!("{}1", "-".repeat(MAX_NESTING_DEPTH + 1));
        assert!(parse_expression(&minus_chain).is_err());
    }

    #[test]
    fn test_length_limit() {
        let long = vec!["1"; MAX_EXPRESSION_LEN].join("+");
        assert!(parse_err(&long).1.contains("最大长度"));
    }
}
