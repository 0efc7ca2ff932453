//! 数量表达式 DSL
//!
//! `qty` 字段使用的四则运算小语言：
//! - 词法分析（[`lexer`]）→ 递归下降语法分析（[`parser`]）→ AST → 结构递归求值（[`evaluator`]）
//! - 节点只有 `Literal` / `VarRef` / `BinOp` 三种，不存在文本替换或通用求值
//! - 标识符通过 [`ValueEnvironment`] 解析，未知标识符是显式错误

pub mod evaluator;
pub mod lexer;
pub mod parser;

pub use evaluator::{ValueEnvironment, evaluate};
pub use parser::parse_expression;

use crate::error::ExpressionError;
use std::collections::BTreeSet;
use std::fmt;

/// 二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        };
        write!(f, "{}", s)
    }
}

/// 表达式语法树
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(f64),
    VarRef(String),
    BinOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    /// 解析表达式文本
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        parse_expression(input)
    }

    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Self::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// 在给定环境中求值
    pub fn evaluate<E>(&self, env: &E) -> Result<f64, ExpressionError>
    where
        E: ValueEnvironment + ?Sized,
    {
        evaluate(self, env)
    }

    /// 表达式引用的全部标识符（去重、有序）
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Self::Literal(_) => {}
            Self::VarRef(name) => {
                names.insert(name.clone());
            }
            Self::BinOp { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{}", value),
            Self::VarRef(name) => write!(f, "{}", name),
            Self::BinOp { op, left, right } => write!(f, "({} {} {})", left, op, right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_variables() {
        let expr = Expression::parse("length * (1 + waste_pct) / length").unwrap();
        let vars: Vec<String> = expr.variables().into_iter().collect();
        assert_eq!(vars, vec!["length".to_string(), "waste_pct".to_string()]);

        assert!(Expression::parse("2 * 3").unwrap().variables().is_empty());
    }

    #[test]
    fn test_parse_then_evaluate() {
        let expr = Expression::parse("length * 0.75").unwrap();
        let env = HashMap::from([("length".to_string(), 10.0)]);
        assert_eq!(expr.evaluate(&env), Ok(7.5));
    }

    #[test]
    fn test_ast_shape() {
        let expr = Expression::parse("a - 1").unwrap();
        assert_eq!(
            expr,
            Expression::binary(
                Expression::VarRef("a".to_string()),
                BinaryOperator::Subtract,
                Expression::Literal(1.0),
            )
        );
    }
}
