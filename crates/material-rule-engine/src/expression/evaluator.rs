//! 表达式求值

use super::{BinaryOperator, Expression};
use crate::error::ExpressionError;
use std::collections::{BTreeMap, HashMap};

/// 表达式求值环境
///
/// 负责把标识符解析为数值。无法解析时返回 `UnknownVariable`，
/// 存在但不是数值时返回 `NonNumericValue`。
pub trait ValueEnvironment {
    fn lookup(&self, name: &str) -> Result<f64, ExpressionError>;
}

impl ValueEnvironment for HashMap<String, f64> {
    fn lookup(&self, name: &str) -> Result<f64, ExpressionError> {
        self.get(name).copied().ok_or_else(|| unknown(name))
    }
}

impl ValueEnvironment for BTreeMap<String, f64> {
    fn lookup(&self, name: &str) -> Result<f64, ExpressionError> {
        self.get(name).copied().ok_or_else(|| unknown(name))
    }
}

fn unknown(name: &str) -> ExpressionError {
    ExpressionError::UnknownVariable {
        name: name.to_string(),
    }
}

/// 对语法树做结构递归求值
pub fn evaluate<E>(expr: &Expression, env: &E) -> Result<f64, ExpressionError>
where
    E: ValueEnvironment + ?Sized,
{
    match expr {
        Expression::Literal(value) => Ok(*value),
        Expression::VarRef(name) => env.lookup(name),
        Expression::BinOp { op, left, right } => {
            let lhs = evaluate(left, env)?;
            let rhs = evaluate(right, env)?;
            apply(*op, lhs, rhs)
        }
    }
}

fn apply(op: BinaryOperator, lhs: f64, rhs: f64) -> Result<f64, ExpressionError> {
    let value = match op {
        BinaryOperator::Add => lhs + rhs,
        BinaryOperator::Subtract => lhs - rhs,
        BinaryOperator::Multiply => lhs * rhs,
        BinaryOperator::Divide => {
            if rhs == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            lhs / rhs
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExpressionError::NonFiniteResult)
    }
}
