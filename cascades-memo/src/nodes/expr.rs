// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Scalar sub-expressions attached to plan nodes. They take part in structural hashing, so two
//! filters over the same group with different predicates are different memo nodes.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;

use itertools::Itertools;

use super::{ProjectionName, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Add,
    Sub,
    Mult,
    Div,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    Constant(Value),
    Variable(ProjectionName),
    UnaryOp(UnaryOp, Arc<Expr>),
    BinaryOp(BinaryOp, Arc<Expr>, Arc<Expr>),
    FunctionCall { name: Arc<str>, args: Vec<Expr> },
    /// Navigates a dotted field path starting from `input`.
    EvalPath { path: Vec<Arc<str>>, input: Arc<Expr> },
}

impl Expr {
    pub fn constant(value: Value) -> Self {
        Self::Constant(value)
    }

    pub fn var(name: &str) -> Self {
        Self::Variable(name.into())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::BinaryOp(op, Arc::new(left), Arc::new(right))
    }

    pub fn unary(op: UnaryOp, input: Expr) -> Self {
        Self::UnaryOp(op, Arc::new(input))
    }

    pub fn true_constant() -> Self {
        Self::Constant(Value::Bool(true))
    }

    /// Collect the projections this expression reads from its input.
    pub fn collect_variables(&self, out: &mut BTreeSet<ProjectionName>) {
        match self {
            Expr::Constant(_) => {}
            Expr::Variable(name) => {
                out.insert(name.clone());
            }
            Expr::UnaryOp(_, input) => input.collect_variables(out),
            Expr::BinaryOp(_, left, right) => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Expr::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_variables(out);
                }
            }
            Expr::EvalPath { input, .. } => input.collect_variables(out),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Constant(value) => write!(f, "{}", value),
            Expr::Variable(name) => write!(f, "${}", name),
            Expr::UnaryOp(op, input) => write!(f, "({} {})", op, input),
            Expr::BinaryOp(op, left, right) => write!(f, "({} {} {})", op, left, right),
            Expr::FunctionCall { name, args } => {
                write!(f, "{}({})", name, args.iter().join(", "))
            }
            Expr::EvalPath { path, input } => write!(f, "{}.{}", input, path.iter().join(".")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_variables_walks_all_operands() {
        let expr = Expr::binary(
            BinaryOp::And,
            Expr::binary(BinaryOp::Eq, Expr::var("a"), Expr::constant(Value::Int64(1))),
            Expr::FunctionCall {
                name: "exists".into(),
                args: vec![Expr::var("b")],
            },
        );
        let mut vars = BTreeSet::new();
        expr.collect_variables(&mut vars);
        let expected: Vec<ProjectionName> = vec!["a".into(), "b".into()];
        assert_eq!(vars.into_iter().collect_vec(), expected);
    }
}
