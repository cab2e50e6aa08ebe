//! Expression IR handed over by frontends for the right-hand side of an
//! assignment.
//!
//! The operator set is closed: every operator a pattern extractor can reason
//! about has its own variant, and anything a frontend could not map lands in
//! [`Expr::Opaque`], which every extractor treats as unmodelled.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bit position used by selects. A frontend emits `Dynamic` when the index
/// is itself a signal (`a[i]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Index {
    Const(u32),
    Dynamic(Box<Expr>),
}

impl Index {
    pub fn as_const(&self) -> Option<u32> {
        match self {
            Index::Const(v) => Some(*v),
            Index::Dynamic(_) => None,
        }
    }
}

impl From<u32> for Index {
    fn from(value: u32) -> Self {
        Index::Const(value)
    }
}

impl From<Expr> for Index {
    fn from(value: Expr) -> Self {
        Index::Dynamic(Box::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Expr {
    Id(String),
    Const(i64),
    Bit {
        base: String,
        index: Index,
    },
    Slice {
        base: String,
        hi: Index,
        lo: Index,
    },
    Not(Box<Expr>),
    Xor(Vec<Expr>),
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Shl(Box<Expr>, Box<Expr>),
    Shr(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Neq(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
    Concat(Vec<Expr>),
    Replicate {
        count: u32,
        value: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Opaque {
        op: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn id(name: impl Into<String>) -> Self {
        Expr::Id(name.into())
    }

    pub fn constant(value: i64) -> Self {
        Expr::Const(value)
    }

    pub fn bit(base: impl Into<String>, index: impl Into<Index>) -> Self {
        Expr::Bit {
            base: base.into(),
            index: index.into(),
        }
    }

    pub fn slice(base: impl Into<String>, hi: impl Into<Index>, lo: impl Into<Index>) -> Self {
        Expr::Slice {
            base: base.into(),
            hi: hi.into(),
            lo: lo.into(),
        }
    }

    pub fn replicate(value: Expr, count: u32) -> Self {
        Expr::Replicate {
            count,
            value: Box::new(value),
        }
    }

    pub fn cond(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Cond {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn binary(op: fn(Box<Expr>, Box<Expr>) -> Expr, lhs: Expr, rhs: Expr) -> Self {
        op(Box::new(lhs), Box::new(rhs))
    }

    /// Operator tag as it appears in artifacts and graph dumps.
    pub fn op_name(&self) -> &str {
        match self {
            Expr::Id(_) => "id",
            Expr::Const(_) => "const",
            Expr::Bit { .. } => "bit",
            Expr::Slice { .. } => "slice",
            Expr::Not(_) => "not",
            Expr::Xor(_) => "xor",
            Expr::Or(_) => "or",
            Expr::And(_) => "and",
            Expr::Add(..) => "add",
            Expr::Sub(..) => "sub",
            Expr::Mul(..) => "mul",
            Expr::Shl(..) => "shl",
            Expr::Shr(..) => "shr",
            Expr::Eq(..) => "eq",
            Expr::Neq(..) => "neq",
            Expr::Lt(..) => "lt",
            Expr::Le(..) => "le",
            Expr::Gt(..) => "gt",
            Expr::Ge(..) => "ge",
            Expr::Concat(_) => "concat",
            Expr::Replicate { .. } => "replicate",
            Expr::Cond { .. } => "cond",
            Expr::Opaque { op, .. } => op,
        }
    }

    /// Visit every signal reference in the tree, left to right. Select bases
    /// count as references; constants do not.
    pub fn for_each_reference<'a>(&'a self, visit: &mut impl FnMut(&'a str)) {
        match self {
            Expr::Id(name) => visit(name.as_str()),
            Expr::Const(_) => {}
            Expr::Bit { base, index } => {
                visit(base.as_str());
                index.for_each_reference(visit);
            }
            Expr::Slice { base, hi, lo } => {
                visit(base.as_str());
                hi.for_each_reference(visit);
                lo.for_each_reference(visit);
            }
            Expr::Not(inner) => inner.for_each_reference(visit),
            Expr::Xor(items) | Expr::Or(items) | Expr::And(items) | Expr::Concat(items) => {
                for item in items {
                    item.for_each_reference(visit);
                }
            }
            Expr::Add(lhs, rhs)
            | Expr::Sub(lhs, rhs)
            | Expr::Mul(lhs, rhs)
            | Expr::Shl(lhs, rhs)
            | Expr::Shr(lhs, rhs)
            | Expr::Eq(lhs, rhs)
            | Expr::Neq(lhs, rhs)
            | Expr::Lt(lhs, rhs)
            | Expr::Le(lhs, rhs)
            | Expr::Gt(lhs, rhs)
            | Expr::Ge(lhs, rhs) => {
                lhs.for_each_reference(visit);
                rhs.for_each_reference(visit);
            }
            Expr::Replicate { value, .. } => value.for_each_reference(visit),
            Expr::Cond {
                cond,
                then,
                otherwise,
            } => {
                cond.for_each_reference(visit);
                then.for_each_reference(visit);
                otherwise.for_each_reference(visit);
            }
            Expr::Opaque { args, .. } => {
                for arg in args {
                    arg.for_each_reference(visit);
                }
            }
        }
    }

    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.for_each_reference(&mut |name| out.push(name));
        out
    }
}

impl Index {
    fn for_each_reference<'a>(&'a self, visit: &mut impl FnMut(&'a str)) {
        if let Index::Dynamic(expr) = self {
            expr.for_each_reference(visit);
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Const(v) => write!(f, "{v}"),
            Index::Dynamic(expr) => write!(f, "{expr}"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, op: &str, items: &[Expr]) -> fmt::Result {
    write!(f, "{op}(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.op_name();
        match self {
            Expr::Id(name) => f.write_str(name),
            Expr::Const(v) => write!(f, "{v}"),
            Expr::Bit { base, index } => write!(f, "bit({base}, {index})"),
            Expr::Slice { base, hi, lo } => write!(f, "slice({base}, {hi}, {lo})"),
            Expr::Not(inner) => write!(f, "not({inner})"),
            Expr::Xor(items) | Expr::Or(items) | Expr::And(items) | Expr::Concat(items) => {
                write_list(f, op, items)
            }
            Expr::Add(lhs, rhs)
            | Expr::Sub(lhs, rhs)
            | Expr::Mul(lhs, rhs)
            | Expr::Shl(lhs, rhs)
            | Expr::Shr(lhs, rhs)
            | Expr::Eq(lhs, rhs)
            | Expr::Neq(lhs, rhs)
            | Expr::Lt(lhs, rhs)
            | Expr::Le(lhs, rhs)
            | Expr::Gt(lhs, rhs)
            | Expr::Ge(lhs, rhs) => write!(f, "{op}({lhs}, {rhs})"),
            Expr::Replicate { count, value } => write!(f, "replicate({value}, {count})"),
            Expr::Cond {
                cond,
                then,
                otherwise,
            } => write!(f, "cond({cond}, {then}, {otherwise})"),
            Expr::Opaque { args, .. } => write_list(f, op, args),
        }
    }
}
