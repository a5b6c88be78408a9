// SPDX-License-Identifier: MIT

//! Abstract Syntax Tree for derived-field formulas

/// A formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Bare identifier: the current value of the field with that id
    Field(String),
    /// Function call: name(arg, arg, ...)
    Call { name: String, args: Vec<Expr> },
    /// Literal argument value
    Literal(Literal),
}

/// Literal values in formulas
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
}

impl Expr {
    /// Collect the field ids this expression reads, in first-seen order
    pub fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            Expr::Field(id) => {
                if !out.contains(id) {
                    out.push(id.clone());
                }
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
            Expr::Literal(_) => {}
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Field(id) => write!(f, "{}", id),
            Expr::Literal(Literal::String(s)) => write!(f, "{:?}", s),
            Expr::Literal(Literal::Number(n)) => write!(f, "{}", n),
            Expr::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
