use super::functions::Function;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

/// Parsed formula expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    /// `{name}`: a column or constant binding.
    Reference(String),
    /// Bare identifier: `pi`, `e` or a workspace constant.
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub(crate) fn number(value: f64) -> Expr {
        Expr::Number(value)
    }

    pub(crate) fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub(crate) fn call(function: Function, args: Vec<Expr>) -> Expr {
        Expr::Call { function, args }
    }

    /// True when no braced reference appears in the expression.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Number(_) | Expr::Identifier(_) => true,
            Expr::Reference(_) => false,
            Expr::Unary { operand, .. } => operand.is_constant(),
            Expr::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Expr::Call { args, .. } => args.iter().all(Expr::is_constant),
        }
    }

    /// Braced references in first-appearance order, without duplicates.
    pub fn references(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_names(&mut out, false);
        out
    }

    /// Bare identifiers (constants such as `pi` or `g`), deduplicated.
    pub fn identifiers(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_names(&mut out, true);
        out
    }

    fn collect_names(&self, out: &mut Vec<String>, identifiers: bool) {
        match self {
            Expr::Number(_) => {}
            Expr::Reference(name) | Expr::Identifier(name) => {
                let wanted = matches!(self, Expr::Identifier(_)) == identifiers;
                if wanted && !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            Expr::Unary { operand, .. } => operand.collect_names(out, identifiers),
            Expr::Binary { left, right, .. } => {
                left.collect_names(out, identifiers);
                right.collect_names(out, identifiers);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_names(out, identifiers);
                }
            }
        }
    }
}
