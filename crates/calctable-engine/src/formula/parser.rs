//! Recursive-descent parser with Python operator precedence.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '//' | '%') unary)*
//! unary   := ('+' | '-') unary | power
//! power   := primary ('**' unary)?
//! primary := NUMBER | '{' name '}' | IDENT | IDENT '(' args ')' | '(' expr ')'
//! ```

use super::FormulaError;
use super::ast::{BinaryOp, Expr, UnaryOp};
use super::functions::Function;
use super::lexer::{Spanned, Token, tokenize};

/// Deep enough for any hand-written formula, shallow enough for the stack.
/// Bounds both parser recursion and the height of the resulting tree, since
/// evaluation, differentiation and drop all recurse over it.
const MAX_DEPTH: usize = 256;

pub(crate) fn parse(source: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(source)?;
    if tokens.len() == 1 {
        return Err(FormulaError::syntax(0, "empty formula"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = parser.expr()?;
    let tail = parser.current();
    if tail.token != Token::Eof {
        return Err(parser.unexpected(tail));
    }
    Ok(node.expr)
}

/// A parsed subtree and its height.
struct Node {
    expr: Expr,
    height: usize,
}

impl Node {
    fn leaf(expr: Expr) -> Node {
        Node { expr, height: 1 }
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn current(&self) -> Spanned {
        self.tokens[self.pos.min(self.tokens.len() - 1)].clone()
    }

    fn advance(&mut self) -> Spanned {
        let token = self.current();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, at: Spanned) -> FormulaError {
        FormulaError::syntax(at.position, format!("unexpected {}", at.token.describe()))
    }

    fn too_deep(&self) -> FormulaError {
        FormulaError::syntax(self.current().position, "expression nested too deeply")
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Wrap `children` under a new node of height one more than the tallest.
    fn branch(&self, expr: Expr, children: &[usize]) -> Result<Node, FormulaError> {
        let height = children.iter().copied().max().unwrap_or(0) + 1;
        if height > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(Node { expr, height })
    }

    fn binary(&self, op: BinaryOp, left: Node, right: Node) -> Result<Node, FormulaError> {
        let heights = [left.height, right.height];
        self.branch(Expr::binary(op, left.expr, right.expr), &heights)
    }

    fn expr(&mut self) -> Result<Node, FormulaError> {
        let mut left = self.term()?;
        loop {
            let op = match self.current().token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = self.binary(op, left, right)?;
        }
    }

    fn term(&mut self) -> Result<Node, FormulaError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.current().token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::DoubleSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = self.binary(op, left, right)?;
        }
    }

    fn unary(&mut self) -> Result<Node, FormulaError> {
        self.enter()?;
        let op = match self.current().token {
            Token::Plus => Some(UnaryOp::Plus),
            Token::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        let result = match op {
            Some(op) => {
                self.advance();
                self.unary().and_then(|operand| {
                    self.branch(Expr::unary(op, operand.expr), &[operand.height])
                })
            }
            None => self.power(),
        };
        self.leave();
        result
    }

    fn power(&mut self) -> Result<Node, FormulaError> {
        let base = self.primary()?;
        if self.current().token == Token::DoubleStar {
            self.advance();
            let exponent = self.unary()?;
            return self.binary(BinaryOp::Pow, base, exponent);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Node, FormulaError> {
        let at = self.advance();
        let node = match at.token {
            Token::Number(n) => Node::leaf(Expr::number(n)),
            Token::Reference(name) => Node::leaf(Expr::Reference(name)),
            Token::Ident(name) => {
                if self.current().token == Token::LParen {
                    let function = Function::from_name(&name).ok_or_else(|| {
                        FormulaError::UnsupportedOperation(format!(
                            "function '{}' is not allowed",
                            name
                        ))
                    })?;
                    self.advance();
                    let args = self.arguments()?;
                    function.check_arity(args.len())?;
                    let heights: Vec<usize> = args.iter().map(|a| a.height).collect();
                    let args = args.into_iter().map(|a| a.expr).collect();
                    self.branch(Expr::call(function, args), &heights)?
                } else {
                    Node::leaf(Expr::Identifier(name))
                }
            }
            Token::LParen => {
                self.enter()?;
                let inner = self.expr()?;
                let close = self.advance();
                if close.token != Token::RParen {
                    return Err(self.unexpected(close));
                }
                self.leave();
                inner
            }
            _ => return Err(self.unexpected(at)),
        };

        if self.current().token == Token::LParen {
            return Err(FormulaError::UnsupportedOperation(
                "calling an expression".into(),
            ));
        }
        Ok(node)
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn arguments(&mut self) -> Result<Vec<Node>, FormulaError> {
        let mut args = Vec::new();
        if self.current().token == Token::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            let next = self.advance();
            match next.token {
                Token::Comma => {
                    // Python allows a trailing comma before ')'.
                    if self.current().token == Token::RParen {
                        self.advance();
                        return Ok(args);
                    }
                }
                Token::RParen => return Ok(args),
                _ => return Err(self.unexpected(next)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn n(v: f64) -> Expr {
        Expr::number(v)
    }

    #[test]
    fn test_precedence_matches_python() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::binary(BinaryOp::Add, n(1.0), Expr::binary(BinaryOp::Mul, n(2.0), n(3.0)))
        );
        // -2**2 is -(2**2)
        assert_eq!(
            parse("-2**2").unwrap(),
            Expr::unary(UnaryOp::Neg, Expr::binary(BinaryOp::Pow, n(2.0), n(2.0)))
        );
        // ** is right-associative
        assert_eq!(
            parse("2**3**2").unwrap(),
            Expr::binary(BinaryOp::Pow, n(2.0), Expr::binary(BinaryOp::Pow, n(3.0), n(2.0)))
        );
        // exponent may carry a sign
        assert_eq!(
            parse("2**-1").unwrap(),
            Expr::binary(BinaryOp::Pow, n(2.0), Expr::unary(UnaryOp::Neg, n(1.0)))
        );
    }

    #[test]
    fn test_calls_and_references() {
        let expr = parse("max({a}, {b}, 3,)").unwrap();
        assert_eq!(expr.references(), vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(expr, Expr::Call { function: Function::Max, ref args } if args.len() == 3));
    }

    #[test]
    fn test_syntax_errors_carry_positions() {
        assert!(matches!(parse(""), Err(FormulaError::Syntax { position: 0, .. })));
        assert!(matches!(parse("1 +"), Err(FormulaError::Syntax { position: 3, .. })));
        assert!(matches!(parse("(1 + 2"), Err(FormulaError::Syntax { .. })));
        assert!(matches!(parse("1 2"), Err(FormulaError::Syntax { position: 2, .. })));
    }

    #[test]
    fn test_rejects_unknown_functions_and_calls() {
        assert!(matches!(
            parse("__import__('os')"),
            Err(FormulaError::UnsupportedOperation(_))
        ));
        assert!(matches!(parse("eval(1)"), Err(FormulaError::UnsupportedOperation(_))));
        assert!(matches!(parse("{f}(2)"), Err(FormulaError::UnsupportedOperation(_))));
        assert!(matches!(parse("(abs)(2)"), Err(FormulaError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_arity_checked_at_parse_time() {
        assert!(matches!(parse("sqrt(1, 2)"), Err(FormulaError::Arity { got: 2, .. })));
        assert!(matches!(parse("min()"), Err(FormulaError::Arity { got: 0, .. })));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let deep = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
        assert!(matches!(parse(&deep), Err(FormulaError::Syntax { .. })));
        let minus = format!("{}1", "-".repeat(1000));
        assert!(matches!(parse(&minus), Err(FormulaError::Syntax { .. })));
    }

    #[test]
    fn test_long_operator_chains_are_rejected() {
        for op in ["+", "*", "-", "/", "%", "//", "**"] {
            let chain = vec!["1"; 20_000].join(op);
            assert!(
                matches!(parse(&chain), Err(FormulaError::Syntax { .. })),
                "chain of {}",
                op
            );
        }
        let args = format!("max({})", vec!["1"; 20_000].join(","));
        assert!(parse(&args).is_ok());
    }

    #[test]
    fn test_chains_within_the_limit_parse() {
        let sum = vec!["{x}"; MAX_DEPTH - 1].join(" + ");
        assert!(parse(&sum).is_ok());
        let nested = format!("{}{{x}}{}", "(1 + ".repeat(100), ")".repeat(100));
        assert!(parse(&nested).is_ok());
    }
}
