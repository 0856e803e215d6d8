//! Expressions of parametric easings, parsed with chumsky.
//!
//! The grammar is ordinary arithmetic over one variable `x`:
//!
//! ```text
//! expr    := product (('+' | '-') product)*
//! product := unary (('*' | '/') unary)*
//! unary   := '-'* power
//! power   := atom ('^' atom)*          (right associative)
//! atom    := number | 'x' | 'pi' | 'e' | function '(' expr ')' | '(' expr ')'
//! ```
//!
//! with functions `sin`, `cos`, `tan`, `sqrt`, `exp`, `ln` and `abs`.

use chumsky::prelude::*;

use crate::error::EasingError;

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// A built-in function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Sqrt,
    Exp,
    Ln,
    Abs,
}

impl Function {
    fn apply(self, value: f64) -> f64 {
        match self {
            Self::Sin => value.sin(),
            Self::Cos => value.cos(),
            Self::Tan => value.tan(),
            Self::Sqrt => value.sqrt(),
            Self::Exp => value.exp(),
            Self::Ln => value.ln(),
            Self::Abs => value.abs(),
        }
    }
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal or a constant.
    Num(f64),
    /// The variable `x`.
    Var,
    /// Negation.
    Neg(Box<Expr>),
    /// A binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// A function call.
    Call(Function, Box<Expr>),
}

impl Expr {
    /// Evaluates the expression with `x` bound to `x`.
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            Self::Num(value) => *value,
            Self::Var => x,
            Self::Neg(inner) => -inner.eval(x),
            Self::Binary(op, lhs, rhs) => {
                let (lhs, rhs) = (lhs.eval(x), rhs.eval(x));
                match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Sub => lhs - rhs,
                    BinaryOp::Mul => lhs * rhs,
                    BinaryOp::Div => lhs / rhs,
                    BinaryOp::Pow => lhs.powf(rhs),
                }
            }
            Self::Call(function, arg) => function.apply(arg.eval(x)),
        }
    }
}

fn parser<'a>() -> impl Parser<'a, &'a str, Expr, extra::Err<Rich<'a, char>>> {
    recursive(|expr| {
        let number = text::int(10)
            .then(just('.').then(text::digits(10)).or_not())
            .to_slice()
            .validate(|s: &str, e, emitter| {
                s.parse().unwrap_or_else(|_| {
                    emitter.emit(Rich::custom(e.span(), "invalid number"));
                    f64::NAN
                })
            })
            .map(Expr::Num)
            .boxed();

        let function = choice((
            just("sin").to(Function::Sin),
            just("cos").to(Function::Cos),
            just("tan").to(Function::Tan),
            just("sqrt").to(Function::Sqrt),
            just("exp").to(Function::Exp),
            just("ln").to(Function::Ln),
            just("abs").to(Function::Abs),
        ));
        let call = function
            .then(
                expr.clone()
                    .padded()
                    .delimited_by(just('('), just(')')),
            )
            .map(|(function, arg)| Expr::Call(function, Box::new(arg)))
            .boxed();

        let atom = choice((
            number,
            call,
            just("pi").to(Expr::Num(std::f64::consts::PI)),
            just('x').to(Expr::Var),
            just('e').to(Expr::Num(std::f64::consts::E)),
            expr.padded().delimited_by(just('('), just(')')),
        ))
        .padded()
        .boxed();

        let power = atom
            .separated_by(just('^'))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|operands| {
                operands
                    .into_iter()
                    .rev()
                    .reduce(|rhs, lhs| Expr::Binary(BinaryOp::Pow, Box::new(lhs), Box::new(rhs)))
                    .unwrap_or(Expr::Num(f64::NAN))
            })
            .boxed();

        let unary = just('-')
            .padded()
            .repeated()
            .foldr(power, |_minus, rhs| Expr::Neg(Box::new(rhs)))
            .boxed();

        let product = unary
            .clone()
            .foldl(
                choice((
                    just('*').to(BinaryOp::Mul),
                    just('/').to(BinaryOp::Div),
                ))
                .padded()
                .then(unary)
                .repeated(),
                |lhs, (op, rhs)| Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
            )
            .boxed();

        product
            .clone()
            .foldl(
                choice((
                    just('+').to(BinaryOp::Add),
                    just('-').to(BinaryOp::Sub),
                ))
                .padded()
                .then(product)
                .repeated(),
                |lhs, (op, rhs)| Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
            )
            .boxed()
    })
}

/// Parses an expression in `x`.
///
/// # Errors
///
/// Returns [`EasingError::Expression`] with every parser error joined.
pub fn parse(src: &str) -> Result<Expr, EasingError> {
    parser()
        .padded()
        .then_ignore(end())
        .parse(src)
        .into_result()
        .map_err(|errs| EasingError::Expression {
            expression: src.to_string(),
            message: errs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        })
}
