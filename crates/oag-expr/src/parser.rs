//! Expression parser.
//!
//! Produces an [`Expr`] from constraint condition code. The grammar accepts
//! the operators the evaluator understands and nothing more — no imports,
//! no attribute escape, no free identifiers outside the three scope roots.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, none_of, satisfy},
    combinator::{all_consuming, map, not, opt, peek, recognize, value},
    error::{context, ContextError, ParseError as NomParseError, VerboseError},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::ast::{BinaryOp, Builtin, Expr, Literal, ScopeRoot, UnaryOp};
use crate::error::ExprError;

/// Parse a complete expression from source text.
pub fn parse_expression(input: &str) -> Result<Expr, ExprError> {
    match all_consuming(delimited(
        multispace0::<_, VerboseError<&str>>,
        expr,
        multispace0,
    ))(input)
    {
        Ok((_, parsed)) => Ok(parsed),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(ExprError::Parse(nom::error::convert_error(input, e)))
        }
        Err(nom::Err::Incomplete(_)) => Err(ExprError::Parse("incomplete input".into())),
    }
}

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

fn ws<'a, T>(
    inner: impl FnMut(&'a str) -> PResult<'a, T>,
) -> impl FnMut(&'a str) -> PResult<'a, T> {
    preceded(multispace0, inner)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A keyword that must not run into a longer identifier (`in` vs `index`).
fn keyword<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    kw: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    terminated(tag(kw), not(peek(satisfy(is_ident_char))))
}

// ── Precedence climb: or > and > not > comparison > additive > term ──

fn expr(input: &str) -> PResult<'_, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(keyword("or")), and_expr))(input)?;
    Ok((input, fold_binary(first, BinaryOp::Or, rest)))
}

fn and_expr(input: &str) -> PResult<'_, Expr> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(ws(keyword("and")), not_expr))(input)?;
    Ok((input, fold_binary(first, BinaryOp::And, rest)))
}

fn not_expr(input: &str) -> PResult<'_, Expr> {
    alt((
        map(
            preceded(ws(keyword("not")), not_expr),
            |operand| Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
        ),
        comparison,
    ))(input)
}

fn comparison(input: &str) -> PResult<'_, Expr> {
    let (input, lhs) = additive(input)?;
    let (input, tail) = opt(pair(ws(comparison_op), additive))(input)?;
    match tail {
        Some((op, rhs)) => Ok((
            input,
            Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )),
        None => Ok((input, lhs)),
    }
}

fn comparison_op(input: &str) -> PResult<'_, BinaryOp> {
    alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Lte, tag("<=")),
        value(BinaryOp::Gte, tag(">=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
        value(
            BinaryOp::NotIn,
            tuple((keyword("not"), multispace0, keyword("in"))),
        ),
        value(BinaryOp::In, keyword("in")),
    ))(input)
}

fn additive(input: &str) -> PResult<'_, Expr> {
    let (input, first) = multiplicative(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        ))),
        multiplicative,
    ))(input)?;
    Ok((input, fold_binary_pairs(first, rest)))
}

fn multiplicative(input: &str) -> PResult<'_, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Mul, char('*')),
            value(BinaryOp::Div, char('/')),
        ))),
        unary,
    ))(input)?;
    Ok((input, fold_binary_pairs(first, rest)))
}

fn unary(input: &str) -> PResult<'_, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |operand| Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(operand),
        }),
        primary,
    ))(input)
}

fn primary(input: &str) -> PResult<'_, Expr> {
    ws(alt((
        map(literal, Expr::Literal),
        bracket_list,
        call_or_path,
        paren_group,
    )))(input)
}

// ── Grouping and lists ───────────────────────────────────────────

/// `(a)` is grouping; `(a,)` and `(a, b)` are tuple literals.
fn paren_group(input: &str) -> PResult<'_, Expr> {
    let (input, _) = char('(')(input)?;
    let (input, first) = expr(input)?;
    let (input, items) = many0(preceded(ws(char(',')), opt(expr)))(input)?;
    let (input, _) = ws(char(')'))(input)?;

    if items.is_empty() {
        return Ok((input, first));
    }
    let mut elements = vec![first];
    elements.extend(items.into_iter().flatten());
    Ok((input, Expr::List(elements)))
}

fn bracket_list(input: &str) -> PResult<'_, Expr> {
    map(
        delimited(
            char('['),
            opt(terminated(
                separated_list1(ws(char(',')), expr),
                opt(ws(char(','))),
            )),
            ws(char(']')),
        ),
        |items| Expr::List(items.unwrap_or_default()),
    )(input)
}

// ── Identifiers: scope paths and builtin calls ───────────────────

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn call_or_path(input: &str) -> PResult<'_, Expr> {
    let (rest, ident) = identifier(input)?;

    // Builtin call: `len(...)` / `abs(...)`.
    if let Some(builtin) = Builtin::from_ident(ident) {
        let call: PResult<'_, Expr> = delimited(ws(char('(')), expr, ws(char(')')))(rest);
        if let Ok((rest, arg)) = call {
            return Ok((
                rest,
                Expr::Call {
                    builtin,
                    arg: Box::new(arg),
                },
            ));
        }
    }

    // Scope path: `state.status`, `user.role`, bare `param`.
    if let Some(root) = ScopeRoot::from_ident(ident) {
        let (rest, segments) = many0(preceded(char('.'), identifier))(rest)?;
        return Ok((
            rest,
            Expr::Path {
                root,
                segments: segments.into_iter().map(str::to_string).collect(),
            },
        ));
    }

    // Any other identifier is an undeclared symbol — reject.
    context("undeclared symbol", |i| {
        Err(nom::Err::Error(VerboseError::from_error_kind(
            i,
            nom::error::ErrorKind::Verify,
        )))
    })(input)
}

// ── Literals ─────────────────────────────────────────────────────

fn literal(input: &str) -> PResult<'_, Literal> {
    alt((
        value(Literal::Bool(true), keyword("True")),
        value(Literal::Bool(true), keyword("true")),
        value(Literal::Bool(false), keyword("False")),
        value(Literal::Bool(false), keyword("false")),
        value(Literal::Null, keyword("None")),
        value(Literal::Null, keyword("null")),
        number,
        map(string_literal, Literal::String),
    ))(input)
}

fn number(input: &str) -> PResult<'_, Literal> {
    let (rest, text) = recognize(tuple((digit1, opt(pair(char('.'), digit1)))))(input)?;
    if text.contains('.') {
        match text.parse::<f64>() {
            Ok(f) => Ok((rest, Literal::Float(f))),
            Err(_) => Err(nom::Err::Error(VerboseError::from_error_kind(
                input,
                nom::error::ErrorKind::Float,
            ))),
        }
    } else {
        match text.parse::<i64>() {
            Ok(i) => Ok((rest, Literal::Int(i))),
            Err(_) => Err(nom::Err::Error(VerboseError::from_error_kind(
                input,
                nom::error::ErrorKind::Digit,
            ))),
        }
    }
}

fn string_literal(input: &str) -> PResult<'_, String> {
    alt((quoted_string('\''), quoted_string('"')))(input)
}

fn quoted_string<'a>(
    quote: char,
) -> impl FnMut(&'a str) -> PResult<'a, String> {
    move |input: &'a str| {
        let (input, _) = char(quote)(input)?;
        // Empty string: closing quote immediately.
        if let Ok((rest, _)) = char::<_, VerboseError<&str>>(quote)(input) {
            return Ok((rest, String::new()));
        }
        let (input, content) = escaped_transform(
            none_of(match quote {
                '\'' => "'\\",
                _ => "\"\\",
            }),
            '\\',
            alt((
                value('\'', char('\'')),
                value('"', char('"')),
                value('\\', char('\\')),
            )),
        )(input)?;
        let (input, _) = char(quote)(input)?;
        Ok((input, content))
    }
}

// ── Fold helpers ─────────────────────────────────────────────────

fn fold_binary(first: Expr, op: BinaryOp, rest: Vec<Expr>) -> Expr {
    rest.into_iter().fold(first, |lhs, rhs| Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn fold_binary_pairs(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}
