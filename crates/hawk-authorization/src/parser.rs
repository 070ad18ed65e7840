//! Textual permission expressions
//!
//! ```text
//! expr   := term ("or" term)*
//! term   := factor ("and" factor)*
//! factor := "permitAll" | "denyAll" | AUTHORITY | "(" expr ")"
//! ```
//!
//! Keywords are case-insensitive; `and` binds tighter than `or`. Authority
//! tokens are `[A-Za-z0-9_]+` and may not be a keyword.

use crate::PermissionExpr;
use hawk_core::{HawkError, HawkResult};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, not, peek, value, verify},
    multi::many0,
    sequence::{delimited, preceded, terminated},
    IResult,
};

const KEYWORDS: &[&str] = &["and", "or", "permitall", "denyall"];

/// Parse a permission expression
pub fn parse_expression(input: &str) -> HawkResult<PermissionExpr> {
    match all_consuming(delimited(multispace0, expr, multispace0))(input) {
        Ok((_, parsed)) => Ok(parsed),
        Err(err) => Err(HawkError::invalid(format!(
            "invalid permission expression '{input}': {err}"
        ))),
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A keyword that is not the prefix of a longer token (`or` but not `ORDER`)
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    delimited(
        multispace0,
        terminated(tag_no_case(word), not(peek(take_while1(is_token_char)))),
        multispace0,
    )
}

fn expr(input: &str) -> IResult<&str, PermissionExpr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(preceded(keyword("or"), term))(input)?;
    Ok((input, fold(first, rest, PermissionExpr::Any)))
}

fn term(input: &str) -> IResult<&str, PermissionExpr> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(preceded(keyword("and"), factor))(input)?;
    Ok((input, fold(first, rest, PermissionExpr::All)))
}

fn factor(input: &str) -> IResult<&str, PermissionExpr> {
    delimited(
        multispace0,
        alt((
            value(PermissionExpr::PermitAll, keyword("permitAll")),
            value(PermissionExpr::Any(Vec::new()), keyword("denyAll")),
            delimited(char('('), expr, preceded(multispace0, char(')'))),
            map(
                verify(take_while1(is_token_char), |token: &str| {
                    !KEYWORDS.contains(&token.to_ascii_lowercase().as_str())
                }),
                PermissionExpr::authority,
            ),
        )),
        multispace0,
    )(input)
}

fn fold(
    first: PermissionExpr,
    rest: Vec<PermissionExpr>,
    combine: fn(Vec<PermissionExpr>) -> PermissionExpr,
) -> PermissionExpr {
    if rest.is_empty() {
        first
    } else {
        let mut operands = Vec::with_capacity(rest.len() + 1);
        operands.push(first);
        operands.extend(rest);
        combine(operands)
    }
}
