//! Point filter expressions in the PDAL `filters.expression` syntax, e.g.
//! `Classification == 2 && Z > 10` or `!(Intensity < 5 || UserData == 1)`.
use std::str::FromStr;

use las::Point;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, recognize, value},
    multi::many0,
    number::complete::double,
    sequence::{delimited, pair, preceded},
};

use crate::error::{Error, Result};
use crate::io::dimension::Dimension;
use crate::io::extra_bytes::ExtraBytesLayout;
use crate::io::las::PointCloud;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    fn apply(&self, left: f64, right: f64) -> bool {
        match self {
            Comparator::Eq => left == right,
            Comparator::Ne => left != right,
            Comparator::Lt => left < right,
            Comparator::Le => left <= right,
            Comparator::Gt => left > right,
            Comparator::Ge => left >= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Dimension(Dimension),
    Value(f64),
}

impl Operand {
    fn eval(&self, point: &Point, layout: &ExtraBytesLayout) -> f64 {
        match self {
            Operand::Dimension(dim) => dim.get(point, layout).unwrap_or(0.0),
            Operand::Value(v) => *v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Compare {
        left: Operand,
        op: Comparator,
        right: Operand,
    },
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

impl Node {
    fn eval(&self, point: &Point, layout: &ExtraBytesLayout) -> bool {
        match self {
            Node::Compare { left, op, right } => {
                op.apply(left.eval(point, layout), right.eval(point, layout))
            }
            Node::Not(inner) => !inner.eval(point, layout),
            Node::And(a, b) => a.eval(point, layout) && b.eval(point, layout),
            Node::Or(a, b) => a.eval(point, layout) || b.eval(point, layout),
        }
    }

    fn collect_dimensions(&self, out: &mut Vec<Dimension>) {
        match self {
            Node::Compare { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Dimension(dim) = operand {
                        if !out.contains(dim) {
                            out.push(dim.clone());
                        }
                    }
                }
            }
            Node::Not(inner) => inner.collect_dimensions(out),
            Node::And(a, b) | Node::Or(a, b) => {
                a.collect_dimensions(out);
                b.collect_dimensions(out);
            }
        }
    }
}

/// A parsed filter expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

fn ws<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, f64> {
    double(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        identifier.map(|name: &str| Operand::Dimension(Dimension::parse(name))),
        number.map(Operand::Value),
    ))
    .parse(input)
}

fn comparator(input: &str) -> IResult<&str, Comparator> {
    alt((
        value(Comparator::Eq, tag("==")),
        value(Comparator::Ne, tag("!=")),
        value(Comparator::Le, tag("<=")),
        value(Comparator::Ge, tag(">=")),
        value(Comparator::Lt, tag("<")),
        value(Comparator::Gt, tag(">")),
    ))
    .parse(input)
}

fn comparison(input: &str) -> IResult<&str, Node> {
    let (input, left) = ws(operand).parse(input)?;
    let (input, op) = ws(comparator).parse(input)?;
    let (input, right) = ws(operand).parse(input)?;
    Ok((input, Node::Compare { left, op, right }))
}

fn primary(input: &str) -> IResult<&str, Node> {
    alt((
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        comparison,
    ))
    .parse(input)
}

fn unary(input: &str) -> IResult<&str, Node> {
    alt((
        preceded(ws(char('!')), unary).map(|node| Node::Not(Box::new(node))),
        primary,
    ))
    .parse(input)
}

fn and_expr(input: &str) -> IResult<&str, Node> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(preceded(ws(tag("&&")), unary)).parse(input)?;
    let node = rest
        .into_iter()
        .fold(first, |acc, node| Node::And(Box::new(acc), Box::new(node)));
    Ok((input, node))
}

fn or_expr(input: &str) -> IResult<&str, Node> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(tag("||")), and_expr)).parse(input)?;
    let node = rest
        .into_iter()
        .fold(first, |acc, node| Node::Or(Box::new(acc), Box::new(node)));
    Ok((input, node))
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |message: String| Error::Expression {
            expression: source.to_string(),
            message,
        };
        match all_consuming(or_expr).parse(source) {
            Ok((_, root)) => Ok(Self {
                source: source.to_string(),
                root,
            }),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let at = e.input.trim();
                Err(invalid(if at.is_empty() {
                    "unexpected end of expression".to_string()
                } else {
                    format!("unexpected input at '{}'", at)
                }))
            }
            Err(nom::Err::Incomplete(_)) => Err(invalid("incomplete expression".to_string())),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Dimensions referenced by the expression, in order of appearance
    pub fn dimensions(&self) -> Vec<Dimension> {
        let mut dims = Vec::new();
        self.root.collect_dimensions(&mut dims);
        dims
    }

    pub fn matches(&self, point: &Point, layout: &ExtraBytesLayout) -> bool {
        self.root.eval(point, layout)
    }

    /// Points of `cloud` for which the expression holds. Every dimension it
    /// references must exist in the cloud.
    pub fn filter(&self, mut cloud: PointCloud) -> Result<PointCloud> {
        if let Some(missing) = self.dimensions().iter().find(|d| !cloud.has_dimension(d)) {
            return Err(Error::Expression {
                expression: self.source.clone(),
                message: format!("dimension {} not found in point cloud", missing),
            });
        }
        let layout = cloud.layout.clone();
        cloud.points.retain(|p| self.matches(p, &layout));
        Ok(cloud)
    }
}

impl FromStr for Expression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Expression::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use las::point::Classification;
    use rstest::rstest;

    fn point(class: u8, z: f64, intensity: u16) -> Point {
        Point {
            z,
            intensity,
            classification: Classification::new(class).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_a_comparison() {
        let expr = Expression::parse("Classification==2").unwrap();
        assert_eq!(
            expr.root,
            Node::Compare {
                left: Operand::Dimension(Dimension::Classification),
                op: Comparator::Eq,
                right: Operand::Value(2.0),
            }
        );
        assert_eq!(expr.dimensions(), vec![Dimension::Classification]);
    }

    #[rstest]
    #[case("Classification == 2", true)]
    #[case("Classification != 2", false)]
    #[case("Z > 10 && Intensity <= 5", true)]
    #[case("Z > 11 && Intensity <= 5", false)]
    #[case("Z > 11 || Classification == 2", true)]
    #[case("!(Classification == 2)", false)]
    #[case("Classification == 2 || Z >= 11 && Intensity < 5", true)]
    #[case("(Classification == 2 || Z >= 11) && Intensity < 5", false)]
    #[case("2 == Classification", true)]
    #[case("Z < -1e3", false)]
    fn evaluates(#[case] source: &str, #[case] expected: bool) {
        let expr: Expression = source.parse().unwrap();
        let layout = ExtraBytesLayout::default();
        assert_eq!(expr.matches(&point(2, 10.5, 5), &layout), expected);
    }

    #[rstest]
    #[case("")]
    #[case("Classification")]
    #[case("Classification = 2")]
    #[case("Classification == 2 &&")]
    #[case("(Z > 1")]
    fn rejects_malformed(#[case] source: &str) {
        let err = Expression::parse(source).unwrap_err();
        assert!(matches!(err, Error::Expression { .. }));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = Expression::parse("Z > 1 || Z > 2 && Z > 3").unwrap();
        assert!(matches!(expr.root, Node::Or(_, _)));
    }
}
