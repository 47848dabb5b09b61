use derive_more::Display;

use crate::Library;

use super::Query;

pub(super) const END: &str = "END";

/// An operator opening a group of queries.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Operator {
    #[display(fmt = "AND")]
    And,
    #[display(fmt = "OR")]
    Or,
    #[display(fmt = "MINUS")]
    Minus,
}

impl Operator {
    fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "AND" => Some(Operator::And),
            "OR" => Some(Operator::Or),
            "MINUS" => Some(Operator::Minus),
            _ => None,
        }
    }

    fn build(self, children: Vec<Query>) -> Query {
        match self {
            Operator::And => Query::And(children),
            Operator::Or => Query::Or(children),
            Operator::Minus => Query::Minus(children),
        }
    }
}

/// A group still open when parsing stopped:
/// the queries parsed before it was opened,
/// and the operator opening it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub parent: Vec<Query>,
    pub operator: Operator,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Failed to parse query: {message}")]
pub struct ParseError {
    pub message: String,
    /// Groups still open, outermost first.
    pub stack: Vec<Frame>,
    /// Queries parsed in the innermost open group,
    /// or at the top level if none is open.
    pub residual: Vec<Query>,
}

/// Parse tokens into a query.
///
/// `AND`, `OR` and `MINUS` open a group closed by `END`.
/// A token starting with `\` names the pathname after the backslash verbatim,
/// relative to the library's working directory.
/// Any other token names a directory by tagname or pathname,
/// resolved against `library`.
pub fn parse<I>(library: &Library, tokens: I) -> Result<Query, ParseError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut stack: Vec<Frame> = Vec::new();
    let mut current: Vec<Query> = Vec::new();
    for token in tokens {
        let token = token.as_ref();
        if let Some(operator) = Operator::from_keyword(token) {
            stack.push(Frame {
                parent: std::mem::take(&mut current),
                operator,
            });
        } else if token == END {
            let Some(frame) = stack.pop() else {
                return Err(ParseError {
                    message: format!("`{END}` closes no group"),
                    stack,
                    residual: current,
                });
            };
            if current.is_empty() {
                let message = format!("`{}` group is empty", frame.operator);
                stack.push(frame);
                return Err(ParseError {
                    message,
                    stack,
                    residual: current,
                });
            }
            let node = frame.operator.build(std::mem::replace(&mut current, frame.parent));
            current.push(node);
        } else if let Some(name) = token.strip_prefix('\\') {
            current.push(Query::Dir(library.cwd().join(name)));
        } else {
            current.push(Query::Dir(library.resolve(token)));
        }
    }

    if let Some(frame) = stack.last() {
        let message = format!("`{}` group is not closed", frame.operator);
        return Err(ParseError {
            message,
            stack,
            residual: current,
        });
    }
    if current.len() != 1 {
        return Err(ParseError {
            message: format!("expected one query, found {}", current.len()),
            stack,
            residual: current,
        });
    }
    Ok(current.remove(0))
}
