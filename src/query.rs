//! Set algebra over the contents of tag directories.

mod parse;
mod tokenize;

use std::{fs, path::PathBuf};

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::{error::IoResultExt, fs::FileId, Library, Result};

pub use self::{
    parse::{parse, Frame, Operator, ParseError},
    tokenize::{quote, tokenize, TokenizeError},
};

/// Objects matched by a query,
/// each with the path it was found at.
pub type Matches = FxHashMap<FileId, PathBuf>;

/// A query tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    /// Every entry directly in a directory.
    Dir(PathBuf),
    /// Objects matched by every child,
    /// found at their paths in the first.
    And(Vec<Query>),
    /// Objects matched by any child,
    /// found at their paths in the earliest child matching them.
    Or(Vec<Query>),
    /// Objects matched by the first child and no other.
    Minus(Vec<Query>),
}

impl Query {
    pub fn evaluate(&self) -> Result<Matches> {
        match self {
            Query::Dir(path) => {
                let mut entries = fs::read_dir(path)
                    .during("read", path)?
                    .map(|entry| entry.map(|entry| entry.path()))
                    .collect::<Result<Vec<_>, _>>()
                    .during("read", path)?;
                entries.sort_by(|x, y| x.file_name().cmp(&y.file_name()));

                let mut matches = Matches::default();
                for entry in entries {
                    // Dangling symlinks match nothing.
                    if let Ok(id) = FileId::of(&entry) {
                        matches.insert(id, entry);
                    }
                }
                Ok(matches)
            }
            Query::And(children) => {
                let mut children = children.iter();
                let Some(first) = children.next() else {
                    return Ok(Matches::default());
                };
                let mut matches = first.evaluate()?;
                for child in children {
                    let other = child.evaluate()?;
                    matches.retain(|id, _| other.contains_key(id));
                }
                Ok(matches)
            }
            Query::Or(children) => {
                let mut matches = Matches::default();
                for child in children {
                    for (id, path) in child.evaluate()? {
                        matches.entry(id).or_insert(path);
                    }
                }
                Ok(matches)
            }
            Query::Minus(children) => {
                let mut children = children.iter();
                let Some(first) = children.next() else {
                    return Ok(Matches::default());
                };
                let mut matches = first.evaluate()?;
                for child in children {
                    let other = child.evaluate()?;
                    matches.retain(|id, _| !other.contains_key(id));
                }
                Ok(matches)
            }
        }
    }

    /// Write the query as a string that tokenizes and parses back to it.
    ///
    /// Directories are written escaped,
    /// so they are taken verbatim when parsed.
    /// Relative directories parse back joined to the library's working directory.
    pub fn unparse(&self) -> String {
        let mut tokens = Vec::new();
        self.unparse_into(&mut tokens);
        tokens.join(" ")
    }

    fn unparse_into(&self, tokens: &mut Vec<String>) {
        let (operator, children) = match self {
            Query::Dir(path) => {
                tokens.push(quote(&format!("\\{}", path.display())));
                return;
            }
            Query::And(children) => (Operator::And, children),
            Query::Or(children) => (Operator::Or, children),
            Query::Minus(children) => (Operator::Minus, children),
        };
        tokens.push(operator.to_string());
        for child in children {
            child.unparse_into(tokens);
        }
        tokens.push(parse::END.to_owned());
    }
}

/// Paths of the objects matched by `query`, sorted.
pub fn search(query: &Query) -> Result<Vec<PathBuf>> {
    Ok(query.evaluate()?.into_values().sorted().collect())
}

impl Library {
    /// Parse a query string,
    /// resolving directory names against this library.
    pub fn parse_query(&self, s: &str) -> Result<Query> {
        Ok(parse(self, tokenize(s)?)?)
    }

    /// Evaluate a query string.
    pub fn search(&self, s: &str) -> Result<Vec<PathBuf>> {
        search(&self.parse_query(s)?)
    }
}
