//! The statement grammar is a single line of whitespace-separated tokens:
//!
//! - `insert <id> <username> <email>`
//! - `select`
//!
//! Validation happens here, before any page is touched: field counts, id
//! range, and field lengths. A prepared [`Statement`] carries a fully built
//! row, so execution can no longer fail on malformed input.

use crate::access::{Row, RowError};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PrepareError {
    #[error("could not parse statement")]
    Syntax,

    #[error("id must be positive")]
    NegativeId,

    #[error(transparent)]
    Row(#[from] RowError),

    #[error("unrecognized keyword at start of {0:?}")]
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

/// Parses one input line into a statement.
///
/// `insert` takes exactly the next three tokens as id, username, and email;
/// anything after them is ignored. `select` takes no arguments. The id must
/// be an integer that is positive and fits the row key width.
pub fn prepare(input: &str) -> Result<Statement, PrepareError> {
    let mut tokens = input.split_whitespace();
    match tokens.next() {
        Some("insert") => {
            let id = tokens.next().ok_or(PrepareError::Syntax)?;
            let username = tokens.next().ok_or(PrepareError::Syntax)?;
            let email = tokens.next().ok_or(PrepareError::Syntax)?;

            let id: i64 = id.parse().map_err(|_| PrepareError::Syntax)?;
            if id <= 0 {
                return Err(PrepareError::NegativeId);
            }
            let id = u32::try_from(id).map_err(|_| PrepareError::Syntax)?;

            Ok(Statement::Insert(Row::new(id, username, email)?))
        }
        Some("select") => {
            if tokens.next().is_some() {
                return Err(PrepareError::Unrecognized(input.to_string()));
            }
            Ok(Statement::Select)
        }
        _ => Err(PrepareError::Unrecognized(input.to_string())),
    }
}
