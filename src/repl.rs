//! Interactive command loop.
//!
//! Reads one command per line, writing the `db > ` prompt before each read.
//! Statement errors are reported on their own line and the loop continues;
//! storage failures abort the session. Both `.exit` and end of input flush
//! the database before returning.

use crate::access::BTreeError;
use crate::access::row::ROW_SIZE;
use crate::database::Database;
use crate::sql::{prepare, PrepareError, Statement};
use crate::storage::page::leaf_page::{
    LEAF_CELL_SIZE, LEAF_HEADER_SIZE, LEAF_MAX_CELLS, LEAF_SPACE_FOR_CELLS,
};
use crate::storage::page::node::COMMON_HEADER_SIZE;
use crate::storage::StorageError;
use anyhow::Result;
use std::io::{BufRead, Write};

const PROMPT: &str = "db > ";

pub fn run(mut db: Database, mut input: impl BufRead, mut out: impl Write) -> Result<()> {
    let mut line = String::new();
    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let command = line.trim_end_matches(|c| c == '\n' || c == '\r');

        if command.starts_with('.') {
            if command == ".exit" {
                break;
            }
            meta_command(&mut db, command, &mut out)?;
            continue;
        }

        match prepare(command) {
            Ok(statement) => execute(&mut db, statement, &mut out)?,
            Err(err) => report_prepare_error(&err, &mut out)?,
        }
    }
    db.close()?;
    Ok(())
}

fn meta_command(db: &mut Database, command: &str, out: &mut impl Write) -> Result<()> {
    match command {
        ".btree" => {
            writeln!(out, "Tree:")?;
            write!(out, "{}", db.dump_tree()?)?;
        }
        ".constants" => {
            writeln!(out, "Constants:")?;
            writeln!(out, "ROW_SIZE: {}", ROW_SIZE)?;
            writeln!(out, "COMMON_NODE_HEADER_SIZE: {}", COMMON_HEADER_SIZE)?;
            writeln!(out, "LEAF_NODE_HEADER_SIZE: {}", LEAF_HEADER_SIZE)?;
            writeln!(out, "LEAF_NODE_CELL_SIZE: {}", LEAF_CELL_SIZE)?;
            writeln!(out, "LEAF_NODE_SPACE_FOR_CELLS: {}", LEAF_SPACE_FOR_CELLS)?;
            writeln!(out, "LEAF_NODE_MAX_CELLS: {}", LEAF_MAX_CELLS)?;
        }
        _ => {
            writeln!(out, "Unrecognized command '{}'.", command)?;
        }
    }
    Ok(())
}

fn execute(db: &mut Database, statement: Statement, out: &mut impl Write) -> Result<()> {
    match statement {
        Statement::Insert(row) => match db.insert(&row) {
            Ok(()) => writeln!(out, "Executed.")?,
            Err(BTreeError::DuplicateKey(_)) => writeln!(out, "Error: Duplicate key.")?,
            Err(BTreeError::Storage(StorageError::PageLimitReached { .. })) => {
                writeln!(out, "Error: Table full.")?;
            }
            Err(err) => return Err(err.into()),
        },
        Statement::Select => {
            let mut scan = db.scan()?;
            while let Some(row) = scan.next_row()? {
                writeln!(out, "({}, {}, {})", row.id(), row.username(), row.email())?;
            }
            writeln!(out, "Executed.")?;
        }
    }
    Ok(())
}

fn report_prepare_error(err: &PrepareError, out: &mut impl Write) -> Result<()> {
    match err {
        PrepareError::Syntax => writeln!(out, "Syntax error. Could not parse statement.")?,
        PrepareError::NegativeId => writeln!(out, "ID must be positive.")?,
        PrepareError::Row(_) => writeln!(out, "String is too long.")?,
        PrepareError::Unrecognized(text) => {
            writeln!(out, "Unrecognized keyword at start of '{}'.", text)?;
        }
    }
    Ok(())
}
