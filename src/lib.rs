pub mod access;
pub mod database;
pub mod repl;
pub mod sql;
pub mod storage;
