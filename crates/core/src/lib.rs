//! Senie Core: word table, AST, and runtime value types
//!
//! This crate is the foundation shared by the compiler and the runtime:
//! interning identifiers into partitioned id ranges, the parsed AST shape,
//! and the tagged runtime value (`Var`) that both the trait/genotype
//! machinery and the VM operate on.
//!
//! # Modules
//!
//! - `word_table`: interns identifiers into native/keyword/user partitions.
//! - `ast`: parsed node tree with source-span and alterable-node tracking.
//! - `var`: the runtime value type (`Var`) and colour format tag.
//! - `error`: word-table error type.

pub mod ast;
pub mod error;
pub mod var;
pub mod word_table;

pub use ast::{Ast, Node, NodeId, NodeType};
pub use error::WordTableError;
pub use var::{ColourFormat, Var};
pub use word_table::{IName, WordTable};
