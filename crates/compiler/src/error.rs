//! Parse/compile errors, and the crate-wide error enum the CLI returns.

use senie_core::error::WordTableError;
use senie_runtime::error::{SerializeError, VmError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParseError {
    #[error("unmatched closing '{0}' at byte {1}")]
    UnmatchedClose(char, usize),

    #[error("unexpected end of input inside a string starting at byte {0}")]
    UnterminatedString(usize),

    #[error("unexpected end of input, expected closing '{0}'")]
    UnexpectedEof(char),

    #[error("node of type {0} is not a legal alterable value at byte {1}")]
    IllegalAlterable(&'static str, usize),

    #[error("word table error: {0}")]
    WordTable(#[from] WordTableError),
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum CompileError {
    #[error("too many top-level functions (max {max})")]
    TooManyFunctions { max: usize },

    #[error("too many arguments for function (max {max})")]
    TooManyArguments { max: usize },

    #[error("call to undefined function {0:?}")]
    UnknownFunction(String),

    #[error("program exceeds maximum size of {max} bytecode slots")]
    ProgramTooLarge { max: usize },

    #[error("alterable literal of this shape is not supported: {0}")]
    UnsupportedAlterableLiteral(&'static str),

    #[error("`if` requires a condition and a then-branch")]
    MalformedIf,

    #[error("call-site arguments must be `label: value` pairs")]
    UnlabeledCallArgument,

    #[error("malformed `fn` definition")]
    MalformedFnDef,

    #[error("malformed `define` form")]
    MalformedDefine,

    #[error("word table error: {0}")]
    WordTable(#[from] WordTableError),
}

/// Unifies every fallible stage for the CLI's top-level `Result`.
///
/// The specification names `senie_core::SenieError` as the unifying type,
/// but a `#[from]`-based aggregator needs to depend on every stage it
/// converts from; placing it in `senie-core` (a leaf dependency of both
/// `senie-runtime` and `senie-compiler`) would make the dependency graph
/// circular. It lives here instead, at the top of the graph where `main`
/// runs. See `DESIGN.md`.
#[derive(Debug, Error)]
pub enum SenieError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Vm(#[from] VmError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    WordTable(#[from] WordTableError),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
