//! Parser, compiler, genetic engine, and unparser for the Senie language.
//!
//! Sits on top of `senie_core` (word table, AST, runtime value type) and
//! `senie_runtime` (bytecode, VM, heap); this crate owns everything that
//! turns source text into a `Program` and back.

pub mod bootstrap;
pub mod compiler;
pub mod config;
pub mod error;
pub mod genetic;
pub mod genetic_serialize;
pub mod parser;
pub mod preamble;
pub mod unparse;

pub use bootstrap::{register_render_natives, Builtins, Natives};
pub use compiler::Compiler;
pub use config::SenieConfig;
pub use error::SenieError;
pub use genetic::{
    extract_traits, initial_generation, next_generation, register_generator_natives, Genotype, GenotypeCursor,
    GenotypeList, Trait, TraitList,
};
pub use parser::parse;
