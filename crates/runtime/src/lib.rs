//! Stack VM, heap GC, PRNG, and native-function bindings.
//!
//! This crate has no notion of source syntax: it runs [`bytecode::Program`]s
//! produced by a compiler and exposes the pieces (heap, matrix stack, render
//! target, PRNG) a native-function binding needs to do real work.

pub mod bytecode;
pub mod error;
pub mod heap;
pub mod natives;
pub mod prng;
pub mod serialize;
pub mod vm;

pub use bytecode::{Arg, Bytecode, FnInfo, Op, Program, Segment};
pub use error::{SerializeError, VmError};
pub use heap::Heap;
pub use natives::{MatrixStack, NativeFn, NativeTable, RenderPacket, RenderTarget};
pub use prng::{Prng, PrngState};
pub use vm::{Vm, MEMORY_GLOBAL_SIZE, MEMORY_LOCAL_SIZE, STACK_SIZE};
