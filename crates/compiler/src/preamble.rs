//! The fixed program run once before every user program: seeds the
//! reserved global slots (`gen/initial-value`, `USE_VARY`, canvas
//! dimensions) so user code — and trait programs re-entering the same
//! globals — see sane defaults even before `define` touches them.

use crate::bootstrap::{CANVAS_HEIGHT_SLOT, CANVAS_WIDTH_SLOT, GEN_INITIAL_VALUE_SLOT, USE_VARY_SLOT};
use senie_core::var::Var;
use senie_runtime::bytecode::{Arg, Bytecode, Op, Program, Segment};

/// Builds the preamble for a canvas of `width` × `height` device pixels.
/// `gen/initial-value` and `USE_VARY` start at inert defaults; the trait
/// compiler overwrites them before running a trait program.
pub fn build(width: i32, height: i32) -> Program {
    let mut p = Program::new();
    store_global(&mut p, CANVAS_WIDTH_SLOT, Var::Int(width));
    store_global(&mut p, CANVAS_HEIGHT_SLOT, Var::Int(height));
    store_global(&mut p, GEN_INITIAL_VALUE_SLOT, Var::Int(0));
    store_global(&mut p, USE_VARY_SLOT, Var::Bool(false));
    p.emit(Bytecode::simple(Op::Stop));
    p
}

fn store_global(p: &mut Program, slot: usize, value: Var) {
    p.emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Constant), Arg::Literal(value)));
    p.emit(Bytecode::new(Op::Store, Arg::Segment(Segment::Global), Arg::Int(slot as i32)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use senie_runtime::prng::PrngState;
    use senie_runtime::vm::Vm;

    #[test]
    fn preamble_seeds_canvas_dimensions() {
        let preamble = build(800, 600);
        let mut vm = Vm::new(PrngState::from_seed(1));
        vm.run_program(&preamble).unwrap();
        assert_eq!(vm.globals[CANVAS_WIDTH_SLOT], Var::Int(800));
        assert_eq!(vm.globals[CANVAS_HEIGHT_SLOT], Var::Int(600));
    }
}
