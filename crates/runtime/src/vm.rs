//! The stack VM: frames, opcode dispatch, and cooperative GC.
//!
//! The reference implementation addresses one flat array of stack slots by
//! raw offsets (`fp`, `local`, `sp`). Here the same addressing rules
//! (`GLOBAL`/`LOCAL`/`ARGUMENT`/`CONSTANT` segments, the `hop_back` counter
//! bridging `CALL_0`/`RET_0`) are kept, but frames are a `Vec<Frame>` of
//! named argument/local slots layered over one shared working-value stack,
//! rather than one byte-addressed array. Spec §9 explicitly allows this
//! kind of re-architecture provided the ordering property and the observed
//! state at `STOP` are preserved; see `DESIGN.md`.

use crate::bytecode::{Arg, Bytecode, Op, Program, Segment};
use crate::error::VmError;
use crate::heap::{Heap, HEAP_MIN_SIZE, HEAP_SIZE};
use crate::natives::{MatrixStack, NativeTable, RenderTarget};
use crate::prng::{Prng, PrngState};
use senie_core::var::Var;
use senie_core::word_table::IName;
use tracing::{trace, warn};

pub const MEMORY_GLOBAL_SIZE: usize = 40;
pub const MEMORY_LOCAL_SIZE: usize = 40;
pub const STACK_SIZE: usize = 1024;

#[derive(Debug, Clone)]
struct Frame {
    args: Vec<(IName, Var)>,
    locals: Vec<Var>,
    return_ip: usize,
    fn_index: Option<usize>,
    pending_overrides: Vec<(IName, Var)>,
}

impl Frame {
    fn arg(&self, name: IName) -> Option<&Var> {
        self.args.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    fn set_arg(&mut self, name: IName, value: Var) {
        if let Some(slot) = self.args.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.args.push((name, value));
        }
    }
}

pub struct Vm {
    pub globals: Vec<Var>,
    frames: Vec<Frame>,
    stack: Vec<Var>,
    pub heap: Heap,
    pub prng: Prng,
    pub natives: NativeTable,
    pub matrix_stack: MatrixStack,
    pub render_target: RenderTarget,
    hop_back: usize,
    ip: usize,
    pub opcodes_executed: u64,
}

impl Vm {
    pub fn new(seed: PrngState) -> Self {
        Vm {
            globals: vec![Var::Int(0); MEMORY_GLOBAL_SIZE],
            frames: Vec::new(),
            stack: Vec::new(),
            heap: Heap::new(HEAP_SIZE),
            prng: Prng::from_state(seed),
            natives: NativeTable::new(),
            matrix_stack: MatrixStack::new(),
            render_target: RenderTarget::new(),
            hop_back: 0,
            ip: 0,
            opcodes_executed: 0,
        }
    }

    /// Resets per-run state (frames, working stack, ip) while keeping the
    /// heap, natives, and matrix stack; mirrors `vm_reset` running the same
    /// VM across a preamble and a user program.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.stack.clear();
        self.hop_back = 0;
        self.ip = 0;
    }

    pub fn push(&mut self, v: Var) {
        self.stack.push(v);
    }

    pub fn pop(&mut self) -> Result<Var, VmError> {
        self.stack.pop().ok_or(VmError::StackOverflow {
            sp: 0,
            size: STACK_SIZE,
        })
    }

    pub fn top(&self) -> Option<&Var> {
        self.stack.last()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Reads a labeled argument by name out of the top `2 * num_args` stack
    /// slots without popping — `exec_native` re-pushes label/value pairs in
    /// call order before invoking the native closure, so natives read their
    /// arguments this way instead of popping them (popping is `exec_native`'s
    /// job, done once after the closure returns). Returns `None` if `name`
    /// wasn't passed.
    pub fn native_arg(&self, num_args: usize, name: IName) -> Option<&Var> {
        let base = self.stack.len().checked_sub(num_args * 2)?;
        for i in 0..num_args {
            let label_idx = base + i * 2;
            if let Var::Name(n) = self.stack[label_idx] {
                if n == name {
                    return self.stack.get(label_idx + 1);
                }
            }
        }
        None
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    fn frame_at_hop_back(&self) -> Option<&Frame> {
        if self.frames.is_empty() {
            return None;
        }
        let idx = self.frames.len().saturating_sub(1 + self.hop_back.min(self.frames.len() - 1));
        self.frames.get(idx)
    }

    /// Runs the preamble (well-known globals) then the user program, both
    /// in this VM instance, matching the reference `vm_run` order.
    pub fn run(&mut self, preamble: &Program, program: &Program) -> Result<(), VmError> {
        self.reset();
        self.run_program(preamble)?;
        self.reset();
        self.run_program(program)
    }

    pub fn run_program(&mut self, program: &Program) -> Result<(), VmError> {
        self.ip = 0;
        loop {
            if self.heap.needs_gc(HEAP_MIN_SIZE) {
                self.collect_garbage();
            }
            if self.ip >= program.code.len() {
                return Err(VmError::IpOutOfBounds {
                    ip: self.ip,
                    len: program.code.len(),
                });
            }
            let bc = program.code[self.ip].clone();
            trace!(ip = self.ip, op = bc.op.name(), "exec");
            self.opcodes_executed += 1;
            match self.step(&bc, program)? {
                Some(next_ip) => self.ip = next_ip,
                None => return Ok(()),
            }
        }
    }

    fn collect_garbage(&mut self) {
        let mut roots: Vec<Var> = self.stack.clone();
        roots.extend(self.globals.iter().cloned());
        for f in &self.frames {
            roots.extend(f.args.iter().map(|(_, v)| v.clone()));
            roots.extend(f.locals.iter().cloned());
        }
        self.heap.collect(roots.iter());
    }

    fn step(&mut self, bc: &Bytecode, program: &Program) -> Result<Option<usize>, VmError> {
        use Op::*;
        let next = self.ip + 1;
        match bc.op {
            Load => {
                self.exec_load(bc)?;
                Ok(Some(next))
            }
            Store => {
                self.exec_store(bc)?;
                Ok(Some(next))
            }
            StoreF => {
                self.exec_store_f(bc, program)?;
                Ok(Some(next))
            }
            Jump => Ok(Some(self.branch_target(bc)?)),
            JumpIf => {
                let v = self.pop()?;
                if v.is_truthy() {
                    Ok(Some(next))
                } else {
                    Ok(Some(self.branch_target(bc)?))
                }
            }
            Call | CallF => {
                self.exec_call(bc, program)?;
                Ok(Some(self.ip))
            }
            Call0 | CallF0 => {
                self.exec_call0(program)?;
                Ok(Some(self.ip))
            }
            Ret => {
                let result = self.pop()?;
                let frame = self.frames.pop().ok_or(VmError::StackOverflow {
                    sp: 0,
                    size: STACK_SIZE,
                })?;
                self.push(result);
                Ok(Some(frame.return_ip))
            }
            Ret0 => {
                let frame = self.frames.last().ok_or(VmError::StackOverflow {
                    sp: 0,
                    size: STACK_SIZE,
                })?;
                let ret_ip = frame.return_ip;
                self.hop_back += 1;
                Ok(Some(ret_ip))
            }
            Native => {
                self.exec_native(bc)?;
                Ok(Some(next))
            }
            Append => {
                self.exec_append()?;
                Ok(Some(next))
            }
            Squish2 => {
                let y = self.pop_f32("SQUISH2")?;
                let x = self.pop_f32("SQUISH2")?;
                self.push(Var::Vec2([x, y]));
                Ok(Some(next))
            }
            Pile => {
                self.exec_pile(bc)?;
                Ok(Some(next))
            }
            MtxLoad => {
                self.matrix_stack.push()?;
                Ok(Some(next))
            }
            MtxStore => {
                self.matrix_stack.pop();
                Ok(Some(next))
            }
            Add | Sub | Mul | Div | Mod => {
                self.exec_arith(bc.op)?;
                Ok(Some(next))
            }
            Neg => {
                let v = self.pop_f32("NEG")?;
                self.push(Var::Float(-v));
                Ok(Some(next))
            }
            Sqrt => {
                let v = self.pop_f32("SQRT")?;
                self.push(Var::Float(v.sqrt()));
                Ok(Some(next))
            }
            Eq | Gt | Lt => {
                self.exec_compare(bc.op)?;
                Ok(Some(next))
            }
            And | Or => {
                self.exec_logic(bc.op)?;
                Ok(Some(next))
            }
            Not => {
                let v = self.pop()?;
                self.push(Var::Bool(!v.is_truthy()));
                Ok(Some(next))
            }
            Nop => Ok(Some(next)),
            Stop => Ok(None),
        }
    }

    fn branch_target(&self, bc: &Bytecode) -> Result<usize, VmError> {
        let delta = match &bc.arg0 {
            Arg::Int(d) => *d,
            _ => {
                return Err(VmError::TypeMismatch {
                    op: "JUMP",
                    expected: "Int delta",
                    got: "other",
                })
            }
        };
        Ok((self.ip as isize + delta as isize) as usize)
    }

    fn exec_load(&mut self, bc: &Bytecode) -> Result<(), VmError> {
        let seg = match &bc.arg0 {
            Arg::Segment(s) => *s,
            _ => {
                return Err(VmError::TypeMismatch {
                    op: "LOAD",
                    expected: "Segment",
                    got: "other",
                })
            }
        };
        match seg {
            Segment::Constant => {
                let v = match &bc.arg1 {
                    Arg::Literal(v) => v.clone(),
                    _ => {
                        return Err(VmError::TypeMismatch {
                            op: "LOAD CONSTANT",
                            expected: "Literal",
                            got: "other",
                        })
                    }
                };
                self.push(v);
            }
            Segment::Global => {
                let slot = self.int_arg(&bc.arg1, "LOAD GLOBAL")?;
                let v = self
                    .globals
                    .get(slot)
                    .cloned()
                    .unwrap_or(Var::Int(0));
                self.push(v);
            }
            Segment::Local => {
                let slot = self.int_arg(&bc.arg1, "LOAD LOCAL")?;
                let v = self
                    .frame_at_hop_back()
                    .and_then(|f| f.locals.get(slot))
                    .cloned()
                    .unwrap_or(Var::Int(0));
                self.push(v);
            }
            Segment::Argument => {
                let name = self.name_arg(&bc.arg1, "LOAD ARGUMENT")?;
                let v = self
                    .frame_at_hop_back()
                    .and_then(|f| f.arg(name))
                    .cloned()
                    .unwrap_or(Var::Int(0));
                self.push(v);
            }
            Segment::Void => {
                self.push(Var::Vector(self.heap.construct()));
            }
        }
        Ok(())
    }

    fn exec_store(&mut self, bc: &Bytecode) -> Result<(), VmError> {
        let seg = match &bc.arg0 {
            Arg::Segment(s) => *s,
            _ => {
                return Err(VmError::TypeMismatch {
                    op: "STORE",
                    expected: "Segment",
                    got: "other",
                })
            }
        };
        let value = self.pop()?;
        match seg {
            Segment::Void => {}
            Segment::Global => {
                let slot = self.int_arg(&bc.arg1, "STORE GLOBAL")?;
                if slot < self.globals.len() {
                    self.globals[slot] = value;
                }
            }
            Segment::Local => {
                let slot = self.int_arg(&bc.arg1, "STORE LOCAL")?;
                if let Some(f) = self.frames.last_mut() {
                    if slot < f.locals.len() {
                        f.locals[slot] = value;
                    }
                }
            }
            Segment::Argument => {
                let name = self.name_arg(&bc.arg1, "STORE ARGUMENT")?;
                if let Some(f) = self.frames.last_mut() {
                    f.set_arg(name, value);
                }
            }
            Segment::Constant => {}
        }
        Ok(())
    }

    /// `STORE_F` writes a default value into the argument slot of the
    /// function named by `bc.arg0`'s function index, matched by label
    /// (`bc.arg1`). Silently ignored if the function has no such parameter.
    fn exec_store_f(&mut self, bc: &Bytecode, program: &Program) -> Result<(), VmError> {
        let fn_index = self.int_arg(&bc.arg0, "STORE_F")?;
        let name = self.name_arg(&bc.arg1, "STORE_F")?;
        let value = self.pop()?;
        let fn_info = program
            .fn_info
            .get(fn_index)
            .ok_or(VmError::UnknownFunction(fn_index))?;
        if fn_info.offset_for(name).is_none() {
            warn!(fn_index, name, "STORE_F to nonexistent argument, ignored");
            return Ok(());
        }
        if let Some(f) = self.frames.last_mut() {
            f.set_arg(name, value);
        }
        Ok(())
    }

    fn exec_call(&mut self, bc: &Bytecode, program: &Program) -> Result<(), VmError> {
        let fn_index = self.int_arg(&bc.arg0, "CALL")?;
        let num_provided = match &bc.arg1 {
            Arg::Int(n) => *n as usize,
            Arg::None => 0,
            _ => {
                return Err(VmError::TypeMismatch {
                    op: "CALL",
                    expected: "Int num_provided",
                    got: "other",
                })
            }
        };
        let mut overrides = Vec::with_capacity(num_provided);
        for _ in 0..num_provided {
            let value = self.pop()?;
            let label = self.pop()?;
            let name = match label {
                Var::Name(n) => n,
                _ => {
                    return Err(VmError::TypeMismatch {
                        op: "CALL",
                        expected: "Name label",
                        got: "other",
                    })
                }
            };
            overrides.push((name, value));
        }
        overrides.reverse();

        let fn_info = program
            .fn_info
            .get(fn_index)
            .ok_or(VmError::UnknownFunction(fn_index))?;
        self.frames.push(Frame {
            args: Vec::new(),
            locals: vec![Var::Int(0); MEMORY_LOCAL_SIZE],
            return_ip: self.ip + 1,
            fn_index: Some(fn_index),
            pending_overrides: overrides,
        });
        self.hop_back = 0;
        self.ip = fn_info.arg_address;
        Ok(())
    }

    fn exec_call0(&mut self, program: &Program) -> Result<(), VmError> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(VmError::StackOverflow {
                sp: 0,
                size: STACK_SIZE,
            })?;
        let overrides = std::mem::take(&mut frame.pending_overrides);
        for (name, value) in overrides {
            frame.set_arg(name, value);
        }
        let fn_index = frame.fn_index.ok_or(VmError::UnknownFunction(0))?;
        let body_address = program
            .fn_info
            .get(fn_index)
            .ok_or(VmError::UnknownFunction(fn_index))?
            .body_address;
        self.hop_back = 0;
        self.ip = body_address;
        Ok(())
    }

    fn exec_native(&mut self, bc: &Bytecode) -> Result<(), VmError> {
        let native_id = self.int_arg(&bc.arg0, "NATIVE")? as i32;
        let num_args = self.int_arg(&bc.arg1, "NATIVE")?;
        let mut pairs = Vec::with_capacity(num_args);
        for _ in 0..num_args {
            let value = self.pop()?;
            let label = self.pop()?;
            pairs.push((label, value));
        }
        pairs.reverse();
        // Re-push as label/value pairs so the native sees the same ABI
        // (top 2*num_args slots are label-then-value) the reference
        // implementation exposes.
        for (label, value) in &pairs {
            self.push(label.clone());
            self.push(value.clone());
        }
        // `take` the binding out so the closure (which needs `&mut Vm`,
        // including `self.natives` itself) isn't borrowed while it runs;
        // `put_back` restores it afterwards.
        let native = self
            .natives
            .take(native_id)
            .ok_or(VmError::UnboundNative(native_id))?;
        let result = native(self, num_args);
        self.natives.put_back(native_id, native);
        let result = result?;
        for _ in 0..(num_args * 2) {
            self.pop()?;
        }
        self.push(result);
        Ok(())
    }

    fn exec_append(&mut self) -> Result<(), VmError> {
        let value = self.pop()?;
        let head = self.pop()?;
        let head = match head {
            Var::Vector(h) => h,
            _ => {
                return Err(VmError::TypeMismatch {
                    op: "APPEND",
                    expected: "Vector",
                    got: head.type_name(),
                })
            }
        };
        let new_head = self
            .heap
            .append(head, value)
            .ok_or(VmError::HeapExhausted { needed: 1 })?;
        self.push(Var::Vector(new_head));
        Ok(())
    }

    fn exec_pile(&mut self, bc: &Bytecode) -> Result<(), VmError> {
        let num = self.int_arg(&bc.arg0, "PILE")?;
        let v = self.pop()?;
        match v {
            Var::Vec2([x, y]) => {
                if num != 2 {
                    return Err(VmError::TypeMismatch {
                        op: "PILE",
                        expected: "2 elements",
                        got: "Vec2 with mismatched count",
                    });
                }
                self.push(Var::Float(x));
                self.push(Var::Float(y));
            }
            Var::Vector(head) => {
                let elems: Vec<Var> = self.heap.iter(head).cloned().collect();
                if elems.len() != num {
                    return Err(VmError::TypeMismatch {
                        op: "PILE",
                        expected: "matching element count",
                        got: "Vector with mismatched count",
                    });
                }
                for e in elems {
                    self.push(e);
                }
            }
            other => {
                return Err(VmError::TypeMismatch {
                    op: "PILE",
                    expected: "Vec2 or Vector",
                    got: other.type_name(),
                })
            }
        }
        Ok(())
    }

    fn exec_arith(&mut self, op: Op) -> Result<(), VmError> {
        let b = self.pop_f32(op.name())?;
        let a = self.pop_f32(op.name())?;
        let r = match op {
            Op::Add => a + b,
            Op::Sub => a - b,
            Op::Mul => a * b,
            Op::Div => {
                if b == 0.0 {
                    return Err(VmError::DivisionByZero);
                }
                a / b
            }
            Op::Mod => {
                if b == 0.0 {
                    return Err(VmError::DivisionByZero);
                }
                a % b
            }
            _ => unreachable!(),
        };
        self.push(Var::Float(r));
        Ok(())
    }

    fn exec_compare(&mut self, op: Op) -> Result<(), VmError> {
        let b = self.pop_f32(op.name())?;
        let a = self.pop_f32(op.name())?;
        let r = match op {
            Op::Eq => a == b,
            Op::Gt => a > b,
            Op::Lt => a < b,
            _ => unreachable!(),
        };
        self.push(Var::Bool(r));
        Ok(())
    }

    fn exec_logic(&mut self, op: Op) -> Result<(), VmError> {
        let b = self.pop()?.is_truthy();
        let a = self.pop()?.is_truthy();
        let r = match op {
            Op::And => a && b,
            Op::Or => a || b,
            _ => unreachable!(),
        };
        self.push(Var::Bool(r));
        Ok(())
    }

    fn pop_f32(&mut self, op: &'static str) -> Result<f32, VmError> {
        let v = self.pop()?;
        v.as_f32().ok_or(VmError::TypeMismatch {
            op,
            expected: "Int or Float",
            got: v.type_name(),
        })
    }

    fn int_arg(&self, a: &Arg, op: &'static str) -> Result<usize, VmError> {
        match a {
            Arg::Int(i) => Ok(*i as usize),
            _ => Err(VmError::TypeMismatch {
                op,
                expected: "Int",
                got: "other",
            }),
        }
    }

    fn name_arg(&self, a: &Arg, op: &'static str) -> Result<IName, VmError> {
        match a {
            Arg::Name(n) => Ok(*n),
            _ => Err(VmError::TypeMismatch {
                op,
                expected: "Name",
                got: "other",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Bytecode, Segment};

    fn vm() -> Vm {
        Vm::new(PrngState::from_seed(1))
    }

    #[test]
    fn literal_vector_compiles_and_runs_to_vec2() {
        let mut p = Program::new();
        p.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Float(1.0)),
        ));
        p.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Float(2.0)),
        ));
        p.emit(Bytecode::simple(Op::Squish2));
        p.emit(Bytecode::simple(Op::Stop));

        let mut m = vm();
        m.run_program(&p).unwrap();
        assert_eq!(m.top(), Some(&Var::Vec2([1.0, 2.0])));
    }

    #[test]
    fn append_builds_a_vector_on_the_heap() {
        let mut p = Program::new();
        p.emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Void), Arg::None));
        for i in 1..=3 {
            p.emit(Bytecode::new(
                Op::Load,
                Arg::Segment(Segment::Constant),
                Arg::Literal(Var::Int(i)),
            ));
            p.emit(Bytecode::simple(Op::Append));
        }
        p.emit(Bytecode::simple(Op::Stop));

        let mut m = vm();
        m.run_program(&p).unwrap();
        match m.top().unwrap() {
            Var::Vector(head) => {
                let elems: Vec<_> = m.heap.iter(*head).cloned().collect();
                assert_eq!(elems, vec![Var::Int(1), Var::Int(2), Var::Int(3)]);
            }
            other => panic!("expected Vector, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_and_comparison() {
        let mut p = Program::new();
        p.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Float(3.0)),
        ));
        p.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Float(4.0)),
        ));
        p.emit(Bytecode::simple(Op::Add));
        p.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Float(7.0)),
        ));
        p.emit(Bytecode::simple(Op::Eq));
        p.emit(Bytecode::simple(Op::Stop));

        let mut m = vm();
        m.run_program(&p).unwrap();
        assert_eq!(m.top(), Some(&Var::Bool(true)));
    }

    #[test]
    fn stack_is_balanced_at_stop() {
        let mut p = Program::new();
        p.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Int(9)),
        ));
        p.emit(Bytecode::simple(Op::Stop));

        let mut m = vm();
        m.run_program(&p).unwrap();
        assert_eq!(m.stack_len(), 1);
        assert_eq!(m.frame_depth(), 0);
    }

    #[test]
    fn division_by_zero_is_fatal() {
        let mut p = Program::new();
        p.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Float(1.0)),
        ));
        p.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Float(0.0)),
        ));
        p.emit(Bytecode::simple(Op::Div));
        p.emit(Bytecode::simple(Op::Stop));

        let mut m = vm();
        assert_eq!(m.run_program(&p), Err(VmError::DivisionByZero));
    }
}
