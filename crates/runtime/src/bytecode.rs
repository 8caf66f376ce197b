//! Bytecode and program layout.

use senie_core::var::Var;
use senie_core::word_table::IName;

pub const MAX_PROGRAM_SIZE: usize = 2048;
pub const MAX_TRAIT_PROGRAM_SIZE: usize = 256;
pub const MAX_TOP_LEVEL_FUNCTIONS: usize = 32;
pub const MAX_NUM_ARGUMENTS: usize = 16;

/// Which memory region an operand addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Argument,
    Local,
    Global,
    Constant,
    Void,
}

/// The full opcode set, names retained from the reference bytecode codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Load,
    Store,
    StoreF,
    Jump,
    JumpIf,
    Call,
    Call0,
    Ret,
    Ret0,
    CallF,
    CallF0,
    Native,
    Append,
    Pile,
    Squish2,
    MtxLoad,
    MtxStore,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Sqrt,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
    Nop,
    Stop,
}

impl Op {
    pub fn name(self) -> &'static str {
        match self {
            Op::Load => "LOAD",
            Op::Store => "STORE",
            Op::StoreF => "STORE_F",
            Op::Jump => "JUMP",
            Op::JumpIf => "JUMP_IF",
            Op::Call => "CALL",
            Op::Call0 => "CALL_0",
            Op::Ret => "RET",
            Op::Ret0 => "RET_0",
            Op::CallF => "CALL_F",
            Op::CallF0 => "CALL_F_0",
            Op::Native => "NATIVE",
            Op::Append => "APPEND",
            Op::Pile => "PILE",
            Op::Squish2 => "SQUISH2",
            Op::MtxLoad => "MTX_LOAD",
            Op::MtxStore => "MTX_STORE",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Mod => "MOD",
            Op::Neg => "NEG",
            Op::Sqrt => "SQRT",
            Op::Eq => "EQ",
            Op::Gt => "GT",
            Op::Lt => "LT",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Not => "NOT",
            Op::Nop => "NOP",
            Op::Stop => "STOP",
        }
    }
}

/// One operand of a [`Bytecode`] instruction: either a segment tag (paired
/// with an immediate slot offset carried in the other operand) or a literal
/// value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Segment(Segment),
    Int(i32),
    Name(IName),
    Literal(Var),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub op: Op,
    pub arg0: Arg,
    pub arg1: Arg,
}

impl Bytecode {
    pub fn new(op: Op, arg0: Arg, arg1: Arg) -> Self {
        Bytecode { op, arg0, arg1 }
    }

    pub fn simple(op: Op) -> Self {
        Bytecode {
            op,
            arg0: Arg::None,
            arg1: Arg::None,
        }
    }
}

/// A registered top-level function: the entry point that populates
/// argument defaults (`arg_address`) and the entry point for the body once
/// all arguments are overridden (`body_address`).
#[derive(Debug, Clone)]
pub struct FnInfo {
    pub index: usize,
    pub fn_name: IName,
    pub arg_address: usize,
    pub body_address: usize,
    pub num_args: usize,
    /// Maps an argument's `IName` to its slot offset within the frame.
    pub argument_offsets: Vec<(IName, usize)>,
}

impl FnInfo {
    pub fn offset_for(&self, iname: IName) -> Option<usize> {
        self.argument_offsets
            .iter()
            .find(|(n, _)| *n == iname)
            .map(|(_, o)| *o)
    }
}

/// A compiled program: flat bytecode plus the top-level function table and
/// compile-time-only name→slot maps (retained for disassembly).
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub code: Vec<Bytecode>,
    pub fn_info: Vec<FnInfo>,
    pub global_mappings: Vec<(IName, usize)>,
    pub local_mappings: Vec<(IName, usize)>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, bc: Bytecode) -> usize {
        self.code.push(bc);
        self.code.len() - 1
    }

    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        for (i, bc) in self.code.iter().enumerate() {
            out.push_str(&format!(
                "{:>4}  {:<10} {:<14} {:<14}\n",
                i,
                bc.op.name(),
                fmt_arg(&bc.arg0),
                fmt_arg(&bc.arg1)
            ));
        }
        out
    }
}

fn fmt_arg(a: &Arg) -> String {
    match a {
        Arg::Segment(s) => format!("{:?}", s),
        Arg::Int(i) => i.to_string(),
        Arg::Name(n) => format!("name({n})"),
        Arg::Literal(v) => format!("{:?}", v),
        Arg::None => String::new(),
    }
}
