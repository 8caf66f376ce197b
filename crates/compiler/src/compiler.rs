//! AST → bytecode compiler: main-program compilation, trait-program
//! compilation, and compile-with-genotype substitution all share this
//! walker; only preamble bindings and the alterable-node handling differ.

use crate::bootstrap::{Builtins, Natives, GEN_INITIAL_VALUE_SLOT, PREAMBLE_RESERVED_GLOBALS, USE_VARY_SLOT};
use crate::error::CompileError;
use crate::genetic::GenotypeCursor;
use senie_core::ast::{Ast, NodeId, NodeType};
use senie_core::var::Var;
use senie_core::word_table::{IName, NATIVE_START, MAX_NATIVE_LOOKUPS};
use senie_runtime::bytecode::{Arg, Bytecode, FnInfo, Op, Program, Segment};
use std::collections::HashMap;
use tracing::warn;

use senie_runtime::bytecode::{MAX_NUM_ARGUMENTS, MAX_TOP_LEVEL_FUNCTIONS};

struct FnScope {
    fn_index: usize,
    arg_names: Vec<IName>,
    local_slots: HashMap<IName, usize>,
    next_local: usize,
}

/// Drives one compile pass over an [`Ast`]. A fresh `Compiler` is built per
/// program (main compile, trait compile, or compile-with-genotype); none of
/// its state is meant to be reused across calls to `compile_main`.
pub struct Compiler<'a> {
    ast: &'a Ast,
    builtins: &'a Builtins,
    program: Program,
    functions: HashMap<IName, usize>,
    global_slots: HashMap<IName, usize>,
    next_global: usize,
    scope: Option<FnScope>,
    genotype: Option<GenotypeCursor<'a>>,
}

impl<'a> Compiler<'a> {
    pub fn new(ast: &'a Ast, builtins: &'a Builtins) -> Self {
        Compiler {
            ast,
            builtins,
            program: Program::new(),
            functions: HashMap::new(),
            global_slots: HashMap::new(),
            next_global: PREAMBLE_RESERVED_GLOBALS,
            scope: None,
            genotype: None,
        }
    }

    pub fn with_genotype(ast: &'a Ast, builtins: &'a Builtins, genotype: GenotypeCursor<'a>) -> Self {
        let mut c = Self::new(ast, builtins);
        c.genotype = Some(genotype);
        c
    }

    /// Compiles every top-level form in source order, discarding the value
    /// of every statement but the last (via `STORE VOID`), then emits
    /// `STOP`.
    pub fn compile_main(mut self) -> Result<Program, CompileError> {
        let top = self.ast.top_level.clone();
        self.compile_statement_sequence(&top)?;
        self.program.emit(Bytecode::simple(Op::Stop));
        Ok(self.program)
    }

    fn compile_statement_sequence(&mut self, nodes: &[NodeId]) -> Result<(), CompileError> {
        let forms: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|id| !self.is_trivia(*id))
            .collect();
        for (i, id) in forms.iter().enumerate() {
            let produced_value = self.compile_form(*id)?;
            if produced_value && i + 1 != forms.len() {
                self.program
                    .emit(Bytecode::new(Op::Store, Arg::Segment(Segment::Void), Arg::None));
            }
        }
        Ok(())
    }

    fn is_trivia(&self, id: NodeId) -> bool {
        matches!(self.ast.get(id).node_type, NodeType::Whitespace | NodeType::Comment)
    }

    fn non_trivia_children(&self, id: NodeId) -> Vec<NodeId> {
        self.ast
            .children(id)
            .iter()
            .copied()
            .filter(|c| !self.is_trivia(*c))
            .collect()
    }

    /// Compiles one top-level-or-body form. Returns whether it left a value
    /// on the stack (definitions do not).
    fn compile_form(&mut self, id: NodeId) -> Result<bool, CompileError> {
        if let NodeType::List(children) = &self.ast.get(id).node_type {
            let children = children.clone();
            let parts = self.non_trivia_children_of(&children);
            if let Some(&head) = parts.first() {
                if let NodeType::Name(name) = self.ast.get(head).node_type {
                    if name == self.builtins.fn_ {
                        self.compile_fn_def(&parts[1..])?;
                        return Ok(false);
                    }
                    if name == self.builtins.define {
                        self.compile_define(&parts[1..])?;
                        return Ok(false);
                    }
                }
            }
        }
        self.compile_expr(id)?;
        Ok(true)
    }

    fn non_trivia_children_of(&self, children: &[NodeId]) -> Vec<NodeId> {
        children.iter().copied().filter(|c| !self.is_trivia(*c)).collect()
    }

    fn compile_expr(&mut self, id: NodeId) -> Result<(), CompileError> {
        let node = self.ast.get(id);
        let alterable = node.alterable;
        let node_type = node.node_type.clone();

        if alterable {
            if let NodeType::Vector(children) = &node_type {
                // An alterable vector is one trait per child (`add_multiple_traits`
                // in the original), not one trait for the whole vector; see
                // `DESIGN.md`. Only substitutes when a genotype is active —
                // otherwise this compiles as an ordinary vector literal below.
                if self.genotype.is_some() {
                    return self.compile_genotype_vector(children);
                }
            } else if let Some(cursor) = self.genotype.as_mut() {
                let gene = cursor.next().unwrap_or(Var::Int(0));
                self.program.emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Constant), Arg::Literal(gene)));
                return Ok(());
            }
        }

        match node_type {
            NodeType::Int(i) => {
                self.program.emit(Bytecode::new(
                    Op::Load,
                    Arg::Segment(Segment::Constant),
                    Arg::Literal(Var::Int(i)),
                ));
            }
            NodeType::Float(f) => {
                self.program.emit(Bytecode::new(
                    Op::Load,
                    Arg::Segment(Segment::Constant),
                    Arg::Literal(Var::Float(f)),
                ));
            }
            NodeType::Name(name) => self.resolve_name(name),
            NodeType::String(name) | NodeType::Label(name) => {
                self.program.emit(Bytecode::new(
                    Op::Load,
                    Arg::Segment(Segment::Constant),
                    Arg::Literal(Var::Name(name)),
                ));
            }
            NodeType::List(children) => self.compile_list(id, &children)?,
            NodeType::Vector(children) => self.compile_vector(&children)?,
            NodeType::Whitespace | NodeType::Comment => {}
        }
        Ok(())
    }

    /// Pulls one gene per (non-trivia) child of an alterable vector,
    /// building the vector from those genes with the same `Squish2`-or-
    /// `Append` shape `compile_vector` uses for an ordinary literal.
    fn compile_genotype_vector(&mut self, children: &[NodeId]) -> Result<(), CompileError> {
        let parts = self.non_trivia_children_of(children);
        if parts.len() == 2 {
            let a = self.next_gene();
            let b = self.next_gene();
            self.program.emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Constant), Arg::Literal(a)));
            self.program.emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Constant), Arg::Literal(b)));
            self.program.emit(Bytecode::simple(Op::Squish2));
            return Ok(());
        }
        self.program.emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Void), Arg::None));
        for _ in &parts {
            let v = self.next_gene();
            self.program.emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Constant), Arg::Literal(v)));
            self.program.emit(Bytecode::simple(Op::Append));
        }
        Ok(())
    }

    fn next_gene(&mut self) -> Var {
        self.genotype
            .as_mut()
            .expect("caller checked a genotype cursor is active")
            .next()
            .unwrap_or(Var::Int(0))
    }

    fn resolve_name(&mut self, name: IName) {
        if let Some(scope) = &self.scope {
            if scope.arg_names.contains(&name) {
                self.program
                    .emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Argument), Arg::Name(name)));
                return;
            }
            if let Some(&slot) = scope.local_slots.get(&name) {
                self.program
                    .emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Local), Arg::Int(slot as i32)));
                return;
            }
        }
        if let Some(&slot) = self.global_slots.get(&name) {
            self.program
                .emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Global), Arg::Int(slot as i32)));
            return;
        }
        self.program.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Name(name)),
        ));
    }

    fn compile_list(&mut self, id: NodeId, children: &[NodeId]) -> Result<(), CompileError> {
        let parts = self.non_trivia_children_of(children);
        let Some(&head) = parts.first() else {
            self.program
                .emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Void), Arg::None));
            return Ok(());
        };
        if let NodeType::Name(name) = self.ast.get(head).node_type {
            if name == self.builtins.quote {
                return self.compile_quote(&parts[1..]);
            }
            if name == self.builtins.if_ {
                return self.compile_if(&parts[1..]);
            }
            if let Some(op) = self.binary_op(name) {
                self.compile_expr(parts[1])?;
                self.compile_expr(parts[2])?;
                self.program.emit(Bytecode::simple(op));
                return Ok(());
            }
            if let Some(op) = self.unary_op(name) {
                self.compile_expr(parts[1])?;
                self.program.emit(Bytecode::simple(op));
                return Ok(());
            }
            if name == self.builtins.fn_ || name == self.builtins.define {
                warn!(node_id = id.0, "fn/define used in expression position, ignored");
                self.program
                    .emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Void), Arg::None));
                return Ok(());
            }
            return self.compile_call(name, &parts[1..]);
        }
        // A list whose head isn't a bare name (e.g. starts with a literal):
        // compile each element and build a vector from them.
        self.program
            .emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Void), Arg::None));
        for &child in &parts {
            self.compile_expr(child)?;
            self.program.emit(Bytecode::simple(Op::Append));
        }
        Ok(())
    }

    fn binary_op(&self, name: IName) -> Option<Op> {
        let b = self.builtins;
        Some(match name {
            n if n == b.add => Op::Add,
            n if n == b.sub => Op::Sub,
            n if n == b.mul => Op::Mul,
            n if n == b.div => Op::Div,
            n if n == b.modulo => Op::Mod,
            n if n == b.eq => Op::Eq,
            n if n == b.gt => Op::Gt,
            n if n == b.lt => Op::Lt,
            n if n == b.and_ => Op::And,
            n if n == b.or_ => Op::Or,
            _ => return None,
        })
    }

    fn unary_op(&self, name: IName) -> Option<Op> {
        let b = self.builtins;
        Some(match name {
            n if n == b.not_ => Op::Not,
            n if n == b.neg => Op::Neg,
            n if n == b.sqrt => Op::Sqrt,
            _ => return None,
        })
    }

    fn compile_quote(&mut self, parts: &[NodeId]) -> Result<(), CompileError> {
        match parts.first().map(|id| self.ast.get(*id).node_type.clone()) {
            Some(NodeType::Name(n)) => {
                self.program.emit(Bytecode::new(
                    Op::Load,
                    Arg::Segment(Segment::Constant),
                    Arg::Literal(Var::Name(n)),
                ));
                Ok(())
            }
            _ => Err(CompileError::UnsupportedAlterableLiteral("quoted non-name form")),
        }
    }

    fn compile_if(&mut self, parts: &[NodeId]) -> Result<(), CompileError> {
        if parts.len() < 2 {
            return Err(CompileError::MalformedIf);
        }
        self.compile_expr(parts[0])?;
        let jump_if_idx = self
            .program
            .emit(Bytecode::new(Op::JumpIf, Arg::Int(0), Arg::None));
        self.compile_expr(parts[1])?;
        let jump_end_idx = self.program.emit(Bytecode::new(Op::Jump, Arg::Int(0), Arg::None));
        let else_addr = self.program.code.len();
        if let Some(&else_id) = parts.get(2) {
            self.compile_expr(else_id)?;
        } else {
            self.program
                .emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Void), Arg::None));
        }
        let end_addr = self.program.code.len();
        self.patch_jump(jump_if_idx, else_addr);
        self.patch_jump(jump_end_idx, end_addr);
        Ok(())
    }

    fn patch_jump(&mut self, idx: usize, target: usize) {
        let delta = target as i32 - idx as i32;
        self.program.code[idx].arg0 = Arg::Int(delta);
    }

    fn compile_vector(&mut self, children: &[NodeId]) -> Result<(), CompileError> {
        let parts = self.non_trivia_children_of(children);
        let numeric: Vec<NodeId> = parts
            .iter()
            .copied()
            .filter(|id| matches!(self.ast.get(*id).node_type, NodeType::Int(_) | NodeType::Float(_)))
            .collect();
        if parts.len() == 2 && numeric.len() == 2 {
            self.compile_expr(parts[0])?;
            self.compile_expr(parts[1])?;
            self.program.emit(Bytecode::simple(Op::Squish2));
            return Ok(());
        }
        self.program
            .emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Void), Arg::None));
        for &child in &parts {
            self.compile_expr(child)?;
            self.program.emit(Bytecode::simple(Op::Append));
        }
        Ok(())
    }

    /// Call-site protocol: push `(Name(label), value)` pairs then `CALL`
    /// (user function) or `NATIVE` (host binding). `STORE_F` is reserved for
    /// a function's own `arg_address` block — see `compile_fn_def`.
    fn compile_call(&mut self, name: IName, arg_parts: &[NodeId]) -> Result<(), CompileError> {
        let pairs = self.label_value_pairs(arg_parts)?;
        if let Some(&fn_index) = self.functions.get(&name) {
            for (label, value) in &pairs {
                self.program.emit(Bytecode::new(
                    Op::Load,
                    Arg::Segment(Segment::Constant),
                    Arg::Literal(Var::Name(*label)),
                ));
                self.compile_expr(*value)?;
            }
            self.program.emit(Bytecode::new(
                Op::Call,
                Arg::Int(fn_index as i32),
                Arg::Int(pairs.len() as i32),
            ));
            return Ok(());
        }
        if name >= NATIVE_START && name < NATIVE_START + MAX_NATIVE_LOOKUPS as i32 {
            for (label, value) in &pairs {
                self.program.emit(Bytecode::new(
                    Op::Load,
                    Arg::Segment(Segment::Constant),
                    Arg::Literal(Var::Name(*label)),
                ));
                self.compile_expr(*value)?;
            }
            self.program.emit(Bytecode::new(
                Op::Native,
                Arg::Int(name),
                Arg::Int(pairs.len() as i32),
            ));
            return Ok(());
        }
        Err(CompileError::UnknownFunction(format!("{name}")))
    }

    /// Every call-site argument must be `label: value`; this language has
    /// no positional-argument call syntax.
    fn label_value_pairs(&self, parts: &[NodeId]) -> Result<Vec<(IName, NodeId)>, CompileError> {
        let mut pairs = Vec::new();
        let mut i = 0;
        while i < parts.len() {
            match self.ast.get(parts[i]).node_type {
                NodeType::Label(label) => {
                    let value = *parts.get(i + 1).ok_or(CompileError::UnlabeledCallArgument)?;
                    pairs.push((label, value));
                    i += 2;
                }
                _ => return Err(CompileError::UnlabeledCallArgument),
            }
        }
        Ok(pairs)
    }

    fn compile_fn_def(&mut self, parts: &[NodeId]) -> Result<(), CompileError> {
        let sig_id = *parts.first().ok_or(CompileError::MalformedFnDef)?;
        let sig = self.non_trivia_children(sig_id);
        let fn_name = match self.ast.get(*sig.first().ok_or(CompileError::MalformedFnDef)?).node_type {
            NodeType::Name(n) => n,
            _ => return Err(CompileError::MalformedFnDef),
        };
        if self.program.fn_info.len() >= MAX_TOP_LEVEL_FUNCTIONS {
            return Err(CompileError::TooManyFunctions {
                max: MAX_TOP_LEVEL_FUNCTIONS,
            });
        }
        let fn_index = self.program.fn_info.len();
        self.functions.insert(fn_name, fn_index);

        let mut arg_defaults = Vec::new();
        let mut i = 1;
        while i < sig.len() {
            match self.ast.get(sig[i]).node_type {
                NodeType::Label(argname) => {
                    let default = *sig.get(i + 1).ok_or(CompileError::MalformedFnDef)?;
                    arg_defaults.push((argname, default));
                    i += 2;
                }
                _ => i += 1,
            }
        }
        if arg_defaults.len() > MAX_NUM_ARGUMENTS {
            return Err(CompileError::TooManyArguments {
                max: MAX_NUM_ARGUMENTS,
            });
        }

        let skip_idx = self.program.emit(Bytecode::new(Op::Jump, Arg::Int(0), Arg::None));
        let arg_address = self.program.code.len();

        self.scope = Some(FnScope {
            fn_index,
            arg_names: arg_defaults.iter().map(|(n, _)| *n).collect(),
            local_slots: HashMap::new(),
            next_local: 0,
        });

        let mut argument_offsets = Vec::with_capacity(arg_defaults.len());
        for (offset, (argname, default_id)) in arg_defaults.iter().enumerate() {
            argument_offsets.push((*argname, offset));
            self.compile_expr(*default_id)?;
            self.program.emit(Bytecode::new(
                Op::StoreF,
                Arg::Int(fn_index as i32),
                Arg::Name(*argname),
            ));
        }
        self.program.emit(Bytecode::simple(Op::Call0));
        let body_address = self.program.code.len();
        self.compile_statement_sequence(&parts[1..])?;
        self.program.emit(Bytecode::simple(Op::Ret));

        self.scope = None;
        let end_addr = self.program.code.len();
        self.patch_jump(skip_idx, end_addr);

        self.program.fn_info.push(FnInfo {
            index: fn_index,
            fn_name,
            arg_address,
            body_address,
            num_args: arg_defaults.len(),
            argument_offsets,
        });
        Ok(())
    }

    fn compile_define(&mut self, parts: &[NodeId]) -> Result<(), CompileError> {
        let name_id = *parts.first().ok_or(CompileError::MalformedDefine)?;
        let value_id = *parts.get(1).ok_or(CompileError::MalformedDefine)?;
        let name = match self.ast.get(name_id).node_type {
            NodeType::Name(n) => n,
            _ => return Err(CompileError::MalformedDefine),
        };
        self.compile_expr(value_id)?;
        if let Some(scope) = &mut self.scope {
            let slot = *scope.local_slots.entry(name).or_insert_with(|| {
                let s = scope.next_local;
                scope.next_local += 1;
                s
            });
            self.program
                .emit(Bytecode::new(Op::Store, Arg::Segment(Segment::Local), Arg::Int(slot as i32)));
        } else {
            let slot = *self.global_slots.entry(name).or_insert_with(|| {
                let s = self.next_global;
                self.next_global += 1;
                s
            });
            self.program
                .emit(Bytecode::new(Op::Store, Arg::Segment(Segment::Global), Arg::Int(slot as i32)));
        }
        Ok(())
    }
}

/// Compiles the trait program for one alterable node: binds the reserved
/// `gen/initial-value`/`USE_VARY` globals, then compiles the node's
/// `parameter_ast` as a statement sequence whose last value is the gene.
pub fn compile_trait_program(
    ast: &Ast,
    builtins: &Builtins,
    node_id: NodeId,
    initial_value: Var,
    vary: bool,
) -> Result<Program, CompileError> {
    let mut c = Compiler::new(ast, builtins);
    c.program.emit(Bytecode::new(
        Op::Load,
        Arg::Segment(Segment::Constant),
        Arg::Literal(initial_value),
    ));
    c.program.emit(Bytecode::new(
        Op::Store,
        Arg::Segment(Segment::Global),
        Arg::Int(GEN_INITIAL_VALUE_SLOT as i32),
    ));
    c.program.emit(Bytecode::new(
        Op::Load,
        Arg::Segment(Segment::Constant),
        Arg::Literal(Var::Bool(vary)),
    ));
    c.program.emit(Bytecode::new(
        Op::Store,
        Arg::Segment(Segment::Global),
        Arg::Int(USE_VARY_SLOT as i32),
    ));

    let node = ast.get(node_id);
    if node.parameter_ast.is_empty() {
        c.program.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Global),
            Arg::Int(GEN_INITIAL_VALUE_SLOT as i32),
        ));
    } else {
        let trailer = node.parameter_ast.clone();
        c.compile_statement_sequence(&trailer)?;
    }
    c.program.emit(Bytecode::simple(Op::Stop));
    Ok(c.program)
}

/// Recognizes the small set of literal shapes the source's
/// `hack_node_to_var`/`super_hacky_colour_parser` understood: plain
/// numbers, a two-element numeric vector, and the four colour-constructor
/// natives. Anything else is `CompileError::UnsupportedAlterableLiteral`
/// per the Open Question decision recorded in `DESIGN.md`.
pub fn node_literal_to_var(ast: &Ast, natives: &Natives, node_id: NodeId) -> Result<Var, CompileError> {
    let node = ast.get(node_id);
    match &node.node_type {
        NodeType::Int(i) => Ok(Var::Int(*i)),
        NodeType::Float(f) => Ok(Var::Float(*f)),
        NodeType::Vector(children) => {
            let parts: Vec<NodeId> = children
                .iter()
                .copied()
                .filter(|c| !matches!(ast.get(*c).node_type, NodeType::Whitespace | NodeType::Comment))
                .collect();
            if parts.len() != 2 {
                return Err(CompileError::UnsupportedAlterableLiteral("vector with != 2 elements"));
            }
            let a = scalar(ast, parts[0])?;
            let b = scalar(ast, parts[1])?;
            Ok(Var::Vec2([a, b]))
        }
        NodeType::List(children) => {
            let parts: Vec<NodeId> = children
                .iter()
                .copied()
                .filter(|c| !matches!(ast.get(*c).node_type, NodeType::Whitespace | NodeType::Comment))
                .collect();
            let head = *parts.first().ok_or(CompileError::UnsupportedAlterableLiteral("empty list"))?;
            let format = match ast.get(head).node_type {
                NodeType::Name(n) if n == natives.col_rgb => senie_core::var::ColourFormat::Rgb,
                NodeType::Name(n) if n == natives.col_hsl => senie_core::var::ColourFormat::Hsl,
                NodeType::Name(n) if n == natives.col_lab => senie_core::var::ColourFormat::Lab,
                NodeType::Name(n) if n == natives.col_hsv => senie_core::var::ColourFormat::Hsv,
                _ => return Err(CompileError::UnsupportedAlterableLiteral("non-colour list literal")),
            };
            let mut values = Vec::with_capacity(4);
            let mut i = 1;
            while i < parts.len() && values.len() < 4 {
                if matches!(ast.get(parts[i]).node_type, NodeType::Label(_)) {
                    if let Some(&v) = parts.get(i + 1) {
                        values.push(scalar(ast, v)?);
                    }
                    i += 2;
                } else {
                    i += 1;
                }
            }
            while values.len() < 4 {
                values.push(0.0);
            }
            Ok(Var::Colour(format, [values[0], values[1], values[2], values[3]]))
        }
        other => Err(CompileError::UnsupportedAlterableLiteral(other.type_name())),
    }
}

fn scalar(ast: &Ast, id: NodeId) -> Result<f32, CompileError> {
    match ast.get(id).node_type {
        NodeType::Int(i) => Ok(i as f32),
        NodeType::Float(f) => Ok(f),
        _ => Err(CompileError::UnsupportedAlterableLiteral("non-numeric component")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use senie_core::word_table::WordTable;

    fn compile_src(src: &str) -> Program {
        let mut words = WordTable::new();
        let builtins = Builtins::declare(&mut words).unwrap();
        Natives::declare(&mut words).unwrap();
        let ast = parse(src, &mut words).unwrap();
        Compiler::new(&ast, &builtins).compile_main().unwrap()
    }

    #[test]
    fn literal_vector_compiles_to_squish2() {
        let p = compile_src("[1 2]");
        let ops: Vec<_> = p.code.iter().map(|bc| bc.op).collect();
        assert!(ops.contains(&Op::Squish2));
        assert_eq!(*ops.last().unwrap(), Op::Stop);
    }

    #[test]
    fn if_emits_two_branch_patches() {
        let p = compile_src("(if 1 2 3)");
        assert!(p.code.iter().any(|bc| bc.op == Op::JumpIf));
        assert!(p.code.iter().any(|bc| bc.op == Op::Jump));
    }

    #[test]
    fn fn_definition_registers_fn_info() {
        let p = compile_src("(fn (double x: 1) (* x 2))");
        assert_eq!(p.fn_info.len(), 1);
        assert_eq!(p.fn_info[0].num_args, 1);
    }

    #[test]
    fn native_call_emits_native_opcode() {
        let p = compile_src("(rect width: 10 height: 20)");
        assert!(p.code.iter().any(|bc| bc.op == Op::Native));
    }

    #[test]
    fn unknown_function_is_a_compile_error() {
        let mut words = WordTable::new();
        let builtins = Builtins::declare(&mut words).unwrap();
        Natives::declare(&mut words).unwrap();
        let ast = parse("(totally-unknown-thing a: 1)", &mut words).unwrap();
        let err = Compiler::new(&ast, &builtins).compile_main().unwrap_err();
        assert!(matches!(err, CompileError::UnknownFunction(_)));
    }
}
