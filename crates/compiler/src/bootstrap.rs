//! Fixed keyword/native vocabulary declared once before parsing begins.
//!
//! Declaring these first means the parser's `intern_user_word` calls find
//! them already present (natives/keywords shadow user words), so the
//! compiler can dispatch on `IName` equality rather than string comparison.

use senie_core::error::WordTableError;
use senie_core::var::{ColourFormat, Var};
use senie_core::word_table::{IName, WordTable, NOT_FOUND};
use senie_runtime::vm::Vm;

/// Reserved global slots the preamble and trait-program compiler write to
/// before any user code runs.
pub const GEN_INITIAL_VALUE_SLOT: usize = 0;
pub const USE_VARY_SLOT: usize = 1;
pub const CANVAS_WIDTH_SLOT: usize = 2;
pub const CANVAS_HEIGHT_SLOT: usize = 3;
pub const PREAMBLE_RESERVED_GLOBALS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub quote: IName,
    pub if_: IName,
    pub fn_: IName,
    pub define: IName,
    pub add: IName,
    pub sub: IName,
    pub mul: IName,
    pub div: IName,
    pub modulo: IName,
    pub eq: IName,
    pub gt: IName,
    pub lt: IName,
    pub and_: IName,
    pub or_: IName,
    pub not_: IName,
    pub neg: IName,
    pub sqrt: IName,
    pub gen_initial_value: IName,
    pub use_vary: IName,
}

impl Builtins {
    pub fn declare(words: &mut WordTable) -> Result<Self, WordTableError> {
        Ok(Builtins {
            quote: words.declare_keyword("quote")?,
            if_: words.declare_keyword("if")?,
            fn_: words.declare_keyword("fn")?,
            define: words.declare_keyword("define")?,
            add: words.declare_keyword("+")?,
            sub: words.declare_keyword("-")?,
            mul: words.declare_keyword("*")?,
            div: words.declare_keyword("/")?,
            modulo: words.declare_keyword("%")?,
            eq: words.declare_keyword("=")?,
            gt: words.declare_keyword(">")?,
            lt: words.declare_keyword("<")?,
            and_: words.declare_keyword("and")?,
            or_: words.declare_keyword("or")?,
            not_: words.declare_keyword("not")?,
            neg: words.declare_keyword("neg")?,
            sqrt: words.declare_keyword("sqrt")?,
            gen_initial_value: words.declare_keyword("gen/initial-value")?,
            use_vary: words.declare_keyword("USE_VARY")?,
        })
    }
}

/// A representative generative-art native vocabulary: shape emission,
/// colour construction, and the randomized generators trait programs call.
/// The rendering/colour-space math behind these is a host responsibility
/// (out of scope); only their calling convention matters here.
#[derive(Debug, Clone, Copy)]
pub struct Natives {
    pub rect: IName,
    pub line: IName,
    pub col_rgb: IName,
    pub col_hsl: IName,
    pub col_lab: IName,
    pub col_hsv: IName,
    pub gen_scalar: IName,
    pub gen_2d: IName,
    pub gen_select: IName,
}

impl Natives {
    pub fn declare(words: &mut WordTable) -> Result<Self, WordTableError> {
        Ok(Natives {
            rect: words.declare_native("rect")?,
            line: words.declare_native("line")?,
            col_rgb: words.declare_native("col/rgb")?,
            col_hsl: words.declare_native("col/hsl")?,
            col_lab: words.declare_native("col/lab")?,
            col_hsv: words.declare_native("col/hsv")?,
            gen_scalar: words.declare_native("gen/scalar")?,
            gen_2d: words.declare_native("gen/2d")?,
            gen_select: words.declare_native("gen/select")?,
        })
    }
}

/// Registers the rendering-backend natives (`rect`, `line`, `col/*`) into
/// `vm`'s native table. The colour-space math and shape tessellation these
/// stand in for are a host responsibility (out of scope); these bindings
/// only need to read their typed, labeled arguments off the stack and
/// append vertices to `vm.render_target` the way the spec's host-binding
/// surface describes. `words` must be the table the source was parsed
/// with, so the labels below resolve to the `IName`s call sites wrote.
///
/// Call this (alongside [`crate::genetic::register_generator_natives`])
/// before running any program that isn't a trait program — a trait
/// program's scratch VM only ever needs the generator natives.
pub fn register_render_natives(vm: &mut Vm, natives: &Natives, words: &WordTable) {
    let position = words.lookup("position").unwrap_or(NOT_FOUND);
    let width = words.lookup("width").unwrap_or(NOT_FOUND);
    let height = words.lookup("height").unwrap_or(NOT_FOUND);
    let from = words.lookup("from").unwrap_or(NOT_FOUND);
    let to = words.lookup("to").unwrap_or(NOT_FOUND);
    let colour = words.lookup("colour").unwrap_or(NOT_FOUND);
    let r = words.lookup("r").unwrap_or(NOT_FOUND);
    let g = words.lookup("g").unwrap_or(NOT_FOUND);
    let b = words.lookup("b").unwrap_or(NOT_FOUND);
    let alpha = words.lookup("alpha").unwrap_or(NOT_FOUND);

    vm.natives.register(
        natives.rect,
        Box::new(move |vm, num_args| {
            let (cx, cy) = match vm.native_arg(num_args, position) {
                Some(Var::Vec2([x, y])) => (*x, *y),
                _ => (0.0, 0.0),
            };
            let w = vm.native_arg(num_args, width).and_then(Var::as_f32).unwrap_or(0.0);
            let h = vm.native_arg(num_args, height).and_then(Var::as_f32).unwrap_or(0.0);
            let rgba = match vm.native_arg(num_args, colour) {
                Some(Var::Colour(_, c)) => *c,
                _ => [1.0, 1.0, 1.0, 1.0],
            };
            let (hw, hh) = (w / 2.0, h / 2.0);
            for xy in [
                [cx - hw, cy - hh],
                [cx + hw, cy - hh],
                [cx + hw, cy + hh],
                [cx - hw, cy - hh],
                [cx + hw, cy + hh],
                [cx - hw, cy + hh],
            ] {
                vm.render_target.push_vertex(xy, rgba, [0.0, 0.0]);
            }
            Ok(Var::Bool(true))
        }),
    );

    vm.natives.register(
        natives.line,
        Box::new(move |vm, num_args| {
            let p0 = match vm.native_arg(num_args, from) {
                Some(Var::Vec2(p)) => *p,
                _ => [0.0, 0.0],
            };
            let p1 = match vm.native_arg(num_args, to) {
                Some(Var::Vec2(p)) => *p,
                _ => [0.0, 0.0],
            };
            let rgba = match vm.native_arg(num_args, colour) {
                Some(Var::Colour(_, c)) => *c,
                _ => [1.0, 1.0, 1.0, 1.0],
            };
            vm.render_target.push_vertex(p0, rgba, [0.0, 0.0]);
            vm.render_target.push_vertex(p1, rgba, [0.0, 0.0]);
            Ok(Var::Bool(true))
        }),
    );

    let colour_reader = move |format: ColourFormat| {
        move |vm: &mut Vm, num_args: usize| {
            let rr = vm.native_arg(num_args, r).and_then(Var::as_f32).unwrap_or(0.0);
            let gg = vm.native_arg(num_args, g).and_then(Var::as_f32).unwrap_or(0.0);
            let bb = vm.native_arg(num_args, b).and_then(Var::as_f32).unwrap_or(0.0);
            let aa = vm.native_arg(num_args, alpha).and_then(Var::as_f32).unwrap_or(1.0);
            Ok(Var::Colour(format, [rr, gg, bb, aa]))
        }
    };
    vm.natives.register(natives.col_rgb, Box::new(colour_reader(ColourFormat::Rgb)));
    vm.natives.register(natives.col_hsl, Box::new(colour_reader(ColourFormat::Hsl)));
    vm.natives.register(natives.col_lab, Box::new(colour_reader(ColourFormat::Lab)));
    vm.natives.register(natives.col_hsv, Box::new(colour_reader(ColourFormat::Hsv)));
}
