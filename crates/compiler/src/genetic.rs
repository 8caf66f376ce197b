//! Trait extraction and genotype population management.
//!
//! A [`Trait`] pairs an alterable node's authored value with a small
//! program that recomputes it; a [`Genotype`] is one concrete value per
//! trait. Traits and genotypes line up positionally — both are built by
//! walking the AST in the same pre-order, left-to-right traversal.

use crate::bootstrap::{Builtins, Natives};
use crate::compiler::{compile_trait_program, node_literal_to_var};
use crate::error::CompileError;
use senie_core::ast::{Ast, NodeId, NodeType};
use senie_core::var::Var;
use senie_core::word_table::{WordTable, NOT_FOUND};
use senie_runtime::bytecode::Program;
use senie_runtime::error::VmError;
use senie_runtime::prng::{Prng, PrngState};
use senie_runtime::vm::Vm;

/// Registers the generator natives (`gen/scalar`, `gen/2d`, `gen/select`)
/// trait programs call into `vm`'s native table. These are the engine's own
/// randomness primitives, not the out-of-scope rendering backend — without
/// them every trait program compiled by `compile_trait_program` fails at
/// its first `NATIVE` opcode with `VmError::UnboundNative`.
///
/// `words` must be the same table the source was parsed with, so the
/// `min`/`max`/`options` argument labels resolve to the `IName`s the call
/// sites actually wrote; a label never used anywhere in the source looks up
/// as [`NOT_FOUND`], which simply never matches a provided argument.
pub fn register_generator_natives(vm: &mut Vm, natives: &Natives, words: &WordTable) {
    let min = words.lookup("min").unwrap_or(NOT_FOUND);
    let max = words.lookup("max").unwrap_or(NOT_FOUND);
    let options = words.lookup("options").unwrap_or(NOT_FOUND);

    vm.natives.register(
        natives.gen_scalar,
        Box::new(move |vm, num_args| {
            let lo = vm.native_arg(num_args, min).and_then(Var::as_f32).unwrap_or(0.0);
            let hi = vm.native_arg(num_args, max).and_then(Var::as_f32).unwrap_or(1.0);
            Ok(Var::Float(vm.prng.f32_range(lo, hi)))
        }),
    );

    vm.natives.register(
        natives.gen_2d,
        Box::new(move |vm, num_args| {
            let lo = vm.native_arg(num_args, min).and_then(Var::as_f32).unwrap_or(0.0);
            let hi = vm.native_arg(num_args, max).and_then(Var::as_f32).unwrap_or(1.0);
            let x = vm.prng.f32_range(lo, hi);
            let y = vm.prng.f32_range(lo, hi);
            Ok(Var::Vec2([x, y]))
        }),
    );

    vm.natives.register(
        natives.gen_select,
        Box::new(move |vm, num_args| {
            let head = match vm.native_arg(num_args, options) {
                Some(Var::Vector(h)) => *h,
                _ => None,
            };
            let items: Vec<Var> = head.map(|h| vm.heap.iter(Some(h)).cloned().collect()).unwrap_or_default();
            if items.is_empty() {
                return Ok(Var::Int(0));
            }
            let idx = vm.prng.i32_range(0, items.len() as i32) as usize;
            Ok(items[idx].clone())
        }),
    );
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trait {
    pub id: i32,
    pub initial_value: Var,
    pub program: Program,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitList {
    pub seed_value: i32,
    pub traits: Vec<Trait>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gene {
    pub var: Var,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Genotype {
    pub genes: Vec<Gene>,
}

#[derive(Debug, Clone, Default)]
pub struct GenotypeList {
    pub genotypes: Vec<Genotype>,
}

/// Pulls genes off a genotype in traversal order as `compile_with_genotype`
/// walks the AST; every alterable node, whatever its own shape, consumes
/// exactly one gene, matching the trait-extraction traversal rule.
pub struct GenotypeCursor<'a> {
    genes: &'a [Gene],
    next: usize,
}

impl<'a> GenotypeCursor<'a> {
    pub fn new(genotype: &'a Genotype) -> Self {
        GenotypeCursor {
            genes: &genotype.genes,
            next: 0,
        }
    }

    pub fn next(&mut self) -> Option<Var> {
        let v = self.genes.get(self.next)?.var.clone();
        self.next += 1;
        Some(v)
    }

    pub fn exhausted(&self) -> bool {
        self.next >= self.genes.len()
    }
}

/// One trait-to-be: `initial_value_node` supplies the trait's authored
/// value (via `node_literal_to_var`), `program_node` supplies the trailing
/// trait program to compile (via its `parameter_ast`).
///
/// These differ for a vector-shaped alterable node: the original's
/// `add_multiple_traits` (`genetic.c`) produces one trait per child of the
/// vector, each keyed off that child's own value, but all of them compiled
/// against the *same* shared `parameter_ast` hanging off the vector as a
/// whole — not one trait for the vector itself. A non-vector alterable
/// node is the degenerate case where both fields are the same node.
struct TraitSite {
    initial_value_node: NodeId,
    program_node: NodeId,
}

/// Walks the AST in pre-order, collecting one [`TraitSite`] per trait in
/// the same order `compile_with_genotype` consumes genes — matching the
/// original's `ga_traverse`/`add_multiple_traits`/`add_single_trait`.
fn collect_trait_sites(ast: &Ast, id: NodeId, out: &mut Vec<TraitSite>) {
    let node = ast.get(id);
    if node.alterable {
        if let NodeType::Vector(children) = &node.node_type {
            for &c in children {
                if matches!(ast.get(c).node_type, NodeType::Whitespace | NodeType::Comment) {
                    continue;
                }
                out.push(TraitSite {
                    initial_value_node: c,
                    program_node: id,
                });
            }
        } else {
            out.push(TraitSite {
                initial_value_node: id,
                program_node: id,
            });
        }
        return;
    }
    match &node.node_type {
        NodeType::List(children) | NodeType::Vector(children) => {
            for &c in children {
                collect_trait_sites(ast, c, out);
            }
        }
        _ => {}
    }
}

fn trait_sites(ast: &Ast) -> Vec<TraitSite> {
    let mut sites = Vec::new();
    for &top in &ast.top_level {
        collect_trait_sites(ast, top, &mut sites);
    }
    sites
}

/// Builds the ordered list of traits for a parsed program. `vary` selects
/// whether each trait program is compiled to re-roll a fresh random value
/// (`USE_VARY=true`, population generation) or to reproduce its initial
/// value deterministically (trait-list extraction proper).
pub fn extract_traits(
    ast: &Ast,
    builtins: &Builtins,
    natives: &Natives,
    seed_value: i32,
    vary: bool,
) -> Result<TraitList, CompileError> {
    let mut traits = Vec::new();
    for (i, site) in trait_sites(ast).into_iter().enumerate() {
        let initial_value = node_literal_to_var(ast, natives, site.initial_value_node)?;
        let program = compile_trait_program(ast, builtins, site.program_node, initial_value.clone(), vary)?;
        traits.push(Trait {
            id: i as i32,
            initial_value,
            program,
        });
    }
    Ok(TraitList { seed_value, traits })
}

/// Runs one trait's program to completion on a scratch VM seeded with
/// `seed`, returning the value left on top of the stack and the PRNG state
/// the evaluation advanced to (threaded into the next trait evaluation).
/// The scratch VM is private to this call — `natives`/`words` are what let
/// it resolve the `gen/*` calls the trait program itself emits.
fn run_trait(
    trait_: &Trait,
    preamble: &Program,
    seed: PrngState,
    natives: &Natives,
    words: &WordTable,
) -> Result<(Var, PrngState), VmError> {
    let mut vm = Vm::new(seed);
    register_generator_natives(&mut vm, natives, words);
    vm.run(preamble, &trait_.program)?;
    let value = vm
        .top()
        .cloned()
        .ok_or(VmError::StackOverflow { sp: 0, size: 0 })?;
    // `PrngState::state()` is a fixed snapshot of the seed, not the
    // post-draw counter, so advance explicitly before handing the state to
    // the next trait evaluation in the same genotype.
    let next_state = PrngState::from_seed(vm.prng.derive_seed());
    Ok((value, next_state))
}

/// Builds one genotype by running every trait's program in order, each
/// continuing the PRNG state the previous one left behind.
fn build_genotype(
    traits: &[Trait],
    preamble: &Program,
    seed: PrngState,
    natives: &Natives,
    words: &WordTable,
) -> Result<Genotype, VmError> {
    let mut state = seed;
    let mut genes = Vec::with_capacity(traits.len());
    for t in traits {
        let (value, next_state) = run_trait(t, preamble, state, natives, words)?;
        state = next_state;
        genes.push(Gene { var: value });
    }
    Ok(Genotype { genes })
}

/// Genotype 0 is always the literal authored values; the rest are built by
/// running each trait's vary-program, sharing one PRNG stream across the
/// whole population (each genotype's seed draw advances it).
pub fn initial_generation(
    trait_list: &TraitList,
    population: usize,
    preamble: &Program,
    natives: &Natives,
    words: &WordTable,
) -> Result<GenotypeList, VmError> {
    let mut genotypes = Vec::with_capacity(population);
    genotypes.push(Genotype {
        genes: trait_list
            .traits
            .iter()
            .map(|t| Gene {
                var: t.initial_value.clone(),
            })
            .collect(),
    });
    let mut stream = Prng::from_state(PrngState::from_seed(trait_list.seed_value as u64));
    for _ in 1..population {
        let genotype_seed = PrngState::from_seed(stream.i32_range(0, i32::MAX) as u64);
        genotypes.push(build_genotype(&trait_list.traits, preamble, genotype_seed, natives, words)?);
    }
    Ok(GenotypeList { genotypes })
}

/// `crossover(A, B, 0) == clone(B)`, `crossover(A, B, L) == clone(A)`;
/// first `cut` genes from `a`, the rest from `b`. Panics if `a`/`b` differ
/// in length, matching the spec's same-length precondition.
pub fn crossover(a: &Genotype, b: &Genotype, cut: usize) -> Genotype {
    assert_eq!(a.genes.len(), b.genes.len(), "crossover requires equal-length genotypes");
    let mut genes = Vec::with_capacity(a.genes.len());
    genes.extend(a.genes[..cut].iter().cloned());
    genes.extend(b.genes[cut..].iter().cloned());
    Genotype { genes }
}

/// Re-evaluates a gene at positions chosen with probability `mutation_rate`
/// under `rng`; all other genes pass through unchanged.
pub fn mutate(
    genotype: &Genotype,
    trait_list: &TraitList,
    preamble: &Program,
    mutation_rate: f32,
    rng: &mut Prng,
    natives: &Natives,
    words: &WordTable,
) -> Result<Genotype, VmError> {
    let mut genes = genotype.genes.clone();
    for (i, t) in trait_list.traits.iter().enumerate() {
        if rng.f32() < mutation_rate {
            let seed = PrngState::from_seed(rng.i32_range(0, i32::MAX) as u64);
            let (value, _) = run_trait(t, preamble, seed, natives, words)?;
            if let Some(gene) = genes.get_mut(i) {
                gene.var = value;
            }
        }
    }
    Ok(Genotype { genes })
}

/// Advances one generation: parents survive verbatim, the rest of the
/// target population is filled by crossing two distinct parents (with up
/// to 10 retries against picking the same index twice) and possibly
/// mutating the result.
pub fn next_generation(
    parents: &GenotypeList,
    trait_list: &TraitList,
    preamble: &Program,
    population: usize,
    mutation_rate: f32,
    seed: PrngState,
    natives: &Natives,
    words: &WordTable,
) -> Result<GenotypeList, VmError> {
    let mut rng = Prng::from_state(seed);
    let p = parents.genotypes.len();
    let mut genotypes = parents.genotypes.clone();
    while genotypes.len() < population && p > 0 {
        let a = rng.i32_range(0, p as i32) as usize;
        let mut b = rng.i32_range(0, p as i32) as usize;
        for _ in 0..10 {
            if b != a {
                break;
            }
            b = rng.i32_range(0, p as i32) as usize;
        }
        if b == a {
            b = (a + 1) % p;
        }
        let length = trait_list.traits.len();
        // Cut is chosen from [0, length] inclusive — `crossover` treats cut
        // 0 and cut `length` as the all-b/all-a edge cases, and the
        // remaining interior cuts (1..length) must all be reachable,
        // including `length - 1`.
        let cut = if length > 0 {
            rng.i32_range(0, length as i32) as usize
        } else {
            0
        };
        let child = crossover(&parents.genotypes[a], &parents.genotypes[b], cut);
        let child = mutate(&child, trait_list, preamble, mutation_rate, &mut rng, natives, words)?;
        genotypes.push(child);
    }
    Ok(GenotypeList { genotypes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use senie_core::word_table::WordTable;

    fn parse_with_vocab(src: &str) -> (Ast, Builtins, Natives, WordTable) {
        let mut words = WordTable::new();
        let builtins = Builtins::declare(&mut words).unwrap();
        let natives = Natives::declare(&mut words).unwrap();
        let ast = parse(src, &mut words).unwrap();
        (ast, builtins, natives, words)
    }

    fn empty_preamble() -> Program {
        let mut p = Program::new();
        p.emit(senie_runtime::bytecode::Bytecode::simple(senie_runtime::bytecode::Op::Stop));
        p
    }

    #[test]
    fn extracts_one_trait_per_alterable_scalar() {
        let (ast, builtins, natives, _words) = parse_with_vocab("(rect width: {10 (gen/scalar min: 0 max: 20)})");
        let tl = extract_traits(&ast, &builtins, &natives, 1, false).unwrap();
        assert_eq!(tl.traits.len(), 1);
        assert_eq!(tl.traits[0].initial_value, Var::Int(10));
    }

    #[test]
    fn vector_alterable_splits_into_one_trait_per_child() {
        let (ast, builtins, natives, _words) =
            parse_with_vocab("(rect position: {[100 200] (gen/2d min: 0 max: 500)})");
        let tl = extract_traits(&ast, &builtins, &natives, 1, false).unwrap();
        assert_eq!(tl.traits.len(), 2);
        assert_eq!(tl.traits[0].initial_value, Var::Int(100));
        assert_eq!(tl.traits[1].initial_value, Var::Int(200));
    }

    #[test]
    fn crossover_preserves_length_and_respects_boundaries() {
        let a = Genotype {
            genes: vec![Gene { var: Var::Int(1) }, Gene { var: Var::Int(2) }, Gene { var: Var::Int(3) }],
        };
        let b = Genotype {
            genes: vec![Gene { var: Var::Int(9) }, Gene { var: Var::Int(8) }, Gene { var: Var::Int(7) }],
        };
        let mid = crossover(&a, &b, 1);
        assert_eq!(mid.genes.len(), 3);
        assert_eq!(crossover(&a, &b, 0), b);
        assert_eq!(crossover(&a, &b, 3), a);
    }

    #[test]
    fn initial_generation_seeds_index_zero_from_literal_values() {
        let (ast, builtins, natives, words) = parse_with_vocab("(rect width: {10 (gen/scalar min: 0 max: 20)})");
        let tl = extract_traits(&ast, &builtins, &natives, 42, true).unwrap();
        let preamble = empty_preamble();
        let population = initial_generation(&tl, 3, &preamble, &natives, &words).unwrap();
        assert_eq!(population.genotypes.len(), 3);
        assert_eq!(population.genotypes[0].genes[0].var, Var::Int(10));
    }

    #[test]
    fn initial_generation_draws_bound_generator_values_for_later_genotypes() {
        let (ast, builtins, natives, words) = parse_with_vocab("(rect width: {10 (gen/scalar min: 0 max: 20)})");
        let tl = extract_traits(&ast, &builtins, &natives, 42, true).unwrap();
        let preamble = empty_preamble();
        let population = initial_generation(&tl, 3, &preamble, &natives, &words).unwrap();
        for genotype in &population.genotypes[1..] {
            match genotype.genes[0].var {
                Var::Float(f) => assert!((0.0..20.0).contains(&f)),
                ref other => panic!("expected a bound gen/scalar draw, got {other:?}"),
            }
        }
    }
}
