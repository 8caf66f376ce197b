//! `senie` — compile and run Senie source programs.
//!
//! Four call shapes (see `SenieConfig`/`README` for the layered config a
//! real deployment would add on top of these flags):
//! - no args: print usage.
//! - `<file>`: parse, compile, run, report vertex counts and timings.
//! - `<file> -d`: parse, compile, pretty-print bytecode, don't run.
//! - `<file> -s <seed>`: trait-compile, build one genotype from `<seed>`,
//!   compile-with-genotype, run, report the number of traits used.

use clap::Parser as ClapParser;
use senie_compiler::error::SenieError;
use senie_compiler::{bootstrap, compiler, config::SenieConfig, genetic, parser, preamble};
use senie_core::word_table::WordTable;
use senie_runtime::prng::PrngState;
use senie_runtime::vm::Vm;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Debug, ClapParser)]
#[command(name = "senie", about = "Compile and run Senie generative-art programs")]
struct Cli {
    /// Source file to compile. With no file, prints usage and exits.
    file: Option<PathBuf>,

    /// Pretty-print bytecode instead of running the program.
    #[arg(short = 'd', long = "disassemble")]
    disassemble: bool,

    /// Trait-compile, build one genotype from this seed, and run that
    /// variant instead of the literal source.
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Path to an optional senie.toml; defaults to ./senie.toml.
    #[arg(long = "config", default_value = "senie.toml")]
    config_path: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let Some(file) = cli.file else {
        print_usage();
        return;
    };

    if let Err(err) = run(&file, cli.disassemble, cli.seed, &cli.config_path) {
        eprintln!("senie: {err}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("usage: senie <file>             parse, compile, run");
    println!("       senie <file> -d          pretty-print bytecode");
    println!("       senie <file> -s <seed>   run one genotype variant");
}

fn run(file: &PathBuf, disassemble: bool, seed: Option<u64>, config_path: &PathBuf) -> Result<(), SenieError> {
    let config = SenieConfig::load(config_path, seed)?;
    let source = std::fs::read_to_string(file)?;

    let mut words = WordTable::new();
    let builtins = bootstrap::Builtins::declare(&mut words)?;
    let natives = bootstrap::Natives::declare(&mut words)?;

    let parse_start = Instant::now();
    let ast = parser::parse(&source, &mut words)?;
    let parse_elapsed = parse_start.elapsed();

    if let Some(seed) = seed {
        return run_with_genotype(&ast, &builtins, &natives, &words, &config, seed);
    }

    let compile_start = Instant::now();
    let program = compiler::Compiler::new(&ast, &builtins).compile_main()?;
    let compile_elapsed = compile_start.elapsed();

    if disassemble {
        print!("{}", program.pretty_print());
        return Ok(());
    }

    let preamble = preamble::build(config.canvas_width, config.canvas_height);
    let mut vm = Vm::new(PrngState::from_seed(config.seed));
    bootstrap::register_render_natives(&mut vm, &natives, &words);
    genetic::register_generator_natives(&mut vm, &natives, &words);
    let run_start = Instant::now();
    vm.run(&preamble, &program)?;
    let run_elapsed = run_start.elapsed();

    info!(
        parse_ms = parse_elapsed.as_secs_f64() * 1000.0,
        compile_ms = compile_elapsed.as_secs_f64() * 1000.0,
        run_ms = run_elapsed.as_secs_f64() * 1000.0,
        opcodes = vm.opcodes_executed,
        "run complete"
    );
    println!(
        "parsed in {:.2?}, compiled in {:.2?}, ran in {:.2?} ({} opcodes)",
        parse_elapsed, compile_elapsed, run_elapsed, vm.opcodes_executed
    );
    Ok(())
}

fn run_with_genotype(
    ast: &senie_core::ast::Ast,
    builtins: &bootstrap::Builtins,
    natives: &bootstrap::Natives,
    words: &WordTable,
    config: &SenieConfig,
    seed: u64,
) -> Result<(), SenieError> {
    let preamble = preamble::build(config.canvas_width, config.canvas_height);
    // index 1 rather than 0: index 0 of `initial_generation` is always the
    // literal authored values, which defeats the point of picking a seed.
    let trait_list = genetic::extract_traits(ast, builtins, natives, seed as i32, true)?;
    let population = genetic::initial_generation(&trait_list, 2, &preamble, natives, words)?;
    let genotype = &population.genotypes[1];

    let cursor = genetic::GenotypeCursor::new(genotype);
    let program = compiler::Compiler::with_genotype(ast, builtins, cursor).compile_main()?;

    let mut vm = Vm::new(PrngState::from_seed(seed));
    bootstrap::register_render_natives(&mut vm, natives, words);
    genetic::register_generator_natives(&mut vm, natives, words);
    vm.run(&preamble, &program)?;

    println!(
        "ran seed {seed} with {} trait(s), {} opcode(s) executed",
        trait_list.traits.len(),
        vm.opcodes_executed
    );
    Ok(())
}
