//! Regenerates source text from an [`Ast`], substituting each alterable
//! node's gene for its original expression.
//!
//! Non-alterable leaves are copied verbatim from the original source
//! slice, so whitespace, comments, and float decimal precision survive
//! untouched; only the genotype-driven substitution at alterable nodes
//! changes the output.

use crate::bootstrap::Natives;
use crate::error::CompileError;
use crate::genetic::GenotypeCursor;
use senie_core::ast::{Ast, NodeId, NodeType};
use senie_core::var::{ColourFormat, Var};
use senie_core::word_table::WordTable;

pub fn unparse(
    ast: &Ast,
    source: &str,
    words: &WordTable,
    natives: &Natives,
    cursor: &mut GenotypeCursor,
) -> Result<String, CompileError> {
    let mut out = String::new();
    for &id in &ast.top_level {
        write_node(ast, source, words, natives, cursor, id, &mut out)?;
    }
    Ok(out)
}

fn write_node(
    ast: &Ast,
    source: &str,
    words: &WordTable,
    natives: &Natives,
    cursor: &mut GenotypeCursor,
    id: NodeId,
    out: &mut String,
) -> Result<(), CompileError> {
    let node = ast.get(id);

    if node.alterable {
        out.push('{');
        for &p in &node.parameter_prefix {
            write_node(ast, source, words, natives, cursor, p, out)?;
        }
        if let NodeType::Vector(children) = &node.node_type {
            // A vector-shaped alterable is one trait per child (see
            // `DESIGN.md`/`genetic.rs`), so it pulls one gene per non-trivia
            // child rather than a single gene for the whole vector.
            let children = children.clone();
            out.push('[');
            for &c in &children {
                if matches!(ast.get(c).node_type, NodeType::Whitespace | NodeType::Comment) {
                    write_node(ast, source, words, natives, cursor, c, out)?;
                } else {
                    let gene = cursor.next().unwrap_or(Var::Int(0));
                    out.push_str(&format_gene(&gene, ast, c, source, words, natives)?);
                }
            }
            out.push(']');
        } else {
            let gene = cursor.next().unwrap_or(Var::Int(0));
            out.push_str(&format_gene(&gene, ast, id, source, words, natives)?);
        }
        for &p in &node.parameter_ast {
            write_node(ast, source, words, natives, cursor, p, out)?;
        }
        out.push('}');
        return Ok(());
    }

    match &node.node_type {
        NodeType::List(children) => {
            if let Some(expr) = quoted_expr(ast, words, children) {
                out.push('\'');
                write_node(ast, source, words, natives, cursor, expr, out)?;
            } else {
                out.push('(');
                for &c in children {
                    write_node(ast, source, words, natives, cursor, c, out)?;
                }
                out.push(')');
            }
        }
        NodeType::Vector(children) => {
            out.push('[');
            for &c in children {
                write_node(ast, source, words, natives, cursor, c, out)?;
            }
            out.push(']');
        }
        NodeType::Whitespace => {
            if node.src.0 == node.src.1 {
                // Synthetic zero-length whitespace from quote desugaring:
                // there is no source slice to copy, so emit a literal space.
                out.push(' ');
            } else {
                out.push_str(&source[node.src.0..node.src.1]);
            }
        }
        _ => out.push_str(&source[node.src.0..node.src.1]),
    }
    Ok(())
}

/// A `List` headed by `Name("quote")` unparses as `'<expr>`. Returns the
/// node id of the quoted expression (the first non-trivia child after the
/// `quote` name) when `children` has this shape.
fn quoted_expr(ast: &Ast, words: &WordTable, children: &[NodeId]) -> Option<NodeId> {
    let quote_iname = words.lookup("quote")?;
    let mut iter = children.iter().copied();
    let first = iter.next()?;
    if !matches!(ast.get(first).node_type, NodeType::Name(n) if n == quote_iname) {
        return None;
    }
    iter.find(|&id| !matches!(ast.get(id).node_type, NodeType::Whitespace | NodeType::Comment))
}

fn format_gene(
    gene: &Var,
    ast: &Ast,
    node_id: NodeId,
    source: &str,
    words: &WordTable,
    natives: &Natives,
) -> Result<String, CompileError> {
    let node = ast.get(node_id);
    match gene {
        Var::Int(i) => Ok(i.to_string()),
        Var::Float(f) => Ok(format_float(*f, node.decimal_count(source))),
        Var::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Var::Long(l) => Ok(l.to_string()),
        Var::Name(n) => words
            .reverse_lookup(*n)
            .map(str::to_string)
            .map_err(|_| CompileError::UnsupportedAlterableLiteral("unresolvable gene name")),
        Var::Vec2([x, y]) => {
            let (dx, dy) = vec2_decimal_counts(ast, node_id, source);
            Ok(format!("[{} {}]", format_float(*x, dx), format_float(*y, dy)))
        }
        Var::Colour(format, [a, b, c, d]) => {
            let head = match format {
                ColourFormat::Rgb => words.reverse_lookup(natives.col_rgb).unwrap_or("col/rgb"),
                ColourFormat::Hsl => words.reverse_lookup(natives.col_hsl).unwrap_or("col/hsl"),
                ColourFormat::Lab => words.reverse_lookup(natives.col_lab).unwrap_or("col/lab"),
                ColourFormat::Hsv => words.reverse_lookup(natives.col_hsv).unwrap_or("col/hsv"),
                ColourFormat::Hsluv | ColourFormat::Xyz => "col/rgb",
            };
            // Colour literals always print at two-decimal precision,
            // regardless of the originally authored literal's precision.
            Ok(format!(
                "({} r: {:.2} g: {:.2} b: {:.2} alpha: {:.2})",
                head, a, b, c, d
            ))
        }
        Var::Vector(_) => Err(CompileError::UnsupportedAlterableLiteral("VECTOR is not unparseable")),
    }
}

fn format_float(f: f32, decimals: usize) -> String {
    format!("{:.*}", decimals, f)
}

/// `Vec2`'s two components keep independent decimal precision taken from
/// the original `[a b]` node's two `Float` children, when the gene is
/// substituting at a vector-shaped node. A `Vec2` gene can also land at a
/// plain scalar child position (a vector-shaped alterable's shared trait
/// program can itself produce a multi-component value per child — see
/// `DESIGN.md`); there the node has no two children to read counts from,
/// so it falls back to zero decimals for both components.
fn vec2_decimal_counts(ast: &Ast, node_id: NodeId, source: &str) -> (usize, usize) {
    if let NodeType::Vector(children) = &ast.get(node_id).node_type {
        let parts: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|c| !matches!(ast.get(*c).node_type, NodeType::Whitespace | NodeType::Comment))
            .collect();
        if parts.len() == 2 {
            return (ast.get(parts[0]).decimal_count(source), ast.get(parts[1]).decimal_count(source));
        }
    }
    (0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{Builtins, Natives};
    use crate::genetic::Genotype;
    use crate::parser::parse;

    #[test]
    fn identity_genotype_reproduces_source_exactly() {
        let mut words = WordTable::new();
        Builtins::declare(&mut words).unwrap();
        let natives = Natives::declare(&mut words).unwrap();
        let src = "(rect width: 10 height: 20)";
        let ast = parse(src, &mut words).unwrap();
        let genotype = Genotype::default();
        let mut cursor = GenotypeCursor::new(&genotype);
        let result = unparse(&ast, src, &words, &natives, &mut cursor).unwrap();
        assert_eq!(result, src);
    }

    #[test]
    fn quote_sugar_round_trips() {
        let mut words = WordTable::new();
        Builtins::declare(&mut words).unwrap();
        let natives = Natives::declare(&mut words).unwrap();
        let src = "'(a b)";
        let ast = parse(src, &mut words).unwrap();
        let genotype = Genotype::default();
        let mut cursor = GenotypeCursor::new(&genotype);
        let result = unparse(&ast, src, &words, &natives, &mut cursor).unwrap();
        assert_eq!(result, src);
    }

    #[test]
    fn alterable_scalar_substitutes_gene_value() {
        use crate::genetic::Gene;
        let mut words = WordTable::new();
        Builtins::declare(&mut words).unwrap();
        let natives = Natives::declare(&mut words).unwrap();
        let src = "(rect width: {10 (gen/scalar min: 0 max: 20)})";
        let ast = parse(src, &mut words).unwrap();
        let genotype = Genotype {
            genes: vec![Gene { var: Var::Int(17) }],
        };
        let mut cursor = GenotypeCursor::new(&genotype);
        let result = unparse(&ast, src, &words, &natives, &mut cursor).unwrap();
        assert_eq!(result, "(rect width: {17 (gen/scalar min: 0 max: 20)})");
        assert!(cursor.exhausted());
    }

    #[test]
    fn alterable_vector_substitutes_one_gene_per_child() {
        use crate::genetic::Gene;
        let mut words = WordTable::new();
        Builtins::declare(&mut words).unwrap();
        let natives = Natives::declare(&mut words).unwrap();
        // Each child's own decimal count governs its own gene's formatting
        // (here both children are authored with two decimals), not a
        // combined Vec2-wide rule — the vector splits into two traits.
        let src = "(rect position: {[100.00 200.00] (gen/2d min: 0 max: 500)} width: 10 height: 10)";
        let ast = parse(src, &mut words).unwrap();
        let genotype = Genotype {
            genes: vec![Gene { var: Var::Float(300.0) }, Gene { var: Var::Float(400.0) }],
        };
        let mut cursor = GenotypeCursor::new(&genotype);
        let result = unparse(&ast, src, &words, &natives, &mut cursor).unwrap();
        assert_eq!(
            result,
            "(rect position: {[300.00 400.00] (gen/2d min: 0 max: 500)} width: 10 height: 10)"
        );
        assert!(cursor.exhausted());
    }
}
