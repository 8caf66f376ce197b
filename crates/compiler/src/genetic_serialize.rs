//! Textual serialization for the genetic-engine types, layered on top of
//! `senie_runtime::serialize`'s `Var`/`Program` codec the same way that
//! module layers `Bytecode` on `Arg` on `Var`: each level's embedded
//! spaces are substituted for an unused character before being joined
//! into the parent line, and restored before recursing back down.

use crate::genetic::{Gene, Genotype, GenotypeList, Trait, TraitList};
use senie_runtime::error::SerializeError;
use senie_runtime::serialize::{deserialize_program, deserialize_var, serialize_program, serialize_var};

pub fn serialize_trait(t: &Trait) -> Result<String, SerializeError> {
    let initial_value = serialize_var(&t.initial_value)?.replace(' ', ";");
    let program = serialize_program(&t.program)?.replace(' ', "`");
    Ok(format!("{} {} {}", t.id, initial_value, program))
}

pub fn deserialize_trait(s: &str) -> Result<Trait, SerializeError> {
    let mut parts = s.splitn(3, ' ');
    let bad = |detail: &str| SerializeError::MalformedPayload {
        tag: "Trait",
        detail: detail.to_string(),
    };
    let id: i32 = parts
        .next()
        .ok_or(SerializeError::UnexpectedEof("trait id"))?
        .parse()
        .map_err(|_| bad("invalid id"))?;
    let initial_value_tok = parts.next().ok_or(SerializeError::UnexpectedEof("trait initial_value"))?;
    let program_tok = parts.next().ok_or(SerializeError::UnexpectedEof("trait program"))?;
    let initial_value = deserialize_var(&initial_value_tok.replace(';', " "))?;
    let program = deserialize_program(&program_tok.replace('`', " "))?;
    Ok(Trait { id, initial_value, program })
}

pub fn serialize_trait_list(tl: &TraitList) -> Result<String, SerializeError> {
    let mut out = format!("{} {}", tl.seed_value, tl.traits.len());
    for t in &tl.traits {
        out.push(' ');
        out.push_str(&serialize_trait(t)?.replace(' ', "~"));
    }
    Ok(out)
}

pub fn deserialize_trait_list(s: &str) -> Result<TraitList, SerializeError> {
    let mut parts = s.split_whitespace();
    let seed_value: i32 = parts
        .next()
        .ok_or(SerializeError::UnexpectedEof("trait_list seed"))?
        .parse()
        .map_err(|_| SerializeError::MalformedPayload {
            tag: "TraitList",
            detail: "seed".to_string(),
        })?;
    let count: usize = parts
        .next()
        .ok_or(SerializeError::UnexpectedEof("trait_list count"))?
        .parse()
        .map_err(|_| SerializeError::MalformedPayload {
            tag: "TraitList",
            detail: "count".to_string(),
        })?;
    let mut traits = Vec::with_capacity(count);
    for _ in 0..count {
        let tok = parts.next().ok_or(SerializeError::UnexpectedEof("trait_list entry"))?;
        traits.push(deserialize_trait(&tok.replace('~', " "))?);
    }
    Ok(TraitList { seed_value, traits })
}

pub fn serialize_genotype(g: &Genotype) -> Result<String, SerializeError> {
    let mut out = format!("{}", g.genes.len());
    for gene in &g.genes {
        out.push(' ');
        out.push_str(&serialize_var(&gene.var)?.replace(' ', ";"));
    }
    Ok(out)
}

pub fn deserialize_genotype(s: &str) -> Result<Genotype, SerializeError> {
    let mut parts = s.split_whitespace();
    let count: usize = parts
        .next()
        .ok_or(SerializeError::UnexpectedEof("genotype count"))?
        .parse()
        .map_err(|_| SerializeError::MalformedPayload {
            tag: "Genotype",
            detail: "count".to_string(),
        })?;
    let mut genes = Vec::with_capacity(count);
    for _ in 0..count {
        let tok = parts.next().ok_or(SerializeError::UnexpectedEof("genotype gene"))?;
        genes.push(Gene {
            var: deserialize_var(&tok.replace(';', " "))?,
        });
    }
    Ok(Genotype { genes })
}

pub fn serialize_genotype_list(gl: &GenotypeList) -> Result<String, SerializeError> {
    let mut out = format!("{}", gl.genotypes.len());
    for g in &gl.genotypes {
        out.push(' ');
        out.push_str(&serialize_genotype(g)?.replace(' ', "~"));
    }
    Ok(out)
}

pub fn deserialize_genotype_list(s: &str) -> Result<GenotypeList, SerializeError> {
    let mut parts = s.split_whitespace();
    let count: usize = parts
        .next()
        .ok_or(SerializeError::UnexpectedEof("genotype_list count"))?
        .parse()
        .map_err(|_| SerializeError::MalformedPayload {
            tag: "GenotypeList",
            detail: "count".to_string(),
        })?;
    let mut genotypes = Vec::with_capacity(count);
    for _ in 0..count {
        let tok = parts.next().ok_or(SerializeError::UnexpectedEof("genotype_list entry"))?;
        genotypes.push(deserialize_genotype(&tok.replace('~', " "))?);
    }
    Ok(GenotypeList { genotypes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use senie_core::var::Var;
    use senie_runtime::bytecode::{Arg, Bytecode, Op, Program, Segment};

    fn sample_trait(id: i32) -> Trait {
        let mut program = Program::new();
        program.emit(Bytecode::new(Op::Load, Arg::Segment(Segment::Constant), Arg::Literal(Var::Int(7))));
        program.emit(Bytecode::simple(Op::Stop));
        Trait {
            id,
            initial_value: Var::Vec2([1.5, -2.0]),
            program,
        }
    }

    #[test]
    fn trait_round_trips() {
        let t = sample_trait(3);
        let s = serialize_trait(&t).unwrap();
        let back = deserialize_trait(&s).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn trait_list_round_trips() {
        let tl = TraitList {
            seed_value: 42,
            traits: vec![sample_trait(0), sample_trait(1)],
        };
        let s = serialize_trait_list(&tl).unwrap();
        let back = deserialize_trait_list(&s).unwrap();
        assert_eq!(tl, back);
    }

    #[test]
    fn genotype_list_round_trips() {
        let gl = GenotypeList {
            genotypes: vec![
                Genotype {
                    genes: vec![Gene { var: Var::Int(1) }, Gene { var: Var::Colour(senie_core::var::ColourFormat::Hsl, [0.1, 0.2, 0.3, 1.0]) }],
                },
                Genotype {
                    genes: vec![Gene { var: Var::Float(3.5) }],
                },
            ],
        };
        let s = serialize_genotype_list(&gl).unwrap();
        let back = deserialize_genotype_list(&s).unwrap();
        assert_eq!(gl.genotypes.len(), back.genotypes.len());
        assert_eq!(gl.genotypes[0].genes, back.genotypes[0].genes);
        assert_eq!(gl.genotypes[1].genes, back.genotypes[1].genes);
    }
}
