//! Textual, space-delimited serialization for `Var`, `Bytecode`, and
//! `Program`, designed for exact round-trips.

use crate::bytecode::{Arg, Bytecode, Op, Program, Segment};
use crate::error::SerializeError;
use senie_core::var::{ColourFormat, Var};

/// Round-trips exactly for every tag except `Float`/`Vec2`/`Colour`, whose
/// components are written with 4 decimal digits — a float carrying more
/// precision than that comes back rounded, not bit-identical.
pub fn serialize_var(v: &Var) -> Result<String, SerializeError> {
    Ok(match v {
        Var::Int(i) => format!("INT {i}"),
        Var::Float(f) => format!("FLOAT {:.4}", f),
        Var::Bool(b) => format!("BOOLEAN {}", if *b { 1 } else { 0 }),
        Var::Long(l) => format!("LONG {l}"),
        Var::Name(n) => format!("NAME {n}"),
        Var::Vec2([x, y]) => format!("2D {:.4} {:.4}", x, y),
        Var::Colour(fmt, [a, b, c, d]) => {
            format!("COLOUR {} {:.4} {:.4} {:.4} {:.4}", fmt.to_i32(), a, b, c, d)
        }
        Var::Vector(_) => return Err(SerializeError::VectorNotSerializable),
    })
}

pub fn deserialize_var(s: &str) -> Result<Var, SerializeError> {
    let mut parts = s.split_whitespace();
    let tag = parts
        .next()
        .ok_or(SerializeError::UnexpectedEof("Var tag"))?;
    let rest: Vec<&str> = parts.collect();
    let bad = |detail: &str| SerializeError::MalformedPayload {
        tag: leak_tag(tag),
        detail: detail.to_string(),
    };
    match tag {
        "INT" => {
            let v = rest
                .first()
                .ok_or_else(|| bad("missing int"))?
                .parse()
                .map_err(|_| bad("invalid int"))?;
            Ok(Var::Int(v))
        }
        "FLOAT" => {
            let v = rest
                .first()
                .ok_or_else(|| bad("missing float"))?
                .parse()
                .map_err(|_| bad("invalid float"))?;
            Ok(Var::Float(v))
        }
        "BOOLEAN" => {
            let v = rest.first().ok_or_else(|| bad("missing bool"))?;
            Ok(Var::Bool(*v == "1"))
        }
        "LONG" => {
            let v = rest
                .first()
                .ok_or_else(|| bad("missing long"))?
                .parse()
                .map_err(|_| bad("invalid long"))?;
            Ok(Var::Long(v))
        }
        "NAME" => {
            let v = rest
                .first()
                .ok_or_else(|| bad("missing name"))?
                .parse()
                .map_err(|_| bad("invalid name"))?;
            Ok(Var::Name(v))
        }
        "2D" => {
            if rest.len() < 2 {
                return Err(bad("missing 2d components"));
            }
            let x = rest[0].parse().map_err(|_| bad("invalid x"))?;
            let y = rest[1].parse().map_err(|_| bad("invalid y"))?;
            Ok(Var::Vec2([x, y]))
        }
        "COLOUR" => {
            if rest.len() < 5 {
                return Err(bad("missing colour components"));
            }
            let fmt_i: i32 = rest[0].parse().map_err(|_| bad("invalid format"))?;
            let fmt = ColourFormat::from_i32(fmt_i).ok_or_else(|| bad("unknown colour format"))?;
            let a = rest[1].parse().map_err(|_| bad("invalid a"))?;
            let b = rest[2].parse().map_err(|_| bad("invalid b"))?;
            let c = rest[3].parse().map_err(|_| bad("invalid c"))?;
            let d = rest[4].parse().map_err(|_| bad("invalid d"))?;
            Ok(Var::Colour(fmt, [a, b, c, d]))
        }
        "VECTOR" => Err(SerializeError::VectorNotSerializable),
        other => Err(SerializeError::UnknownTag(other.to_string())),
    }
}

fn leak_tag(tag: &str) -> &'static str {
    match tag {
        "INT" => "INT",
        "FLOAT" => "FLOAT",
        "BOOLEAN" => "BOOLEAN",
        "LONG" => "LONG",
        "NAME" => "NAME",
        "2D" => "2D",
        "COLOUR" => "COLOUR",
        _ => "UNKNOWN",
    }
}

fn op_from_name(name: &str) -> Option<Op> {
    Some(match name {
        "LOAD" => Op::Load,
        "STORE" => Op::Store,
        "STORE_F" => Op::StoreF,
        "JUMP" => Op::Jump,
        "JUMP_IF" => Op::JumpIf,
        "CALL" => Op::Call,
        "CALL_0" => Op::Call0,
        "RET" => Op::Ret,
        "RET_0" => Op::Ret0,
        "CALL_F" => Op::CallF,
        "CALL_F_0" => Op::CallF0,
        "NATIVE" => Op::Native,
        "APPEND" => Op::Append,
        "PILE" => Op::Pile,
        "SQUISH2" => Op::Squish2,
        "MTX_LOAD" => Op::MtxLoad,
        "MTX_STORE" => Op::MtxStore,
        "ADD" => Op::Add,
        "SUB" => Op::Sub,
        "MUL" => Op::Mul,
        "DIV" => Op::Div,
        "MOD" => Op::Mod,
        "NEG" => Op::Neg,
        "SQRT" => Op::Sqrt,
        "EQ" => Op::Eq,
        "GT" => Op::Gt,
        "LT" => Op::Lt,
        "AND" => Op::And,
        "OR" => Op::Or,
        "NOT" => Op::Not,
        "NOP" => Op::Nop,
        "STOP" => Op::Stop,
        _ => return None,
    })
}

fn segment_name(seg: Segment) -> &'static str {
    match seg {
        Segment::Argument => "ARGUMENT",
        Segment::Local => "LOCAL",
        Segment::Global => "GLOBAL",
        Segment::Constant => "CONSTANT",
        Segment::Void => "VOID",
    }
}

fn segment_from_name(name: &str) -> Option<Segment> {
    Some(match name {
        "ARGUMENT" => Segment::Argument,
        "LOCAL" => Segment::Local,
        "GLOBAL" => Segment::Global,
        "CONSTANT" => Segment::Constant,
        "VOID" => Segment::Void,
        _ => return None,
    })
}

fn serialize_arg(a: &Arg) -> Result<String, SerializeError> {
    Ok(match a {
        Arg::Segment(s) => format!("SEG:{}", segment_name(*s)),
        Arg::Int(i) => format!("I:{i}"),
        Arg::Name(n) => format!("N:{n}"),
        Arg::Literal(v) => format!("L:{}", serialize_var(v)?.replace(' ', ",")),
        Arg::None => "-".to_string(),
    })
}

fn deserialize_arg(s: &str) -> Result<Arg, SerializeError> {
    if s == "-" {
        return Ok(Arg::None);
    }
    let bad = || SerializeError::MalformedPayload {
        tag: "Arg",
        detail: s.to_string(),
    };
    let (kind, payload) = s.split_once(':').ok_or_else(bad)?;
    match kind {
        "SEG" => Ok(Arg::Segment(segment_from_name(payload).ok_or_else(bad)?)),
        "I" => Ok(Arg::Int(payload.parse().map_err(|_| bad())?)),
        "N" => Ok(Arg::Name(payload.parse().map_err(|_| bad())?)),
        "L" => Ok(Arg::Literal(deserialize_var(&payload.replace(',', " "))?)),
        _ => Err(bad()),
    }
}

pub fn serialize_bytecode(bc: &Bytecode) -> Result<String, SerializeError> {
    Ok(format!(
        "{} {} {}",
        bc.op.name(),
        serialize_arg(&bc.arg0)?,
        serialize_arg(&bc.arg1)?
    ))
}

pub fn deserialize_bytecode(s: &str) -> Result<Bytecode, SerializeError> {
    let mut parts = s.splitn(3, ' ');
    let op_name = parts
        .next()
        .ok_or(SerializeError::UnexpectedEof("bytecode op"))?;
    let op = op_from_name(op_name).ok_or_else(|| SerializeError::UnknownTag(op_name.to_string()))?;
    let arg0 = parts.next().unwrap_or("-");
    let arg1 = parts.next().unwrap_or("-");
    Ok(Bytecode {
        op,
        arg0: deserialize_arg(arg0)?,
        arg1: deserialize_arg(arg1)?,
    })
}

pub fn serialize_program(p: &Program) -> Result<String, SerializeError> {
    let mut out = format!("{} {}", MAX_PROGRAM_SIZE_HINT, p.code.len());
    for bc in &p.code {
        out.push(' ');
        out.push_str(&serialize_bytecode(bc)?.replace(' ', "|"));
    }
    Ok(out)
}

const MAX_PROGRAM_SIZE_HINT: usize = crate::bytecode::MAX_PROGRAM_SIZE;

pub fn deserialize_program(s: &str) -> Result<Program, SerializeError> {
    let mut parts = s.split_whitespace();
    let _code_max: usize = parts
        .next()
        .ok_or(SerializeError::UnexpectedEof("program code_max"))?
        .parse()
        .map_err(|_| SerializeError::MalformedPayload {
            tag: "Program",
            detail: "code_max".to_string(),
        })?;
    let code_size: usize = parts
        .next()
        .ok_or(SerializeError::UnexpectedEof("program code_size"))?
        .parse()
        .map_err(|_| SerializeError::MalformedPayload {
            tag: "Program",
            detail: "code_size".to_string(),
        })?;
    let mut program = Program::new();
    for _ in 0..code_size {
        let encoded = parts
            .next()
            .ok_or(SerializeError::UnexpectedEof("program bytecode"))?;
        program.emit(deserialize_bytecode(&encoded.replace('|', " "))?);
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_round_trips_for_every_tag() {
        // Float value pinned to 4 decimal digits — `serialize_var` writes
        // floats as `%.4f`, so anything finer-grained than that wouldn't
        // round-trip bit-for-bit (see its doc comment).
        let values = vec![
            Var::Int(-7),
            Var::Float(3.1415),
            Var::Bool(true),
            Var::Long(18_446_744_073_709_551_615),
            Var::Name(42),
            Var::Vec2([1.5, -2.5]),
            Var::Colour(ColourFormat::Hsl, [0.1, 0.2, 0.3, 1.0]),
        ];
        for v in values {
            let s = serialize_var(&v).unwrap();
            let back = deserialize_var(&s).unwrap();
            assert_eq!(v, back);
        }
    }

    #[test]
    fn vector_is_rejected() {
        assert_eq!(
            serialize_var(&Var::Vector(None)).unwrap_err(),
            SerializeError::VectorNotSerializable
        );
        assert_eq!(
            deserialize_var("VECTOR").unwrap_err(),
            SerializeError::VectorNotSerializable
        );
    }

    #[test]
    fn program_round_trips() {
        let mut p = Program::new();
        p.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Int(1)),
        ));
        p.emit(Bytecode::new(
            Op::Load,
            Arg::Segment(Segment::Constant),
            Arg::Literal(Var::Int(2)),
        ));
        p.emit(Bytecode::simple(Op::Squish2));
        p.emit(Bytecode::simple(Op::Stop));

        let s = serialize_program(&p).unwrap();
        let back = deserialize_program(&s).unwrap();
        assert_eq!(p.code, back.code);
    }
}
