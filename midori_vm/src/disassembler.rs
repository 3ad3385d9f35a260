//! Bytecode disassembly for the CLI and for bytecode-shape tests.

use crate::bytecode::{BytecodeStream, OpCode};
use crate::executable::Executable;

/// Decode a stream into `(offset, opcode)` pairs, skipping operands.
pub fn decode(stream: &BytecodeStream) -> Vec<(usize, OpCode)> {
    let mut decoded = Vec::new();
    let mut offset = 0;
    while offset < stream.len() {
        let Ok(op) = OpCode::try_from(stream.byte_at(offset)) else {
            break;
        };
        decoded.push((offset, op));
        offset += 1 + operand_width(op);
    }
    decoded
}

/// Render one procedure, one instruction per line.
pub fn disassemble_procedure(executable: &Executable, index: usize) -> String {
    let stream = executable.procedure(index);
    let mut rendered = format!(
        "== {} (procedure {}) ==\n",
        executable.procedure_name(index),
        index
    );
    for (offset, op) in decode(stream) {
        let line = stream.line_at(offset);
        let operand = render_operand(stream, offset, op);
        rendered.push_str(&format!(
            "{:04} {:4} {:<24}{}\n",
            offset,
            line,
            opcode_name(op),
            operand
        ));
    }
    rendered
}

/// Render every procedure of an executable.
pub fn disassemble(executable: &Executable) -> String {
    (0..executable.procedure_count())
        .map(|index| disassemble_procedure(executable, index))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Canonical instruction name: `LOAD_CONSTANT`, `IF_INTEGER_LESS`, ...
pub fn opcode_name(op: OpCode) -> String {
    let camel = format!("{:?}", op);
    let mut name = String::with_capacity(camel.len() + 8);
    for (i, c) in camel.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            name.push('_');
        }
        name.push(c.to_ascii_uppercase());
    }
    name
}

fn operand_width(op: OpCode) -> usize {
    use OpCode::*;
    match op {
        IntConstant | FracConstant => 8,
        CreateArray | LoadConstantLongLong => 3,
        LoadConstantLong | Jump | JumpBack | JumpIfFalse | JumpIfTrue | IfIntegerLess
        | IfIntegerLessEqual | IfIntegerGreater | IfIntegerGreaterEqual | IfIntegerEqual
        | IfIntegerNotEqual | IfFractionLess | IfFractionLessEqual | IfFractionGreater
        | IfFractionGreaterEqual | IfFractionEqual | IfFractionNotEqual => 2,
        LoadConstant | GetArray | SetArray | SetTag | CallForeign | CallDefined
        | ConstructStruct | ConstructUnion | AllocateClosure | ConstructClosure
        | DefineGlobal | GetGlobal | SetGlobal | GetLocal | SetLocal | GetCell | SetCell
        | GetMember | SetMember | PopScope | PopMultiple => 1,
        _ => 0,
    }
}

fn render_operand(stream: &BytecodeStream, offset: usize, op: OpCode) -> String {
    match operand_width(op) {
        8 => {
            if op == OpCode::IntConstant {
                format!(" {}", stream.read_i64(offset + 1))
            } else {
                format!(" {}", stream.read_f64(offset + 1))
            }
        }
        3 => format!(" {}", stream.read_u24(offset + 1)),
        2 => format!(" {}", stream.read_u16(offset + 1)),
        1 => format!(" {}", stream.byte_at(offset + 1)),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_name_formatting() {
        assert_eq!(opcode_name(OpCode::LoadConstant), "LOAD_CONSTANT");
        assert_eq!(opcode_name(OpCode::IfIntegerLessEqual), "IF_INTEGER_LESS_EQUAL");
        assert_eq!(opcode_name(OpCode::Pop), "POP");
    }

    #[test]
    fn test_decode_skips_operands() {
        let mut stream = BytecodeStream::new();
        stream.push_op(OpCode::IntConstant, 1);
        stream.push_i64(7, 1);
        stream.push_op(OpCode::Pop, 1);
        stream.push_op(OpCode::Halt, 1);

        let ops: Vec<OpCode> = decode(&stream).into_iter().map(|(_, op)| op).collect();
        assert_eq!(ops, vec![OpCode::IntConstant, OpCode::Pop, OpCode::Halt]);
    }

    #[test]
    fn test_decode_reports_offsets() {
        let mut stream = BytecodeStream::new();
        stream.push_op(OpCode::Jump, 1);
        stream.push_u16(5, 1);
        stream.push_op(OpCode::Halt, 1);

        let decoded = decode(&stream);
        assert_eq!(decoded[0].0, 0);
        assert_eq!(decoded[1].0, 3);
    }
}
