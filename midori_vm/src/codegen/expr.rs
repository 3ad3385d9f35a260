//! Expression emission.

use midori_parser::ast::{
    CastKind, ConstructKind, Expression, OperandKind, VariableSemantic,
};
use midori_parser::token::TokenKind;

use crate::bytecode::OpCode;

use super::{CodeGenerator, MAX_ARITY, MAX_ARRAY_LITERAL, MAX_CAPTURED, MAX_VARIABLE_INDEX};

impl CodeGenerator {
    pub(crate) fn generate_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::IntegerLiteral { token } => match token.lexeme.parse::<i64>() {
                Ok(value) => self.emit_integer(value, token.line),
                Err(_) => self.add_error("Integer literal out of range.", token.line),
            },
            Expression::FractionLiteral { token } => match token.lexeme.parse::<f64>() {
                Ok(value) => self.emit_fraction(value, token.line),
                Err(_) => self.add_error("Fraction literal out of range.", token.line),
            },
            Expression::TextLiteral { token } => {
                let index = self.executable.add_text_constant(&token.lexeme);
                self.emit_constant_load(index, token.line);
            }
            Expression::BoolLiteral { token } => {
                let op = if token.lexeme == "true" {
                    OpCode::True
                } else {
                    OpCode::False
                };
                self.emit_op(op, token.line);
            }
            Expression::UnitLiteral { token } => self.emit_op(OpCode::Unit, token.line),
            Expression::Group { inner } => self.generate_expression(inner),
            Expression::Variable { name, semantic } => match semantic {
                VariableSemantic::Local { relative_index } => {
                    self.emit_indexed(OpCode::GetLocal, *relative_index, name.line);
                }
                VariableSemantic::Cell { absolute_index } => {
                    self.emit_indexed(OpCode::GetCell, *absolute_index, name.line);
                }
                VariableSemantic::Global => {
                    let slot = self.global_slot(&name.lexeme, name.line);
                    self.emit_indexed(OpCode::GetGlobal, slot, name.line);
                }
            },
            Expression::Bind {
                name,
                value,
                semantic,
            } => {
                self.generate_expression(value);
                match semantic {
                    VariableSemantic::Local { relative_index } => {
                        self.emit_indexed(OpCode::SetLocal, *relative_index, name.line);
                    }
                    VariableSemantic::Cell { absolute_index } => {
                        self.emit_indexed(OpCode::SetCell, *absolute_index, name.line);
                    }
                    VariableSemantic::Global => {
                        let slot = self.global_slot(&name.lexeme, name.line);
                        self.emit_indexed(OpCode::SetGlobal, slot, name.line);
                    }
                }
            }
            Expression::Binary {
                op,
                left,
                right,
                operand,
            } => self.generate_binary(op.kind, op.line, left, right, *operand),
            Expression::Unary { op, expr, operand } => {
                self.generate_expression(expr);
                let opcode = match (op.kind, operand) {
                    (TokenKind::Minus, OperandKind::Fraction) => OpCode::NegateFraction,
                    (TokenKind::Minus, _) => OpCode::NegateInteger,
                    (TokenKind::Bang, _) => OpCode::Not,
                    (TokenKind::Tilde, _) => OpCode::BitwiseNot,
                    _ => {
                        self.add_error("Unrecognized unary operator.", op.line);
                        return;
                    }
                };
                self.emit_op(opcode, op.line);
            }
            Expression::Ternary {
                question,
                condition,
                true_branch,
                else_branch,
                condition_kind,
            } => {
                let line = question.line;
                let site = self.generate_condition(condition, *condition_kind, line);
                self.generate_expression(true_branch);
                let end_jump = self.emit_jump(OpCode::Jump, line);
                self.land_condition_exit(site, line);
                self.generate_expression(else_branch);
                self.patch_jump(end_jump, line);
            }
            Expression::Call {
                paren,
                callee,
                arguments,
                is_foreign,
            } => {
                if arguments.len() > MAX_ARITY {
                    self.add_error("Too many call arguments (max 255).", paren.line);
                    return;
                }
                if *is_foreign {
                    // The foreign-function value sits beneath the
                    // arguments; the VM digs it out after staging them.
                    self.generate_expression(callee);
                    for argument in arguments {
                        self.generate_expression(argument);
                    }
                    self.emit_op(OpCode::CallForeign, paren.line);
                } else {
                    // The callee closure sits on top of the arguments.
                    for argument in arguments {
                        self.generate_expression(argument);
                    }
                    self.generate_expression(callee);
                    self.emit_op(OpCode::CallDefined, paren.line);
                }
                self.emit_byte(arguments.len() as u8, paren.line);
            }
            Expression::Get {
                member_name,
                object,
                member_index,
            } => {
                self.generate_expression(object);
                let index = member_index.expect("checker fills member indices");
                self.emit_indexed(OpCode::GetMember, index, member_name.line);
            }
            Expression::Set {
                member_name,
                object,
                value,
                member_index,
            } => {
                self.generate_expression(object);
                self.generate_expression(value);
                let index = member_index.expect("checker fills member indices");
                self.emit_indexed(OpCode::SetMember, index, member_name.line);
            }
            Expression::Array { bracket, elements } => {
                if elements.len() > MAX_ARRAY_LITERAL {
                    self.add_error("Too many array elements (max 16777215).", bracket.line);
                    return;
                }
                for element in elements {
                    self.generate_expression(element);
                }
                self.emit_op(OpCode::CreateArray, bracket.line);
                self.current.push_u24(elements.len() as u32, bracket.line);
            }
            Expression::ArrayGet {
                bracket,
                array,
                indices,
            } => {
                if indices.len() > MAX_VARIABLE_INDEX {
                    self.add_error("Too many array indices (max 255).", bracket.line);
                    return;
                }
                self.generate_expression(array);
                for index in indices {
                    self.generate_expression(index);
                }
                self.emit_op(OpCode::GetArray, bracket.line);
                self.emit_byte(indices.len() as u8, bracket.line);
            }
            Expression::ArraySet {
                bracket,
                array,
                indices,
                value,
            } => {
                if indices.len() > MAX_VARIABLE_INDEX {
                    self.add_error("Too many array indices (max 255).", bracket.line);
                    return;
                }
                self.generate_expression(array);
                for index in indices {
                    self.generate_expression(index);
                }
                self.generate_expression(value);
                self.emit_op(OpCode::SetArray, bracket.line);
                self.emit_byte(indices.len() as u8, bracket.line);
            }
            Expression::Closure {
                keyword,
                params,
                body,
                captured_count,
                ..
            } => {
                let line = keyword.line;
                if params.len() > MAX_ARITY {
                    self.add_error("Too many parameters (max 255).", line);
                    return;
                }
                let new_captures = captured_count - self.enclosing_captured();
                if new_captures > MAX_CAPTURED {
                    self.add_error("Too many captured variables (max 255).", line);
                    return;
                }

                let name = format!("<closure line {}>", line);
                let index = self.compile_procedure(name, *captured_count, body, line);

                self.emit_indexed(OpCode::AllocateClosure, index, line);
                self.emit_op(OpCode::ConstructClosure, line);
                self.emit_byte(new_captures as u8, line);
            }
            Expression::Construct {
                name,
                arguments,
                kind,
            } => {
                for argument in arguments {
                    self.generate_expression(argument);
                }
                match kind.expect("checker resolves constructs") {
                    ConstructKind::Struct { arity } => {
                        if arity > MAX_ARITY {
                            self.add_error("Too many struct members (max 255).", name.line);
                            return;
                        }
                        self.emit_op(OpCode::ConstructStruct, name.line);
                        self.emit_byte(arity as u8, name.line);
                    }
                    ConstructKind::UnionVariant { tag, arity } => {
                        if arity > MAX_ARITY {
                            self.add_error("Too many variant fields (max 255).", name.line);
                            return;
                        }
                        self.emit_op(OpCode::ConstructUnion, name.line);
                        self.emit_byte(arity as u8, name.line);
                        self.emit_op(OpCode::SetTag, name.line);
                        self.emit_byte(tag, name.line);
                    }
                }
            }
            Expression::As { keyword, expr, cast, .. } => {
                self.generate_expression(expr);
                let opcode = match cast.expect("checker resolves casts") {
                    CastKind::ToFraction => OpCode::CastToFraction,
                    CastKind::ToInteger => OpCode::CastToInteger,
                    CastKind::ToText => OpCode::CastToText,
                    CastKind::ToBool => OpCode::CastToBool,
                    CastKind::ToUnit => OpCode::CastToUnit,
                    // Layout-identical structs: the value is already in
                    // the right shape.
                    CastKind::StructIdentity => return,
                };
                self.emit_op(opcode, keyword.line);
            }
        }
    }

    fn generate_binary(
        &mut self,
        op: TokenKind,
        line: u32,
        left: &Expression,
        right: &Expression,
        operand: OperandKind,
    ) {
        // Short-circuit forms leave the deciding value on the stack;
        // the taken path pops it before evaluating the other side.
        if op == TokenKind::DoubleBar {
            self.generate_expression(left);
            let end_jump = self.emit_jump(OpCode::JumpIfTrue, line);
            self.emit_op(OpCode::Pop, line);
            self.generate_expression(right);
            self.patch_jump(end_jump, line);
            return;
        }
        if op == TokenKind::DoubleAmpersand {
            self.generate_expression(left);
            let end_jump = self.emit_jump(OpCode::JumpIfFalse, line);
            self.emit_op(OpCode::Pop, line);
            self.generate_expression(right);
            self.patch_jump(end_jump, line);
            return;
        }

        self.generate_expression(left);
        self.generate_expression(right);

        let integer = operand == OperandKind::Integer;
        let opcode = match op {
            TokenKind::Plus if integer => OpCode::AddInteger,
            TokenKind::Plus => OpCode::AddFraction,
            TokenKind::Minus if integer => OpCode::SubtractInteger,
            TokenKind::Minus => OpCode::SubtractFraction,
            TokenKind::Star if operand == OperandKind::Array => OpCode::DupArray,
            TokenKind::Star if integer => OpCode::MultiplyInteger,
            TokenKind::Star => OpCode::MultiplyFraction,
            TokenKind::Slash if integer => OpCode::DivideInteger,
            TokenKind::Slash => OpCode::DivideFraction,
            TokenKind::Percent if integer => OpCode::ModuloInteger,
            TokenKind::Percent => OpCode::ModuloFraction,
            TokenKind::PlusPlus if operand == OperandKind::Text => OpCode::ConcatText,
            TokenKind::PlusPlus => OpCode::ConcatArray,
            TokenKind::ColonPlus => OpCode::AddBackArray,
            TokenKind::PlusColon => OpCode::AddFrontArray,
            TokenKind::LeftShift => OpCode::LeftShift,
            TokenKind::RightShift => OpCode::RightShift,
            TokenKind::Ampersand => OpCode::BitwiseAnd,
            TokenKind::Bar => OpCode::BitwiseOr,
            TokenKind::Caret => OpCode::BitwiseXor,
            TokenKind::Less if integer => OpCode::LessInteger,
            TokenKind::Less => OpCode::LessFraction,
            TokenKind::LessEqual if integer => OpCode::LessEqualInteger,
            TokenKind::LessEqual => OpCode::LessEqualFraction,
            TokenKind::Greater if integer => OpCode::GreaterInteger,
            TokenKind::Greater => OpCode::GreaterFraction,
            TokenKind::GreaterEqual if integer => OpCode::GreaterEqualInteger,
            TokenKind::GreaterEqual => OpCode::GreaterEqualFraction,
            TokenKind::DoubleEqual if operand == OperandKind::Text => OpCode::EqualText,
            TokenKind::DoubleEqual if integer => OpCode::EqualInteger,
            TokenKind::DoubleEqual => OpCode::EqualFraction,
            TokenKind::BangEqual if operand == OperandKind::Text => {
                // There is no NOT_EQUAL_TEXT; compare and negate.
                self.emit_op(OpCode::EqualText, line);
                self.emit_op(OpCode::Not, line);
                return;
            }
            TokenKind::BangEqual if integer => OpCode::NotEqualInteger,
            TokenKind::BangEqual => OpCode::NotEqualFraction,
            _ => {
                self.add_error("Unrecognized binary operator.", line);
                return;
            }
        };
        self.emit_op(opcode, line);
    }
}
