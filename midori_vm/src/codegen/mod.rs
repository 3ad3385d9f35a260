//! Bytecode generation from the typed AST.
//!
//! One procedure is emitted for the top level (index 0) and one per
//! closure. Literals go to the shared constant pool, globals to the
//! shared name table; every procedure carries its own line map. All
//! encoding limits are enforced here; nothing is silently truncated.

mod expr;

use std::collections::HashMap;

use midori_parser::ast::{ConditionOperand, Expression, ProgramTree, Statement, SwitchCase};
use midori_parser::token::TokenKind;

use crate::bytecode::{BytecodeStream, OpCode};
use crate::error::code_generator_error;
use crate::executable::Executable;

pub(crate) const MAX_CONSTANTS: usize = 0xFF_FFFF;
pub(crate) const MAX_VARIABLE_INDEX: usize = u8::MAX as usize;
pub(crate) const MAX_JUMP: usize = u16::MAX as usize;
pub(crate) const MAX_ARITY: usize = u8::MAX as usize;
pub(crate) const MAX_ARRAY_LITERAL: usize = 0xFF_FFFF;
pub(crate) const MAX_PROCEDURES: usize = u8::MAX as usize;
pub(crate) const MAX_CAPTURED: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    While,
    For,
}

#[derive(Debug)]
struct LoopFrame {
    kind: LoopKind,
    start: usize,
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

/// How a condition was emitted: a fused compare-and-branch, or a plain
/// boolean with a peeking conditional jump (whose value each path must
/// pop).
#[derive(Debug, Clone, Copy)]
enum ConditionSite {
    Fused { exit_jump: usize },
    Plain { exit_jump: usize },
}

#[derive(Debug)]
pub struct CodeGenerator {
    executable: Executable,
    /// Completed closure procedures; final index is position + 1.
    compiled: Vec<(BytecodeStream, String)>,
    current: BytecodeStream,
    current_name: String,
    errors: Vec<String>,
    globals: HashMap<String, usize>,
    loop_stack: Vec<LoopFrame>,
    /// Environment sizes of the enclosing closure chain; the last entry
    /// is the active procedure's captured-cell count.
    captured_stack: Vec<usize>,
}

/// Generate an executable from a checked program.
pub fn generate(program: ProgramTree) -> Result<Executable, Vec<String>> {
    let mut generator = CodeGenerator {
        executable: Executable::new(),
        compiled: Vec::new(),
        current: BytecodeStream::new(),
        current_name: "<main>".to_string(),
        errors: Vec::new(),
        globals: HashMap::new(),
        loop_stack: Vec::new(),
        captured_stack: vec![0],
    };

    for statement in &program {
        generator.generate_statement(statement);
    }
    generator.emit_op(OpCode::Halt, generator.last_line());

    if !generator.errors.is_empty() {
        return Err(generator.errors);
    }

    let mut procedures = Vec::with_capacity(generator.compiled.len() + 1);
    let mut names = Vec::with_capacity(generator.compiled.len() + 1);
    procedures.push(generator.current);
    names.push(generator.current_name);
    for (stream, name) in generator.compiled {
        procedures.push(stream);
        names.push(name);
    }
    let mut executable = generator.executable;
    executable.attach_procedures(procedures, names);
    Ok(executable)
}

impl CodeGenerator {
    // ==================== Emission helpers ====================

    pub(crate) fn emit_op(&mut self, op: OpCode, line: u32) {
        self.current.push_op(op, line);
    }

    pub(crate) fn emit_byte(&mut self, byte: u8, line: u32) {
        self.current.push_byte(byte, line);
    }

    fn last_line(&self) -> u32 {
        let len = self.current.len();
        if len == 0 {
            1
        } else {
            self.current.line_at(len - 1)
        }
    }

    pub(crate) fn add_error(&mut self, detail: &str, line: u32) {
        self.errors.push(code_generator_error(detail, line));
    }

    /// Emit a `u8`-indexed instruction, rejecting out-of-range indices.
    pub(crate) fn emit_indexed(&mut self, op: OpCode, index: usize, line: u32) {
        if index > MAX_VARIABLE_INDEX {
            self.add_error("Too many variables (max 255).", line);
            return;
        }
        self.emit_op(op, line);
        self.emit_byte(index as u8, line);
    }

    /// Load a pool constant with the narrowest index encoding.
    pub(crate) fn emit_constant_load(&mut self, index: usize, line: u32) {
        if index <= u8::MAX as usize {
            self.emit_op(OpCode::LoadConstant, line);
            self.emit_byte(index as u8, line);
        } else if index <= u16::MAX as usize {
            self.emit_op(OpCode::LoadConstantLong, line);
            self.current.push_u16(index as u16, line);
        } else if index <= MAX_CONSTANTS {
            self.emit_op(OpCode::LoadConstantLongLong, line);
            self.current.push_u24(index as u32, line);
        } else {
            self.add_error("Too many constants (max 16777215).", line);
        }
    }

    pub(crate) fn emit_integer(&mut self, value: i64, line: u32) {
        self.emit_op(OpCode::IntConstant, line);
        self.current.push_i64(value, line);
    }

    pub(crate) fn emit_fraction(&mut self, value: f64, line: u32) {
        self.emit_op(OpCode::FracConstant, line);
        self.current.push_f64(value, line);
    }

    /// Emit a forward jump with a placeholder offset; returns the
    /// operand position for [`patch_jump`].
    pub(crate) fn emit_jump(&mut self, op: OpCode, line: u32) -> usize {
        self.emit_op(op, line);
        self.emit_byte(0xFF, line);
        self.emit_byte(0xFF, line);
        self.current.len() - 2
    }

    pub(crate) fn patch_jump(&mut self, operand_pos: usize, line: u32) {
        let distance = self.current.len() - operand_pos - 2;
        if distance > MAX_JUMP {
            self.add_error("Too much code to jump over (max 65535).", line);
            return;
        }
        let bytes = (distance as u16).to_le_bytes();
        self.current.set_byte(operand_pos, bytes[0]);
        self.current.set_byte(operand_pos + 1, bytes[1]);
    }

    pub(crate) fn emit_loop(&mut self, loop_start: usize, line: u32) {
        self.emit_op(OpCode::JumpBack, line);
        let offset = self.current.len() - loop_start + 2;
        if offset > MAX_JUMP {
            self.add_error("Loop body too large (max 65535).", line);
            return;
        }
        self.current.push_u16(offset as u16, line);
    }

    /// Discard `count` locals without cell promotion (break/continue).
    fn emit_pop_multiple(&mut self, mut count: usize, line: u32) {
        while count > 0 {
            let chunk = count.min(u8::MAX as usize);
            self.emit_op(OpCode::PopMultiple, line);
            self.emit_byte(chunk as u8, line);
            count -= chunk;
        }
    }

    /// Discard `count` locals at a scope exit; promotes pending cells.
    fn emit_pop_scope(&mut self, mut count: usize, line: u32) {
        loop {
            let chunk = count.min(u8::MAX as usize);
            self.emit_op(OpCode::PopScope, line);
            self.emit_byte(chunk as u8, line);
            count -= chunk;
            if count == 0 {
                break;
            }
        }
    }

    // ==================== Conditions ====================

    fn fused_opcode(op: TokenKind, kind: ConditionOperand) -> Option<OpCode> {
        let integer = kind == ConditionOperand::Integer;
        Some(match op {
            TokenKind::Less if integer => OpCode::IfIntegerLess,
            TokenKind::LessEqual if integer => OpCode::IfIntegerLessEqual,
            TokenKind::Greater if integer => OpCode::IfIntegerGreater,
            TokenKind::GreaterEqual if integer => OpCode::IfIntegerGreaterEqual,
            TokenKind::DoubleEqual if integer => OpCode::IfIntegerEqual,
            TokenKind::BangEqual if integer => OpCode::IfIntegerNotEqual,
            TokenKind::Less => OpCode::IfFractionLess,
            TokenKind::LessEqual => OpCode::IfFractionLessEqual,
            TokenKind::Greater => OpCode::IfFractionGreater,
            TokenKind::GreaterEqual => OpCode::IfFractionGreaterEqual,
            TokenKind::DoubleEqual => OpCode::IfFractionEqual,
            TokenKind::BangEqual => OpCode::IfFractionNotEqual,
            _ => return None,
        })
    }

    /// Compile a branch/loop condition. Numeric comparisons become one
    /// fused compare-and-branch; everything else is the classic
    /// peeking `JUMP_IF_FALSE` plus a `POP` on the fall-through path.
    fn generate_condition(
        &mut self,
        condition: &Expression,
        condition_kind: ConditionOperand,
        line: u32,
    ) -> ConditionSite {
        if condition_kind != ConditionOperand::Other {
            if let Expression::Binary {
                op, left, right, ..
            } = condition
            {
                if let Some(fused) = Self::fused_opcode(op.kind, condition_kind) {
                    self.generate_expression(left);
                    self.generate_expression(right);
                    let exit_jump = self.emit_jump(fused, line);
                    return ConditionSite::Fused { exit_jump };
                }
            }
        }
        self.generate_expression(condition);
        let exit_jump = self.emit_jump(OpCode::JumpIfFalse, line);
        self.emit_op(OpCode::Pop, line);
        ConditionSite::Plain { exit_jump }
    }

    /// Close a condition's exit edge: patch the jump here and pop the
    /// peeked boolean when one is on the stack.
    fn land_condition_exit(&mut self, site: ConditionSite, line: u32) {
        match site {
            ConditionSite::Fused { exit_jump } => self.patch_jump(exit_jump, line),
            ConditionSite::Plain { exit_jump } => {
                self.patch_jump(exit_jump, line);
                self.emit_op(OpCode::Pop, line);
            }
        }
    }

    // ==================== Statements ====================

    pub(crate) fn generate_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block {
                right_brace,
                statements,
                local_count,
            } => {
                for stmt in statements {
                    self.generate_statement(stmt);
                }
                if *local_count > 0 {
                    self.emit_pop_scope(*local_count, right_brace.line);
                }
            }
            Statement::Simple { semicolon, expr } => {
                self.generate_expression(expr);
                self.emit_op(OpCode::Pop, semicolon.line);
            }
            Statement::Define {
                name,
                value,
                local_index,
                ..
            } => {
                // Globals claim their slot before the initializer runs
                // so a closure bound here can call itself through it.
                let global_index = if local_index.is_none() {
                    let index = self.executable.add_global(name.lexeme.clone());
                    if index > MAX_VARIABLE_INDEX {
                        self.add_error("Too many global variables (max 255).", name.line);
                    }
                    self.globals.insert(name.lexeme.clone(), index);
                    Some(index)
                } else {
                    None
                };

                self.generate_expression(value);

                if let Some(index) = global_index {
                    self.emit_indexed(OpCode::DefineGlobal, index, name.line);
                }
                // A local's value simply stays at its frame slot.
            }
            Statement::If {
                keyword,
                condition,
                true_branch,
                else_branch,
                condition_kind,
            } => {
                let line = keyword.line;
                let site = self.generate_condition(condition, *condition_kind, line);
                self.generate_statement(true_branch);
                let else_jump = self.emit_jump(OpCode::Jump, line);
                self.land_condition_exit(site, line);
                if let Some(else_branch) = else_branch {
                    self.generate_statement(else_branch);
                }
                self.patch_jump(else_jump, line);
            }
            Statement::While {
                keyword,
                condition,
                body,
                condition_kind,
            } => {
                let line = keyword.line;
                let start = self.current.len();
                let site = self.generate_condition(condition, *condition_kind, line);
                self.loop_stack.push(LoopFrame {
                    kind: LoopKind::While,
                    start,
                    break_jumps: Vec::new(),
                    continue_jumps: Vec::new(),
                });

                self.generate_statement(body);

                let frame = self.loop_stack.pop().expect("while frame");
                self.emit_loop(frame.start, line);
                self.land_condition_exit(site, line);
                for jump in frame.break_jumps {
                    self.patch_jump(jump, line);
                }
            }
            Statement::For {
                keyword,
                initializer,
                condition,
                increment,
                body,
                control_local_count,
                condition_kind,
            } => {
                let line = keyword.line;
                if let Some(initializer) = initializer {
                    self.generate_statement(initializer);
                }
                let start = self.current.len();
                let site = match condition {
                    Some(condition) => self.generate_condition(condition, *condition_kind, line),
                    None => {
                        self.emit_op(OpCode::True, line);
                        let exit_jump = self.emit_jump(OpCode::JumpIfFalse, line);
                        self.emit_op(OpCode::Pop, line);
                        ConditionSite::Plain { exit_jump }
                    }
                };
                self.loop_stack.push(LoopFrame {
                    kind: LoopKind::For,
                    start,
                    break_jumps: Vec::new(),
                    continue_jumps: Vec::new(),
                });

                self.generate_statement(body);

                let frame = self.loop_stack.pop().expect("for frame");
                for jump in frame.continue_jumps {
                    self.patch_jump(jump, line);
                }
                if let Some(increment) = increment {
                    self.generate_statement(increment);
                }
                self.emit_loop(frame.start, line);
                self.land_condition_exit(site, line);
                if *control_local_count > 0 {
                    self.emit_pop_scope(*control_local_count, line);
                }
                for jump in frame.break_jumps {
                    self.patch_jump(jump, line);
                }
            }
            Statement::Break { keyword, pop_count } => {
                if self.loop_stack.is_empty() {
                    self.add_error("'break' outside of a loop.", keyword.line);
                    return;
                }
                self.emit_pop_multiple(*pop_count, keyword.line);
                let jump = self.emit_jump(OpCode::Jump, keyword.line);
                self.loop_stack
                    .last_mut()
                    .expect("loop frame")
                    .break_jumps
                    .push(jump);
            }
            Statement::Continue { keyword, pop_count } => {
                let Some(frame) = self.loop_stack.last() else {
                    self.add_error("'continue' outside of a loop.", keyword.line);
                    return;
                };
                let (kind, start) = (frame.kind, frame.start);
                self.emit_pop_multiple(*pop_count, keyword.line);
                match kind {
                    // A while continue re-tests the condition, which is
                    // already behind us.
                    LoopKind::While => self.emit_loop(start, keyword.line),
                    // A for continue runs the incrementer, which is
                    // emitted after the body.
                    LoopKind::For => {
                        let jump = self.emit_jump(OpCode::Jump, keyword.line);
                        self.loop_stack
                            .last_mut()
                            .expect("loop frame")
                            .continue_jumps
                            .push(jump);
                    }
                }
            }
            Statement::Return { keyword, value } => {
                self.generate_expression(value);
                self.emit_op(OpCode::Return, keyword.line);
            }
            Statement::Struct { .. } | Statement::Union { .. } => {
                // Type declarations exist only in the checker's world.
            }
            Statement::Switch {
                keyword,
                scrutinee,
                cases,
            } => self.generate_switch(keyword.line, scrutinee, cases),
            Statement::Foreign {
                name, local_index, ..
            } => {
                let index = self.executable.add_foreign_function_constant(&name.lexeme);
                self.emit_constant_load(index, name.line);
                if local_index.is_none() {
                    let global = self.executable.add_global(name.lexeme.clone());
                    if global > MAX_VARIABLE_INDEX {
                        self.add_error("Too many global variables (max 255).", name.line);
                    }
                    self.globals.insert(name.lexeme.clone(), global);
                    self.emit_indexed(OpCode::DefineGlobal, global, name.line);
                }
            }
        }
    }

    /// Switch dispatch: the scrutinee's payloads and tag are unpacked
    /// once; each case compares the tag copy with a fused branch. The
    /// matching case pops the tag, leaving the payloads in place as the
    /// case scope's locals. A default arm becomes one synthetic case
    /// per uncovered variant that discards that variant's payloads.
    fn generate_switch(&mut self, line: u32, scrutinee: &Expression, cases: &[SwitchCase]) {
        self.generate_expression(scrutinee);
        self.emit_op(OpCode::LoadTag, line);

        let mut end_jumps = Vec::new();
        let mut default_case = None;

        for case in cases {
            match case {
                SwitchCase::Member {
                    keyword,
                    bindings,
                    body,
                    tag,
                    ..
                } => {
                    let case_line = keyword.line;
                    let tag = tag.expect("checker fills case tags");
                    self.emit_op(OpCode::Dup, case_line);
                    self.emit_integer(tag as i64, case_line);
                    let next_case = self.emit_jump(OpCode::IfIntegerEqual, case_line);
                    // Matched: drop the tag, the payloads become the
                    // case bindings.
                    self.emit_op(OpCode::Pop, case_line);
                    self.generate_statement(body);
                    self.emit_pop_scope(bindings.len(), case_line);
                    end_jumps.push(self.emit_jump(OpCode::Jump, case_line));
                    self.patch_jump(next_case, case_line);
                }
                SwitchCase::Default { .. } => default_case = Some(case),
            }
        }

        if let Some(SwitchCase::Default {
            keyword,
            body,
            uncovered,
        }) = default_case
        {
            let case_line = keyword.line;
            let mut into_default = Vec::new();
            for (tag, arity) in uncovered {
                self.emit_op(OpCode::Dup, case_line);
                self.emit_integer(*tag as i64, case_line);
                let next_case = self.emit_jump(OpCode::IfIntegerEqual, case_line);
                self.emit_op(OpCode::Pop, case_line);
                self.emit_pop_multiple(*arity, case_line);
                into_default.push(self.emit_jump(OpCode::Jump, case_line));
                self.patch_jump(next_case, case_line);
            }
            for jump in into_default {
                self.patch_jump(jump, case_line);
            }
            self.generate_statement(body);
        }

        for jump in end_jumps {
            self.patch_jump(jump, line);
        }
    }

    // ==================== Closure procedures ====================

    /// Compile a closure body as a fresh procedure and return its index.
    pub(crate) fn compile_procedure(
        &mut self,
        name: String,
        captured_count: usize,
        body: &Statement,
        line: u32,
    ) -> usize {
        let parent_stream = std::mem::take(&mut self.current);
        let parent_name = std::mem::replace(&mut self.current_name, name);
        let parent_loops = std::mem::take(&mut self.loop_stack);
        self.captured_stack.push(captured_count);

        self.generate_statement(body);
        // Guard for bodies whose conservative return analysis
        // over-approximates (`while (c) { return x; }`): running off
        // the end yields Unit instead of undefined bytes.
        let end_line = self.last_line();
        self.emit_op(OpCode::Unit, end_line);
        self.emit_op(OpCode::Return, end_line);

        self.captured_stack.pop();
        self.loop_stack = parent_loops;
        let finished = std::mem::replace(&mut self.current, parent_stream);
        let finished_name = std::mem::replace(&mut self.current_name, parent_name);

        let index = self.compiled.len() + 1;
        if index > MAX_PROCEDURES {
            self.add_error("Too many procedures (max 255).", line);
        }
        self.compiled.push((finished, finished_name));
        index
    }

    pub(crate) fn enclosing_captured(&self) -> usize {
        *self.captured_stack.last().expect("captured stack")
    }

    pub(crate) fn global_slot(&mut self, name: &str, line: u32) -> usize {
        match self.globals.get(name) {
            Some(index) => *index,
            None => {
                self.add_error(
                    &format!("Global variable '{}' has no slot.", name),
                    line,
                );
                0
            }
        }
    }
}
