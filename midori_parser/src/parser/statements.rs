//! Statement and declaration grammar.

use crate::ast::{Statement, SwitchCase, TypeExpr};
use crate::token::{Token, TokenKind};

use super::{LoopContext, ParseOutcome, Parser};

impl Parser {
    pub(crate) fn parse_declaration(&mut self) -> ParseOutcome<Statement> {
        if self.matches(&[TokenKind::Var, TokenKind::Fixed]) {
            return self.parse_define_statement();
        }
        if self.matches(&[TokenKind::Struct]) {
            return self.parse_struct_declaration();
        }
        if self.matches(&[TokenKind::Union]) {
            return self.parse_union_declaration();
        }
        if self.matches(&[TokenKind::Foreign]) {
            return self.parse_foreign_statement();
        }
        self.parse_statement()
    }

    fn parse_statement(&mut self) -> ParseOutcome<Statement> {
        if self.matches(&[TokenKind::LeftBrace]) {
            return self.parse_block_statement();
        }
        if self.matches(&[TokenKind::If]) {
            return self.parse_if_statement();
        }
        if self.matches(&[TokenKind::While]) {
            return self.parse_while_statement();
        }
        if self.matches(&[TokenKind::For]) {
            return self.parse_for_statement();
        }
        if self.matches(&[TokenKind::Break]) {
            return self.parse_break_statement();
        }
        if self.matches(&[TokenKind::Continue]) {
            return self.parse_continue_statement();
        }
        if self.matches(&[TokenKind::Return]) {
            return self.parse_return_statement();
        }
        if self.matches(&[TokenKind::Switch]) {
            return self.parse_switch_statement();
        }
        self.parse_simple_statement()
    }

    fn parse_block_statement(&mut self) -> ParseOutcome<Statement> {
        self.begin_scope();
        let mut statements = Vec::new();
        while !self.is_at_end() && !self.check(TokenKind::RightBrace, 0) {
            match self.parse_declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.end_scope();
                    return Err(e);
                }
            }
        }
        let right_brace = match self.consume(TokenKind::RightBrace, "Expected '}' after block.") {
            Ok(t) => t,
            Err(e) => {
                self.end_scope();
                return Err(e);
            }
        };
        let local_count = self.end_scope();
        Ok(Statement::Block {
            right_brace,
            statements,
            local_count,
        })
    }

    fn parse_define_statement(&mut self) -> ParseOutcome<Statement> {
        let is_fixed = self.previous().kind == TokenKind::Fixed;
        let name = self.consume(TokenKind::Identifier, "Expected variable name.")?;
        self.define_name(&name, is_fixed)?;

        let mut annotation = None;
        if self.matches(&[TokenKind::Colon]) {
            annotation = Some(self.parse_type()?);
        }

        // The slot is assigned before the initializer is parsed so a
        // closure bound here can reference itself recursively.
        let local_index = self.assign_local_slot(&name.lexeme);

        self.consume(TokenKind::Equal, "Expected '=' after variable name.")?;
        let value = self.parse_expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after variable definition.")?;

        Ok(Statement::Define {
            name,
            annotation,
            value,
            local_index,
            is_fixed,
        })
    }

    fn parse_struct_declaration(&mut self) -> ParseOutcome<Statement> {
        let name = self.consume(TokenKind::Identifier, "Expected struct name.")?;
        if !name.lexeme.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(self.error("Struct name must start with a capital letter.", &name));
        }
        self.define_name(&name, true)?;
        self.mark_typelike(&name.lexeme);

        self.consume(TokenKind::LeftBrace, "Expected '{' before struct body.")?;

        let mut members: Vec<(Token, TypeExpr)> = Vec::new();
        loop {
            if self.matches(&[TokenKind::RightBrace]) {
                break;
            }
            let member = self.consume(TokenKind::Identifier, "Expected struct member name.")?;
            self.consume(TokenKind::Colon, "Expected ':' before struct member type.")?;
            let ty = self.parse_type()?;

            if matches!(&ty, TypeExpr::Named(member_ty) if *member_ty == name.lexeme) {
                return Err(self.error("Recursive struct is not allowed.", &member));
            }
            members.push((member, ty));

            if self.matches(&[TokenKind::Comma]) {
                continue;
            }
            self.consume(TokenKind::RightBrace, "Expected ',' or '}' after struct member.")?;
            break;
        }

        self.consume(TokenKind::Semicolon, "Expected ';' after struct body.")?;
        Ok(Statement::Struct { name, members })
    }

    fn parse_union_declaration(&mut self) -> ParseOutcome<Statement> {
        let name = self.consume(TokenKind::Identifier, "Expected union name.")?;
        if !name.lexeme.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(self.error("Union name must start with a capital letter.", &name));
        }
        self.define_name(&name, true)?;
        self.mark_typelike(&name.lexeme);

        self.consume(TokenKind::LeftBrace, "Expected '{' before union body.")?;

        let mut variants: Vec<(Token, Vec<TypeExpr>)> = Vec::new();
        loop {
            if self.matches(&[TokenKind::RightBrace]) {
                break;
            }
            let variant = self.consume(TokenKind::Identifier, "Expected union variant name.")?;
            self.define_name(&variant, true)?;
            self.mark_typelike(&variant.lexeme);

            let mut field_types = Vec::new();
            if self.matches(&[TokenKind::LeftParen]) {
                loop {
                    field_types.push(self.parse_type()?);
                    if !self.matches(&[TokenKind::Comma]) {
                        break;
                    }
                }
                self.consume(TokenKind::RightParen, "Expected ')' after variant field types.")?;
            }
            variants.push((variant, field_types));

            if self.matches(&[TokenKind::Comma]) {
                continue;
            }
            self.consume(TokenKind::RightBrace, "Expected ',' or '}' after union variant.")?;
            break;
        }

        self.consume(TokenKind::Semicolon, "Expected ';' after union body.")?;
        Ok(Statement::Union { name, variants })
    }

    fn parse_foreign_statement(&mut self) -> ParseOutcome<Statement> {
        let name = self.consume(TokenKind::Identifier, "Expected foreign function name.")?;
        self.define_name(&name, true)?;
        let local_index = self.assign_local_slot(&name.lexeme);

        self.consume(TokenKind::Colon, "Expected ':' before foreign function type.")?;
        let ty = self.parse_type()?;
        if !matches!(ty, TypeExpr::Function(..)) {
            return Err(self.error("'foreign' only applies to function types.", &name));
        }
        self.consume(TokenKind::Semicolon, "Expected ';' after foreign declaration.")?;

        Ok(Statement::Foreign {
            name,
            ty,
            local_index,
        })
    }

    fn parse_if_statement(&mut self) -> ParseOutcome<Statement> {
        let keyword = self.previous();
        self.consume(TokenKind::LeftParen, "Expected '(' after 'if'.")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after if condition.")?;

        let true_branch = Box::new(self.parse_statement()?);
        let mut else_branch = None;
        if self.matches(&[TokenKind::Else]) {
            else_branch = Some(Box::new(self.parse_statement()?));
        }

        Ok(Statement::If {
            keyword,
            condition,
            true_branch,
            else_branch,
            condition_kind: Default::default(),
        })
    }

    fn parse_while_statement(&mut self) -> ParseOutcome<Statement> {
        let keyword = self.previous();
        self.loop_stack.push(LoopContext {
            break_base: self.total_locals,
            continue_base: self.total_locals,
        });

        let result = (|| {
            self.consume(TokenKind::LeftParen, "Expected '(' after 'while'.")?;
            let condition = self.parse_expression()?;
            self.consume(TokenKind::RightParen, "Expected ')' after while condition.")?;
            let body = Box::new(self.parse_statement()?);
            Ok(Statement::While {
                keyword,
                condition,
                body,
                condition_kind: Default::default(),
            })
        })();

        self.loop_stack.pop();
        result
    }

    fn parse_for_statement(&mut self) -> ParseOutcome<Statement> {
        let keyword = self.previous();
        let break_base = self.total_locals;
        let loop_depth = self.loop_stack.len();
        self.begin_scope();

        let result = self.parse_for_inner(keyword, break_base);

        if result.is_err() {
            self.end_scope();
        }
        // The context is pushed partway through parsing; only pop what
        // this loop actually pushed.
        self.loop_stack.truncate(loop_depth);
        result
    }

    fn parse_for_inner(&mut self, keyword: Token, break_base: usize) -> ParseOutcome<Statement> {
        // The loop context is pushed after the initializer so `continue`
        // keeps the control variable alive while `break` discards it.
        self.consume(TokenKind::LeftParen, "Expected '(' after 'for'.")?;

        let mut initializer = None;
        if self.matches(&[TokenKind::Var, TokenKind::Fixed]) {
            initializer = Some(Box::new(self.parse_define_statement()?));
        } else if !self.matches(&[TokenKind::Semicolon]) {
            initializer = Some(Box::new(self.parse_simple_statement()?));
        }

        self.loop_stack.push(LoopContext {
            break_base,
            continue_base: self.total_locals,
        });

        let mut condition = None;
        if !self.check(TokenKind::Semicolon, 0) {
            condition = Some(self.parse_expression()?);
        }
        let semicolon = self.consume(TokenKind::Semicolon, "Expected ';' after for condition.")?;

        let mut increment = None;
        if !self.check(TokenKind::RightParen, 0) {
            let expr = self.parse_expression()?;
            increment = Some(Box::new(Statement::Simple {
                semicolon,
                expr,
            }));
        }
        self.consume(TokenKind::RightParen, "Expected ')' after for clauses.")?;

        let body = Box::new(self.parse_statement()?);
        let control_local_count = self.end_scope();

        Ok(Statement::For {
            keyword,
            initializer,
            condition,
            increment,
            body,
            control_local_count,
            condition_kind: Default::default(),
        })
    }

    fn parse_break_statement(&mut self) -> ParseOutcome<Statement> {
        let keyword = self.previous();
        let Some(ctx) = self.loop_stack.last().copied() else {
            return Err(self.error("'break' must be used inside a loop.", &keyword));
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after 'break'.")?;
        Ok(Statement::Break {
            keyword,
            pop_count: self.total_locals - ctx.break_base,
        })
    }

    fn parse_continue_statement(&mut self) -> ParseOutcome<Statement> {
        let keyword = self.previous();
        let Some(ctx) = self.loop_stack.last().copied() else {
            return Err(self.error("'continue' must be used inside a loop.", &keyword));
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after 'continue'.")?;
        Ok(Statement::Continue {
            keyword,
            pop_count: self.total_locals - ctx.continue_base,
        })
    }

    fn parse_return_statement(&mut self) -> ParseOutcome<Statement> {
        let keyword = self.previous();
        if self.closure_depth == 0 {
            return Err(self.error("'return' must be used inside a closure.", &keyword));
        }
        let value = self.parse_expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after return value.")?;
        Ok(Statement::Return { keyword, value })
    }

    fn parse_simple_statement(&mut self) -> ParseOutcome<Statement> {
        let expr = self.parse_expression()?;
        let semicolon = self.consume(TokenKind::Semicolon, "Expected ';' after expression.")?;
        Ok(Statement::Simple { semicolon, expr })
    }

    fn parse_switch_statement(&mut self) -> ParseOutcome<Statement> {
        let keyword = self.previous();
        self.consume(TokenKind::LeftParen, "Expected '(' after 'switch'.")?;
        let scrutinee = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after switch value.")?;
        self.consume(TokenKind::LeftBrace, "Expected '{' before cases.")?;

        let mut cases: Vec<SwitchCase> = Vec::new();
        let mut seen_variants: Vec<String> = Vec::new();
        let mut has_default = false;

        while self.matches(&[TokenKind::Case, TokenKind::Default]) {
            let case_keyword = self.previous();
            if case_keyword.kind == TokenKind::Case {
                let variant = self.consume(TokenKind::Identifier, "Expected variant name.")?;
                if seen_variants.contains(&variant.lexeme) {
                    return Err(self.error("Duplicate case in switch statement.", &variant));
                }
                seen_variants.push(variant.lexeme.clone());

                self.begin_scope();
                let case = self.parse_member_case(case_keyword, variant);
                if case.is_err() {
                    self.end_scope();
                }
                let case = case?;
                self.end_scope();
                cases.push(case);
            } else {
                if has_default {
                    return Err(self.error("Cannot have more than one default case.", &case_keyword));
                }
                has_default = true;
                self.consume(TokenKind::Colon, "Expected ':' after 'default'.")?;
                let body = self.parse_statement()?;
                cases.push(SwitchCase::Default {
                    keyword: case_keyword,
                    body,
                    uncovered: Vec::new(),
                });
            }
        }

        self.consume(TokenKind::RightBrace, "Expected '}' after cases.")?;
        Ok(Statement::Switch {
            keyword,
            scrutinee,
            cases,
        })
    }

    fn parse_member_case(&mut self, keyword: Token, variant: Token) -> ParseOutcome<SwitchCase> {
        let mut bindings = Vec::new();
        if self.matches(&[TokenKind::LeftParen]) {
            if !self.matches(&[TokenKind::RightParen]) {
                loop {
                    let is_fixed = if self.matches(&[TokenKind::Fixed]) {
                        true
                    } else if self.matches(&[TokenKind::Var]) {
                        false
                    } else {
                        let at = self.peek(0).clone();
                        return Err(self.error("Expected 'var' or 'fixed'.", &at));
                    };
                    let binding = self.consume(TokenKind::Identifier, "Expected binding name.")?;
                    self.define_name(&binding, is_fixed)?;
                    self.assign_local_slot(&binding.lexeme);
                    bindings.push(binding);
                    if !self.matches(&[TokenKind::Comma]) {
                        break;
                    }
                }
                self.consume(TokenKind::RightParen, "Expected ')' after bindings.")?;
            }
        }
        self.consume(TokenKind::Colon, "Expected ':' after case.")?;
        let body = self.parse_statement()?;
        Ok(SwitchCase::Member {
            keyword,
            variant,
            bindings,
            body,
            tag: None,
        })
    }
}
