//! Recursive-descent parser for Midori.
//!
//! The parser resolves every name to a [`VariableSemantic`] while
//! parsing: it tracks a scope stack, the current closure depth, the
//! local count of the current frame, and the total local count across
//! all active frames. A name declared in the current frame is `Local`
//! (frame-relative slot), one declared in an enclosing frame is `Cell`
//! (index into the closure environment), and one declared at the
//! outermost scope is `Global`.

mod expressions;
mod statements;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::ast::{ProgramTree, Statement, TypeExpr, VariableSemantic};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone)]
pub(crate) struct VariableContext {
    pub relative_index: Option<usize>,
    pub absolute_index: Option<usize>,
    pub closure_depth: usize,
    pub is_fixed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Scope {
    pub variables: HashMap<String, VariableContext>,
    /// Names declared here that own no stack slot (structs, unions and
    /// their variant constructors).
    pub typelike: HashSet<String>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopContext {
    /// Total-local watermark a `break` pops back to.
    pub break_base: usize,
    /// Total-local watermark a `continue` pops back to; for `for` loops
    /// this sits above the control variable so it survives iterations.
    pub continue_base: usize,
}

pub(crate) type ParseOutcome<T> = Result<T, ParseError>;

#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    file_name: PathBuf,
    pub(crate) scopes: Vec<Scope>,
    pub(crate) closure_depth: usize,
    pub(crate) locals_in_current_frame: usize,
    pub(crate) total_locals: usize,
    pub(crate) loop_stack: Vec<LoopContext>,
    /// include-file dependency edges, for cycle detection.
    dependencies: HashMap<PathBuf, Vec<PathBuf>>,
    included: HashSet<PathBuf>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, file_name: impl AsRef<Path>) -> Self {
        let file_name = absolute(file_name.as_ref());
        let mut dependencies = HashMap::new();
        dependencies.insert(file_name.clone(), Vec::new());
        let mut included = HashSet::new();
        included.insert(file_name.clone());
        Self {
            tokens,
            current: 0,
            file_name,
            scopes: Vec::new(),
            closure_depth: 0,
            locals_in_current_frame: 0,
            total_locals: 0,
            loop_stack: Vec::new(),
            dependencies,
            included,
        }
    }

    /// Parse the whole token stream. Parsing continues past errors so a
    /// single compile reports as many problems as possible.
    pub fn parse(mut self) -> Result<ProgramTree, Vec<String>> {
        let mut program = ProgramTree::new();
        let mut errors = Vec::new();

        self.begin_scope();
        while !self.is_at_end() {
            while self.check(TokenKind::Directive, 0) {
                self.advance();
                if let Err(e) = self.handle_directive() {
                    errors.push(e.message);
                }
            }
            if self.is_at_end() {
                break;
            }
            match self.parse_declaration() {
                Ok(stmt) => program.push(stmt),
                Err(e) => errors.push(e.message),
            }
        }
        self.end_scope();

        if errors.is_empty() {
            Ok(program)
        } else {
            Err(errors)
        }
    }

    // ==================== Token cursor ====================

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek(0).kind == TokenKind::Eof
    }

    pub(crate) fn peek(&self, offset: usize) -> &Token {
        let idx = self.current + offset;
        if idx < self.tokens.len() {
            &self.tokens[idx]
        } else {
            &self.tokens[self.tokens.len() - 1]
        }
    }

    pub(crate) fn previous(&self) -> Token {
        self.tokens[self.current - 1].clone()
    }

    pub(crate) fn check(&self, kind: TokenKind, offset: usize) -> bool {
        !self.is_at_end() && self.peek(offset).kind == kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub(crate) fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|k| self.check(*k, 0)) {
            self.advance();
            return true;
        }
        false
    }

    pub(crate) fn consume(&mut self, kind: TokenKind, message: &str) -> ParseOutcome<Token> {
        if self.check(kind, 0) {
            return Ok(self.advance());
        }
        let at = self.peek(0).clone();
        Err(self.error(message, &at))
    }

    /// Build a diagnostic and skip ahead to the next likely statement
    /// boundary so later errors still surface.
    pub(crate) fn error(&mut self, message: &str, token: &Token) -> ParseError {
        let err = ParseError::parser(message, &token.lexeme, token.line);
        self.synchronize();
        err
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous_is_semicolon() {
                return;
            }
            match self.peek(0).kind {
                TokenKind::Var
                | TokenKind::Fixed
                | TokenKind::Struct
                | TokenKind::Union
                | TokenKind::Foreign
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Switch
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn previous_is_semicolon(&self) -> bool {
        self.current > 0 && self.tokens[self.current - 1].kind == TokenKind::Semicolon
    }

    // ==================== Scopes & name resolution ====================

    pub(crate) fn begin_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost scope, returning how many stack slots it owned.
    pub(crate) fn end_scope(&mut self) -> usize {
        let scope = self.scopes.pop().expect("scope stack underflow");
        let local_count = scope
            .variables
            .values()
            .filter(|v| v.relative_index.is_some())
            .count();
        self.locals_in_current_frame -= local_count;
        self.total_locals -= local_count;
        local_count
    }

    pub(crate) fn is_at_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Register `name` in the innermost scope. Duplicate declarations in
    /// the same scope are an error; shadowing an outer scope is allowed.
    pub(crate) fn define_name(&mut self, name: &Token, is_fixed: bool) -> ParseOutcome<()> {
        let already_defined = self
            .scopes
            .last()
            .expect("no active scope")
            .variables
            .contains_key(&name.lexeme);
        if already_defined {
            return Err(self.error("A name with this spelling already exists in this scope.", name));
        }
        let closure_depth = self.closure_depth;
        self.scopes.last_mut().expect("no active scope").variables.insert(
            name.lexeme.clone(),
            VariableContext {
                relative_index: None,
                absolute_index: None,
                closure_depth,
                is_fixed,
            },
        );
        Ok(())
    }

    /// Assign the next stack slot to `name`. Globals (outermost scope)
    /// get no slot; they live in the global table.
    pub(crate) fn assign_local_slot(&mut self, name: &str) -> Option<usize> {
        if self.is_at_global_scope() {
            return None;
        }
        let relative = self.locals_in_current_frame;
        let absolute = self.total_locals;
        self.locals_in_current_frame += 1;
        self.total_locals += 1;
        let ctx = self
            .scopes
            .last_mut()
            .expect("no active scope")
            .variables
            .get_mut(name)
            .expect("assign_local_slot on undefined name");
        ctx.relative_index = Some(relative);
        ctx.absolute_index = Some(absolute);
        Some(relative)
    }

    /// Mark `name` as owning no stack slot (struct/union constructors).
    pub(crate) fn mark_typelike(&mut self, name: &str) {
        let scope = self.scopes.last_mut().expect("no active scope");
        scope.typelike.insert(name.to_string());
    }

    /// Resolve a name to its semantic, searching innermost-out.
    /// Returns the semantic and whether the binding is `fixed`.
    /// Struct, union, and variant names own no runtime slot and do not
    /// resolve as values.
    pub(crate) fn resolve(&self, name: &str) -> Option<(VariableSemantic, bool)> {
        for (scope_idx, scope) in self.scopes.iter().enumerate().rev() {
            if scope.typelike.contains(name) {
                return None;
            }
            if let Some(ctx) = scope.variables.get(name) {
                let semantic = if scope_idx == 0 {
                    VariableSemantic::Global
                } else if ctx.closure_depth == self.closure_depth {
                    VariableSemantic::Local {
                        relative_index: ctx.relative_index?,
                    }
                } else {
                    VariableSemantic::Cell {
                        absolute_index: ctx.absolute_index?,
                    }
                };
                return Some((semantic, ctx.is_fixed));
            }
        }
        None
    }

    // ==================== Include directives ====================

    fn handle_directive(&mut self) -> ParseOutcome<()> {
        let directive = self.previous();
        if directive.lexeme != "include" {
            return Err(self.error(
                &format!("Unknown directive '{}'.", directive.lexeme),
                &directive,
            ));
        }

        let path_token =
            self.consume(TokenKind::TextLiteral, "Expected text literal after include directive.")?;
        let include_path = absolute(Path::new(&path_token.lexeme));

        if self.included.contains(&include_path) {
            return Ok(());
        }

        self.dependencies
            .entry(self.file_name.clone())
            .or_default()
            .push(include_path.clone());
        if self.has_circular_dependency() {
            return Err(self.error("Circular dependency detected.", &path_token));
        }

        let source = match std::fs::read_to_string(&include_path) {
            Ok(s) => s,
            Err(_) => return Err(self.error("Could not open include file.", &path_token)),
        };
        let mut included_tokens = match Lexer::new(&source).lex() {
            Ok(t) => t,
            Err(errors) => {
                let first = errors.into_iter().next().expect("at least one lexer error");
                return Err(first);
            }
        };
        // Drop the included file's Eof and splice its tokens in place.
        included_tokens.pop();
        self.included.insert(include_path);
        self.tokens
            .splice(self.current..self.current, included_tokens);
        Ok(())
    }

    fn has_circular_dependency(&self) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![self.file_name.clone()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                return true;
            }
            if let Some(deps) = self.dependencies.get(&current) {
                stack.extend(deps.iter().cloned());
            }
        }
        false
    }

    // ==================== Return-path analysis ====================

    /// Conservative "returns in all paths" check the code generator
    /// trusts when compiling closure bodies.
    pub(crate) fn has_return_statement(stmt: &Statement) -> bool {
        match stmt {
            Statement::Return { .. } => true,
            Statement::If {
                true_branch,
                else_branch,
                ..
            } => match else_branch {
                Some(else_branch) => {
                    Self::has_return_statement(true_branch)
                        && Self::has_return_statement(else_branch)
                }
                None => false,
            },
            Statement::Block { statements, .. } => {
                statements.iter().any(Self::has_return_statement)
            }
            Statement::While { body, .. } | Statement::For { body, .. } => {
                Self::has_return_statement(body)
            }
            _ => false,
        }
    }

    // ==================== Types ====================

    pub(crate) fn parse_type(&mut self) -> ParseOutcome<TypeExpr> {
        if self.matches(&[TokenKind::IntType]) {
            Ok(TypeExpr::Integer)
        } else if self.matches(&[TokenKind::FracType]) {
            Ok(TypeExpr::Fraction)
        } else if self.matches(&[TokenKind::TextType]) {
            Ok(TypeExpr::Text)
        } else if self.matches(&[TokenKind::BoolType]) {
            Ok(TypeExpr::Bool)
        } else if self.matches(&[TokenKind::UnitType]) {
            Ok(TypeExpr::Unit)
        } else if self.matches(&[TokenKind::ArrayType]) {
            self.consume(TokenKind::LeftBracket, "Expected '[' after 'Array'.")?;
            let element = self.parse_type()?;
            self.consume(TokenKind::RightBracket, "Expected ']' after array element type.")?;
            Ok(TypeExpr::Array(Box::new(element)))
        } else if self.matches(&[TokenKind::LeftParen]) {
            let mut params = Vec::new();
            if !self.matches(&[TokenKind::RightParen]) {
                loop {
                    params.push(self.parse_type()?);
                    if !self.matches(&[TokenKind::Comma]) {
                        break;
                    }
                }
                self.consume(TokenKind::RightParen, "Expected ')' after parameter types.")?;
            }
            self.consume(TokenKind::ThinArrow, "Expected '->' before return type.")?;
            let ret = self.parse_type()?;
            Ok(TypeExpr::Function(params, Box::new(ret)))
        } else if self.matches(&[TokenKind::Identifier]) {
            Ok(TypeExpr::Named(self.previous().lexeme))
        } else {
            let at = self.peek(0).clone();
            Err(self.error("Expected type.", &at))
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
