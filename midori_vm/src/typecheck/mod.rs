//! Static type checking.
//!
//! The checker assigns every expression an interned [`TypeId`], rejects
//! ill-typed programs, and annotates the AST with what the code
//! generator needs: typed operand kinds, condition operand kinds,
//! struct member indices, union variant tags, construct resolutions,
//! cast kinds, and the foreign flag on calls.
//!
//! Errors are accumulated; checking continues past failures wherever
//! recovery is sound, so one compile reports as many problems as
//! possible.

mod expr;

use std::collections::HashMap;

use midori_parser::ast::{
    ConditionOperand, Expression, OperandKind, ProgramTree, Statement, SwitchCase, TypeExpr,
};
use midori_parser::token::{Token, TokenKind};

use crate::error::type_checker_error;
use crate::types::{MidoriType, TypeId, TypeTable, UnionVariant};

pub(crate) type ExprOutcome = Result<TypeId, String>;

/// One lexical scope: value bindings, named types, and union variant
/// constructors declared here.
#[derive(Debug, Default)]
struct TypeScope {
    bindings: HashMap<String, TypeId>,
    named_types: HashMap<String, TypeId>,
    variant_unions: HashMap<String, TypeId>,
}

#[derive(Debug)]
pub struct TypeChecker<'t> {
    pub(crate) types: &'t mut TypeTable,
    scopes: Vec<TypeScope>,
    errors: Vec<String>,
    current_return_type: Option<TypeId>,
}

/// Check a whole program, mutating its annotation slots in place.
pub fn check_program(
    program: &mut ProgramTree,
    types: &mut TypeTable,
) -> Result<(), Vec<String>> {
    let mut checker = TypeChecker {
        types,
        scopes: vec![TypeScope::default()],
        errors: Vec::new(),
        current_return_type: None,
    };
    for statement in program.iter_mut() {
        checker.check_statement(statement);
    }
    if checker.errors.is_empty() {
        Ok(())
    } else {
        Err(checker.errors)
    }
}

impl<'t> TypeChecker<'t> {
    fn begin_scope(&mut self) {
        self.scopes.push(TypeScope::default());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn bind(&mut self, name: &str, ty: TypeId) {
        self.scopes
            .last_mut()
            .expect("no active type scope")
            .bindings
            .insert(name.to_string(), ty);
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<TypeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name).copied())
    }

    pub(crate) fn lookup_named_type(&self, name: &str) -> Option<TypeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.named_types.get(name).copied())
    }

    pub(crate) fn lookup_variant_union(&self, name: &str) -> Option<TypeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.variant_unions.get(name).copied())
    }

    fn add_error(&mut self, message: String) {
        self.errors.push(message);
    }

    /// Resolve a syntactic type annotation against the intern table.
    pub(crate) fn resolve_type_expr(
        &mut self,
        type_expr: &TypeExpr,
        at: &Token,
        is_foreign: bool,
    ) -> ExprOutcome {
        match type_expr {
            TypeExpr::Integer => Ok(self.types.integer()),
            TypeExpr::Fraction => Ok(self.types.fraction()),
            TypeExpr::Text => Ok(self.types.text()),
            TypeExpr::Bool => Ok(self.types.bool()),
            TypeExpr::Unit => Ok(self.types.unit()),
            TypeExpr::Array(element) => {
                let element = self.resolve_type_expr(element, at, false)?;
                Ok(self.types.intern_array(element))
            }
            TypeExpr::Function(params, ret) => {
                let mut param_ids = Vec::with_capacity(params.len());
                for param in params {
                    param_ids.push(self.resolve_type_expr(param, at, false)?);
                }
                let ret = self.resolve_type_expr(ret, at, false)?;
                Ok(self.types.intern_function(param_ids, ret, is_foreign))
            }
            TypeExpr::Named(name) => self.lookup_named_type(name).ok_or_else(|| {
                type_checker_error(
                    &format!("Undefined struct or union '{}'.", name),
                    at,
                    &[],
                    None,
                )
            }),
        }
    }

    // ==================== Statements ====================

    pub(crate) fn check_statement(&mut self, statement: &mut Statement) {
        match statement {
            Statement::Block { statements, .. } => {
                self.begin_scope();
                for stmt in statements.iter_mut() {
                    self.check_statement(stmt);
                }
                self.end_scope();
            }
            Statement::Simple { expr, .. } => {
                if let Err(e) = self.check_expression(expr) {
                    self.add_error(e);
                }
            }
            Statement::Define {
                name,
                annotation,
                value,
                ..
            } => self.check_define(name.clone(), annotation.clone(), value),
            Statement::If {
                keyword,
                condition,
                true_branch,
                else_branch,
                condition_kind,
            } => {
                match Self::check_condition_inner(self, keyword, condition, "If") {
                    Ok(kind) => *condition_kind = kind,
                    Err(e) => self.add_error(e),
                }
                self.check_statement(true_branch);
                if let Some(else_branch) = else_branch {
                    self.check_statement(else_branch);
                }
            }
            Statement::While {
                keyword,
                condition,
                body,
                condition_kind,
            } => {
                match Self::check_condition_inner(self, keyword, condition, "While") {
                    Ok(kind) => *condition_kind = kind,
                    Err(e) => self.add_error(e),
                }
                self.check_statement(body);
            }
            Statement::For {
                keyword,
                initializer,
                condition,
                increment,
                body,
                condition_kind,
                ..
            } => {
                self.begin_scope();
                if let Some(initializer) = initializer {
                    self.check_statement(initializer);
                }
                if let Some(condition) = condition {
                    match Self::check_condition_inner(self, keyword, condition, "For") {
                        Ok(kind) => *condition_kind = kind,
                        Err(e) => self.add_error(e),
                    }
                }
                if let Some(increment) = increment {
                    self.check_statement(increment);
                }
                self.check_statement(body);
                self.end_scope();
            }
            Statement::Break { .. } | Statement::Continue { .. } => {}
            Statement::Return { keyword, value } => {
                let actual = match self.check_expression(value) {
                    Ok(ty) => ty,
                    Err(e) => {
                        self.add_error(e);
                        return;
                    }
                };
                let Some(expected) = self.current_return_type else {
                    // The parser already rejects top-level returns.
                    return;
                };
                if actual != expected {
                    let expected_name = self.types.name_of(expected).to_string();
                    let actual_name = self.types.name_of(actual).to_string();
                    let message = type_checker_error(
                        "Return statement expression type error.",
                        keyword,
                        &[expected_name],
                        Some(&actual_name),
                    );
                    self.add_error(message);
                }
            }
            Statement::Struct { name, members } => self.check_struct(name.clone(), members),
            Statement::Union { name, variants } => self.check_union(name.clone(), variants),
            Statement::Switch {
                keyword,
                scrutinee,
                cases,
            } => self.check_switch(keyword.clone(), scrutinee, cases),
            Statement::Foreign { name, ty, .. } => {
                match self.resolve_type_expr(&ty.clone(), name, true) {
                    Ok(fn_type) => self.bind(&name.lexeme, fn_type),
                    Err(e) => self.add_error(e),
                }
            }
        }
    }

    fn check_define(
        &mut self,
        name: Token,
        annotation: Option<TypeExpr>,
        value: &mut Expression,
    ) {
        // A closure bound to a name may call itself: the binding is
        // installed from the declared signature before the body runs
        // through the checker.
        if let Expression::Closure {
            param_types,
            return_type,
            ..
        } = value
        {
            let declared = (|| -> ExprOutcome {
                let mut params = Vec::with_capacity(param_types.len());
                for param in param_types.clone().iter() {
                    params.push(self.resolve_type_expr(param, &name, false)?);
                }
                let ret = self.resolve_type_expr(&return_type.clone(), &name, false)?;
                Ok(self.types.intern_function(params, ret, false))
            })();
            let declared = match declared {
                Ok(ty) => ty,
                Err(e) => {
                    self.add_error(e);
                    return;
                }
            };
            if let Some(annotation) = &annotation {
                match self.resolve_type_expr(annotation, &name, false) {
                    Ok(annotated) if annotated != declared => {
                        let expected = self.types.name_of(annotated).to_string();
                        let actual = self.types.name_of(declared).to_string();
                        self.add_error(type_checker_error(
                            "Define statement type error",
                            &name,
                            &[expected],
                            Some(&actual),
                        ));
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.add_error(e);
                        return;
                    }
                }
            }
            self.bind(&name.lexeme, declared);
            if let Err(e) = self.check_expression(value) {
                self.add_error(e);
            }
            return;
        }

        // An empty array literal has no type of its own; the annotation
        // decides.
        if let Expression::Array { elements, .. } = value {
            if elements.is_empty() {
                match &annotation {
                    Some(annotation @ TypeExpr::Array(_)) => {
                        match self.resolve_type_expr(&annotation.clone(), &name, false) {
                            Ok(ty) => self.bind(&name.lexeme, ty),
                            Err(e) => self.add_error(e),
                        }
                    }
                    _ => self.add_error(type_checker_error(
                        "Must provide an array type annotation for an empty array.",
                        &name,
                        &[],
                        None,
                    )),
                }
                return;
            }
        }

        let actual = match self.check_expression(value) {
            Ok(ty) => ty,
            Err(e) => {
                self.add_error(e);
                return;
            }
        };
        if let Some(annotation) = &annotation {
            match self.resolve_type_expr(annotation, &name, false) {
                Ok(annotated) if annotated != actual => {
                    let expected = self.types.name_of(annotated).to_string();
                    let actual_name = self.types.name_of(actual).to_string();
                    self.add_error(type_checker_error(
                        "Define statement type error",
                        &name,
                        &[expected],
                        Some(&actual_name),
                    ));
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    self.add_error(e);
                    return;
                }
            }
        }
        self.bind(&name.lexeme, actual);
    }

    /// Check a branch/loop condition: it must be `Bool`, and when it is
    /// a numeric comparison the operand kind feeds fused branch
    /// selection.
    fn check_condition_inner(
        checker: &mut Self,
        keyword: &Token,
        condition: &mut Expression,
        construct: &str,
    ) -> Result<ConditionOperand, String> {
        let ty = checker.check_expression(condition)?;
        if !checker.types.is_bool(ty) {
            let actual = checker.types.name_of(ty).to_string();
            return Err(type_checker_error(
                &format!("{} statement condition must be of type Bool.", construct),
                keyword,
                &["Bool".to_string()],
                Some(&actual),
            ));
        }
        Ok(condition_operand_of(condition))
    }

    fn check_struct(&mut self, name: Token, members: &[(Token, TypeExpr)]) {
        let mut member_names = Vec::with_capacity(members.len());
        let mut member_types = Vec::with_capacity(members.len());
        for (member, type_expr) in members {
            match self.resolve_type_expr(type_expr, member, false) {
                Ok(ty) => {
                    member_names.push(member.lexeme.clone());
                    member_types.push(ty);
                }
                Err(e) => {
                    self.add_error(e);
                    return;
                }
            }
        }

        let Some(struct_type) =
            self.types
                .insert_struct(&name.lexeme, member_names, member_types.clone())
        else {
            self.add_error(type_checker_error(
                "A type with this name already exists.",
                &name,
                &[],
                None,
            ));
            return;
        };

        // The constructor is a function from the member types to the
        // struct, installed under the struct's name.
        let constructor = self.types.intern_function(member_types, struct_type, false);
        self.bind(&name.lexeme, constructor);
        self.scopes
            .last_mut()
            .expect("no active type scope")
            .named_types
            .insert(name.lexeme.clone(), struct_type);
    }

    fn check_union(&mut self, name: Token, variants: &[(Token, Vec<TypeExpr>)]) {
        if variants.len() > u8::MAX as usize + 1 {
            self.add_error(type_checker_error(
                "Too many union variants (max 256 tags).",
                &name,
                &[],
                None,
            ));
            return;
        }

        let mut resolved = Vec::with_capacity(variants.len());
        for (tag, (variant, field_exprs)) in variants.iter().enumerate() {
            let mut field_types = Vec::with_capacity(field_exprs.len());
            for field in field_exprs {
                match self.resolve_type_expr(field, variant, false) {
                    Ok(ty) => field_types.push(ty),
                    Err(e) => {
                        self.add_error(e);
                        return;
                    }
                }
            }
            resolved.push(UnionVariant {
                name: variant.lexeme.clone(),
                tag: tag as u8,
                field_types,
            });
        }

        let Some(union_type) = self.types.insert_union(&name.lexeme, resolved.clone()) else {
            self.add_error(type_checker_error(
                "A type with this name already exists.",
                &name,
                &[],
                None,
            ));
            return;
        };

        let scope = self.scopes.last_mut().expect("no active type scope");
        scope.named_types.insert(name.lexeme.clone(), union_type);
        for variant in &resolved {
            scope
                .variant_unions
                .insert(variant.name.clone(), union_type);
        }
        // One constructor per variant, bound under the variant's name.
        for variant in resolved {
            let constructor = self
                .types
                .intern_function(variant.field_types, union_type, false);
            self.bind(&variant.name, constructor);
        }
    }

    fn check_switch(
        &mut self,
        keyword: Token,
        scrutinee: &mut Expression,
        cases: &mut [SwitchCase],
    ) {
        let scrutinee_type = match self.check_expression(scrutinee) {
            Ok(ty) => ty,
            Err(e) => {
                self.add_error(e);
                return;
            }
        };
        let MidoriType::Union { variants, .. } = self.types.get(scrutinee_type) else {
            let actual = self.types.name_of(scrutinee_type).to_string();
            self.add_error(type_checker_error(
                "Switch statement scrutinee must be a union.",
                &keyword,
                &[],
                Some(&actual),
            ));
            return;
        };
        let variants = variants.clone();

        let mut remaining: Vec<&UnionVariant> = variants.iter().collect();
        let mut has_default = false;

        for case in cases.iter_mut() {
            match case {
                SwitchCase::Member {
                    variant,
                    bindings,
                    body,
                    tag,
                    ..
                } => {
                    let Some(declared) = variants.iter().find(|v| v.name == variant.lexeme)
                    else {
                        self.add_error(type_checker_error(
                            "Switch case does not name a variant of the scrutinee's union.",
                            variant,
                            &[],
                            None,
                        ));
                        return;
                    };
                    if bindings.len() != declared.field_types.len() {
                        self.add_error(type_checker_error(
                            &format!(
                                "Switch case arity error: variant '{}' has {} fields.",
                                declared.name,
                                declared.field_types.len()
                            ),
                            variant,
                            &[],
                            None,
                        ));
                        return;
                    }
                    *tag = Some(declared.tag);
                    remaining.retain(|v| v.tag != declared.tag);

                    self.begin_scope();
                    for (binding, field_type) in bindings.iter().zip(&declared.field_types) {
                        self.bind(&binding.lexeme, *field_type);
                    }
                    self.check_statement(body);
                    self.end_scope();
                }
                SwitchCase::Default { body, .. } => {
                    has_default = true;
                    self.begin_scope();
                    self.check_statement(body);
                    self.end_scope();
                }
            }
        }

        if !remaining.is_empty() && !has_default {
            self.add_error(type_checker_error(
                "Not all union variants are matched.",
                &keyword,
                &[],
                None,
            ));
            return;
        }

        // The generator compiles the default arm as one synthetic case
        // per uncovered variant; it needs each one's tag and arity.
        let uncovered_info: Vec<(u8, usize)> = remaining
            .iter()
            .map(|v| (v.tag, v.field_types.len()))
            .collect();
        for case in cases.iter_mut() {
            if let SwitchCase::Default { uncovered, .. } = case {
                *uncovered = uncovered_info.clone();
            }
        }
    }

    pub(crate) fn closure_return_type_swap(
        &mut self,
        new_return_type: Option<TypeId>,
    ) -> Option<TypeId> {
        std::mem::replace(&mut self.current_return_type, new_return_type)
    }

    pub(crate) fn with_case_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_scope();
        let result = f(self);
        self.end_scope();
        result
    }
}

/// Comparison conditions over `Int`/`Frac` drive fused branches.
pub(crate) fn condition_operand_of(condition: &Expression) -> ConditionOperand {
    if let Expression::Binary { op, operand, .. } = condition {
        let is_comparison = matches!(
            op.kind,
            TokenKind::Less
                | TokenKind::LessEqual
                | TokenKind::Greater
                | TokenKind::GreaterEqual
                | TokenKind::DoubleEqual
                | TokenKind::BangEqual
        );
        if is_comparison {
            return match operand {
                OperandKind::Integer => ConditionOperand::Integer,
                OperandKind::Fraction => ConditionOperand::Fraction,
                _ => ConditionOperand::Other,
            };
        }
    }
    ConditionOperand::Other
}
