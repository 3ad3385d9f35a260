//! Expression rules.

use midori_parser::ast::{CastKind, ConstructKind, Expression, OperandKind, Statement};
use midori_parser::token::{Token, TokenKind};

use crate::error::type_checker_error;
use crate::types::MidoriType;

use super::{ExprOutcome, TypeChecker};

impl<'t> TypeChecker<'t> {
    pub(crate) fn check_expression(&mut self, expression: &mut Expression) -> ExprOutcome {
        match expression {
            Expression::IntegerLiteral { .. } => Ok(self.types.integer()),
            Expression::FractionLiteral { .. } => Ok(self.types.fraction()),
            Expression::TextLiteral { .. } => Ok(self.types.text()),
            Expression::BoolLiteral { .. } => Ok(self.types.bool()),
            Expression::UnitLiteral { .. } => Ok(self.types.unit()),
            Expression::Group { inner } => self.check_expression(inner),
            Expression::Variable { name, .. } => self.lookup(&name.lexeme).ok_or_else(|| {
                type_checker_error("Variable not found.", name, &[], None)
            }),
            Expression::Bind { name, value, .. } => {
                let value_type = self.check_expression(value)?;
                let Some(declared) = self.lookup(&name.lexeme) else {
                    return Err(type_checker_error("Variable not found.", name, &[], None));
                };
                if value_type != declared {
                    let expected = self.types.name_of(declared).to_string();
                    let actual = self.types.name_of(value_type).to_string();
                    return Err(type_checker_error(
                        "Bind expression type error",
                        name,
                        &[expected],
                        Some(&actual),
                    ));
                }
                Ok(declared)
            }
            Expression::Binary {
                op,
                left,
                right,
                operand,
            } => {
                let op = op.clone();
                let left_type = self.check_expression(left)?;
                let right_type = self.check_expression(right)?;
                self.check_binary(&op, left_type, right_type, operand)
            }
            Expression::Unary { op, expr, operand } => {
                let op = op.clone();
                let expr_type = self.check_expression(expr)?;
                self.check_unary(&op, expr_type, operand)
            }
            Expression::Ternary {
                question,
                condition,
                true_branch,
                else_branch,
                condition_kind,
            } => {
                let question = question.clone();
                let condition_type = self.check_expression(condition)?;
                if !self.types.is_bool(condition_type) {
                    let actual = self.types.name_of(condition_type).to_string();
                    return Err(type_checker_error(
                        "Ternary condition must be of type Bool.",
                        &question,
                        &["Bool".to_string()],
                        Some(&actual),
                    ));
                }
                *condition_kind = super::condition_operand_of(condition);

                let true_type = self.check_expression(true_branch)?;
                let else_type = self.check_expression(else_branch)?;
                if true_type != else_type {
                    let expected = self.types.name_of(true_type).to_string();
                    let actual = self.types.name_of(else_type).to_string();
                    return Err(type_checker_error(
                        "Ternary branches must have the same type.",
                        &question,
                        &[expected],
                        Some(&actual),
                    ));
                }
                Ok(true_type)
            }
            Expression::Call {
                paren,
                callee,
                arguments,
                is_foreign,
            } => {
                let paren = paren.clone();
                let callee_type = self.check_expression(callee)?;
                let MidoriType::Function {
                    params,
                    ret,
                    is_foreign: callee_foreign,
                } = self.types.get(callee_type)
                else {
                    let actual = self.types.name_of(callee_type).to_string();
                    return Err(type_checker_error(
                        "Call expression type error: not a callable.",
                        &paren,
                        &[],
                        Some(&actual),
                    ));
                };
                let params = params.clone();
                let ret = *ret;
                *is_foreign = *callee_foreign;

                if params.len() != arguments.len() {
                    return Err(type_checker_error(
                        "Call expression type error: incorrect arity.",
                        &paren,
                        &[],
                        None,
                    ));
                }
                for (argument, param) in arguments.iter_mut().zip(params) {
                    let argument_type = self.check_expression(argument)?;
                    if argument_type != param {
                        let expected = self.types.name_of(param).to_string();
                        let actual = self.types.name_of(argument_type).to_string();
                        return Err(type_checker_error(
                            "Call expression type error",
                            &paren,
                            &[expected],
                            Some(&actual),
                        ));
                    }
                }
                Ok(ret)
            }
            Expression::Get {
                member_name,
                object,
                member_index,
            } => {
                let member_name = member_name.clone();
                let object_type = self.check_expression(object)?;
                let (index, member_type) =
                    self.resolve_member(&member_name, object_type)?;
                *member_index = Some(index);
                Ok(member_type)
            }
            Expression::Set {
                member_name,
                object,
                value,
                member_index,
            } => {
                let member_name = member_name.clone();
                let object_type = self.check_expression(object)?;
                let value_type = self.check_expression(value)?;
                let (index, member_type) =
                    self.resolve_member(&member_name, object_type)?;
                if value_type != member_type {
                    let expected = self.types.name_of(member_type).to_string();
                    let actual = self.types.name_of(value_type).to_string();
                    return Err(type_checker_error(
                        "Set expression type error",
                        &member_name,
                        &[expected],
                        Some(&actual),
                    ));
                }
                *member_index = Some(index);
                Ok(value_type)
            }
            Expression::Array { bracket, elements } => {
                let bracket = bracket.clone();
                if elements.is_empty() {
                    return Err(type_checker_error(
                        "Empty array literal requires a type annotation.",
                        &bracket,
                        &[],
                        None,
                    ));
                }
                let mut element_type = None;
                for element in elements.iter_mut() {
                    let ty = self.check_expression(element)?;
                    match element_type {
                        None => element_type = Some(ty),
                        Some(expected) if expected != ty => {
                            let expected_name = self.types.name_of(expected).to_string();
                            let actual = self.types.name_of(ty).to_string();
                            return Err(type_checker_error(
                                "Array elements must share one type.",
                                &bracket,
                                &[expected_name],
                                Some(&actual),
                            ));
                        }
                        Some(_) => {}
                    }
                }
                let element = element_type.expect("non-empty array literal");
                Ok(self.types.intern_array(element))
            }
            Expression::ArrayGet {
                bracket,
                array,
                indices,
            } => {
                let bracket = bracket.clone();
                let array_type = self.check_expression(array)?;
                self.check_indices(&bracket, indices)?;
                self.walk_array_levels(&bracket, array_type, indices.len())
            }
            Expression::ArraySet {
                bracket,
                array,
                indices,
                value,
            } => {
                let bracket = bracket.clone();
                let array_type = self.check_expression(array)?;
                let value_type = self.check_expression(value)?;
                self.check_indices(&bracket, indices)?;
                let element_type =
                    self.walk_array_levels(&bracket, array_type, indices.len())?;
                if value_type != element_type {
                    let expected = self.types.name_of(element_type).to_string();
                    let actual = self.types.name_of(value_type).to_string();
                    return Err(type_checker_error(
                        "Array set expression type error",
                        &bracket,
                        &[expected],
                        Some(&actual),
                    ));
                }
                Ok(value_type)
            }
            Expression::Closure {
                keyword,
                params,
                param_types,
                return_type,
                body,
                ..
            } => {
                let keyword = keyword.clone();
                let mut param_ids = Vec::with_capacity(param_types.len());
                for param in param_types.clone().iter() {
                    param_ids.push(self.resolve_type_expr(param, &keyword, false)?);
                }
                let ret = self.resolve_type_expr(&return_type.clone(), &keyword, false)?;

                let params = params.clone();
                let previous = self.closure_return_type_swap(Some(ret));
                self.with_case_scope(|checker| {
                    for (param, ty) in params.iter().zip(&param_ids) {
                        checker.bind(&param.lexeme, *ty);
                    }
                    checker.check_closure_body(body);
                });
                self.closure_return_type_swap(previous);

                Ok(self.types.intern_function(param_ids, ret, false))
            }
            Expression::Construct {
                name,
                arguments,
                kind,
            } => {
                let name = name.clone();
                let (expected_params, result_type, resolved_kind) =
                    self.resolve_construct(&name)?;
                *kind = Some(resolved_kind);

                if expected_params.len() != arguments.len() {
                    return Err(type_checker_error(
                        "Construct expression type error: incorrect arity.",
                        &name,
                        &[],
                        None,
                    ));
                }
                for (argument, param) in arguments.iter_mut().zip(expected_params) {
                    let argument_type = self.check_expression(argument)?;
                    if argument_type != param {
                        let expected = self.types.name_of(param).to_string();
                        let actual = self.types.name_of(argument_type).to_string();
                        return Err(type_checker_error(
                            "Construct expression type error",
                            &name,
                            &[expected],
                            Some(&actual),
                        ));
                    }
                }
                Ok(result_type)
            }
            Expression::As {
                keyword,
                expr,
                target,
                cast,
            } => {
                let keyword = keyword.clone();
                let source = self.check_expression(expr)?;
                let target_type = self.resolve_type_expr(&target.clone(), &keyword, false)?;
                *cast = Some(self.check_cast(&keyword, source, target_type)?);
                Ok(target_type)
            }
        }
    }

    /// A closure body is a block; its statements run in the parameter
    /// scope, matching the parser's frame layout.
    fn check_closure_body(&mut self, body: &mut Statement) {
        if let Statement::Block { statements, .. } = body {
            for statement in statements.iter_mut() {
                self.check_statement(statement);
            }
        } else {
            self.check_statement(body);
        }
    }

    fn check_binary(
        &mut self,
        op: &Token,
        left: crate::types::TypeId,
        right: crate::types::TypeId,
        operand: &mut OperandKind,
    ) -> ExprOutcome {
        let types = &mut *self.types;

        // Array-shaped operators first: repeat, append, prepend.
        if op.kind == TokenKind::Star
            && matches!(types.get(left), MidoriType::Array { .. })
            && types.is_integer(right)
        {
            *operand = OperandKind::Array;
            return Ok(left);
        }
        if op.kind == TokenKind::ColonPlus {
            if let MidoriType::Array { element } = types.get(left) {
                if *element != right {
                    let expected = types.name_of(*element).to_string();
                    let actual = types.name_of(right).to_string();
                    return Err(type_checker_error(
                        "Array append type error: right operand does not match the element type.",
                        op,
                        &[expected],
                        Some(&actual),
                    ));
                }
                *operand = OperandKind::Array;
                return Ok(left);
            }
        }
        if op.kind == TokenKind::PlusColon {
            if let MidoriType::Array { element } = types.get(right) {
                if *element != left {
                    let expected = types.name_of(*element).to_string();
                    let actual = types.name_of(left).to_string();
                    return Err(type_checker_error(
                        "Array prepend type error: left operand does not match the element type.",
                        op,
                        &[expected],
                        Some(&actual),
                    ));
                }
                *operand = OperandKind::Array;
                return Ok(right);
            }
        }

        if left != right {
            let left_name = types.name_of(left).to_string();
            let right_name = types.name_of(right).to_string();
            return Err(type_checker_error(
                &format!(
                    "Binary expression type error: left type is {}, right type is {}.",
                    left_name, right_name
                ),
                op,
                &[],
                None,
            ));
        }

        let kind_of = |types: &crate::types::TypeTable| {
            if types.is_integer(left) {
                OperandKind::Integer
            } else if types.is_fraction(left) {
                OperandKind::Fraction
            } else if types.is_text(left) {
                OperandKind::Text
            } else if matches!(types.get(left), MidoriType::Array { .. }) {
                OperandKind::Array
            } else if types.is_bool(left) {
                OperandKind::Bool
            } else {
                OperandKind::Other
            }
        };

        match op.kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent => {
                if !types.is_numeric(left) {
                    let actual = types.name_of(left).to_string();
                    return Err(type_checker_error(
                        "Binary expression type error",
                        op,
                        &["Int".to_string(), "Frac".to_string()],
                        Some(&actual),
                    ));
                }
                *operand = kind_of(types);
                Ok(left)
            }
            TokenKind::LeftShift
            | TokenKind::RightShift
            | TokenKind::Ampersand
            | TokenKind::Bar
            | TokenKind::Caret => {
                if !types.is_integer(left) {
                    let actual = types.name_of(left).to_string();
                    return Err(type_checker_error(
                        "Binary expression type error",
                        op,
                        &["Int".to_string()],
                        Some(&actual),
                    ));
                }
                *operand = OperandKind::Integer;
                Ok(left)
            }
            TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual => {
                if !types.is_numeric(left) {
                    let actual = types.name_of(left).to_string();
                    return Err(type_checker_error(
                        "Binary expression type error",
                        op,
                        &["Int".to_string(), "Frac".to_string()],
                        Some(&actual),
                    ));
                }
                *operand = kind_of(types);
                Ok(types.bool())
            }
            TokenKind::DoubleEqual | TokenKind::BangEqual => {
                if !types.is_numeric(left) && !types.is_text(left) {
                    let actual = types.name_of(left).to_string();
                    return Err(type_checker_error(
                        "Binary expression type error",
                        op,
                        &["Int".to_string(), "Frac".to_string(), "Text".to_string()],
                        Some(&actual),
                    ));
                }
                *operand = kind_of(types);
                Ok(types.bool())
            }
            TokenKind::DoubleAmpersand | TokenKind::DoubleBar => {
                if !types.is_bool(left) {
                    let actual = types.name_of(left).to_string();
                    return Err(type_checker_error(
                        "Binary expression type error",
                        op,
                        &["Bool".to_string()],
                        Some(&actual),
                    ));
                }
                *operand = OperandKind::Bool;
                Ok(types.bool())
            }
            TokenKind::PlusPlus => {
                let is_concatenable = types.is_text(left)
                    || matches!(types.get(left), MidoriType::Array { .. });
                if !is_concatenable {
                    let actual = types.name_of(left).to_string();
                    return Err(type_checker_error(
                        "Concatenation requires two texts or two arrays of one element type.",
                        op,
                        &[],
                        Some(&actual),
                    ));
                }
                *operand = kind_of(types);
                Ok(left)
            }
            _ => Err(type_checker_error(
                "Unrecognized binary operator.",
                op,
                &[],
                None,
            )),
        }
    }

    fn check_unary(
        &mut self,
        op: &Token,
        expr_type: crate::types::TypeId,
        operand: &mut OperandKind,
    ) -> ExprOutcome {
        match op.kind {
            TokenKind::Minus => {
                if !self.types.is_numeric(expr_type) {
                    let actual = self.types.name_of(expr_type).to_string();
                    return Err(type_checker_error(
                        "Unary expression type error",
                        op,
                        &["Int".to_string(), "Frac".to_string()],
                        Some(&actual),
                    ));
                }
                *operand = if self.types.is_integer(expr_type) {
                    OperandKind::Integer
                } else {
                    OperandKind::Fraction
                };
                Ok(expr_type)
            }
            TokenKind::Bang => {
                if !self.types.is_bool(expr_type) {
                    let actual = self.types.name_of(expr_type).to_string();
                    return Err(type_checker_error(
                        "Unary expression type error",
                        op,
                        &["Bool".to_string()],
                        Some(&actual),
                    ));
                }
                *operand = OperandKind::Bool;
                Ok(expr_type)
            }
            TokenKind::Tilde => {
                if !self.types.is_integer(expr_type) {
                    let actual = self.types.name_of(expr_type).to_string();
                    return Err(type_checker_error(
                        "Unary expression type error",
                        op,
                        &["Int".to_string()],
                        Some(&actual),
                    ));
                }
                *operand = OperandKind::Integer;
                Ok(expr_type)
            }
            _ => Err(type_checker_error(
                "Unrecognized unary operator.",
                op,
                &[],
                None,
            )),
        }
    }

    fn resolve_member(
        &mut self,
        member_name: &Token,
        object_type: crate::types::TypeId,
    ) -> Result<(usize, crate::types::TypeId), String> {
        let MidoriType::Struct {
            member_names,
            member_types,
            ..
        } = self.types.get(object_type)
        else {
            let actual = self.types.name_of(object_type).to_string();
            return Err(type_checker_error(
                "Member access requires a struct.",
                member_name,
                &[],
                Some(&actual),
            ));
        };
        let Some(index) = member_names.iter().position(|n| *n == member_name.lexeme)
        else {
            let actual = self.types.name_of(object_type).to_string();
            return Err(type_checker_error(
                &format!("Struct has no member named '{}'.", member_name.lexeme),
                member_name,
                &[],
                Some(&actual),
            ));
        };
        Ok((index, member_types[index]))
    }

    fn check_indices(
        &mut self,
        bracket: &Token,
        indices: &mut [Expression],
    ) -> Result<(), String> {
        for index in indices.iter_mut() {
            let index_type = self.check_expression(index)?;
            if !self.types.is_integer(index_type) {
                let actual = self.types.name_of(index_type).to_string();
                return Err(type_checker_error(
                    "Array indices must be of type Int.",
                    bracket,
                    &["Int".to_string()],
                    Some(&actual),
                ));
            }
        }
        Ok(())
    }

    /// Descend `levels` array layers, erroring when a level is not an
    /// array.
    fn walk_array_levels(
        &mut self,
        bracket: &Token,
        mut current: crate::types::TypeId,
        levels: usize,
    ) -> ExprOutcome {
        for _ in 0..levels {
            let MidoriType::Array { element } = self.types.get(current) else {
                let actual = self.types.name_of(current).to_string();
                return Err(type_checker_error(
                    "Indexing requires an array.",
                    bracket,
                    &[],
                    Some(&actual),
                ));
            };
            current = *element;
        }
        Ok(current)
    }

    fn resolve_construct(
        &mut self,
        name: &Token,
    ) -> Result<(Vec<crate::types::TypeId>, crate::types::TypeId, ConstructKind), String> {
        // Variant constructors shadow struct names checked second, in
        // declaration-scope order.
        if let Some(union_type) = self.lookup_variant_union(&name.lexeme) {
            let MidoriType::Union { variants, .. } = self.types.get(union_type) else {
                unreachable!("variant map points at a non-union type");
            };
            let variant = variants
                .iter()
                .find(|v| v.name == name.lexeme)
                .expect("variant map entry without a variant");
            return Ok((
                variant.field_types.clone(),
                union_type,
                ConstructKind::UnionVariant {
                    tag: variant.tag,
                    arity: variant.field_types.len(),
                },
            ));
        }

        if let Some(type_id) = self.lookup_named_type(&name.lexeme) {
            if let MidoriType::Struct { member_types, .. } = self.types.get(type_id) {
                return Ok((
                    member_types.clone(),
                    type_id,
                    ConstructKind::Struct {
                        arity: member_types.len(),
                    },
                ));
            }
        }

        Err(type_checker_error(
            "Construct expression type error: no struct or union variant with this name.",
            name,
            &[],
            None,
        ))
    }

    fn check_cast(
        &mut self,
        keyword: &Token,
        source: crate::types::TypeId,
        target: crate::types::TypeId,
    ) -> Result<CastKind, String> {
        let target_kind = self.types.get(target).clone();
        match target_kind {
            MidoriType::Integer => Ok(CastKind::ToInteger),
            MidoriType::Fraction => Ok(CastKind::ToFraction),
            MidoriType::Text => Ok(CastKind::ToText),
            MidoriType::Bool => Ok(CastKind::ToBool),
            MidoriType::Unit => Ok(CastKind::ToUnit),
            MidoriType::Struct {
                member_types: target_members,
                ..
            } => {
                let MidoriType::Struct {
                    member_types: source_members,
                    ..
                } = self.types.get(source)
                else {
                    let actual = self.types.name_of(source).to_string();
                    return Err(type_checker_error(
                        "Type cast expression type error.",
                        keyword,
                        &[],
                        Some(&actual),
                    ));
                };
                if *source_members != target_members {
                    let actual = self.types.name_of(source).to_string();
                    return Err(type_checker_error(
                        "Type cast expression type error: struct layouts differ.",
                        keyword,
                        &[],
                        Some(&actual),
                    ));
                }
                Ok(CastKind::StructIdentity)
            }
            _ => {
                let target_name = self.types.name_of(target).to_string();
                Err(type_checker_error(
                    &format!("Cannot cast to {}.", target_name),
                    keyword,
                    &[],
                    None,
                ))
            }
        }
    }
}
