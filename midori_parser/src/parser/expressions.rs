//! Expression grammar.
//!
//! Precedence, loosest to tightest:
//! `as` > assignment > ternary > `||` > `&&` > `|` > `^` > `&` >
//! equality > comparison > shifts > additive (`+ ++ - :+ +:`) >
//! multiplicative > unary > `new` > call/member > indexing > primary.

use crate::ast::{Expression, Statement, TypeExpr};
use crate::token::{Token, TokenKind};

use super::{ParseOutcome, Parser};

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> ParseOutcome<Expression> {
        self.parse_as()
    }

    fn parse_as(&mut self) -> ParseOutcome<Expression> {
        let mut expr = self.parse_bind()?;
        while self.matches(&[TokenKind::As]) {
            let keyword = self.previous();
            let target = self.parse_type()?;
            expr = Expression::As {
                keyword,
                expr: Box::new(expr),
                target,
                cast: None,
            };
        }
        Ok(expr)
    }

    fn parse_bind(&mut self) -> ParseOutcome<Expression> {
        let expr = self.parse_ternary()?;

        if self.matches(&[TokenKind::Equal]) {
            let equal = self.previous();
            let value = self.parse_bind()?;

            return match expr {
                Expression::Variable { name, .. } => {
                    let Some((semantic, is_fixed)) = self.resolve(&name.lexeme) else {
                        return Err(self.error("Undefined variable.", &name));
                    };
                    if is_fixed {
                        return Err(self.error("Cannot break a fixed name binding.", &name));
                    }
                    Ok(Expression::Bind {
                        name,
                        value: Box::new(value),
                        semantic,
                    })
                }
                Expression::Get {
                    member_name,
                    object,
                    ..
                } => Ok(Expression::Set {
                    member_name,
                    object,
                    value: Box::new(value),
                    member_index: None,
                }),
                Expression::ArrayGet {
                    bracket,
                    array,
                    indices,
                } => Ok(Expression::ArraySet {
                    bracket,
                    array,
                    indices,
                    value: Box::new(value),
                }),
                _ => Err(self.error("Invalid binding target.", &equal)),
            };
        }

        Ok(expr)
    }

    fn parse_ternary(&mut self) -> ParseOutcome<Expression> {
        let condition = self.parse_logical_or()?;

        if self.matches(&[TokenKind::Question]) {
            let question = self.previous();
            let true_branch = self.parse_ternary()?;
            self.consume(TokenKind::Colon, "Expected ':' in ternary expression.")?;
            let else_branch = self.parse_ternary()?;
            return Ok(Expression::Ternary {
                question,
                condition: Box::new(condition),
                true_branch: Box::new(true_branch),
                else_branch: Box::new(else_branch),
                condition_kind: Default::default(),
            });
        }

        Ok(condition)
    }

    fn parse_binary_chain(
        &mut self,
        operand: fn(&mut Self) -> ParseOutcome<Expression>,
        ops: &[TokenKind],
    ) -> ParseOutcome<Expression> {
        let mut expr = operand(self)?;
        while self.matches(ops) {
            let op = self.previous();
            let right = operand(self)?;
            expr = Expression::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                operand: Default::default(),
            };
        }
        Ok(expr)
    }

    fn parse_logical_or(&mut self) -> ParseOutcome<Expression> {
        self.parse_binary_chain(Self::parse_logical_and, &[TokenKind::DoubleBar])
    }

    fn parse_logical_and(&mut self) -> ParseOutcome<Expression> {
        self.parse_binary_chain(Self::parse_bitwise_or, &[TokenKind::DoubleAmpersand])
    }

    fn parse_bitwise_or(&mut self) -> ParseOutcome<Expression> {
        self.parse_binary_chain(Self::parse_bitwise_xor, &[TokenKind::Bar])
    }

    fn parse_bitwise_xor(&mut self) -> ParseOutcome<Expression> {
        self.parse_binary_chain(Self::parse_bitwise_and, &[TokenKind::Caret])
    }

    fn parse_bitwise_and(&mut self) -> ParseOutcome<Expression> {
        self.parse_binary_chain(Self::parse_equality, &[TokenKind::Ampersand])
    }

    fn parse_equality(&mut self) -> ParseOutcome<Expression> {
        self.parse_binary_chain(
            Self::parse_comparison,
            &[TokenKind::BangEqual, TokenKind::DoubleEqual],
        )
    }

    fn parse_comparison(&mut self) -> ParseOutcome<Expression> {
        self.parse_binary_chain(
            Self::parse_shift,
            &[
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
            ],
        )
    }

    fn parse_shift(&mut self) -> ParseOutcome<Expression> {
        self.parse_binary_chain(
            Self::parse_term,
            &[TokenKind::LeftShift, TokenKind::RightShift],
        )
    }

    fn parse_term(&mut self) -> ParseOutcome<Expression> {
        self.parse_binary_chain(
            Self::parse_factor,
            &[
                TokenKind::Plus,
                TokenKind::PlusPlus,
                TokenKind::Minus,
                TokenKind::ColonPlus,
                TokenKind::PlusColon,
            ],
        )
    }

    fn parse_factor(&mut self) -> ParseOutcome<Expression> {
        self.parse_binary_chain(
            Self::parse_unary,
            &[TokenKind::Star, TokenKind::Slash, TokenKind::Percent],
        )
    }

    fn parse_unary(&mut self) -> ParseOutcome<Expression> {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus, TokenKind::Tilde]) {
            let op = self.previous();
            let expr = self.parse_unary()?;
            return Ok(Expression::Unary {
                op,
                expr: Box::new(expr),
                operand: Default::default(),
            });
        }
        self.parse_construct()
    }

    fn parse_construct(&mut self) -> ParseOutcome<Expression> {
        if self.matches(&[TokenKind::New]) {
            let name = self.consume(TokenKind::Identifier, "Expected type name after 'new'.")?;
            self.consume(TokenKind::LeftParen, "Expected '(' after type name.")?;
            let arguments = self.parse_argument_list()?;
            return Ok(Expression::Construct {
                name,
                arguments,
                kind: None,
            });
        }
        self.parse_call()
    }

    fn parse_call(&mut self) -> ParseOutcome<Expression> {
        let mut expr = self.parse_array_access()?;

        loop {
            if self.matches(&[TokenKind::LeftParen]) {
                let arguments = self.parse_argument_list()?;
                let paren = self.previous();
                expr = Expression::Call {
                    paren,
                    callee: Box::new(expr),
                    arguments,
                    is_foreign: false,
                };
            } else if self.matches(&[TokenKind::Dot]) {
                let member_name =
                    self.consume(TokenKind::Identifier, "Expected member name after '.'.")?;
                expr = Expression::Get {
                    member_name,
                    object: Box::new(expr),
                    member_index: None,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_argument_list(&mut self) -> ParseOutcome<Vec<Expression>> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen, 0) {
            loop {
                arguments.push(self.parse_expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ')' after arguments.")?;
        Ok(arguments)
    }

    fn parse_array_access(&mut self) -> ParseOutcome<Expression> {
        let expr = self.parse_primary()?;

        if self.check(TokenKind::LeftBracket, 0) {
            let bracket = self.peek(0).clone();
            let mut indices = Vec::new();
            while self.matches(&[TokenKind::LeftBracket]) {
                indices.push(self.parse_bind()?);
                self.consume(TokenKind::RightBracket, "Expected ']' after index.")?;
            }
            return Ok(Expression::ArrayGet {
                bracket,
                array: Box::new(expr),
                indices,
            });
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseOutcome<Expression> {
        if self.matches(&[TokenKind::LeftParen]) {
            if self.matches(&[TokenKind::RightParen]) {
                return Ok(Expression::UnitLiteral {
                    token: self.previous(),
                });
            }
            let inner = self.parse_expression()?;
            self.consume(TokenKind::RightParen, "Expected ')' after expression.")?;
            return Ok(Expression::Group {
                inner: Box::new(inner),
            });
        }

        if self.matches(&[TokenKind::Identifier]) {
            let name = self.previous();
            let Some((semantic, _)) = self.resolve(&name.lexeme) else {
                return Err(self.error("Undefined variable.", &name));
            };
            return Ok(Expression::Variable { name, semantic });
        }

        if self.matches(&[TokenKind::Backslash]) {
            return self.parse_closure();
        }

        if self.matches(&[TokenKind::True, TokenKind::False]) {
            return Ok(Expression::BoolLiteral {
                token: self.previous(),
            });
        }
        if self.matches(&[TokenKind::FractionLiteral]) {
            return Ok(Expression::FractionLiteral {
                token: self.previous(),
            });
        }
        if self.matches(&[TokenKind::IntegerLiteral]) {
            return Ok(Expression::IntegerLiteral {
                token: self.previous(),
            });
        }
        if self.matches(&[TokenKind::TextLiteral]) {
            return Ok(Expression::TextLiteral {
                token: self.previous(),
            });
        }

        if self.matches(&[TokenKind::LeftBracket]) {
            let bracket = self.previous();
            let mut elements = Vec::new();
            if self.matches(&[TokenKind::RightBracket]) {
                return Ok(Expression::Array { bracket, elements });
            }
            loop {
                elements.push(self.parse_expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
            self.consume(TokenKind::RightBracket, "Expected ']' after array elements.")?;
            return Ok(Expression::Array { bracket, elements });
        }

        let at = self.peek(0).clone();
        Err(self.error("Expected expression.", &at))
    }

    /// `\(var a: Int, fixed b: Text): Ret { body }`
    ///
    /// The closure body is a fresh frame: the frame-local counter resets,
    /// the loop stack is saved so `break` cannot escape the closure, and
    /// every local (parameters included) gets a slot in the new frame.
    fn parse_closure(&mut self) -> ParseOutcome<Expression> {
        let keyword = self.previous();
        self.consume(TokenKind::LeftParen, "Expected '(' before closure parameters.")?;

        let saved_frame_locals = self.locals_in_current_frame;
        let saved_loop_stack = std::mem::take(&mut self.loop_stack);
        self.locals_in_current_frame = 0;
        self.closure_depth += 1;
        self.begin_scope();

        let result = self.parse_closure_inner(&keyword);

        // Frame bookkeeping is restored even on a parse error so later
        // statements resolve against the right counters.
        self.closure_depth -= 1;
        self.locals_in_current_frame = saved_frame_locals;
        self.loop_stack = saved_loop_stack;

        result
    }

    fn parse_closure_inner(&mut self, keyword: &Token) -> ParseOutcome<Expression> {
        let mut params: Vec<Token> = Vec::new();
        let mut param_types: Vec<TypeExpr> = Vec::new();

        if !self.matches(&[TokenKind::RightParen]) {
            loop {
                let is_fixed = if self.matches(&[TokenKind::Var]) {
                    false
                } else if self.matches(&[TokenKind::Fixed]) {
                    true
                } else {
                    let at = self.peek(0).clone();
                    self.end_scope();
                    return Err(self.error("Expected 'var' or 'fixed' before parameter name.", &at));
                };

                let name = match self.parse_closure_param(is_fixed) {
                    Ok((name, ty)) => {
                        param_types.push(ty);
                        name
                    }
                    Err(e) => {
                        self.end_scope();
                        return Err(e);
                    }
                };
                params.push(name);

                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
            if let Err(e) = self.consume(TokenKind::RightParen, "Expected ')' after parameters.") {
                self.end_scope();
                return Err(e);
            }
        }

        let body = (|| {
            self.consume(TokenKind::Colon, "Expected ':' before closure return type.")?;
            let return_type = self.parse_type()?;
            self.consume(TokenKind::LeftBrace, "Expected '{' before closure body.")?;

            let mut statements = Vec::new();
            while !self.is_at_end() && !self.check(TokenKind::RightBrace, 0) {
                statements.push(self.parse_declaration()?);
            }
            let right_brace = self.consume(TokenKind::RightBrace, "Expected '}' after closure body.")?;
            Ok((return_type, right_brace, statements))
        })();

        let (return_type, right_brace, statements) = match body {
            Ok(parts) => parts,
            Err(e) => {
                self.end_scope();
                return Err(e);
            }
        };

        let local_count = self.end_scope();
        let body = Statement::Block {
            right_brace,
            statements,
            local_count,
        };

        if !Self::has_return_statement(&body) {
            return Err(self.error("Closure does not return in all paths.", keyword));
        }

        // After end_scope the total-local counter holds exactly the
        // enclosing frames' live locals: the environment this closure
        // captures.
        Ok(Expression::Closure {
            keyword: keyword.clone(),
            params,
            param_types,
            return_type,
            body: Box::new(body),
            captured_count: self.total_locals,
        })
    }

    fn parse_closure_param(&mut self, is_fixed: bool) -> ParseOutcome<(Token, TypeExpr)> {
        let name = self.consume(TokenKind::Identifier, "Expected parameter name.")?;
        self.consume(TokenKind::Colon, "Expected ':' before parameter type.")?;
        let ty = self.parse_type()?;
        self.define_name(&name, is_fixed)?;
        self.assign_local_slot(&name.lexeme);
        Ok((name, ty))
    }
}
