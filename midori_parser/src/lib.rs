//! Lexer and parser for the Midori language.
//!
//! The crate turns source text into a [`ast::ProgramTree`] in which
//! every variable reference carries a resolved semantic (local slot,
//! captured cell, or global), every scope records its owned-local
//! count, and every closure body has been checked to return in all
//! paths. Type checking and code generation live in `midori_vm`.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;

pub use ast::ProgramTree;
pub use error::ParseError;
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind};

/// Lex and parse a source string in one step.
///
/// Lexer failures short-circuit; parser errors are accumulated.
pub fn parse_source(
    source: &str,
    file_name: &str,
) -> Result<ProgramTree, Vec<String>> {
    let tokens = Lexer::new(source)
        .lex()
        .map_err(|errors| errors.into_iter().map(|e| e.message).collect::<Vec<_>>())?;
    Parser::new(tokens, file_name).parse()
}
