//! Token definitions for the Midori lexer.

use logos::Logos;
use serde::Serialize;

/// Raw token kinds produced by the logos-generated lexer.
///
/// Multi-character operators are declared alongside their prefixes;
/// logos resolves the overlap by longest match (`:+` before `:`,
/// `++` before `+`, `->` before `-`).
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"\n")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
pub enum TokenKind {
    // ==================== Keywords ====================
    #[token("var")]
    Var,
    #[token("fixed")]
    Fixed,
    #[token("struct")]
    Struct,
    #[token("union")]
    Union,
    #[token("foreign")]
    Foreign,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("new")]
    New,
    #[token("as")]
    As,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // ==================== Type keywords ====================
    #[token("Int")]
    IntType,
    #[token("Frac")]
    FracType,
    #[token("Text")]
    TextType,
    #[token("Bool")]
    BoolType,
    #[token("Unit")]
    UnitType,
    #[token("Array")]
    ArrayType,

    // ==================== Delimiters ====================
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("?")]
    Question,
    #[token("\\")]
    Backslash,
    #[token("->")]
    ThinArrow,

    // ==================== Operators ====================
    #[token("+")]
    Plus,
    #[token("++")]
    PlusPlus,
    #[token(":+")]
    ColonPlus,
    #[token("+:")]
    PlusColon,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<<")]
    LeftShift,
    #[token(">>")]
    RightShift,
    #[token("&")]
    Ampersand,
    #[token("&&")]
    DoubleAmpersand,
    #[token("|")]
    Bar,
    #[token("||")]
    DoubleBar,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    DoubleEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,

    // ==================== Literals ====================
    #[regex(r"[0-9]+\.[0-9]+")]
    FractionLiteral,
    #[regex(r"[0-9]+")]
    IntegerLiteral,
    #[regex(r#""([^"\\]|\\.)*""#)]
    TextLiteral,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
    #[regex(r"#[a-zA-Z_]+")]
    Directive,

    Eof,
}

/// A lexed token: kind, processed lexeme, and 1-based source line.
///
/// For text literals the lexeme is the unescaped content without the
/// surrounding quotes; for directives it is the name without the `#`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logos::Logos;

    fn kinds(src: &str) -> Vec<TokenKind> {
        TokenKind::lexer(src).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn test_longest_match_operators() {
        assert_eq!(
            kinds("+ ++ +: :+ : -> - ="),
            vec![
                TokenKind::Plus,
                TokenKind::PlusPlus,
                TokenKind::PlusColon,
                TokenKind::ColonPlus,
                TokenKind::Colon,
                TokenKind::ThinArrow,
                TokenKind::Minus,
                TokenKind::Equal,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("var fixed varx Intx Int"),
            vec![
                TokenKind::Var,
                TokenKind::Fixed,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::IntType,
            ]
        );
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(
            kinds("42 3.14"),
            vec![TokenKind::IntegerLiteral, TokenKind::FractionLiteral]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("1 // line\n2 /* block\n * more */ 3"),
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::IntegerLiteral,
                TokenKind::IntegerLiteral
            ]
        );
    }

    #[test]
    fn test_text_literal_with_escape() {
        assert_eq!(kinds(r#""a\"b""#), vec![TokenKind::TextLiteral]);
    }

    #[test]
    fn test_directive() {
        assert_eq!(
            kinds("#include \"x\""),
            vec![TokenKind::Directive, TokenKind::TextLiteral]
        );
    }
}
