//! Lexer for Midori source code.
//!
//! Wraps the logos-generated token stream: attaches line numbers,
//! unescapes text literals, and accumulates errors so one bad character
//! does not hide the rest of the diagnostics.

use logos::Logos;

use crate::error::ParseError;
use crate::span::SourceMap;
use crate::token::{Token, TokenKind};

#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    source_map: SourceMap,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let source_map = SourceMap::new(source);
        Self { source, source_map }
    }

    /// Lex the whole source into a token vector terminated by `Eof`.
    ///
    /// Lexing continues past bad characters; all errors are returned
    /// together.
    pub fn lex(self) -> Result<Vec<Token>, Vec<ParseError>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        let mut inner = TokenKind::lexer(self.source);
        while let Some(result) = inner.next() {
            let span = inner.span();
            let line = self.source_map.line_of(span.start);
            match result {
                Ok(kind) => {
                    let raw = &self.source[span.start..span.end];
                    let lexeme = match kind {
                        TokenKind::TextLiteral => unescape(&raw[1..raw.len() - 1]),
                        TokenKind::Directive => raw[1..].to_string(),
                        _ => raw.to_string(),
                    };
                    tokens.push(Token::new(kind, lexeme, line));
                }
                Err(()) => {
                    let raw = &self.source[span.start..span.end];
                    errors.push(ParseError::lexer(
                        format!("Unexpected character '{}'.", raw),
                        line,
                    ));
                }
            }
        }

        let last_line = self.source_map.line_of(self.source.len());
        tokens.push(Token::new(TokenKind::Eof, "", last_line));

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }
}

fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('"') => result.push('"'),
            Some('\\') => result.push('\\'),
            Some(other) => result.push(other),
            None => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(src).lex().unwrap()
    }

    #[test]
    fn test_lines_attached() {
        let tokens = lex("var x = 1;\nvar y = 2;");
        assert_eq!(tokens[0].line, 1);
        let second_var = tokens.iter().filter(|t| t.kind == TokenKind::Var).nth(1);
        assert_eq!(second_var.unwrap().line, 2);
    }

    #[test]
    fn test_text_literal_unescaped() {
        let tokens = lex(r#""a\nb""#);
        assert_eq!(tokens[0].lexeme, "a\nb");
    }

    #[test]
    fn test_directive_lexeme() {
        let tokens = lex("#include \"lib.mdr\"");
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[0].lexeme, "include");
        assert_eq!(tokens[1].lexeme, "lib.mdr");
    }

    #[test]
    fn test_eof_appended() {
        let tokens = lex("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn test_bad_character_collected() {
        let errors = Lexer::new("var $ = 1; @").lex().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("Unexpected character '$'"));
    }
}
