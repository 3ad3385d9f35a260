//! The Midori prelude, compiled ahead of every user program.
//!
//! Declares the stock foreign surface (backed by the builtin registry
//! or `MidoriStdLib`) and defines `PrintLine` on top of `Print`.

pub const PRELUDE_SOURCE: &str = r#"
foreign Print : (Text) -> Unit;
foreign GetTime : () -> Frac;
foreign OverwriteToFile : (Text, Text) -> Bool;
foreign AppendToFile : (Text, Text) -> Bool;

fixed PrintLine = \(var value: Int): Unit {
    Print((value as Text) ++ "\n");
    return ();
};

fixed PrintTextLine = \(var value: Text): Unit {
    Print(value ++ "\n");
    return ();
};
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use midori_parser::Lexer;

    #[test]
    fn test_prelude_lexes_cleanly() {
        assert!(Lexer::new(PRELUDE_SOURCE).lex().is_ok());
    }
}
