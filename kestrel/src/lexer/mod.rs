//! Lexer implementation using logos

mod token;

pub use token::Token;

use crate::ast::{LineIndex, Span};
use crate::error::{CompileError, Result};
use logos::Logos;

/// Tokenize source code; `file` is only used for diagnostics
pub fn tokenize(source: &str, file: &str) -> Result<Vec<(Token, Span)>> {
    let index = LineIndex::new(source);
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = index.span(lexer.span());
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                let slice = lexer.slice();
                let message = match slice.chars().next() {
                    Some('"') => "unterminated or malformed string literal".to_string(),
                    Some('\'') => "malformed character literal".to_string(),
                    Some(c) if c.is_ascii_digit() => format!("invalid number literal {slice:?}"),
                    _ => format!("unexpected character: {slice:?}"),
                };
                return Err(CompileError::lexer(message, span, file));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source, "test.ks")
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(kinds("").is_empty());
        assert!(kinds("   \t\n\r\n  ").is_empty());
    }

    #[test]
    fn test_tokenize_keywords() {
        assert_eq!(
            kinds("func if elif else switch case default"),
            vec![
                Token::Func,
                Token::If,
                Token::Elif,
                Token::Else,
                Token::Switch,
                Token::Case,
                Token::Default
            ]
        );
        assert_eq!(
            kinds("foreach in require null"),
            vec![Token::Foreach, Token::In, Token::Require, Token::Null]
        );
    }

    #[test]
    fn test_tokenize_numeric_literals() {
        assert_eq!(
            kinds("42 42L 0x2A 1.5f 1.5 2e3"),
            vec![
                Token::IntLit(42),
                Token::LongLit(42),
                Token::IntLit(42),
                Token::FloatLit(1.5),
                Token::DoubleLit(1.5),
                Token::DoubleLit(2000.0)
            ]
        );
    }

    #[test]
    fn test_tokenize_string_and_char() {
        assert_eq!(
            kinds(r#""a\tb" 'c' '\n'"#),
            vec![
                Token::StringLit("a\tb".to_string()),
                Token::CharLit(b'c'),
                Token::CharLit(b'\n')
            ]
        );
    }

    #[test]
    fn test_tokenize_longest_operator_wins() {
        assert_eq!(
            kinds(">>> >> >= > ++ += + && &"),
            vec![
                Token::GtGtGt,
                Token::GtGt,
                Token::GtEq,
                Token::Gt,
                Token::PlusPlus,
                Token::PlusEq,
                Token::Plus,
                Token::AmpAmp,
                Token::Amp
            ]
        );
    }

    #[test]
    fn test_tokenize_skips_comments() {
        assert_eq!(
            kinds("a // line\n/* block\n * more */ b"),
            vec![Token::Ident("a".to_string()), Token::Ident("b".to_string())]
        );
    }

    #[test]
    fn test_tokenize_positions() {
        let tokens = tokenize("x = 1;\n  print(x);", "t.ks").unwrap();
        let (_, print) = &tokens[4];
        assert_eq!((print.line, print.column), (2, 3));
        assert_eq!((print.start, print.end), (9, 14));
    }

    #[test]
    fn test_tokenize_unexpected_character_error() {
        let err = tokenize("x = `;", "bad.ks").unwrap_err();
        assert!(err.message().contains("unexpected character"));
        assert_eq!(err.file(), "bad.ks");
        assert_eq!(err.span().column, 5);
    }

    #[test]
    fn test_tokenize_unterminated_string() {
        let err = tokenize("\"abc", "bad.ks").unwrap_err();
        assert!(err.message().contains("string"));
    }
}
