// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lexical analysis for ToMiC source code.
//!
//! The lexer is hand-written for maximum control over error recovery.
//! On each call it skips whitespace, then dispatches on the first
//! non-whitespace character, first match wins:
//!
//! 1. digits - integer literal (degrades to [`TokenKind::Unknown`] when
//!    letters follow without a separator)
//! 2. letter or `_` - identifier, reclassified by keyword lookup
//! 3. `"` - format string literal
//! 4. single-character operators `+ - * / %`
//! 5. two-character operator heads `& | = < > !` (`&&` `||` `==` `<=`
//!    `>=` `!=`; of the heads only `= < > !` are valid alone)
//! 6. delimiters `, ; ( ) [ ] { }`
//! 7. anything else - a single-character [`TokenKind::Unknown`]
//!
//! End of input produces a [`TokenKind::Terminator`] token at the current
//! position; further calls keep returning it.
//!
//! # Example
//!
//! ```
//! use tomic_core::source_analysis::{lex, TokenKind};
//!
//! let tokens = lex("x + 1");
//! assert_eq!(tokens.len(), 3); // x, +, 1 (terminator excluded)
//! assert_eq!(tokens[1].kind, TokenKind::Plus);
//! ```

use std::iter::Peekable;
use std::str::Chars;

use ecow::EcoString;

use super::{SourceLocation, Token, TokenKind};

const WHITESPACE: &str = " \t\r\n\x0b\x0c";
const OPERATORS: &str = "+-*/%&|!<>=";
const DELIMITERS: &str = ",;()[]{}";

/// A lexer that tokenizes ToMiC source code.
///
/// Implements [`Iterator`]; the iterator ends at the terminator token,
/// while [`Lexer::next_token`] returns the terminator forever.
pub struct Lexer<'src> {
    chars: Peekable<Chars<'src>>,
    /// Location of the next character to be read (1-based).
    line: u32,
    column: u32,
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("line", &self.line)
            .field("column", &self.column)
            .finish()
    }
}

/// Tokenizes an entire source string, excluding the trailing terminator.
#[must_use]
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given (preprocessed) source text.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    /// A token boundary for integer and identifier lexemes: end of input,
    /// whitespace, a delimiter, or an operator.
    fn is_separator(c: Option<char>) -> bool {
        match c {
            None => true,
            Some(c) => {
                WHITESPACE.contains(c) || DELIMITERS.contains(c) || OPERATORS.contains(c)
            }
        }
    }

    /// Lexes the next token. At end of input, returns (and keeps
    /// returning) a terminator token.
    pub fn next_token(&mut self) -> Token {
        while self.peek_char().is_some_and(|c| WHITESPACE.contains(c)) {
            self.advance();
        }

        let loc = self.location();
        let Some(c) = self.peek_char() else {
            return Token::new(TokenKind::Terminator, "", loc);
        };

        match c {
            '0'..='9' => self.lex_number(loc),
            'a'..='z' | 'A'..='Z' | '_' => self.lex_identifier(loc),
            '"' => self.lex_format_string(loc),
            '+' | '-' | '*' | '/' | '%' => self.lex_single_op(loc),
            '&' | '|' | '=' | '<' | '>' | '!' => self.lex_double_op(loc),
            ',' | ';' | '(' | ')' | '[' | ']' | '{' | '}' => self.lex_delimiter(loc),
            _ => {
                self.advance();
                Token::new(TokenKind::Unknown, EcoString::from(c), loc)
            }
        }
    }

    fn lex_number(&mut self, loc: SourceLocation) -> Token {
        let mut lexeme = EcoString::new();
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            lexeme.push(self.advance().unwrap_or_default());
        }

        // A digit run glued to non-separator characters is one bad token.
        if !Self::is_separator(self.peek_char()) {
            while !Self::is_separator(self.peek_char()) {
                lexeme.push(self.advance().unwrap_or_default());
            }
            return Token::new(TokenKind::Unknown, lexeme, loc);
        }

        Token::new(TokenKind::Integer, lexeme, loc)
    }

    fn lex_identifier(&mut self, loc: SourceLocation) -> Token {
        let mut lexeme = EcoString::new();
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            lexeme.push(self.advance().unwrap_or_default());
        }

        if !Self::is_separator(self.peek_char()) {
            while !Self::is_separator(self.peek_char()) {
                lexeme.push(self.advance().unwrap_or_default());
            }
            return Token::new(TokenKind::Unknown, lexeme, loc);
        }

        let kind = TokenKind::keyword(&lexeme).unwrap_or(TokenKind::Identifier);
        Token::new(kind, lexeme, loc)
    }

    /// Lexes a format string literal. The lexeme keeps the surrounding
    /// quotes; the escape `\n` is stored as a real newline character so
    /// downstream passes never re-parse escapes.
    fn lex_format_string(&mut self, loc: SourceLocation) -> Token {
        let mut lexeme = EcoString::new();
        let mut error = false;

        lexeme.push(self.advance().unwrap_or_default()); // opening quote
        let mut closed = false;

        while let Some(c) = self.peek_char() {
            if c == '"' {
                self.advance();
                lexeme.push('"');
                closed = true;
                break;
            }
            match c {
                '\\' => {
                    self.advance();
                    if self.peek_char() == Some('n') {
                        self.advance();
                        lexeme.push('\n');
                    } else {
                        lexeme.push('\\');
                        error = true;
                    }
                }
                '%' => {
                    self.advance();
                    if self.peek_char() == Some('d') {
                        self.advance();
                        lexeme.push('%');
                        lexeme.push('d');
                    } else {
                        lexeme.push('%');
                        error = true;
                    }
                }
                _ if Self::is_format_char(c) => {
                    self.advance();
                    lexeme.push(c);
                }
                _ => {
                    self.advance();
                    lexeme.push(c);
                    error = true;
                }
            }
        }

        if !closed {
            error = true;
        }

        let kind = if error {
            TokenKind::Unknown
        } else {
            TokenKind::FormatString
        };
        Token::new(kind, lexeme, loc)
    }

    /// Characters allowed verbatim inside a format string: space, `!`,
    /// and the printable range `(`..`~` except backslash.
    fn is_format_char(c: char) -> bool {
        matches!(c, ' ' | '!') || (('('..='~').contains(&c) && c != '\\')
    }

    fn lex_single_op(&mut self, loc: SourceLocation) -> Token {
        let c = self.advance().unwrap_or_default();
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            _ => TokenKind::Percent,
        };
        Token::new(kind, EcoString::from(c), loc)
    }

    /// Lexes the two-character operator family. `&` and `|` must pair up
    /// to be valid; `= < > !` stand on their own when unpaired.
    fn lex_double_op(&mut self, loc: SourceLocation) -> Token {
        let c = self.advance().unwrap_or_default();
        let (kind, lexeme) = match c {
            '&' => {
                if self.peek_char() == Some('&') {
                    self.advance();
                    (TokenKind::AndAnd, EcoString::from("&&"))
                } else {
                    (TokenKind::Unknown, EcoString::from("&"))
                }
            }
            '|' => {
                if self.peek_char() == Some('|') {
                    self.advance();
                    (TokenKind::OrOr, EcoString::from("||"))
                } else {
                    (TokenKind::Unknown, EcoString::from("|"))
                }
            }
            '=' => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    (TokenKind::Equal, EcoString::from("=="))
                } else {
                    (TokenKind::Assign, EcoString::from("="))
                }
            }
            '<' => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    (TokenKind::LessEqual, EcoString::from("<="))
                } else {
                    (TokenKind::Less, EcoString::from("<"))
                }
            }
            '>' => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    (TokenKind::GreaterEqual, EcoString::from(">="))
                } else {
                    (TokenKind::Greater, EcoString::from(">"))
                }
            }
            _ => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    (TokenKind::NotEqual, EcoString::from("!="))
                } else {
                    (TokenKind::Not, EcoString::from("!"))
                }
            }
        };
        Token::new(kind, lexeme, loc)
    }

    fn lex_delimiter(&mut self, loc: SourceLocation) -> Token {
        let c = self.advance().unwrap_or_default();
        let kind = match c {
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            _ => TokenKind::RightBrace,
        };
        Token::new(kind, EcoString::from(c), loc)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let token = self.next_token();
        if token.kind.is_terminator() {
            None
        } else {
            Some(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        assert_eq!(
            kinds("const int x void mains"),
            vec![
                TokenKind::Const,
                TokenKind::Int,
                TokenKind::Identifier,
                TokenKind::Void,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn lexes_a_small_program() {
        let tokens = lex("int main() { return 0; }");
        let expected = [
            TokenKind::Int,
            TokenKind::Main,
            TokenKind::LeftParen,
            TokenKind::RightParen,
            TokenKind::LeftBrace,
            TokenKind::Return,
            TokenKind::Integer,
            TokenKind::Semicolon,
            TokenKind::RightBrace,
        ];
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            expected
        );
        assert_eq!(tokens[6].lexeme, "0");
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = lex("int a;\n  a = 1;");
        assert_eq!(tokens[0].loc, SourceLocation::new(1, 1));
        assert_eq!(tokens[1].loc, SourceLocation::new(1, 5));
        assert_eq!(tokens[3].loc, SourceLocation::new(2, 3));
        assert_eq!(tokens[4].loc, SourceLocation::new(2, 5));
    }

    #[test]
    fn double_char_operators() {
        assert_eq!(
            kinds("== != <= >= && || < > ! ="),
            vec![
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Not,
                TokenKind::Assign,
            ]
        );
    }

    #[test]
    fn lone_ampersand_and_pipe_are_unknown() {
        let tokens = lex("a & b | c");
        assert_eq!(tokens[1].kind, TokenKind::Unknown);
        assert_eq!(tokens[1].lexeme, "&");
        assert_eq!(tokens[3].kind, TokenKind::Unknown);
        assert_eq!(tokens[3].lexeme, "|");
    }

    #[test]
    fn digits_glued_to_letters_are_unknown() {
        let tokens = lex("123abc + 4");
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert_eq!(tokens[0].lexeme, "123abc");
        assert_eq!(tokens[1].kind, TokenKind::Plus);
        assert_eq!(tokens[2].kind, TokenKind::Integer);
    }

    #[test]
    fn format_string_with_escapes() {
        let tokens = lex("\"x=%d\\n\"");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::FormatString);
        // The \n escape is folded into a real newline inside the lexeme.
        assert_eq!(tokens[0].lexeme, "\"x=%d\n\"");
    }

    #[test]
    fn format_string_with_bad_escape_is_unknown() {
        let tokens = lex("\"rate: %f\"");
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
    }

    #[test]
    fn unterminated_format_string_is_unknown() {
        let tokens = lex("\"oops");
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
    }

    #[test]
    fn terminator_repeats_at_end_of_input() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
        assert_eq!(lexer.next_token().kind, TokenKind::Terminator);
        assert_eq!(lexer.next_token().kind, TokenKind::Terminator);
    }

    #[test]
    fn unknown_single_character_fallback() {
        let tokens = lex("a @ b");
        assert_eq!(tokens[1].kind, TokenKind::Unknown);
        assert_eq!(tokens[1].lexeme, "@");
    }
}
