// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Token types for ToMiC lexical analysis.
//!
//! Each token pairs a [`TokenKind`] with the lexeme text and the
//! [`SourceLocation`] of its first character. The fixed-lexeme / display
//! tables that a separate "token mapper" would provide live directly on
//! [`TokenKind`] as [`TokenKind::lexeme`], [`TokenKind::description`],
//! and [`TokenKind::keyword`].

use ecow::EcoString;

use super::SourceLocation;

/// The kind of token, not including lexeme or source location.
///
/// This enum covers every syntactic element of the ToMiC dialect:
/// keywords, identifiers, integer literals, format strings, operators,
/// delimiters, and the `Terminator` / `Unknown` sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenKind {
    // === Keywords ===
    /// `const`
    Const,
    /// `int`
    Int,
    /// `void`
    Void,
    /// `if`
    If,
    /// `else`
    Else,
    /// `for`
    For,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `return`
    Return,
    /// `main`
    Main,
    /// `getint`
    Getint,
    /// `printf`
    Printf,

    // === Literals ===
    /// An identifier: `foo`, `_tmp1`
    Identifier,
    /// An integer literal: `42`
    Integer,
    /// A format string literal: `"x=%d\n"` (lexeme keeps the quotes)
    FormatString,

    // === Operators ===
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `=`
    Assign,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Not,

    // === Delimiters ===
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,

    // === Sentinels ===
    /// End of input; returned forever once the stream is exhausted.
    Terminator,
    /// Unrecognizable input, preserved for error recovery.
    Unknown,
}

impl TokenKind {
    /// Looks up the keyword kind for an identifier lexeme, if any.
    #[must_use]
    pub fn keyword(lexeme: &str) -> Option<Self> {
        match lexeme {
            "const" => Some(Self::Const),
            "int" => Some(Self::Int),
            "void" => Some(Self::Void),
            "if" => Some(Self::If),
            "else" => Some(Self::Else),
            "for" => Some(Self::For),
            "break" => Some(Self::Break),
            "continue" => Some(Self::Continue),
            "return" => Some(Self::Return),
            "main" => Some(Self::Main),
            "getint" => Some(Self::Getint),
            "printf" => Some(Self::Printf),
            _ => None,
        }
    }

    /// The fixed lexeme of this kind, for kinds that have one.
    ///
    /// Identifiers, literals, and the sentinels have no fixed lexeme.
    #[must_use]
    pub const fn lexeme(self) -> Option<&'static str> {
        match self {
            Self::Const => Some("const"),
            Self::Int => Some("int"),
            Self::Void => Some("void"),
            Self::If => Some("if"),
            Self::Else => Some("else"),
            Self::For => Some("for"),
            Self::Break => Some("break"),
            Self::Continue => Some("continue"),
            Self::Return => Some("return"),
            Self::Main => Some("main"),
            Self::Getint => Some("getint"),
            Self::Printf => Some("printf"),
            Self::Plus => Some("+"),
            Self::Minus => Some("-"),
            Self::Star => Some("*"),
            Self::Slash => Some("/"),
            Self::Percent => Some("%"),
            Self::Assign => Some("="),
            Self::Equal => Some("=="),
            Self::NotEqual => Some("!="),
            Self::Less => Some("<"),
            Self::LessEqual => Some("<="),
            Self::Greater => Some(">"),
            Self::GreaterEqual => Some(">="),
            Self::AndAnd => Some("&&"),
            Self::OrOr => Some("||"),
            Self::Not => Some("!"),
            Self::Comma => Some(","),
            Self::Semicolon => Some(";"),
            Self::LeftParen => Some("("),
            Self::RightParen => Some(")"),
            Self::LeftBracket => Some("["),
            Self::RightBracket => Some("]"),
            Self::LeftBrace => Some("{"),
            Self::RightBrace => Some("}"),
            Self::Identifier
            | Self::Integer
            | Self::FormatString
            | Self::Terminator
            | Self::Unknown => None,
        }
    }

    /// The display name used by the AST printers, in the conventional
    /// course output format.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Const => "CONSTTK",
            Self::Int => "INTTK",
            Self::Void => "VOIDTK",
            Self::If => "IFTK",
            Self::Else => "ELSETK",
            Self::For => "FORTK",
            Self::Break => "BREAKTK",
            Self::Continue => "CONTINUETK",
            Self::Return => "RETURNTK",
            Self::Main => "MAINTK",
            Self::Getint => "GETINTTK",
            Self::Printf => "PRINTFTK",
            Self::Identifier => "IDENFR",
            Self::Integer => "INTCON",
            Self::FormatString => "STRCON",
            Self::Plus => "PLUS",
            Self::Minus => "MINU",
            Self::Star => "MULT",
            Self::Slash => "DIV",
            Self::Percent => "MOD",
            Self::Assign => "ASSIGN",
            Self::Equal => "EQL",
            Self::NotEqual => "NEQ",
            Self::Less => "LSS",
            Self::LessEqual => "LEQ",
            Self::Greater => "GRE",
            Self::GreaterEqual => "GEQ",
            Self::AndAnd => "AND",
            Self::OrOr => "OR",
            Self::Not => "NOT",
            Self::Comma => "COMMA",
            Self::Semicolon => "SEMICN",
            Self::LeftParen => "LPARENT",
            Self::RightParen => "RPARENT",
            Self::LeftBracket => "LBRACK",
            Self::RightBracket => "RBRACK",
            Self::LeftBrace => "LBRACE",
            Self::RightBrace => "RBRACE",
            Self::Terminator => "EOF",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns `true` if this is the end-of-input marker.
    #[must_use]
    pub const fn is_terminator(self) -> bool {
        matches!(self, Self::Terminator)
    }

    /// Returns `true` if this is the error-recovery sentinel.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// A token with its lexeme text and source location.
///
/// Tokens are cheap to clone: the lexeme is an [`EcoString`].
///
/// # Examples
///
/// ```
/// use tomic_core::source_analysis::{SourceLocation, Token, TokenKind};
///
/// let token = Token::new(TokenKind::Identifier, "foo", SourceLocation::new(1, 5));
/// assert_eq!(token.kind, TokenKind::Identifier);
/// assert_eq!(token.lexeme, "foo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The kind of this token.
    pub kind: TokenKind,
    /// The lexeme text as it appeared in the source.
    pub lexeme: EcoString,
    /// Location of the first character.
    pub loc: SourceLocation,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub fn new(kind: TokenKind, lexeme: impl Into<EcoString>, loc: SourceLocation) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            loc,
        }
    }

    /// Creates a pseudo-token inserted by parser error recovery.
    ///
    /// The lexeme is the kind's fixed lexeme; the location is where the
    /// token should have appeared.
    #[must_use]
    pub fn pseudo(kind: TokenKind, loc: SourceLocation) -> Self {
        Self {
            kind,
            lexeme: EcoString::from(kind.lexeme().unwrap_or("")),
            loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup() {
        assert_eq!(TokenKind::keyword("const"), Some(TokenKind::Const));
        assert_eq!(TokenKind::keyword("getint"), Some(TokenKind::Getint));
        assert_eq!(TokenKind::keyword("main"), Some(TokenKind::Main));
        assert_eq!(TokenKind::keyword("constant"), None);
        assert_eq!(TokenKind::keyword(""), None);
    }

    #[test]
    fn fixed_lexemes() {
        assert_eq!(TokenKind::AndAnd.lexeme(), Some("&&"));
        assert_eq!(TokenKind::Semicolon.lexeme(), Some(";"));
        assert_eq!(TokenKind::Identifier.lexeme(), None);
        assert_eq!(TokenKind::Terminator.lexeme(), None);
    }

    #[test]
    fn descriptions_follow_course_format() {
        assert_eq!(TokenKind::Identifier.description(), "IDENFR");
        assert_eq!(TokenKind::Integer.description(), "INTCON");
        assert_eq!(TokenKind::FormatString.description(), "STRCON");
        assert_eq!(TokenKind::Main.description(), "MAINTK");
        assert_eq!(TokenKind::Percent.description(), "MOD");
    }

    #[test]
    fn pseudo_token_carries_fixed_lexeme() {
        let token = Token::pseudo(TokenKind::Semicolon, SourceLocation::new(2, 9));
        assert_eq!(token.kind, TokenKind::Semicolon);
        assert_eq!(token.lexeme, ";");
        assert_eq!(token.loc, SourceLocation::new(2, 9));
    }

    #[test]
    fn sentinel_predicates() {
        assert!(TokenKind::Terminator.is_terminator());
        assert!(!TokenKind::Semicolon.is_terminator());
        assert!(TokenKind::Unknown.is_unknown());
        assert!(!TokenKind::Identifier.is_unknown());
    }
}
