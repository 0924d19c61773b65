use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::diagnostics::Diagnostics;

#[derive(Eq, PartialEq, Debug, Copy, Clone, Hash)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Colon,
    Comma,
    Dot,
    Minus,
    Percent,
    Plus,
    Question,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    StarStar,
    PlusPlus,
    MinusMinus,

    // An operator glued to a following '=', e.g. "+=".
    CompoundEqual,

    // Literals.
    Identifier,
    String,
    Number,

    // Keywords.
    And,
    Break,
    Class,
    Continue,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    SelfKw,
    Super,
    True,
    Var,
    While,

    Eof,
    Error,
}

/// Identity of a token, unique for the lifetime of the process.
///
/// The analyzer records bindings as "use-site token -> declaring token", so
/// two tokens with the same lexeme must still be told apart.
#[derive(Eq, PartialEq, Debug, Copy, Clone, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

impl TokenId {
    pub fn fresh() -> TokenId {
        TokenId(NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub enum Literal {
    Identifier(String),
    Str(String),
    Number(f64),
    Compound {
        operator: Box<Token>,
        equal: Box<Token>,
    },
}

#[derive(Clone)]
pub struct Token {
    pub ty: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub line: usize,
    pub col: i64,
    pub id: TokenId,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Token {{ ty: {:?}, lexeme: \"{}\", literal: {:?}, line: {:?}, col: {:?}}}",
            self.ty, self.lexeme, self.literal, self.line, self.col
        )
    }
}

impl Token {
    pub fn new(ty: TokenType, lexeme: &str, literal: Option<Literal>, line: usize, col: i64) -> Token {
        Token {
            ty,
            lexeme: lexeme.to_string(),
            literal,
            line,
            col,
            id: TokenId::fresh(),
        }
    }

    /// A synthetic identifier that appears nowhere in the source (`self`,
    /// native bindings).
    pub fn special(name: &str) -> Token {
        Token::new(TokenType::Identifier, name, None, 0, -1)
    }

    pub fn lex_equals(&self, other: &Token) -> bool {
        self.lexeme == other.lexeme
    }

    /// The two tokens a `CompoundEqual` was built from.
    pub fn compound_parts(&self) -> Option<(&Token, &Token)> {
        match &self.literal {
            Some(Literal::Compound { operator, equal }) => Some((operator, equal)),
            _ => None,
        }
    }
}

pub fn scan_tokens(input: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut scanner = Scanner {
        source: input.chars().collect(),
        ..Default::default()
    };

    scanner.scan_tokens(diagnostics);
    tracing::debug!(count = scanner.tokens.len(), "scanned tokens");

    compound(scanner.tokens)
}

struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    col: i64,
}

impl Default for Scanner {
    fn default() -> Scanner {
        Scanner {
            source: Vec::new(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            col: -1,
        }
    }
}

impl Scanner {
    fn scan_tokens(&mut self, diagnostics: &mut Diagnostics) {
        while !self.done() {
            self.start = self.current;
            self.scan_token(diagnostics);
        }

        self.tokens.push(Token::new(TokenType::Eof, "", None, self.line, self.col));
    }

    fn advance(&mut self) -> char {
        self.current += 1;
        self.col += 1;

        let c = self.source[self.current - 1];
        if c == '\n' {
            self.line += 1;
            self.col = -1;
        }
        c
    }

    fn scan_token(&mut self, diagnostics: &mut Diagnostics) {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ':' => self.add_token(TokenType::Colon),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '%' => self.add_token(TokenType::Percent),
            '?' => self.add_token(TokenType::Question),
            ';' => self.add_token(TokenType::Semicolon),
            '-' => {
                let matches_dash = self.matches('-');
                self.add_token(if matches_dash {
                    TokenType::MinusMinus
                } else {
                    TokenType::Minus
                })
            }
            '+' => {
                let matches_plus = self.matches('+');
                self.add_token(if matches_plus {
                    TokenType::PlusPlus
                } else {
                    TokenType::Plus
                })
            }
            '*' => {
                let matches_star = self.matches('*');
                self.add_token(if matches_star {
                    TokenType::StarStar
                } else {
                    TokenType::Star
                })
            }
            '!' => {
                let matches_eq = self.matches('=');
                self.add_token(if matches_eq {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                })
            }
            '=' => {
                let matches_eq = self.matches('=');
                self.add_token(if matches_eq {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                })
            }
            '<' => {
                let matches_eq = self.matches('=');
                self.add_token(if matches_eq {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                })
            }
            '>' => {
                let matches_eq = self.matches('=');
                self.add_token(if matches_eq {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                })
            }
            '/' => {
                if self.matches('/') {
                    while self.peek() != '\n' && !self.done() {
                        self.advance();
                    }
                } else if self.matches('*') {
                    self.block_comment(diagnostics)
                } else {
                    self.add_token(TokenType::Slash)
                }
            }
            ' ' | '\r' | '\t' | '\n' => {}
            '"' => self.string(diagnostics),
            _ => {
                if Scanner::is_decimal_digit(c) {
                    self.number()
                } else if Scanner::is_alpha(c) {
                    self.identifier()
                } else {
                    diagnostics.error_at_line(self.line, &format!("Unexpected character '{}'.", c))
                }
            }
        }
    }

    fn block_comment(&mut self, diagnostics: &mut Diagnostics) {
        let start_line = self.line;
        let mut depth = 1;

        while depth > 0 {
            if self.done() {
                diagnostics.error_at_line(
                    self.line,
                    &format!(
                        "Unterminated block comment started at line {} (depth {}).",
                        start_line, depth
                    ),
                );
                return;
            }
            if self.peek() == '/' && self.peek_next() == '*' {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                self.advance();
            }
        }
    }

    fn string(&mut self, diagnostics: &mut Diagnostics) {
        let start_col = self.col;
        let mut value = String::new();

        while self.peek() != '"' && !self.done() {
            let c = self.advance();
            if c == '\\' && !self.done() {
                let escaped = self.advance();
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    '\'' => value.push('\''),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            } else {
                value.push(c);
            }
        }

        if self.done() {
            diagnostics.error_at_line(self.line, "Unterminated string.");
            return;
        }

        // the closing "
        self.advance();

        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(
            TokenType::String,
            &lexeme,
            Some(Literal::Str(value)),
            self.line,
            start_col,
        ));
    }

    fn number(&mut self) {
        while Scanner::is_decimal_digit(self.peek()) {
            self.advance();
        }

        if self.peek() == '.' && Scanner::is_decimal_digit(self.peek_next()) {
            self.advance();
        }

        while Scanner::is_decimal_digit(self.peek()) {
            self.advance();
        }

        let val: String = self.source[self.start..self.current].iter().collect();
        // digits with at most one inner '.' always parse
        let parsed_val = val.parse().unwrap_or(0.0);

        self.add_token_literal(TokenType::Number, Some(Literal::Number(parsed_val)))
    }

    fn identifier(&mut self) {
        while Scanner::is_alphanumeric(self.peek()) {
            self.advance();
        }

        let literal_val: String = self.source[self.start..self.current].iter().collect();

        let token_type = match keyword(&literal_val) {
            Some(kw_token_type) => kw_token_type,
            None => TokenType::Identifier,
        };

        match token_type {
            TokenType::Identifier => self.add_token_literal(
                TokenType::Identifier,
                Some(Literal::Identifier(literal_val)),
            ),
            _ => self.add_token(token_type),
        }
    }

    fn is_alphanumeric(c: char) -> bool {
        Scanner::is_alpha(c) || Scanner::is_decimal_digit(c)
    }

    fn is_alpha(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn is_decimal_digit(c: char) -> bool {
        c.is_ascii_digit()
    }

    fn matches(&mut self, c: char) -> bool {
        if self.done() || self.peek() != c {
            return false;
        }

        self.advance();
        true
    }

    fn add_token(&mut self, token_type: TokenType) {
        self.add_token_literal(token_type, None)
    }

    fn add_token_literal(&mut self, token_type: TokenType, literal: Option<Literal>) {
        let text: String = self.source[self.start..self.current].iter().collect();
        let col = self.col + 1 - text.chars().count() as i64;

        self.tokens
            .push(Token::new(token_type, &text, literal, self.line, col))
    }

    fn peek(&self) -> char {
        if self.done() {
            return '\0';
        }
        self.source[self.current]
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() {
            '\0'
        } else {
            self.source[self.current + 1]
        }
    }

    fn done(&self) -> bool {
        self.current >= self.source.len()
    }
}

fn keyword(s: &str) -> Option<TokenType> {
    match s {
        "and" => Some(TokenType::And),
        "break" => Some(TokenType::Break),
        "class" => Some(TokenType::Class),
        "continue" => Some(TokenType::Continue),
        "else" => Some(TokenType::Else),
        "false" => Some(TokenType::False),
        "for" => Some(TokenType::For),
        "fun" => Some(TokenType::Fun),
        "if" => Some(TokenType::If),
        "nil" => Some(TokenType::Nil),
        "or" => Some(TokenType::Or),
        "print" => Some(TokenType::Print),
        "return" => Some(TokenType::Return),
        "self" => Some(TokenType::SelfKw),
        "super" => Some(TokenType::Super),
        "true" => Some(TokenType::True),
        "var" => Some(TokenType::Var),
        "while" => Some(TokenType::While),
        _ => None,
    }
}

fn is_compoundable(ty: TokenType) -> bool {
    matches!(
        ty,
        TokenType::Plus
            | TokenType::Minus
            | TokenType::Star
            | TokenType::Slash
            | TokenType::Percent
            | TokenType::StarStar
            | TokenType::And
            | TokenType::Or
    )
}

fn adjacent(left: &Token, right: &Token) -> bool {
    left.line == right.line && left.col + left.lexeme.chars().count() as i64 == right.col
}

/// Collapses `op` immediately followed by `=` into one `CompoundEqual` token
/// carrying both, so the parser can desugar `a op= b` into `a = a op b`.
fn compound(tokens: Vec<Token>) -> Vec<Token> {
    let mut res: Vec<Token> = Vec::with_capacity(tokens.len());

    for token in tokens {
        let glue = match res.last() {
            Some(prev) => {
                token.ty == TokenType::Equal && is_compoundable(prev.ty) && adjacent(prev, &token)
            }
            None => false,
        };

        match res.pop() {
            Some(operator) if glue => {
                let lexeme = format!("{}{}", operator.lexeme, token.lexeme);
                let (line, col) = (operator.line, operator.col);
                res.push(Token::new(
                    TokenType::CompoundEqual,
                    &lexeme,
                    Some(Literal::Compound {
                        operator: Box::new(operator),
                        equal: Box::new(token),
                    }),
                    line,
                    col,
                ));
            }
            Some(prev) => {
                res.push(prev);
                res.push(token);
            }
            None => res.push(token),
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(code: &str) -> (Vec<Token>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let tokens = scan_tokens(code, &mut diagnostics);
        (tokens, diagnostics)
    }

    fn types(code: &str) -> Vec<TokenType> {
        scan(code).0.iter().map(|tok| tok.ty).collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            types("( ) { } , . ; : ? % ! != = == < <= > >= ** ++ --"),
            vec![
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::Comma,
                TokenType::Dot,
                TokenType::Semicolon,
                TokenType::Colon,
                TokenType::Question,
                TokenType::Percent,
                TokenType::Bang,
                TokenType::BangEqual,
                TokenType::Equal,
                TokenType::EqualEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::StarStar,
                TokenType::PlusPlus,
                TokenType::MinusMinus,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            types("var self_ = self; class break continue"),
            vec![
                TokenType::Var,
                TokenType::Identifier,
                TokenType::Equal,
                TokenType::SelfKw,
                TokenType::Semicolon,
                TokenType::Class,
                TokenType::Break,
                TokenType::Continue,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let (tokens, diagnostics) = scan("12 3.5 7.");
        assert!(!diagnostics.has_error());
        let nums: Vec<f64> = tokens
            .iter()
            .filter_map(|tok| match tok.literal {
                Some(Literal::Number(n)) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(nums, vec![12.0, 3.5, 7.0]);
        assert_eq!(tokens[3].ty, TokenType::Dot);
    }

    #[test]
    fn test_string_escapes() {
        let (tokens, _) = scan(r#""a\tb\n\"c\"""#);
        match &tokens[0].literal {
            Some(Literal::Str(s)) => assert_eq!(s, "a\tb\n\"c\""),
            other => panic!("unexpected literal {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_string_reported_once() {
        let (tokens, diagnostics) = scan("print \"abc\n\ndef");
        assert_eq!(diagnostics.error_count(), 1);
        assert!(diagnostics.stderr().contains("[line 3] Error: Unterminated string."));
        assert_eq!(tokens.last().map(|t| t.ty), Some(TokenType::Eof));
    }

    #[test]
    fn test_bad_characters_all_reported() {
        let (tokens, diagnostics) = scan("var a = 1 @ 2 # 3;");
        assert_eq!(diagnostics.error_count(), 2);
        assert!(diagnostics.stderr().contains("Unexpected character '@'."));
        assert!(diagnostics.stderr().contains("Unexpected character '#'."));
        assert_eq!(tokens.len(), 8);
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            types("1 // comment\n/* a /* nested */ still comment */ 2"),
            vec![TokenType::Number, TokenType::Number, TokenType::Eof]
        );
    }

    #[test]
    fn test_unterminated_nested_comment() {
        let (_, diagnostics) = scan("/* one /* two */\n\n");
        assert_eq!(diagnostics.error_count(), 1);
        assert!(diagnostics
            .stderr()
            .contains("Unterminated block comment started at line 1 (depth 1)."));
    }

    #[test]
    fn test_compound_tokens() {
        let (tokens, _) = scan("a += 1; b **= 2; c or= d; e + = f;");
        assert_eq!(tokens[1].ty, TokenType::CompoundEqual);
        assert_eq!(tokens[1].lexeme, "+=");
        let (operator, equal) = tokens[1].compound_parts().unwrap();
        assert_eq!(operator.ty, TokenType::Plus);
        assert_eq!(equal.ty, TokenType::Equal);
        assert_eq!(tokens[5].lexeme, "**=");
        assert_eq!(tokens[9].lexeme, "or=");
        // not adjacent: stays two tokens
        assert_eq!(tokens[13].ty, TokenType::Plus);
        assert_eq!(tokens[14].ty, TokenType::Equal);
    }

    #[test]
    fn test_line_and_col() {
        let (tokens, _) = scan("var x;\n  print x;");
        assert_eq!((tokens[0].line, tokens[0].col), (1, 0));
        assert_eq!((tokens[3].line, tokens[3].col), (2, 2));
        assert_eq!((tokens[4].line, tokens[4].col), (2, 8));
    }

    #[test]
    fn test_token_ids_are_unique() {
        let (tokens, _) = scan("a a a");
        assert_ne!(tokens[0].id, tokens[1].id);
        assert_ne!(tokens[1].id, tokens[2].id);
    }
}
