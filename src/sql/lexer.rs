/// SQL Lexer - converts SQL text into tokens
///
/// At each position the matchers in `MATCHERS` are tried in order and the
/// first one that recognises the input appends a token and advances. A full
/// pass that leaves the position unchanged means the scanner is stuck.
use super::token::{Token, TokenKind};
use crate::error::{EngineError, Result};
use crate::types::timestamp::parse_date;

type Matcher = fn(&mut Lexer) -> bool;

const MATCHERS: &[Matcher] = &[
    Lexer::match_space,
    Lexer::match_comment,
    Lexer::match_punctuation,
    Lexer::match_single_quoted,
    Lexer::match_double_quoted,
    Lexer::match_backtick_quoted,
    Lexer::match_dollar_quoted,
    Lexer::match_now,
    Lexer::match_date,
    Lexer::match_number,
    Lexer::match_word,
];

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        while !self.is_eof() {
            let checkpoint = self.position;
            for matcher in MATCHERS {
                if matcher(&mut self) {
                    break;
                }
            }
            if self.position == checkpoint {
                let remainder: String = self.input[self.position..].iter().collect();
                return Err(EngineError::Lex {
                    position: self.position,
                    remainder,
                });
            }
        }
        Ok(self.tokens)
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.char_at(self.position)
    }

    fn char_at(&self, index: usize) -> char {
        self.input.get(index).copied().unwrap_or('\0')
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>, start: usize, end: usize) {
        self.tokens.push(Token::new(kind, lexeme, start));
        self.position = end;
    }

    fn is_word_char(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_'
    }

    fn match_space(&mut self) -> bool {
        if !self.current_char().is_whitespace() {
            return false;
        }
        let start = self.position;
        let mut end = start;
        while end < self.input.len() && self.input[end].is_whitespace() {
            end += 1;
        }
        self.push(TokenKind::Space, " ", start, end);
        true
    }

    fn match_comment(&mut self) -> bool {
        if self.current_char() != '-' || self.char_at(self.position + 1) != '-' {
            return false;
        }
        let start = self.position;
        let mut end = start;
        while end < self.input.len() && self.input[end] != '\n' {
            end += 1;
        }
        self.push(TokenKind::Space, " ", start, end);
        true
    }

    fn match_punctuation(&mut self) -> bool {
        let start = self.position;
        let next = self.char_at(start + 1);
        let (kind, len) = match self.current_char() {
            ';' => (TokenKind::Semicolon, 1),
            ',' => (TokenKind::Comma, 1),
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '*' => (TokenKind::Star, 1),
            '.' => (TokenKind::Period, 1),
            '=' => (TokenKind::Eq, 1),
            '<' if next == '=' => (TokenKind::Le, 2),
            '<' if next == '>' => (TokenKind::Ne, 2),
            '<' => (TokenKind::Lt, 1),
            '>' if next == '=' => (TokenKind::Ge, 2),
            '>' => (TokenKind::Gt, 1),
            '!' if next == '=' => (TokenKind::Ne, 2),
            _ => return false,
        };
        let lexeme: String = self.input[start..start + len].iter().collect();
        self.push(kind, lexeme, start, start + len);
        true
    }

    /// Capture text up to `quote`, with a doubled quote standing for itself.
    /// Returns the content and the position after the closing quote.
    fn scan_quoted(&self, quote: char) -> Option<(String, usize)> {
        let mut content = String::new();
        let mut i = self.position + 1;
        while i < self.input.len() {
            let ch = self.input[i];
            if ch == quote {
                if self.char_at(i + 1) == quote {
                    content.push(quote);
                    i += 2;
                    continue;
                }
                return Some((content, i + 1));
            }
            content.push(ch);
            i += 1;
        }
        None
    }

    fn match_single_quoted(&mut self) -> bool {
        self.match_quoted('\'', TokenKind::String)
    }

    fn match_double_quoted(&mut self) -> bool {
        self.match_quoted('"', TokenKind::QuotedIdent)
    }

    fn match_backtick_quoted(&mut self) -> bool {
        self.match_quoted('`', TokenKind::QuotedIdent)
    }

    fn match_quoted(&mut self, quote: char, kind: TokenKind) -> bool {
        if self.current_char() != quote {
            return false;
        }
        let start = self.position;
        match self.scan_quoted(quote) {
            Some((content, end)) => {
                self.push(kind, content, start, end);
                true
            }
            None => false,
        }
    }

    /// `$$...$$`: the kind is inferred from the captured text.
    fn match_dollar_quoted(&mut self) -> bool {
        if self.current_char() != '$' || self.char_at(self.position + 1) != '$' {
            return false;
        }
        let start = self.position;
        let mut i = start + 2;
        while i + 1 < self.input.len() {
            if self.input[i] == '$' && self.input[i + 1] == '$' {
                let content: String = self.input[start + 2..i].iter().collect();
                let kind = if content.trim().parse::<f64>().is_ok() {
                    TokenKind::Number
                } else if parse_date(&content).is_some() {
                    TokenKind::Date
                } else {
                    TokenKind::String
                };
                self.push(kind, content, start, i + 2);
                return true;
            }
            i += 1;
        }
        false
    }

    fn match_now(&mut self) -> bool {
        let start = self.position;
        let candidate: String = self.input[start..(start + 5).min(self.input.len())]
            .iter()
            .collect();
        if !candidate.eq_ignore_ascii_case("now()") {
            return false;
        }
        self.push(TokenKind::Now, candidate, start, start + 5);
        true
    }

    /// Unquoted `YYYY-MM-DD`
    fn match_date(&mut self) -> bool {
        const SHAPE: &[u8] = b"dddd-dd-dd";
        let start = self.position;
        if start + SHAPE.len() > self.input.len() {
            return false;
        }
        for (offset, expected) in SHAPE.iter().enumerate() {
            let ch = self.input[start + offset];
            let ok = match expected {
                b'd' => ch.is_ascii_digit(),
                _ => ch == '-',
            };
            if !ok {
                return false;
            }
        }
        let end = start + SHAPE.len();
        if Self::is_word_char(self.char_at(end)) {
            return false;
        }
        let lexeme: String = self.input[start..end].iter().collect();
        if parse_date(&lexeme).is_none() {
            return false;
        }
        self.push(TokenKind::Date, lexeme, start, end);
        true
    }

    fn match_number(&mut self) -> bool {
        let start = self.position;
        let mut i = start;
        if self.char_at(i) == '-' {
            i += 1;
        }
        if !self.char_at(i).is_ascii_digit() {
            return false;
        }
        let mut seen_dot = false;
        while i < self.input.len() {
            let ch = self.input[i];
            if ch.is_ascii_digit() {
                i += 1;
            } else if ch == '.' && !seen_dot && self.char_at(i + 1).is_ascii_digit() {
                seen_dot = true;
                i += 1;
            } else {
                break;
            }
        }
        // 12abc is a word, not a number followed by a word
        if Self::is_word_char(self.char_at(i)) {
            return false;
        }
        let lexeme: String = self.input[start..i].iter().collect();
        self.push(TokenKind::Number, lexeme, start, i);
        true
    }

    /// Keywords and identifiers. Reading the whole word before the keyword
    /// lookup keeps `count` from matching the head of `country`.
    fn match_word(&mut self) -> bool {
        let first = self.current_char();
        if !(first.is_alphabetic() || first == '_' || first.is_ascii_digit()) {
            return false;
        }
        let start = self.position;
        let mut end = start;
        while end < self.input.len() && Self::is_word_char(self.input[end]) {
            end += 1;
        }
        let word: String = self.input[start..end].iter().collect();
        let kind = TokenKind::from_keyword(&word).unwrap_or(TokenKind::Identifier);
        self.push(kind, word, start, end);
        true
    }
}

/// Lex `text` into tokens, whitespace included.
pub fn lex(text: &str) -> Result<Vec<Token>> {
    Lexer::new(text).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::token::strip_spaces;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        strip_spaces(lex(sql).unwrap())
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_lexer_simple_select() {
        assert_eq!(
            kinds("SELECT * FROM users"),
            vec![TokenKind::Select, TokenKind::Star, TokenKind::From, TokenKind::Identifier]
        );
    }

    #[test]
    fn test_keywords_reject_prefix_match() {
        let tokens = strip_spaces(lex("SELECT country, count FROM t").unwrap());
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].lexeme, "country");
        assert_eq!(tokens[3].kind, TokenKind::Count);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("= != <> < > <= >="),
            vec![
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Ne,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Le,
                TokenKind::Ge
            ]
        );
    }

    #[test]
    fn test_quoted_forms_capture_content() {
        let tokens = strip_spaces(lex(r#"'it''s' "my table" `col`"#).unwrap());
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "it's");
        assert_eq!(tokens[1].kind, TokenKind::QuotedIdent);
        assert_eq!(tokens[1].lexeme, "my table");
        assert_eq!(tokens[2].lexeme, "col");
    }

    #[test]
    fn test_dollar_quoted_inference() {
        let tokens = strip_spaces(lex("$$12.5$$ $$2021-03-04$$ $$hello$$").unwrap());
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "12.5");
        assert_eq!(tokens[1].kind, TokenKind::Date);
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].lexeme, "hello");
    }

    #[test]
    fn test_numbers_dates_and_now() {
        let tokens = strip_spaces(lex("-12 3.25 2020-01-31 NOW() now").unwrap());
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "-12");
        assert_eq!(tokens[1].lexeme, "3.25");
        assert_eq!(tokens[2].kind, TokenKind::Date);
        assert_eq!(tokens[3].kind, TokenKind::Now);
        assert_eq!(tokens[4].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_stuck_scanner_reports_remainder() {
        let err = lex("SELECT 'unterminated").unwrap_err();
        match err {
            EngineError::Lex { position, remainder } => {
                assert_eq!(position, 7);
                assert_eq!(remainder, "'unterminated");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(matches!(lex("SELECT #"), Err(EngineError::Lex { .. })));

        // Positions count characters, not bytes
        let err = lex("SELECT 'é' #").unwrap_err();
        assert!(matches!(err, EngineError::Lex { position: 11, .. }));
        assert!(err.to_string().starts_with("cannot lex input at character 11"));
    }

    #[test]
    fn test_comment_is_whitespace() {
        assert_eq!(
            kinds("SELECT * -- trailing\nFROM users"),
            vec![TokenKind::Select, TokenKind::Star, TokenKind::From, TokenKind::Identifier]
        );
    }
}
