//! Tokens and the token buffer: typed accessors with lookahead, rewind, and
//! panic-mode recovery to a matching closing parenthesis.

use crate::diagnostics::SourcePos;
use crate::text::number;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TokenKind {
    Keyword,
    Integer,
    Floating,
    String,
    Id,
    Parenthesis,
}

/// One token: its kind, raw text, and source position. String tokens hold the
/// raw contents between the quotes; identifiers keep their leading `$`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: SourcePos,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: SourcePos) -> Self {
        Token {
            kind,
            text: text.into(),
            pos,
        }
    }
}

/// The pre-lexed token stream with an absolute cursor.
#[derive(Debug, Default)]
pub struct TokenBuffer {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenBuffer {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenBuffer { tokens, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len());
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.tokens.len()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead)
    }

    /// The position to blame in diagnostics: the current token's, or the last
    /// token's when the stream is exhausted.
    pub fn source_pos(&self) -> SourcePos {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|token| token.pos)
            .unwrap_or(SourcePos::new(1, 1))
    }

    pub fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;

        Some(token)
    }

    fn take_if(&mut self, accept: impl Fn(&Token) -> bool) -> Option<&Token> {
        let token = self.tokens.get(self.pos)?;

        if accept(token) {
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    /// Consumes the given parenthesis when it is next.
    pub fn get_parenthesis(&mut self, which: char) -> bool {
        self.take_if(|token| token.kind == TokenKind::Parenthesis && token.text.starts_with(which))
            .is_some()
    }

    pub fn peek_parenthesis(&self, which: char) -> bool {
        matches!(self.peek(), Some(token)
            if token.kind == TokenKind::Parenthesis && token.text.starts_with(which))
    }

    /// Consumes the given keyword when it is next.
    pub fn get_keyword(&mut self, keyword: &str) -> bool {
        self.take_if(|token| token.kind == TokenKind::Keyword && token.text == keyword)
            .is_some()
    }

    /// Consumes any keyword.
    pub fn get_any_keyword(&mut self) -> Option<String> {
        self.take_if(|token| token.kind == TokenKind::Keyword)
            .map(|token| token.text.clone())
    }

    pub fn peek_keyword(&self) -> Option<&str> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Keyword => Some(&token.text),
            _ => None,
        }
    }

    /// Consumes an identifier, returning it without the leading `$`.
    pub fn get_id(&mut self) -> Option<String> {
        self.take_if(|token| token.kind == TokenKind::Id)
            .map(|token| token.text[1..].to_string())
    }

    pub fn get_u32(&mut self) -> Option<u32> {
        let parsed = match self.peek() {
            Some(token) if token.kind == TokenKind::Integer => number::parse_u32(&token.text),
            _ => None,
        };

        if parsed.is_some() {
            self.pos += 1;
        }

        parsed
    }

    pub fn get_i32(&mut self) -> Option<i32> {
        let parsed = match self.peek() {
            Some(token) if token.kind == TokenKind::Integer => number::parse_i32(&token.text),
            _ => None,
        };

        if parsed.is_some() {
            self.pos += 1;
        }

        parsed
    }

    pub fn get_i64(&mut self) -> Option<i64> {
        let parsed = match self.peek() {
            Some(token) if token.kind == TokenKind::Integer => number::parse_i64(&token.text),
            _ => None,
        };

        if parsed.is_some() {
            self.pos += 1;
        }

        parsed
    }

    /// Floats also accept integer tokens and the keyword forms
    /// (`nan`, `nan:0x…`, `inf`).
    pub fn get_f32(&mut self) -> Option<f32> {
        let parsed = match self.peek() {
            Some(token)
                if matches!(
                    token.kind,
                    TokenKind::Integer | TokenKind::Floating | TokenKind::Keyword
                ) =>
            {
                number::parse_f32(&token.text)
            }
            _ => None,
        };

        if parsed.is_some() {
            self.pos += 1;
        }

        parsed
    }

    pub fn get_f64(&mut self) -> Option<f64> {
        let parsed = match self.peek() {
            Some(token)
                if matches!(
                    token.kind,
                    TokenKind::Integer | TokenKind::Floating | TokenKind::Keyword
                ) =>
            {
                number::parse_f64(&token.text)
            }
            _ => None,
        };

        if parsed.is_some() {
            self.pos += 1;
        }

        parsed
    }

    /// Consumes a string token and decodes its escapes into bytes.
    pub fn get_string(&mut self) -> Option<Vec<u8>> {
        let decoded = match self.peek() {
            Some(token) if token.kind == TokenKind::String => decode_string(&token.text),
            _ => None,
        };

        if decoded.is_some() {
            self.pos += 1;
        }

        decoded
    }

    /// A string that must also be valid UTF-8 (names).
    pub fn get_text(&mut self) -> Option<String> {
        let start = self.pos;
        let bytes = self.get_string()?;

        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(_) => {
                self.pos = start;
                None
            }
        }
    }

    /// Skips forward past the closing parenthesis matching the one most
    /// recently opened, used after a syntax error.
    pub fn recover(&mut self) {
        let mut depth = 1u32;

        while let Some(token) = self.advance() {
            if token.kind == TokenKind::Parenthesis {
                match token.text.as_str() {
                    "(" => depth += 1,
                    _ => {
                        depth -= 1;

                        if depth == 0 {
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Decodes the escape sequences of a raw string body. Invalid escapes were
/// already reported by the lexer; here they pass through undecoded.
pub fn decode_string(raw: &str) -> Option<Vec<u8>> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut utf8 = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
            continue;
        }

        match chars.next()? {
            'n' => bytes.push(b'\n'),
            'r' => bytes.push(b'\r'),
            't' => bytes.push(b'\t'),
            '"' => bytes.push(b'"'),
            '\'' => bytes.push(b'\''),
            '\\' => bytes.push(b'\\'),
            high => {
                let low = chars.next()?;
                let value = (high.to_digit(16)? << 4) | low.to_digit(16)?;

                bytes.push(value as u8);
            }
        }
    }

    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(tokens: Vec<(TokenKind, &str)>) -> TokenBuffer {
        TokenBuffer::new(
            tokens
                .into_iter()
                .enumerate()
                .map(|(column, (kind, text))| {
                    Token::new(kind, text, SourcePos::new(1, column as u32 + 1))
                })
                .collect(),
        )
    }

    #[test]
    fn typed_accessors_consume_on_match_only() {
        let mut tokens = buffer(vec![
            (TokenKind::Parenthesis, "("),
            (TokenKind::Keyword, "module"),
            (TokenKind::Parenthesis, ")"),
        ]);

        assert!(!tokens.get_parenthesis(')'));
        assert!(tokens.get_parenthesis('('));
        assert!(!tokens.get_keyword("memory"));
        assert!(tokens.get_keyword("module"));
        assert!(tokens.get_parenthesis(')'));
        assert!(tokens.at_end());
    }

    #[test]
    fn ids_drop_their_sigil() {
        let mut tokens = buffer(vec![(TokenKind::Id, "$add")]);

        assert_eq!(tokens.get_id(), Some("add".to_string()));
    }

    #[test]
    fn numbers_parse_by_type() {
        let mut tokens = buffer(vec![
            (TokenKind::Integer, "0x10"),
            (TokenKind::Integer, "-8"),
            (TokenKind::Floating, "1.5"),
        ]);

        assert_eq!(tokens.get_u32(), Some(16));
        assert_eq!(tokens.get_u32(), None);
        assert_eq!(tokens.get_i32(), Some(-8));
        assert_eq!(tokens.get_f64(), Some(1.5));
    }

    #[test]
    fn recover_skips_to_matching_parenthesis() {
        let mut tokens = buffer(vec![
            (TokenKind::Keyword, "junk"),
            (TokenKind::Parenthesis, "("),
            (TokenKind::Keyword, "nested"),
            (TokenKind::Parenthesis, ")"),
            (TokenKind::Parenthesis, ")"),
            (TokenKind::Keyword, "after"),
        ]);

        tokens.recover();

        assert_eq!(tokens.peek_keyword(), Some("after"));
    }

    #[test]
    fn string_escapes_decode() {
        assert_eq!(
            decode_string(r#"a\n\t\"\\\7f"#),
            Some(vec![b'a', b'\n', b'\t', b'"', b'\\', 0x7F])
        );
    }
}
