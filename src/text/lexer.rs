//! The S-expression tokeniser, built from nom combinators over the raw
//! source. Positions are recovered from the remaining-input offset against a
//! precomputed table of line starts.

use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::one_of;
use nom::combinator::recognize;
use nom::sequence::pair;
use nom::IResult;

use crate::diagnostics::{Diagnostics, SourcePos};
use crate::text::tokens::{Token, TokenBuffer, TokenKind};

/// Tokenises the whole source. Lexical problems are reported and the
/// offending character skipped, so one pass yields every error.
pub fn tokenize(source: &str, diagnostics: &mut Diagnostics) -> TokenBuffer {
    let lines = LineTable::new(source);
    let mut tokens = Vec::new();
    let mut rest = source;

    loop {
        rest = skip_trivia(rest, source, &lines, diagnostics);

        if rest.is_empty() {
            break;
        }

        let pos = lines.pos(offset(source, rest));

        if let Ok((after, text)) = parenthesis(rest) {
            tokens.push(Token::new(TokenKind::Parenthesis, text, pos));
            rest = after;
            continue;
        }

        if rest.starts_with('"') {
            match string_body(&rest[1..]) {
                Some((after, body, errors)) => {
                    for (error_offset, message) in errors {
                        let inner = offset(source, &rest[1..]) + error_offset;
                        diagnostics.error_at(lines.pos(inner), message);
                    }

                    tokens.push(Token::new(TokenKind::String, body, pos));
                    rest = after;
                }
                None => {
                    diagnostics.error_at(pos, "unterminated string");
                    rest = "";
                }
            }

            continue;
        }

        if let Ok((after, text)) = atom(rest) {
            match classify(text) {
                Ok(kind) => tokens.push(Token::new(kind, text, pos)),
                Err(message) => {
                    diagnostics.error_at(pos, format!("{} '{}'", message, text));
                    // Keep a keyword token so the parser can resynchronise.
                    tokens.push(Token::new(TokenKind::Keyword, text, pos));
                }
            }

            rest = after;
            continue;
        }

        let stray = rest.chars().next().unwrap();
        diagnostics.error_at(pos, format!("stray character '{}'", stray.escape_default()));
        rest = &rest[stray.len_utf8()..];
    }

    TokenBuffer::new(tokens)
}

fn offset(source: &str, rest: &str) -> usize {
    source.len() - rest.len()
}

/// Byte offsets of every line start, for offset -> (line, column) queries.
struct LineTable {
    starts: Vec<usize>,
}

impl LineTable {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];

        for (index, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(index + 1);
            }
        }

        LineTable { starts }
    }

    fn pos(&self, offset: usize) -> SourcePos {
        let line = self.starts.partition_point(|&start| start <= offset);

        SourcePos::new(line as u32, (offset - self.starts[line - 1] + 1) as u32)
    }
}

fn is_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}

/// Identifier characters: the printable set minus structural punctuation.
fn is_id_char(ch: char) -> bool {
    ch.is_ascii_graphic() && !matches!(ch, '?' | ',' | ';' | '(' | ')' | '"' | '=')
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag(";;"), take_while(|ch| ch != '\n')))(input)
}

fn parenthesis(input: &str) -> IResult<&str, &str> {
    recognize(one_of("()"))(input)
}

/// A maximal run of identifier characters, permitting one trailing `=` which
/// marks the keyword as a key (`offset=`, `align=`).
fn atom(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(is_id_char),
        take_while(|ch| ch == '='),
    ))(input)
}

/// Skips whitespace, line comments, and nested block comments.
fn skip_trivia<'a>(
    mut rest: &'a str,
    source: &str,
    lines: &LineTable,
    diagnostics: &mut Diagnostics,
) -> &'a str {
    loop {
        let trimmed = rest.trim_start_matches(is_space);

        if let Ok((after, _)) = line_comment(trimmed) {
            rest = after;
            continue;
        }

        if trimmed.starts_with("(;") {
            match skip_block_comment(trimmed) {
                Some(after) => {
                    rest = after;
                    continue;
                }
                None => {
                    diagnostics.error_at(
                        lines.pos(offset(source, trimmed)),
                        "unterminated block comment",
                    );
                    return "";
                }
            }
        }

        return trimmed;
    }
}

/// Block comments nest.
fn skip_block_comment(input: &str) -> Option<&str> {
    let mut rest = &input[2..];
    let mut depth = 1u32;

    while depth > 0 {
        if let Some(after) = rest.strip_prefix("(;") {
            depth += 1;
            rest = after;
        } else if let Some(after) = rest.strip_prefix(";)") {
            depth -= 1;
            rest = after;
        } else {
            let ch = rest.chars().next()?;
            rest = &rest[ch.len_utf8()..];
        }
    }

    Some(rest)
}

/// Scans a string body up to the closing quote, collecting escape errors as
/// (offset, message) pairs. Returns (rest, raw body, errors).
#[allow(clippy::type_complexity)]
fn string_body(input: &str) -> Option<(&str, &str, Vec<(usize, String)>)> {
    let mut errors = Vec::new();
    let mut chars = input.char_indices();

    while let Some((index, ch)) = chars.next() {
        match ch {
            '"' => return Some((&input[index + 1..], &input[..index], errors)),
            '\n' => return None,
            '\\' => match chars.next() {
                Some((_, 'n' | 'r' | 't' | '"' | '\'' | '\\')) => {}
                Some((escape_index, high)) => {
                    let low = chars.next();

                    if !high.is_ascii_hexdigit()
                        || !low.map_or(false, |(_, ch)| ch.is_ascii_hexdigit())
                    {
                        errors.push((escape_index, format!("invalid escape '\\{}'", high)));
                    }
                }
                None => return None,
            },
            _ => {}
        }
    }

    None
}

/// Decides what an atom is: a number, an identifier, or a keyword.
fn classify(text: &str) -> Result<TokenKind, &'static str> {
    if text.starts_with('$') {
        if text.len() == 1 {
            return Err("empty identifier");
        }

        return Ok(TokenKind::Id);
    }

    let unsigned = text.trim_start_matches(['+', '-']);

    if unsigned.starts_with(|ch: char| ch.is_ascii_digit()) {
        return classify_number(unsigned);
    }

    // `nan`, `nan:0x…` and `inf` read as keywords and are re-interpreted by
    // the float accessors.
    if text.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
        return Ok(TokenKind::Keyword);
    }

    Err("unrecognised token")
}

fn classify_number(unsigned: &str) -> Result<TokenKind, &'static str> {
    if unsigned.contains("__") {
        return Err("doubled separator in number");
    }

    let hex = unsigned.starts_with("0x") || unsigned.starts_with("0X");
    let digits = if hex { &unsigned[2..] } else { unsigned };

    let floating = digits.contains('.')
        || (hex && digits.contains(['p', 'P']))
        || (!hex && digits.contains(['e', 'E']));

    let digit_ok = |ch: char| {
        ch == '_'
            || ch == '.'
            || if hex {
                ch.is_ascii_hexdigit() || matches!(ch, 'p' | 'P' | '+' | '-')
            } else {
                ch.is_ascii_digit() || matches!(ch, 'e' | 'E' | '+' | '-')
            }
    };

    if !digits.chars().all(digit_ok) || digits.is_empty() {
        return Err("malformed number");
    }

    Ok(if floating {
        TokenKind::Floating
    } else {
        TokenKind::Integer
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let buffer = tokenize(source, &mut diagnostics);
        let mut tokens = Vec::new();
        let mut buffer = buffer;

        while let Some(token) = buffer.advance() {
            tokens.push(token.clone());
        }

        (tokens, diagnostics)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn basic_module() {
        let (tokens, diagnostics) = lex("(module)");

        assert!(!diagnostics.has_errors());
        assert_eq!(
            tokens
                .iter()
                .map(|token| token.text.as_str())
                .collect::<Vec<_>>(),
            vec!["(", "module", ")"]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let (tokens, diagnostics) =
            lex("(module ;; a line comment\n (; nested (; block ;) comment ;) )");

        assert!(!diagnostics.has_errors());
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn unterminated_block_comment_is_reported() {
        let (_, diagnostics) = lex("(; never closed");

        assert!(diagnostics.has_errors());
    }

    #[test]
    fn token_classification() {
        assert_eq!(
            kinds("func $f 42 -8 1.5 0x1p2 \"text\""),
            vec![
                TokenKind::Keyword,
                TokenKind::Id,
                TokenKind::Integer,
                TokenKind::Integer,
                TokenKind::Floating,
                TokenKind::Floating,
                TokenKind::String,
            ]
        );
    }

    #[test]
    fn key_keywords_keep_their_equals() {
        let (tokens, diagnostics) = lex("offset=8 align=4");

        assert!(!diagnostics.has_errors());
        assert_eq!(tokens[0].text, "offset=");
        assert_eq!(tokens[1].text, "8");
        assert_eq!(tokens[2].text, "align=");
        assert_eq!(tokens[3].text, "4");
    }

    #[test]
    fn positions_are_line_and_column() {
        let (tokens, _) = lex("(module\n  (func))");

        assert_eq!(tokens[0].pos, SourcePos::new(1, 1));
        assert_eq!(tokens[1].pos, SourcePos::new(1, 2));
        assert_eq!(tokens[2].pos, SourcePos::new(2, 3));
        assert_eq!(tokens[3].pos, SourcePos::new(2, 4));
    }

    #[test]
    fn doubled_separator_is_a_lexical_error() {
        let (_, diagnostics) = lex("1__000");

        assert!(diagnostics.has_errors());
    }

    #[test]
    fn bad_escape_is_reported_with_position() {
        let (tokens, diagnostics) = lex("\"ab\\q\"");

        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(tokens.len(), 1);
        assert!(diagnostics.items()[0].message.contains("invalid escape"));
    }

    #[test]
    fn strings_keep_raw_bodies() {
        let (tokens, _) = lex(r#""a\tb""#);

        assert_eq!(tokens[0].text, r"a\tb");
    }
}
