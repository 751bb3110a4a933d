//! First pass over a record line: lexing plus numeric-wrapper unwrapping.
//!
//! The worker prints records as dictionary literals of its own runtime, so a
//! line may contain single-quoted strings, tuples and numbers wrapped in a
//! type marker such as `np.float64(45.2)`. Lexing is string-aware: wrapper
//! syntax that happens to occur inside a quoted value stays untouched.

use super::record::RecordError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    /// String literal with quotes removed and escapes resolved
    Str(String),
    /// Numeric literal exactly as written
    Number(String),
    /// Bare or dotted identifier, e.g. `True`, `np.float64`
    Ident(String),
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Str(s) => write!(f, "string {:?}", s),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Ident(i) => write!(f, "identifier {}", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token start within the line
    pub offset: usize,
}

/// Lex a record line and unwrap numeric wrappers in one call.
pub fn tokenize(line: &str) -> Result<Vec<Token>, RecordError> {
    let tokens = lex(line)?;
    Ok(unwrap_numeric_wrappers(tokens))
}

fn lex(line: &str) -> Result<Vec<Token>, RecordError> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '{' => single(&mut chars, TokenKind::LBrace),
            '}' => single(&mut chars, TokenKind::RBrace),
            '[' => single(&mut chars, TokenKind::LBracket),
            ']' => single(&mut chars, TokenKind::RBracket),
            '(' => single(&mut chars, TokenKind::LParen),
            ')' => single(&mut chars, TokenKind::RParen),
            ':' => single(&mut chars, TokenKind::Colon),
            ',' => single(&mut chars, TokenKind::Comma),
            '\'' | '"' => {
                chars.next();
                TokenKind::Str(lex_string(&mut chars, c, offset)?)
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let mut text = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    let continues_exponent = (d == '-' || d == '+')
                        && text.ends_with(|e: char| e == 'e' || e == 'E');
                    if d.is_ascii_digit()
                        || d == '.'
                        || d == 'e'
                        || d == 'E'
                        || continues_exponent
                        || text.is_empty()
                    {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Number(text)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '.' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Ident(text)
            }
            other => {
                return Err(RecordError::UnexpectedChar { ch: other, offset });
            }
        };
        tokens.push(Token { kind, offset });
    }

    Ok(tokens)
}

fn single<I>(chars: &mut std::iter::Peekable<I>, kind: TokenKind) -> TokenKind
where
    I: Iterator<Item = (usize, char)>,
{
    chars.next();
    kind
}

fn lex_string<I>(
    chars: &mut std::iter::Peekable<I>,
    quote: char,
    start: usize,
) -> Result<String, RecordError>
where
    I: Iterator<Item = (usize, char)>,
{
    let mut value = String::new();

    while let Some((_, c)) = chars.next() {
        match c {
            c if c == quote => return Ok(value),
            '\\' => {
                let (_, escaped) = chars
                    .next()
                    .ok_or(RecordError::UnterminatedString { offset: start })?;
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    // \\, \', \" and anything unknown keep the escaped char
                    other => value.push(other),
                }
            }
            other => value.push(other),
        }
    }

    Err(RecordError::UnterminatedString { offset: start })
}

/// Numeric type markers the worker runtime wraps literals in.
fn is_numeric_marker(ident: &str) -> bool {
    let name = ident.rsplit('.').next().unwrap_or(ident);
    matches!(
        name,
        "float16"
            | "float32"
            | "float64"
            | "float128"
            | "float_"
            | "double"
            | "longdouble"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
    )
}

/// Replace every `MARKER ( NUMBER )` token run with the bare number.
///
/// Only identifier tokens can start a wrapper, and string contents are never
/// identifier tokens, so quoted text is left alone.
fn unwrap_numeric_wrappers(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if let [Token {
            kind: TokenKind::Ident(marker),
            offset,
        }, Token {
            kind: TokenKind::LParen,
            ..
        }, Token {
            kind: TokenKind::Number(number),
            ..
        }, Token {
            kind: TokenKind::RParen,
            ..
        }, ..] = &tokens[i..]
        {
            if is_numeric_marker(marker) {
                out.push(Token {
                    kind: TokenKind::Number(number.clone()),
                    offset: *offset,
                });
                i += 4;
                continue;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }

    out
}
