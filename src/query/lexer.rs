//! Tokenizer for the graph query language.
//!
//! Keywords are not special at this level; the parser matches identifiers
//! case-insensitively. Arrows are produced as separate `<`, `-`, `>`
//! tokens and assembled by the parser, so `n.x<-1` stays unambiguous.

use crate::error::QueryParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Dot,
    Pipe,
    Star,
    Dash,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    RegexMatch,
    Eof,
}

impl TokenKind {
    /// Display form used in error messages
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(s) => format!("'{}'", s),
            Self::Str(s) => format!("string \"{}\"", s),
            Self::Int(n) => format!("number {}", n),
            Self::Float(n) => format!("number {}", n),
            Self::LParen => "'('".into(),
            Self::RParen => "')'".into(),
            Self::LBracket => "'['".into(),
            Self::RBracket => "']'".into(),
            Self::LBrace => "'{'".into(),
            Self::RBrace => "'}'".into(),
            Self::Colon => "':'".into(),
            Self::Comma => "','".into(),
            Self::Dot => "'.'".into(),
            Self::Pipe => "'|'".into(),
            Self::Star => "'*'".into(),
            Self::Dash => "'-'".into(),
            Self::Eq => "'='".into(),
            Self::Ne => "'!='".into(),
            Self::Lt => "'<'".into(),
            Self::Le => "'<='".into(),
            Self::Gt => "'>'".into(),
            Self::Ge => "'>='".into(),
            Self::RegexMatch => "'=~'".into(),
            Self::Eof => "end of input".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token's first character
    pub position: usize,
}

/// Split query text into tokens, ending with `Eof`
pub fn tokenize(input: &str) -> Result<Vec<Token>, QueryParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let single = match ch {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            '|' => Some(TokenKind::Pipe),
            '*' => Some(TokenKind::Star),
            '-' => Some(TokenKind::Dash),
            _ => None,
        };
        if let Some(kind) = single {
            chars.next();
            tokens.push(Token { kind, position: pos });
            continue;
        }

        match ch {
            '.' => {
                chars.next();
                tokens.push(Token {
                    kind: TokenKind::Dot,
                    position: pos,
                });
            }
            '=' => {
                chars.next();
                let kind = if chars.next_if(|&(_, c)| c == '~').is_some() {
                    TokenKind::RegexMatch
                } else {
                    chars.next_if(|&(_, c)| c == '=');
                    TokenKind::Eq
                };
                tokens.push(Token { kind, position: pos });
            }
            '!' => {
                chars.next();
                if chars.next_if(|&(_, c)| c == '=').is_none() {
                    return Err(QueryParseError::new(pos + 1, "'=' after '!'", found_at(input, pos + 1)));
                }
                tokens.push(Token {
                    kind: TokenKind::Ne,
                    position: pos,
                });
            }
            '<' => {
                chars.next();
                let kind = if chars.next_if(|&(_, c)| c == '=').is_some() {
                    TokenKind::Le
                } else if chars.next_if(|&(_, c)| c == '>').is_some() {
                    TokenKind::Ne
                } else {
                    TokenKind::Lt
                };
                tokens.push(Token { kind, position: pos });
            }
            '>' => {
                chars.next();
                let kind = if chars.next_if(|&(_, c)| c == '=').is_some() {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                };
                tokens.push(Token { kind, position: pos });
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, other)) => value.push(other),
                            None => break,
                        },
                        c if c == ch => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(QueryParseError::new(input.len(), "closing quote", "end of input"));
                }
                tokens.push(Token {
                    kind: TokenKind::Str(value),
                    position: pos,
                });
            }
            c if c.is_ascii_digit() => {
                let mut end = pos;
                let mut is_float = false;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_digit() {
                        end = i + 1;
                        chars.next();
                    } else if c == '.' && !is_float && next_is_digit(input, i) {
                        is_float = true;
                        end = i + 1;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let text = &input[pos..end];
                let kind = if is_float {
                    text.parse().map(TokenKind::Float).ok()
                } else {
                    text.parse().map(TokenKind::Int).ok()
                };
                let Some(kind) = kind else {
                    return Err(QueryParseError::new(pos, "number", format!("'{}'", text)));
                };
                tokens.push(Token { kind, position: pos });
            }
            c if c.is_alphabetic() || c == '_' || c == '`' => {
                let ident = if c == '`' {
                    chars.next();
                    let mut value = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '`' {
                            closed = true;
                            break;
                        }
                        value.push(c);
                    }
                    if !closed {
                        return Err(QueryParseError::new(input.len(), "closing backtick", "end of input"));
                    }
                    value
                } else {
                    let mut value = String::new();
                    while let Some((_, c)) = chars.next_if(|&(_, c)| c.is_alphanumeric() || c == '_') {
                        value.push(c);
                    }
                    value
                };
                tokens.push(Token {
                    kind: TokenKind::Ident(ident),
                    position: pos,
                });
            }
            other => {
                return Err(QueryParseError::new(pos, "a query token", format!("'{}'", other)));
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: input.len(),
    });
    Ok(tokens)
}

fn next_is_digit(input: &str, dot: usize) -> bool {
    input[dot + 1..]
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
}

fn found_at(input: &str, pos: usize) -> String {
    input
        .get(pos..)
        .and_then(|rest| rest.chars().next())
        .map(|c| format!("'{}'", c))
        .unwrap_or_else(|| "end of input".to_string())
}
