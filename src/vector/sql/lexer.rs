use crate::errors::*;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    /// Bare identifier or keyword, as written.
    Ident(String),
    /// `"double quoted"` identifier, never a keyword.
    QuotedIdent(String),
    /// `'single quoted'` string literal.
    Str(String),
    Integer(i64),
    Real(f64),
    /// Punctuation and operators.
    Symbol(&'static str),
    Eof,
}

impl Token {
    /// `true` if this is the bare keyword `kw` (case-insensitive).
    pub(crate) fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(kw))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    /// Byte offset of the token in the statement.
    pub(crate) pos: usize,
}

const SYMBOLS: [&str; 17] = [
    "<>", "!=", "<=", ">=", "=", "<", ">", "(", ")", ",", "*", "+", "-", "/", "%", ".", ";",
];

fn sql_error(position: usize, msg: impl Into<String>) -> GeoError {
    GeoError::SqlError {
        position,
        msg: msg.into(),
    }
}

/// Split a statement into tokens. The last token is always [`Token::Eof`].
pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;

        if c == b'\'' || c == b'"' {
            let (text, end) = quoted(input, start, c)?;
            pos = end;
            tokens.push(Spanned {
                token: if c == b'\'' {
                    Token::Str(text)
                } else {
                    Token::QuotedIdent(text)
                },
                pos: start,
            });
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let (token, end) = number(input, start)?;
            pos = end;
            tokens.push(Spanned { token, pos: start });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(input[start..pos].to_string()),
                pos: start,
            });
            continue;
        }

        match SYMBOLS.iter().find(|s| input[pos..].starts_with(**s)) {
            Some(symbol) => {
                pos += symbol.len();
                tokens.push(Spanned {
                    token: Token::Symbol(symbol),
                    pos: start,
                });
            }
            None => {
                let ch = input[pos..].chars().next().unwrap_or_default();
                return Err(sql_error(start, format!("unexpected character '{ch}'")));
            }
        }
    }

    tokens.push(Spanned {
        token: Token::Eof,
        pos: input.len(),
    });
    Ok(tokens)
}

/// Read a quoted run starting at `start`; a doubled quote is an escaped quote.
fn quoted(input: &str, start: usize, quote: u8) -> Result<(String, usize)> {
    let bytes = input.as_bytes();
    let mut text = Vec::new();
    let mut pos = start + 1;
    loop {
        match bytes.get(pos) {
            None => return Err(sql_error(start, "unterminated quoted string")),
            Some(&b) if b == quote => {
                if bytes.get(pos + 1) == Some(&quote) {
                    text.push(quote);
                    pos += 2;
                } else {
                    pos += 1;
                    break;
                }
            }
            Some(&b) => {
                text.push(b);
                pos += 1;
            }
        }
    }
    let text = String::from_utf8(text).map_err(|_| sql_error(start, "invalid UTF-8 in string"))?;
    Ok((text, pos))
}

fn number(input: &str, start: usize) -> Result<(Token, usize)> {
    let bytes = input.as_bytes();
    let mut pos = start;
    let mut is_real = false;
    while pos < bytes.len() {
        match bytes[pos] {
            b'0'..=b'9' => pos += 1,
            b'.' if !is_real => {
                is_real = true;
                pos += 1;
            }
            b'e' | b'E' => {
                is_real = true;
                pos += 1;
                if matches!(bytes.get(pos), Some(b'+') | Some(b'-')) {
                    pos += 1;
                }
            }
            _ => break,
        }
    }
    let text = &input[start..pos];
    let token = if is_real {
        Token::Real(
            text.parse()
                .map_err(|_| sql_error(start, format!("invalid number '{text}'")))?,
        )
    } else {
        match text.parse::<i64>() {
            Ok(v) => Token::Integer(v),
            Err(_) => Token::Real(
                text.parse()
                    .map_err(|_| sql_error(start, format!("invalid number '{text}'")))?,
            ),
        }
    };
    Ok((token, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_tokenize_statement() {
        assert_eq!(
            tokens("SELECT \"my field\", 'it''s' FROM t WHERE a <> 1.5e2"),
            vec![
                Token::Ident("SELECT".into()),
                Token::QuotedIdent("my field".into()),
                Token::Symbol(","),
                Token::Str("it's".into()),
                Token::Ident("FROM".into()),
                Token::Ident("t".into()),
                Token::Ident("WHERE".into()),
                Token::Ident("a".into()),
                Token::Symbol("<>"),
                Token::Real(150.0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_positions_and_errors() {
        let spanned = tokenize("a >= 10").unwrap();
        assert_eq!(spanned[1].pos, 2);
        assert_eq!(spanned[2].token, Token::Integer(10));
        assert!(matches!(
            tokenize("a = 'open"),
            Err(GeoError::SqlError { position: 4, .. })
        ));
        assert!(matches!(
            tokenize("a # b"),
            Err(GeoError::SqlError { position: 2, .. })
        ));
    }
}
