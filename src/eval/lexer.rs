use super::EvalError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    // punctuation
    Dot,
    Comma,
    Colon,
    Question,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    // operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, EvalError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            b'?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            b']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            b'{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            b'}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            b'+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            b'*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            b'/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            b'%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            b'!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    // `!==` lexes the same as `!=`
                    i += if bytes.get(i + 2) == Some(&b'=') { 3 } else { 2 };
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                    i += 1;
                }
            }
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    // `===` lexes the same as `==`
                    i += if bytes.get(i + 2) == Some(&b'=') { 3 } else { 2 };
                    tokens.push(Token::EqEq);
                } else {
                    return Err(EvalError::parse(src, "assignment is not an expression"));
                }
            }
            b'&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token::AndAnd);
                    i += 2;
                } else {
                    return Err(EvalError::parse(src, "unexpected `&`"));
                }
            }
            b'|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token::OrOr);
                    i += 2;
                } else {
                    return Err(EvalError::parse(src, "unexpected `|`"));
                }
            }
            b'\'' | b'"' => {
                let quote = c;
                let mut out: Vec<u8> = Vec::new();
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(EvalError::parse(src, "unterminated string")),
                        Some(&b) if b == quote => {
                            i += 1;
                            break;
                        }
                        Some(b'\\') => {
                            let escaped = match bytes.get(i + 1) {
                                Some(b'n') => b'\n',
                                Some(b't') => b'\t',
                                Some(&e) => e,
                                None => return Err(EvalError::parse(src, "unterminated string")),
                            };
                            out.push(escaped);
                            i += 2;
                        }
                        Some(&b) => {
                            out.push(b);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(String::from_utf8_lossy(&out).into_owned()));
            }
            b'0'..=b'9' => {
                let start = i;
                let mut is_float = false;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if bytes.get(i) == Some(&b'.')
                    && matches!(bytes.get(i + 1), Some(d) if d.is_ascii_digit())
                {
                    is_float = true;
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = std::str::from_utf8(&bytes[start..i]).unwrap_or("");
                if is_float {
                    let value = text
                        .parse::<f64>()
                        .map_err(|_| EvalError::parse(src, "bad number"))?;
                    tokens.push(Token::Float(value));
                } else {
                    let value = text
                        .parse::<i64>()
                        .map_err(|_| EvalError::parse(src, "bad number"))?;
                    tokens.push(Token::Int(value));
                }
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c == b'$' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
                {
                    i += 1;
                }
                let word = std::str::from_utf8(&bytes[start..i]).unwrap_or("").to_string();
                tokens.push(match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" | "undefined" => Token::Null,
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(EvalError::parse(
                    src,
                    &format!("unexpected character `{}`", other as char),
                ));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_member_chains_and_operators() {
        let tokens = tokenize("items[0].title != 'done' && count >= 2").unwrap();
        assert!(tokens.contains(&Token::Ident("items".into())));
        assert!(tokens.contains(&Token::NotEq));
        assert!(tokens.contains(&Token::Str("done".into())));
        assert!(tokens.contains(&Token::Ge));
    }

    #[test]
    fn strict_equality_lexes_as_loose() {
        assert_eq!(tokenize("a === b").unwrap(), tokenize("a == b").unwrap());
    }

    #[test]
    fn rejects_assignment() {
        assert!(tokenize("count = 2").is_err());
    }
}
