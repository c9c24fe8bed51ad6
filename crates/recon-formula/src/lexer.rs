//! Expression tokenizer

use crate::error::FormulaError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
    let bytes = source.as_bytes();
    let mut idx = 0usize;
    let mut tokens = Vec::new();

    while idx < bytes.len() {
        let b = bytes[idx];
        if b.is_ascii_whitespace() {
            idx += 1;
            continue;
        }
        let single = match b {
            b'+' => Some(Token::Plus),
            b'-' => Some(Token::Minus),
            b'*' => Some(Token::Star),
            b'/' => Some(Token::Slash),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(token);
            idx += 1;
            continue;
        }

        if b.is_ascii_digit() || b == b'.' {
            let start = idx;
            idx += 1;
            while idx < bytes.len() {
                let c = bytes[idx];
                let exponent_sign =
                    matches!(c, b'+' | b'-') && matches!(bytes[idx - 1], b'e' | b'E');
                if c.is_ascii_digit() || c == b'.' || matches!(c, b'e' | b'E') || exponent_sign {
                    idx += 1;
                } else {
                    break;
                }
            }
            let raw = &source[start..idx];
            let value = raw
                .parse::<f64>()
                .map_err(|_| FormulaError::InvalidNumber(raw.to_string()))?;
            tokens.push(Token::Number(value));
        } else if b.is_ascii_alphabetic() || b == b'_' {
            let start = idx;
            idx += 1;
            while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
                idx += 1;
            }
            tokens.push(Token::Ident(source[start..idx].to_string()));
        } else {
            let found = source[idx..].chars().next().unwrap_or('\u{fffd}');
            return Err(FormulaError::UnexpectedChar { found, offset: idx });
        }
    }

    if tokens.is_empty() {
        return Err(FormulaError::Empty);
    }
    Ok(tokens)
}
