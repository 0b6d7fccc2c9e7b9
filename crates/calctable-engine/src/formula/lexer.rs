use super::FormulaError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Reference(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    LParen,
    RParen,
    Comma,
    Eof,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Reference(name) => format!("reference {{{}}}", name),
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::DoubleSlash => "'//'".into(),
            Token::Percent => "'%'".into(),
            Token::DoubleStar => "'**'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Comma => "','".into(),
            Token::Eof => "end of formula".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "False", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "None", "nonlocal", "not", "or", "pass", "raise", "return", "True", "try", "while",
    "with", "yield",
];

/// Split formula text into tokens, rejecting anything outside the grammar.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, FormulaError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).map(|(_, c)| *c);
        let single = |token: Token| Spanned {
            token,
            position: pos,
        };

        match c {
            '0'..='9' => {
                let (value, end) = lex_number(source, &chars, i)?;
                tokens.push(single(Token::Number(value)));
                i = end;
                continue;
            }
            '.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                let (value, end) = lex_number(source, &chars, i)?;
                tokens.push(single(Token::Number(value)));
                i = end;
                continue;
            }
            '{' => {
                let mut j = i + 1;
                let mut name = String::new();
                loop {
                    match chars.get(j) {
                        None => return Err(FormulaError::syntax(pos, "unterminated reference")),
                        Some((_, '}')) => break,
                        Some((p, '{')) => {
                            return Err(FormulaError::syntax(*p, "nested '{' in reference"));
                        }
                        Some((_, ch)) => name.push(*ch),
                    }
                    j += 1;
                }
                if name.is_empty() {
                    return Err(FormulaError::syntax(pos, "empty reference"));
                }
                tokens.push(single(Token::Reference(name)));
                i = j + 1;
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut j = i;
                let mut name = String::new();
                while let Some((_, ch)) = chars.get(j) {
                    if ch.is_alphanumeric() || *ch == '_' {
                        name.push(*ch);
                        j += 1;
                    } else {
                        break;
                    }
                }
                if KEYWORDS.contains(&name.as_str()) {
                    return Err(FormulaError::UnsupportedOperation(format!(
                        "keyword '{}'",
                        name
                    )));
                }
                tokens.push(single(Token::Ident(name)));
                i = j;
                continue;
            }
            '+' => tokens.push(single(Token::Plus)),
            '-' => tokens.push(single(Token::Minus)),
            '%' => tokens.push(single(Token::Percent)),
            '(' => tokens.push(single(Token::LParen)),
            ')' => tokens.push(single(Token::RParen)),
            ',' => tokens.push(single(Token::Comma)),
            '*' if next == Some('*') => {
                tokens.push(single(Token::DoubleStar));
                i += 2;
                continue;
            }
            '*' => tokens.push(single(Token::Star)),
            '/' if next == Some('/') => {
                tokens.push(single(Token::DoubleSlash));
                i += 2;
                continue;
            }
            '/' => tokens.push(single(Token::Slash)),
            '<' | '>' | '=' | '!' => {
                return Err(FormulaError::UnsupportedOperation(format!(
                    "comparison or assignment '{}'",
                    c
                )));
            }
            '&' | '|' | '^' | '~' => {
                return Err(FormulaError::UnsupportedOperation(format!(
                    "bitwise operator '{}'",
                    c
                )));
            }
            '\'' | '"' => {
                return Err(FormulaError::UnsupportedOperation("string literal".into()));
            }
            '[' | ']' => {
                return Err(FormulaError::UnsupportedOperation("subscript".into()));
            }
            '.' => {
                return Err(FormulaError::UnsupportedOperation("attribute access".into()));
            }
            ';' | ':' | '@' => {
                return Err(FormulaError::UnsupportedOperation(format!("'{}'", c)));
            }
            _ => {
                return Err(FormulaError::syntax(
                    pos,
                    format!("unexpected character '{}'", c),
                ));
            }
        }
        i += 1;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        position: source.len(),
    });
    Ok(tokens)
}

/// Digits with `_` separators, optional fraction, optional exponent.
fn lex_number(
    source: &str,
    chars: &[(usize, char)],
    start: usize,
) -> Result<(f64, usize), FormulaError> {
    let start_pos = chars[start].0;
    let mut text = String::new();
    let mut i = start;
    let peek = |i: usize| chars.get(i).map(|(_, c)| *c);

    let digits = |i: &mut usize, text: &mut String| -> Result<(), FormulaError> {
        let mut last_underscore = false;
        let mut any = false;
        while let Some(c) = peek(*i) {
            if c.is_ascii_digit() {
                text.push(c);
                last_underscore = false;
                any = true;
            } else if c == '_' && any && !last_underscore {
                last_underscore = true;
            } else {
                break;
            }
            *i += 1;
        }
        if last_underscore {
            return Err(FormulaError::syntax(
                chars[*i - 1].0,
                "invalid '_' in number",
            ));
        }
        Ok(())
    };

    digits(&mut i, &mut text)?;
    if peek(i) == Some('.') {
        text.push('.');
        i += 1;
        digits(&mut i, &mut text)?;
    }
    if matches!(peek(i), Some('e' | 'E')) {
        let sign = peek(i + 1);
        let digit_at = if matches!(sign, Some('+' | '-')) { i + 2 } else { i + 1 };
        if peek(digit_at).is_some_and(|c| c.is_ascii_digit()) {
            text.push('e');
            if let Some(s @ ('+' | '-')) = sign {
                text.push(s);
            }
            i = digit_at;
            digits(&mut i, &mut text)?;
        } else {
            return Err(FormulaError::syntax(chars[i].0, "malformed exponent"));
        }
    }

    if let Some(c) = peek(i) {
        if c.is_alphanumeric() || c == '_' || c == '.' {
            return Err(FormulaError::syntax(
                chars[i].0,
                format!("invalid number literal '{}'", &source[start_pos..=chars[i].0]),
            ));
        }
    }

    let value = text
        .parse::<f64>()
        .map_err(|_| FormulaError::syntax(start_pos, "invalid number literal"))?;
    Ok((value, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_tokenize_operators_and_references() {
        assert_eq!(
            kinds("{a} ** 2 // {b c}"),
            vec![
                Token::Reference("a".into()),
                Token::DoubleStar,
                Token::Number(2.0),
                Token::DoubleSlash,
                Token::Reference("b c".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(kinds("1_000")[0], Token::Number(1000.0));
        assert_eq!(kinds(".5")[0], Token::Number(0.5));
        assert_eq!(kinds("2.")[0], Token::Number(2.0));
        assert_eq!(kinds("1.5e-3")[0], Token::Number(1.5e-3));
        assert!(tokenize("1__0").is_err());
        assert!(tokenize("1_").is_err());
        assert!(tokenize("2x").is_err());
        assert!(tokenize("1e").is_err());
    }

    #[test]
    fn test_positions_are_byte_offsets() {
        let tokens = tokenize("  {a} + 1").unwrap();
        assert_eq!(tokens[0].position, 2);
        assert_eq!(tokens[1].position, 6);
        assert_eq!(tokens[2].position, 8);
    }

    #[test]
    fn test_rejects_disallowed_characters() {
        for source in ["{a} < 1", "1 & 2", "'x'", "{a}[0]", "x.y", "a; b", "a == b", "not 1"] {
            assert!(
                matches!(tokenize(source), Err(FormulaError::UnsupportedOperation(_))),
                "{}",
                source
            );
        }
        assert!(matches!(tokenize("{a"), Err(FormulaError::Syntax { .. })));
        assert!(matches!(tokenize("#"), Err(FormulaError::Syntax { position: 0, .. })));
    }
}
