//! Unit string parsing.
//!
//! Accepts the canonical form produced by [`Unit::format`] and the display
//! form produced by [`Unit::format_pretty`], plus the usual hand-typed
//! variants:
//!
//! - products with `*`, `·`, `×` or whitespace: `kg*m`, `kg m`
//! - quotients with `/`: `m/s`, `J/(kg*K)`, `1/s`
//! - exponents with `^` or `**`, signed and optionally rational: `s^-2`, `m^(1/2)`
//! - Unicode superscript exponents: `m²`, `s⁻¹`

use super::{Exponent, MAX_EXPONENT_PART, Unit, UnitError, rational_approximation};

const MAX_NESTING: usize = 32;

/// Parse a unit string into a [`Unit`].
pub(crate) fn parse_unit(text: &str) -> Result<Unit, UnitError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "1" || trimmed.eq_ignore_ascii_case("dimensionless") {
        return Ok(Unit::dimensionless());
    }

    let mut parser = UnitParser {
        source: trimmed,
        chars: trimmed.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let unit = parser.product()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error());
    }
    Ok(unit)
}

struct UnitParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl UnitParser<'_> {
    fn error(&self) -> UnitError {
        UnitError::InvalidUnit(self.source.to_string())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn product(&mut self) -> Result<Unit, UnitError> {
        self.skip_ws();
        let mut unit = self.factor()?;
        loop {
            let had_space = self.skip_ws();
            match self.peek() {
                Some('*') if self.chars.get(self.pos + 1) != Some(&'*') => {
                    self.pos += 1;
                    self.skip_ws();
                    unit = unit.mul(&self.factor()?)?;
                }
                Some('·' | '×' | '⋅') => {
                    self.pos += 1;
                    self.skip_ws();
                    unit = unit.mul(&self.factor()?)?;
                }
                Some('/') => {
                    self.pos += 1;
                    self.skip_ws();
                    unit = unit.div(&self.factor()?)?;
                }
                Some(c) if had_space && starts_atom(c) => {
                    unit = unit.mul(&self.factor()?)?;
                }
                _ => return Ok(unit),
            }
        }
    }

    fn factor(&mut self) -> Result<Unit, UnitError> {
        let base = self.atom()?;
        match self.exponent()? {
            Some(exp) => base.pow(exp),
            None => Ok(base),
        }
    }

    fn atom(&mut self) -> Result<Unit, UnitError> {
        match self.peek() {
            Some('(') => {
                self.depth += 1;
                if self.depth > MAX_NESTING {
                    return Err(self.error());
                }
                self.pos += 1;
                let inner = self.product()?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err(self.error());
                }
                self.pos += 1;
                self.depth -= 1;
                Ok(inner)
            }
            Some('1') => {
                self.pos += 1;
                if self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
                    return Err(self.error());
                }
                Ok(Unit::dimensionless())
            }
            Some(c) if is_symbol_char(c) => {
                let start = self.pos;
                while self.peek().is_some_and(is_symbol_char) {
                    self.pos += 1;
                }
                let symbol: String = self.chars[start..self.pos].iter().collect();
                if symbol.eq_ignore_ascii_case("dimensionless") {
                    return Ok(Unit::dimensionless());
                }
                Unit::from_symbol(&symbol).ok_or_else(|| UnitError::InvalidUnit(symbol))
            }
            _ => Err(self.error()),
        }
    }

    fn exponent(&mut self) -> Result<Option<Exponent>, UnitError> {
        match self.peek() {
            Some('^') => {
                self.pos += 1;
                self.exponent_value().map(Some)
            }
            Some('*') if self.chars.get(self.pos + 1) == Some(&'*') => {
                self.pos += 2;
                self.exponent_value().map(Some)
            }
            Some(c) if superscript_value(c).is_some() || is_superscript_sign(c) => {
                self.superscript().map(Some)
            }
            _ => Ok(None),
        }
    }

    /// `2`, `-1`, `+3`, `0.5`, `(1/2)`, `(-3/2)`
    fn exponent_value(&mut self) -> Result<Exponent, UnitError> {
        self.skip_ws();
        if self.peek() == Some('(') {
            self.pos += 1;
            let numer = self.signed_integer()?;
            self.skip_ws();
            let denom = if self.peek() == Some('/') {
                self.pos += 1;
                self.signed_integer()?
            } else {
                1
            };
            self.skip_ws();
            if self.peek() != Some(')') || denom == 0 {
                return Err(self.error());
            }
            self.pos += 1;
            return Ok(Exponent::new(numer, denom));
        }

        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(int) = text.parse::<i32>() {
            return Ok(Exponent::from_integer(int));
        }
        let float: f64 = text.parse().map_err(|_| self.error())?;
        rational_approximation(float, 100).ok_or_else(|| self.error())
    }

    fn signed_integer(&mut self) -> Result<i32, UnitError> {
        self.skip_ws();
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let value: i32 = text.parse().map_err(|_| self.error())?;
        if value.unsigned_abs() > MAX_EXPONENT_PART {
            return Err(UnitError::ExponentOverflow);
        }
        Ok(value)
    }

    fn superscript(&mut self) -> Result<Exponent, UnitError> {
        let mut negative = false;
        match self.peek() {
            Some('⁻') => {
                negative = true;
                self.pos += 1;
            }
            Some('⁺') => self.pos += 1,
            _ => {}
        }
        let mut value: i32 = 0;
        let mut digits = 0;
        while let Some(d) = self.peek().and_then(superscript_value) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(d))
                .ok_or_else(|| self.error())?;
            digits += 1;
            self.pos += 1;
        }
        if digits == 0 {
            return Err(self.error());
        }
        Ok(Exponent::from_integer(if negative { -value } else { value }))
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphabetic() || c == '°' || c == '_'
}

fn starts_atom(c: char) -> bool {
    c == '(' || c == '1' || is_symbol_char(c)
}

fn superscript_value(c: char) -> Option<i32> {
    match c {
        '⁰' => Some(0),
        '¹' => Some(1),
        '²' => Some(2),
        '³' => Some(3),
        '⁴' => Some(4),
        '⁵' => Some(5),
        '⁶' => Some(6),
        '⁷' => Some(7),
        '⁸' => Some(8),
        '⁹' => Some(9),
        _ => None,
    }
}

fn is_superscript_sign(c: char) -> bool {
    c == '⁻' || c == '⁺'
}
