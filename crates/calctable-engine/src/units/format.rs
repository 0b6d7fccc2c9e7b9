use num_traits::{One, Signed};

use super::{Exponent, Unit};

pub(crate) fn format_canonical(unit: &Unit) -> String {
    if unit.terms.is_empty() {
        return "dimensionless".to_string();
    }

    let numerator: Vec<String> = unit
        .terms
        .iter()
        .filter(|(_, exp)| exp.is_positive())
        .map(|(symbol, exp)| term(symbol, *exp))
        .collect();
    let denominator: Vec<String> = unit
        .terms
        .iter()
        .filter(|(_, exp)| exp.is_negative())
        .map(|(symbol, exp)| term(symbol, -*exp))
        .collect();

    let mut out = if numerator.is_empty() {
        "1".to_string()
    } else {
        numerator.join("*")
    };
    match denominator.len() {
        0 => {}
        1 => {
            out.push('/');
            out.push_str(&denominator[0]);
        }
        _ => {
            out.push_str("/(");
            out.push_str(&denominator.join("*"));
            out.push(')');
        }
    }
    out
}

pub(crate) fn format_pretty(unit: &Unit) -> String {
    unit.terms
        .iter()
        .map(|(symbol, exp)| {
            if exp.is_one() {
                symbol.clone()
            } else if exp.is_integer() {
                format!("{}{}", symbol, superscript(*exp.numer()))
            } else {
                format!("{}^({}/{})", symbol, exp.numer(), exp.denom())
            }
        })
        .collect::<Vec<_>>()
        .join("·")
}

fn term(symbol: &str, exp: Exponent) -> String {
    if exp.is_one() {
        symbol.to_string()
    } else if exp.is_integer() {
        format!("{}^{}", symbol, exp.numer())
    } else {
        format!("{}^({}/{})", symbol, exp.numer(), exp.denom())
    }
}

fn superscript(n: i32) -> String {
    n.to_string()
        .chars()
        .map(|c| match c {
            '-' => '⁻',
            '0' => '⁰',
            '1' => '¹',
            '2' => '²',
            '3' => '³',
            '4' => '⁴',
            '5' => '⁵',
            '6' => '⁶',
            '7' => '⁷',
            '8' => '⁸',
            '9' => '⁹',
            other => other,
        })
        .collect()
}
