//! Known unit symbols and SI prefixes.
//!
//! Symbols resolve exactly first (so `min`, `cd`, `Pa` and `T` keep their own
//! meaning), then as `prefix + symbol` for prefixable units (`km`, `ms`, `hPa`).

use super::Dimension;

struct UnitDef {
    symbol: &'static str,
    /// Exponents over [length, mass, time, current, temperature, amount, luminosity].
    dims: [i32; 7],
    scale: f64,
    prefixable: bool,
}

const fn def(symbol: &'static str, dims: [i32; 7], scale: f64, prefixable: bool) -> UnitDef {
    UnitDef {
        symbol,
        dims,
        scale,
        prefixable,
    }
}

const UNITS: &[UnitDef] = &[
    // SI base units (mass is defined through the gram so that `kg` is k + g).
    def("m", [1, 0, 0, 0, 0, 0, 0], 1.0, true),
    def("g", [0, 1, 0, 0, 0, 0, 0], 1e-3, true),
    def("s", [0, 0, 1, 0, 0, 0, 0], 1.0, true),
    def("A", [0, 0, 0, 1, 0, 0, 0], 1.0, true),
    def("K", [0, 0, 0, 0, 1, 0, 0], 1.0, true),
    def("mol", [0, 0, 0, 0, 0, 1, 0], 1.0, true),
    def("cd", [0, 0, 0, 0, 0, 0, 1], 1.0, true),
    // Derived SI units
    def("Hz", [0, 0, -1, 0, 0, 0, 0], 1.0, true),
    def("N", [1, 1, -2, 0, 0, 0, 0], 1.0, true),
    def("Pa", [-1, 1, -2, 0, 0, 0, 0], 1.0, true),
    def("J", [2, 1, -2, 0, 0, 0, 0], 1.0, true),
    def("W", [2, 1, -3, 0, 0, 0, 0], 1.0, true),
    def("C", [0, 0, 1, 1, 0, 0, 0], 1.0, true),
    def("V", [2, 1, -3, -1, 0, 0, 0], 1.0, true),
    def("ohm", [2, 1, -3, -2, 0, 0, 0], 1.0, true),
    def("Ω", [2, 1, -3, -2, 0, 0, 0], 1.0, true),
    def("F", [-2, -1, 4, 2, 0, 0, 0], 1.0, true),
    def("T", [0, 1, -2, -1, 0, 0, 0], 1.0, true),
    def("Wb", [2, 1, -2, -1, 0, 0, 0], 1.0, true),
    def("H", [2, 1, -2, -2, 0, 0, 0], 1.0, true),
    def("L", [3, 0, 0, 0, 0, 0, 0], 1e-3, true),
    def("eV", [2, 1, -2, 0, 0, 0, 0], 1.602_176_634e-19, true),
    def("bar", [-1, 1, -2, 0, 0, 0, 0], 1e5, true),
    // Non-SI units accepted for use with SI
    def("min", [0, 0, 1, 0, 0, 0, 0], 60.0, false),
    def("h", [0, 0, 1, 0, 0, 0, 0], 3600.0, false),
    def("day", [0, 0, 1, 0, 0, 0, 0], 86400.0, false),
    def("atm", [-1, 1, -2, 0, 0, 0, 0], 101_325.0, false),
    // Angles are dimensionless; degrees carry their radian scale.
    def("rad", [0; 7], 1.0, true),
    def("sr", [0; 7], 1.0, false),
    def("deg", [0; 7], std::f64::consts::PI / 180.0, false),
    def("°", [0; 7], std::f64::consts::PI / 180.0, false),
];

/// Longer prefixes come first so `da` wins over `d`.
const PREFIXES: &[(&str, f64)] = &[
    ("da", 1e1),
    ("Y", 1e24),
    ("Z", 1e21),
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("µ", 1e-6),
    ("μ", 1e-6),
    ("u", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
    ("a", 1e-18),
    ("z", 1e-21),
    ("y", 1e-24),
];

/// Resolve a single unit symbol to its dimension and SI scale factor.
pub(crate) fn lookup(symbol: &str) -> Option<(Dimension, f64)> {
    if let Some(unit) = UNITS.iter().find(|u| u.symbol == symbol) {
        return Some((Dimension::from_ints(unit.dims), unit.scale));
    }

    for (prefix, factor) in PREFIXES {
        let Some(rest) = symbol.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        if let Some(unit) = UNITS.iter().find(|u| u.prefixable && u.symbol == rest) {
            return Some((Dimension::from_ints(unit.dims), unit.scale * factor));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_symbols_win_over_prefixes() {
        let (dim, scale) = lookup("min").unwrap();
        assert_eq!(dim, Dimension::from_ints([0, 0, 1, 0, 0, 0, 0]));
        assert_eq!(scale, 60.0);

        let (dim, _) = lookup("cd").unwrap();
        assert_eq!(dim, Dimension::from_ints([0, 0, 0, 0, 0, 0, 1]));
    }

    #[test]
    fn test_prefixed_symbols() {
        let (_, scale) = lookup("km").unwrap();
        assert_eq!(scale, 1e3);

        let (dim, scale) = lookup("kg").unwrap();
        assert_eq!(dim, Dimension::from_ints([0, 1, 0, 0, 0, 0, 0]));
        assert!((scale - 1.0).abs() < 1e-12);

        let (_, scale) = lookup("hPa").unwrap();
        assert!((scale - 100.0).abs() < 1e-9);

        assert!(lookup("dam").is_some());
        assert!(lookup("µs").is_some());
    }

    #[test]
    fn test_unknown_symbols() {
        assert!(lookup("furlong").is_none());
        assert!(lookup("kmin").is_none());
        assert!(lookup("k").is_none());
    }
}
