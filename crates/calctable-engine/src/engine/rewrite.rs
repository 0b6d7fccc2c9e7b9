use regex::{NoExpand, Regex};

/// Replace every `{old}` reference in a formula with `{new}`.
/// Text outside braces is left untouched, so `{old_u}` and `old` survive.
pub fn rename_reference(formula: &str, old: &str, new: &str) -> String {
    let pattern = format!(r"\{{{}\}}", regex::escape(old));
    let Ok(re) = Regex::new(&pattern) else {
        return formula.to_string();
    };
    let replacement = format!("{{{}}}", new);
    re.replace_all(formula, NoExpand(&replacement)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_only_touches_exact_references() {
        assert_eq!(
            rename_reference("{v} * {v_u} + v + {v}", "v", "speed"),
            "{speed} * {v_u} + v + {speed}"
        );
    }

    #[test]
    fn test_rename_escapes_names() {
        assert_eq!(rename_reference("{a.b} + {a+b}", "a.b", "c"), "{c} + {a+b}");
        assert_eq!(rename_reference("{x}", "x", "$1 cost"), "{$1 cost}");
    }

    #[test]
    fn test_rename_round_trip() {
        let original = "sqrt({x}**2 + {y}**2) / {x}";
        let there = rename_reference(original, "x", "horizontal");
        let back = rename_reference(&there, "horizontal", "x");
        assert_eq!(back, original);
    }
}
