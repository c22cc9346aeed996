//! Row reference shifting for formulas copied onto an appended row

use regex::{Captures, Regex};

/// Rewrite relative references to `old_row` so they point at `new_row`.
///
/// `A5` and `$A5` move, `A$5` stays, and function names that happen to end in
/// the row number (`LOG10(`) are left alone.
pub fn adjust_formula_references(formula: &str, old_row: u32, new_row: u32) -> String {
    let pattern = format!(r"\b([A-Z]{{1,3}}){old_row}\b");
    let Ok(re) = Regex::new(&pattern) else {
        return formula.to_string();
    };

    re.replace_all(formula, |caps: &Captures| {
        let end = caps.get(0).map_or(formula.len(), |m| m.end());
        if formula[end..].starts_with('(') {
            caps[0].to_string()
        } else {
            format!("{}{}", &caps[1], new_row)
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_shifts_relative_references() {
        assert_eq!(adjust_formula_references("=A5*B5", 5, 6), "=A6*B6");
        assert_eq!(adjust_formula_references("=SUM(C5:AB5)", 5, 6), "=SUM(C6:AB6)");
        assert_eq!(adjust_formula_references("=$A5+1", 5, 6), "=$A6+1");
    }

    #[test]
    fn test_keeps_absolute_rows_and_other_rows() {
        assert_eq!(adjust_formula_references("=A$5+A4", 5, 6), "=A$5+A4");
        assert_eq!(adjust_formula_references("=A15+A50", 5, 6), "=A15+A50");
    }

    #[test]
    fn test_keeps_function_names() {
        assert_eq!(adjust_formula_references("=LOG10(A10)", 10, 11), "=LOG10(A11)");
    }

    proptest! {
        #[test]
        fn prop_other_rows_untouched(col in "[A-Z]{1,2}", row in 10u32..1000, old in 1u32..10) {
            let formula = format!("={col}{row}*2");
            prop_assert_eq!(adjust_formula_references(&formula, old, old + 1), formula);
        }

        #[test]
        fn prop_old_row_moves(col in "[A-Z]{1,3}", old in 1u32..100_000) {
            let formula = format!("=MAX({col}{old},{col}{old})");
            let new = old + 1;
            prop_assert_eq!(
                adjust_formula_references(&formula, old, new),
                format!("=MAX({col}{new},{col}{new})")
            );
        }
    }
}
