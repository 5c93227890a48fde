use regex::Regex;
use std::sync::LazyLock;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-/.\\_]").expect("Hardcode regex pattern"));
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9 ]").expect("Hardcode regex pattern"));

/// Turns a raw label into a snake_case token made of `[a-z0-9_]`.
///
/// "E-mail / Address." becomes "e_mail_address"; empty input gives an empty token.
/// Underscores count as separators so that tokens normalize to themselves.
pub fn normalize_label(label: &str) -> String {
    let lower = label.to_lowercase();
    let spaced = SEPARATORS.replace_all(&lower, " ");
    let cleaned = DISALLOWED.replace_all(&spaced, "");
    cleaned.split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Employee ID"), "employee_id");
        assert_eq!(normalize_label("  First   Name "), "first_name");
        assert_eq!(normalize_label("E-mail / Address."), "e_mail_address");
        assert_eq!(normalize_label("Dept\\Team"), "dept_team");
        assert_eq!(normalize_label("Phone #(Mobile)"), "phone_mobile");
        assert_eq!(normalize_label("Hire_Date"), "hire_date");
        assert_eq!(normalize_label("Café Owner"), "caf_owner");
        assert_eq!(normalize_label(""), "");
        assert_eq!(normalize_label("***"), "");
    }

    #[test]
    fn test_underscore_is_a_separator() {
        assert_eq!(normalize_label("employee_id"), "employee_id");
        assert_eq!(normalize_label("employee__id"), "employee_id");
        assert_eq!(normalize_label("_employee_id_"), "employee_id");
        assert_eq!(normalize_label("employee_id"), normalize_label("Employee ID"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for label in ["Employee ID", "E-mail / Address.", "  a.b-c/d\\e  ", "Hire_Date", "ÄÖÜ 12", "x__y", "tab\tsep"] {
            let once = normalize_label(label);
            assert_eq!(normalize_label(&once), once, "label {label:?}");
        }
    }
}
