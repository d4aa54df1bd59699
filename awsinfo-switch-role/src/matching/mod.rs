//! Glob-style wildcard matching for IAM actions and resource ARNs
//!
//! IAM supports two wildcard characters in `Action` and `Resource` entries:
//! `*` matches any run of characters (including none) and `?` matches exactly
//! one character. Action names are compared case-insensitively, resource
//! ARNs case-sensitively.

/// Returns true if `value` contains a wildcard character.
pub fn has_wildcard(value: &str) -> bool {
    value.contains(['*', '?'])
}

/// Match `value` against a `*`/`?` glob `pattern`.
///
/// Uses the single-backtrack-point algorithm: on mismatch we resume right
/// after the most recent `*`, consuming one more character of the value.
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();

    let (mut p, mut v) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while v < value.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, v));
                p += 1;
            }
            Some(&c) if c == '?' || c == value[v] => {
                p += 1;
                v += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    v = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Match an IAM action pattern (`sts:*`, `*`, `sts:AssumeRole`) against an action.
pub fn action_matches(pattern: &str, action: &str) -> bool {
    wildcard_match(&pattern.to_ascii_lowercase(), &action.to_ascii_lowercase())
}

/// Match a resource ARN pattern against a concrete ARN.
pub fn resource_matches(pattern: &str, arn: &str) -> bool {
    wildcard_match(pattern, arn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_literal_patterns() {
        assert!(wildcard_match("sts:AssumeRole", "sts:AssumeRole"));
        assert!(!wildcard_match("sts:AssumeRole", "sts:AssumeRoleWithSAML"));
        assert!(!wildcard_match("sts:AssumeRoleWithSAML", "sts:AssumeRole"));
        assert!(wildcard_match("", ""));
        assert!(!wildcard_match("", "a"));
    }

    #[test]
    fn test_star() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("sts:*", "sts:AssumeRole"));
        assert!(wildcard_match("sts:Assume*", "sts:AssumeRole"));
        assert!(!wildcard_match("iam:*", "sts:AssumeRole"));
        assert!(wildcard_match(
            "arn:aws:iam::*:role/Admin*",
            "arn:aws:iam::123456789012:role/AdminSwitchRole"
        ));
        assert!(!wildcard_match(
            "arn:aws:iam::*:role/Admin*",
            "arn:aws:iam::123456789012:role/ReadOnly"
        ));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(wildcard_match("a*b*c", "abbbc"));
        assert!(!wildcard_match("a*b*c", "aXXbYY"));
    }

    #[test]
    fn test_question_mark() {
        assert!(wildcard_match("role/Dev?", "role/Dev1"));
        assert!(!wildcard_match("role/Dev?", "role/Dev"));
        assert!(!wildcard_match("role/Dev?", "role/Dev12"));
        assert!(wildcard_match("?*", "x"));
        assert!(!wildcard_match("?*", ""));
    }

    #[test]
    fn test_action_matching_ignores_case() {
        assert!(action_matches("STS:assumerole", "sts:AssumeRole"));
        assert!(action_matches("Sts:*", "sts:AssumeRole"));
        assert!(!resource_matches(
            "arn:aws:iam::123456789012:role/admin",
            "arn:aws:iam::123456789012:role/Admin"
        ));
    }

    #[test]
    fn test_has_wildcard() {
        assert!(has_wildcard("arn:aws:iam::*:role/x"));
        assert!(has_wildcard("role/Dev?"));
        assert!(!has_wildcard("arn:aws:iam::123456789012:role/x"));
    }

    proptest! {
        #[test]
        fn prop_literal_matches_itself(s in "[a-zA-Z0-9:/_-]{0,40}") {
            prop_assert!(wildcard_match(&s, &s));
        }

        #[test]
        fn prop_star_matches_everything(s in ".{0,40}") {
            prop_assert!(wildcard_match("*", &s));
        }

        #[test]
        fn prop_prefix_star(prefix in "[a-z:]{0,10}", rest in "[a-zA-Z]{0,10}") {
            let pattern = format!("{prefix}*");
            let value = format!("{prefix}{rest}");
            prop_assert!(wildcard_match(&pattern, &value));
        }
    }
}
