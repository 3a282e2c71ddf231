//! Label canonicalization: decoration stripping plus an ordered rule table.
//!
//! Pure and deterministic. Unmapped labels become their own cleaned-verbatim
//! identity rather than being dropped.

use crate::config::RuleBook;

/// Strip bracketed annotations and count-unit tokens, collapse whitespace.
pub fn clean(rules: &RuleBook, raw: &str) -> String {
    let pattern = rules.canonical.strip_pattern();

    // Removing a bracketed span can juxtapose a count and a unit token into
    // a new strippable token, so run the strip to a fixed point.
    let mut stripped = raw.to_string();
    loop {
        let next = pattern.replace_all(&stripped, "").into_owned();
        if next == stripped {
            break;
        }
        stripped = next;
    }
    let mut cleaned = String::with_capacity(stripped.len());
    let mut last_was_space = true;
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                cleaned.push(' ');
            }
            last_was_space = true;
        } else {
            cleaned.push(c);
            last_was_space = false;
        }
    }
    cleaned
        .trim_matches(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .to_string()
}

/// Map a raw free-text label to its canonical product identity.
///
/// Rules are evaluated top to bottom; the first satisfied rule wins. No
/// match returns the cleaned name verbatim. Empty input yields the empty
/// identity; the caller decides whether to skip such rows.
pub fn canonicalize(rules: &RuleBook, raw: &str) -> String {
    let cleaned = clean(rules, raw);
    if cleaned.is_empty() {
        return cleaned;
    }
    for rule in &rules.canonical.rules {
        if rule.matches(&cleaned) {
            return rule.name.clone();
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleBook;

    fn book() -> RuleBook {
        RuleBook::from_toml(
            r#"
name = "Canonical Test"

[[canonical.rules]]
all_of = ["strawberry", "fresh-milk"]
name = "strawberry cold-brew fresh-milk"

[[canonical.rules]]
all_of = ["ice-cream"]
any_of = ["yogurt", "sour"]
name = "yogurt ice-cream"

[[canonical.rules]]
all_of = ["double-skin"]
none_of = ["original", "pistachio"]
name = "fruit double-skin milk"

[[canonical.rules]]
all_of = ["fresh-milk"]
name = "fresh-milk"
"#,
        )
        .unwrap()
    }

    #[test]
    fn strips_brackets_and_count_units() {
        let b = book();
        assert_eq!(
            clean(&b, "[limited] strawberry cold-brew fresh-milk (cup)"),
            "strawberry cold-brew fresh-milk"
        );
        assert_eq!(clean(&b, "【new】pudding 10-piece"), "pudding");
        assert_eq!(clean(&b, "pudding（gift）"), "pudding");
    }

    #[test]
    fn first_matching_rule_wins() {
        let b = book();
        assert_eq!(
            canonicalize(&b, "[limited] strawberry cold-brew fresh-milk (cup)"),
            "strawberry cold-brew fresh-milk"
        );
        // Bare fresh-milk only reaches the later rule.
        assert_eq!(canonicalize(&b, "fresh-milk, 3-pack"), "fresh-milk");
    }

    #[test]
    fn any_of_and_none_of() {
        let b = book();
        assert_eq!(canonicalize(&b, "sour ice-cream cone"), "yogurt ice-cream");
        assert_eq!(
            canonicalize(&b, "mango double-skin milk"),
            "fruit double-skin milk"
        );
        // none_of veto falls through to verbatim.
        assert_eq!(
            canonicalize(&b, "original double-skin milk"),
            "original double-skin milk"
        );
    }

    #[test]
    fn unmapped_label_is_its_own_identity() {
        let b = book();
        assert_eq!(canonicalize(&b, "  sesame  paste "), "sesame paste");
    }

    #[test]
    fn empty_input_is_empty_identity() {
        let b = book();
        assert_eq!(canonicalize(&b, ""), "");
        assert_eq!(canonicalize(&b, "  (gift)  "), "");
    }

    #[test]
    fn strip_runs_to_a_fixed_point() {
        let b = book();
        // Dropping the bracketed span joins "3" and "packs" into a count-unit
        // token that only a second strip pass can see.
        let once = canonicalize(&b, "3 [limited] packs of sesame paste");
        assert_eq!(once, "of sesame paste");
        assert_eq!(canonicalize(&b, &once), once);
    }

    #[test]
    fn idempotent_on_arbitrary_labels() {
        let b = RuleBook::standard();
        for raw in [
            "3 [limited] packs of sesame paste",
            "【new】2 pieces pudding",
            "fresh-milk 3-pack (promo)",
            "  sesame,  paste ;",
            "5 (gift) servings yogurt-bowl with strawberry",
        ] {
            let once = canonicalize(&b, raw);
            assert_eq!(canonicalize(&b, &once), once, "input: {raw}");
        }
    }

    #[test]
    fn idempotent_over_table() {
        let b = book();
        for rule in &b.canonical.rules {
            assert_eq!(
                canonicalize(&b, &rule.name),
                rule.name,
                "rule target '{}' must map to itself",
                rule.name
            );
        }
    }

    #[test]
    fn idempotent_over_standard_table() {
        let b = RuleBook::standard();
        for rule in &b.canonical.rules {
            assert_eq!(canonicalize(&b, &rule.name), rule.name);
        }
    }
}
