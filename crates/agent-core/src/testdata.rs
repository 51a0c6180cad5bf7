//! Canonical input values for exploratory testing.

/// Pick a test value for an input from its label signals (placeholder,
/// aria-label, name, type), most specific match first.
pub fn canonical_value_for(label: &str) -> &'static str {
    let label = label.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| label.contains(n));

    if has(&["email", "e-mail"]) {
        "test.explorer@example.com"
    } else if has(&["password", "passwd"]) {
        "TestPass123!"
    } else if has(&["phone", "tel"]) {
        "555-0100"
    } else if has(&["url", "website", "link"]) {
        "https://example.com"
    } else if has(&["search", "query", "find"]) {
        "test"
    } else if has(&["date", "birthday"]) {
        "2024-01-01"
    } else if has(&["number", "amount", "count", "qty", "quantity"]) {
        "42"
    } else if has(&["name", "user"]) {
        "Test Explorer"
    } else {
        "test input"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_to_canonical_values() {
        assert_eq!(canonical_value_for("Email address"), "test.explorer@example.com");
        assert_eq!(canonical_value_for("Your PASSWORD"), "TestPass123!");
        assert_eq!(canonical_value_for("Search the docs"), "test");
        assert_eq!(canonical_value_for("Telephone"), "555-0100");
        assert_eq!(canonical_value_for("Quantity"), "42");
        assert_eq!(canonical_value_for("Full name"), "Test Explorer");
        assert_eq!(canonical_value_for("mystery field"), "test input");
    }

    #[test]
    fn email_beats_name_when_both_match() {
        assert_eq!(canonical_value_for("username or email"), "test.explorer@example.com");
    }
}
