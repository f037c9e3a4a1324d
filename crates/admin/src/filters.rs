//! Custom Askama template filters.
//!
//! Template modules bring these into scope with `use crate::filters;`.

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Up to two initials for the sidebar avatar, e.g. `Sari Dewi` -> `SD`.
///
/// Usage in templates: `{{ admin_user.name|initials }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn initials(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(initials_of(&value.to_string()))
}

fn initials_of(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() {
        "?".to_owned()
    } else {
        letters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials_take_first_two_words() {
        assert_eq!(initials_of("sari dewi lestari"), "SD");
        assert_eq!(initials_of("Budi"), "B");
        assert_eq!(initials_of("   "), "?");
    }
}
