//! URL-safe identifiers.

use deunicode::deunicode;

/// Transliterate to ASCII, lowercase, and join alphanumeric runs with `-`.
///
/// `"My First Post!"` → `"my-first-post"`, `"Crème brûlée"` → `"creme-brulee"`.
pub fn slugify(input: &str) -> String {
    let ascii = deunicode(input);
    let mut out = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Bump a slug's numeric suffix: `post` → `post-2`, counted from `n`.
pub fn with_suffix(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{base}-{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("My First Post!"), "my-first-post");
        assert_eq!(slugify("  leading and trailing  "), "leading-and-trailing");
        assert_eq!(slugify("a---b__c"), "a-b-c");
        assert_eq!(slugify("Crème brûlée"), "creme-brulee");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
    }

    #[test]
    fn suffixes() {
        assert_eq!(with_suffix("post", 1), "post");
        assert_eq!(with_suffix("post", 2), "post-2");
        assert_eq!(with_suffix("post", 10), "post-10");
    }
}
