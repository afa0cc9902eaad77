//! URL slugs for menu items, categories and blog posts.

const MAX_SLUG_LEN: usize = 80;
const FALLBACK: &str = "item";

/// Turn free text into a lowercase, dash-separated slug.
///
/// Common Latin accents are folded to ASCII, every run of other characters
/// becomes a single `-`, and leading/trailing dashes are dropped. Empty
/// results fall back to `"item"`.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars().flat_map(char::to_lowercase) {
        let keep = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        let folded = if keep { None } else { fold_accent(ch) };
        if !keep && folded.is_none() {
            pending_dash = !out.is_empty();
            continue;
        }
        if pending_dash {
            out.push('-');
            pending_dash = false;
        }
        match folded {
            Some(s) => out.push_str(s),
            None => out.push(ch),
        }
    }

    if out.len() > MAX_SLUG_LEN {
        out.truncate(MAX_SLUG_LEN);
        while out.ends_with('-') {
            out.pop();
        }
    }

    if out.is_empty() {
        FALLBACK.to_string()
    } else {
        out
    }
}

/// Pick the first free slug: `base`, then `base-2`, `base-3`, ...
pub fn unique_slug(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    (2u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn fold_accent(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'œ' => "oe",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'ß' => "ss",
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn slugify_basic_phrases() {
        assert_eq!(slugify("Margherita Pizza"), "margherita-pizza");
        assert_eq!(slugify("  Fish & Chips!! "), "fish-chips");
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
        assert_eq!(slugify("Spicy   --  Wings (12 pcs)"), "spicy-wings-12-pcs");
    }

    #[test]
    fn slugify_falls_back_when_nothing_survives() {
        assert_eq!(slugify("!!!"), "item");
        assert_eq!(slugify(""), "item");
    }

    #[test]
    fn slugify_caps_length_without_trailing_dash() {
        let long = "word ".repeat(40);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn unique_slug_appends_first_free_suffix() {
        let taken: HashSet<&str> = ["pasta", "pasta-2", "pasta-3"].into_iter().collect();
        assert_eq!(unique_slug("pasta", |s| taken.contains(s)), "pasta-4");
        assert_eq!(unique_slug("soup", |s| taken.contains(s)), "soup");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Slugs only ever contain [a-z0-9-] and never start/end with a dash.
            #[test]
            fn slug_charset_is_url_safe(input in ".{0,120}") {
                let slug = slugify(&input);
                prop_assert!(!slug.is_empty());
                prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
                prop_assert!(!slug.starts_with('-'));
                prop_assert!(!slug.ends_with('-'));
                prop_assert!(!slug.contains("--"));
            }

            /// Slugifying a slug is a no-op.
            #[test]
            fn slugify_is_idempotent(input in "[A-Za-z0-9 éü&-]{0,60}") {
                let once = slugify(&input);
                prop_assert_eq!(slugify(&once), once.clone());
            }
        }
    }
}
