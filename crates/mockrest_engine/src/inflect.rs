//! Minimal English inflection for resource names.
//!
//! Nested routes and foreign keys are derived from collection names: `/posts/1/comments`
//! filters on `postId`, `_expand=post` looks in `posts`. Only the regular plural forms
//! that show up in resource names are handled.

/// Singular form of a (plural) resource name: `posts` -> `post`, `categories` -> `category`.
pub fn singular(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    for suffix in ["sses", "xes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Plural form of a (singular) resource name: `post` -> `posts`, `category` -> `categories`.
pub fn plural(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        let vowel_before = stem
            .chars()
            .last()
            .is_some_and(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'));
        if !stem.is_empty() && !vowel_before {
            return format!("{}ies", stem);
        }
    }
    if ["s", "x", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}
