//! Searchable-text normalization.

use docscope_core::types::FxHashSet;

/// Split an identifier at case and letter/digit boundaries.
/// `HTTPServerId2` becomes `["HTTP", "Server", "Id", "2"]`.
pub fn split_camel(word: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    let mut parts = Vec::new();
    let mut start = 0;
    for i in 1..chars.len() {
        let (at, c) = chars[i];
        let prev = chars[i - 1].1;
        let next_lower = chars.get(i + 1).is_some_and(|(_, n)| n.is_lowercase());
        let boundary = (prev.is_lowercase() && c.is_uppercase())
            || (prev.is_uppercase() && c.is_uppercase() && next_lower)
            || (prev.is_alphabetic() && c.is_ascii_digit())
            || (prev.is_ascii_digit() && c.is_alphabetic());
        if boundary {
            parts.push(&word[start..at]);
            start = at;
        }
    }
    if start < word.len() {
        parts.push(&word[start..]);
    }
    parts
}

/// Lowercased, punctuation-free, deduplicated tokens of every fragment.
/// Compound identifiers contribute the whole word and its camel-case parts.
pub fn normalize<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut out: Vec<String> = Vec::new();
    let mut push = |token: String| {
        if !token.is_empty() && seen.insert(token.clone()) {
            out.push(token);
        }
    };
    for fragment in fragments {
        for word in fragment.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            push(word.to_lowercase());
            let parts = split_camel(word);
            if parts.len() > 1 {
                for part in parts {
                    push(part.to_lowercase());
                }
            }
        }
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_camel_and_acronyms() {
        assert_eq!(split_camel("CustomerId"), vec!["Customer", "Id"]);
        assert_eq!(split_camel("HTTPServerId2"), vec!["HTTP", "Server", "Id", "2"]);
        assert_eq!(split_camel("orders"), vec!["orders"]);
        assert_eq!(split_camel(""), Vec::<&str>::new());
    }

    #[test]
    fn normalizes_and_dedups() {
        let text = normalize(["Shop.Domain.OrderLine", "order_lines", "Order"]);
        assert_eq!(text, "shop domain orderline order line lines");
    }
}
