//! Content fragment parsing.
//!
//! Record messages hold a loosely delimited pseudo-array of JSON-ish blobs,
//! e.g. `{"a":1},{"b":2}`. Splitting on the `"},"` boundary consumes the
//! closing brace of every fragment except the last, so it is restored after
//! the split.

/// Fragment boundary within a record message.
const FRAGMENT_BOUNDARY: &str = "},";

/// Splits a record message into discrete content fragments.
///
/// Pure function of its input: an empty message yields an empty list, and the
/// same message always yields the same fragments.
pub fn split_fragments(message: &str) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }

    let mut fragments: Vec<String> = message.split(FRAGMENT_BOUNDARY).map(str::to_string).collect();
    let last = fragments.len() - 1;
    for fragment in fragments.iter_mut().take(last) {
        fragment.push('}');
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_two_fragments() {
        let fragments = split_fragments(r#"{"a":1},{"b":2}"#);
        assert_eq!(fragments, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn test_split_single_fragment_unchanged() {
        let fragments = split_fragments(r#"{"a":1}"#);
        assert_eq!(fragments, vec![r#"{"a":1}"#]);
    }

    #[test]
    fn test_split_three_fragments() {
        let fragments = split_fragments(r#"{"a":1},{"b":2},{"c":3}"#);
        assert_eq!(fragments, vec![r#"{"a":1}"#, r#"{"b":2}"#, r#"{"c":3}"#]);
    }

    #[test]
    fn test_split_empty_message() {
        assert!(split_fragments("").is_empty());
    }

    #[test]
    fn test_split_is_pure() {
        let message = r#"{"temp":21},{"temp":22}"#;
        assert_eq!(split_fragments(message), split_fragments(message));
    }

    #[test]
    fn test_split_nested_objects_keep_outer_close() {
        // The last fragment keeps its own trailing brace untouched.
        let fragments = split_fragments(r#"{"a":{"x":1}},{"b":2}"#);
        assert_eq!(fragments, vec![r#"{"a":{"x":1}}"#, r#"{"b":2}"#]);
    }
}
