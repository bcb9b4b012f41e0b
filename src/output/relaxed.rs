//! Permissive JSON decoding.
//!
//! Command output is often hand-written or produced by tools that emit
//! JSON-with-comments. Before handing text to `serde_json`, line and block
//! comments are removed and trailing commas before `]`/`}` are dropped.
//! String literals are left untouched.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse permissive JSON into a [`Value`].
pub fn parse(input: &str) -> serde_json::Result<Value> {
    serde_json::from_str(&normalize(input))
}

/// Parse permissive JSON into any deserializable type.
pub fn parse_as<T: DeserializeOwned>(input: &str) -> serde_json::Result<T> {
    serde_json::from_str(&normalize(input))
}

/// Strip comments and trailing commas outside string literals.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    // Position in `out` of a comma that may turn out to be trailing.
    let mut pending_comma: Option<usize> = None;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                out.push(' ');
            }
            ',' => {
                pending_comma = Some(out.len());
                out.push(c);
            }
            ']' | '}' => {
                if let Some(pos) = pending_comma.take() {
                    out.remove(pos);
                }
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            '"' => {
                pending_comma = None;
                in_string = true;
                out.push(c);
            }
            _ => {
                pending_comma = None;
                out.push(c);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(parse(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_line_and_block_comments() {
        let input = "{\n  // leading\n  \"a\": /* inline */ 1\n}";
        assert_eq!(parse(input).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_trailing_commas() {
        let input = "{\"list\": [1, 2, 3,\n], \"x\": {\"y\": true,},}";
        assert_eq!(
            parse(input).unwrap(),
            json!({"list": [1, 2, 3], "x": {"y": true}})
        );
    }

    #[test]
    fn test_strings_untouched() {
        let input = r#"{"url": "http://a/b", "s": "a,]", "q": "\"//\""}"#;
        let value = parse(input).unwrap();
        assert_eq!(value["url"], "http://a/b");
        assert_eq!(value["s"], "a,]");
        assert_eq!(value["q"], "\"//\"");
    }

    #[test]
    fn test_inner_commas_kept() {
        assert_eq!(parse("[1, 2]").unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_malformed_is_error() {
        assert!(parse("{\"a\": }").is_err());
        assert!(parse("").is_err());
    }
}
