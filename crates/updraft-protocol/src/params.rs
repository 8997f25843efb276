use std::collections::HashMap;

/// Split `value; key=val; key2="quoted"` into the leading value and its
/// parameters. Parameter names are lowercased; quoted values are unescaped.
pub fn parse_header_parameters(header: &str) -> (String, HashMap<String, String>) {
    let mut segments = split_unquoted(header, ';').into_iter();
    let value = segments.next().unwrap_or_default().trim().to_string();

    let params = segments
        .filter_map(|segment| {
            let (name, raw) = segment.split_once('=')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            Some((name, unquote(raw.trim())))
        })
        .collect();

    (value, params)
}

fn split_unquoted(input: &str, separator: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            c if c == separator && !in_quotes => out.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    out.push(current);
    out
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::plain("multipart/mixed; boundary=abc", "multipart/mixed", "boundary", "abc")]
    #[case::quoted(r#"multipart/mixed; boundary="a;b""#, "multipart/mixed", "boundary", "a;b")]
    #[case::disposition(r#"inline; name="manifest""#, "inline", "name", "manifest")]
    #[case::case_insensitive_name("form-data; NAME=directive", "form-data", "name", "directive")]
    #[case::escaped(r#"x; name="a\"b""#, "x", "name", "a\"b")]
    fn parses_value_and_parameter(
        #[case] header: &str,
        #[case] value: &str,
        #[case] key: &str,
        #[case] expected: &str,
    ) {
        let (parsed, params) = parse_header_parameters(header);
        assert_eq!(parsed, value);
        assert_eq!(params.get(key).map(String::as_str), Some(expected));
    }

    #[test]
    fn no_parameters() {
        let (value, params) = parse_header_parameters("application/json");
        assert_eq!(value, "application/json");
        assert!(params.is_empty());
    }
}
