use std::collections::HashMap;

/// Decodes the query-string flavor of URL encoding: `+` becomes a space
/// and `%XX` becomes the byte with that hex value. Decoding never fails; a
/// `%` with anything other than two hex digits behind it is passed through
/// literally.
pub fn url_decode(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '+' => {
                out.push(' ');
                i += 1;
            }
            '%' if i + 2 < chars.len() => {
                let hex: String = chars[i + 1..=i + 2].iter().collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(byte) => {
                        out.push(char::from(byte));
                        i += 3;
                    }
                    Err(_) => {
                        out.push('%');
                        i += 1;
                    }
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Pulls the request path out of a raw request. Only the first line is
/// looked at; the second whitespace-separated token is the path and the
/// method is ignored. Anything malformed degrades to `/`.
pub fn request_path(request: &str) -> &str {
    let line = request.split("\r\n").next().unwrap_or("");
    let mut tokens = line.split_whitespace();
    let _method = tokens.next();
    tokens.next().unwrap_or("/")
}

/// Parses `key=value` pairs from a `/?`-prefixed path into a map. Pairs
/// without `=` are skipped; duplicate keys resolve to the last occurrence
/// in source order.
pub fn query_params(path: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if let Some(query) = path.strip_prefix("/?") {
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                params.insert(key.to_string(), url_decode(value));
            }
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn decodes_plus_and_percent_sequences() {
        assert_eq!(url_decode("Hello%20World"), "Hello World");
        assert_eq!(url_decode("a+b+c"), "a b c");
        assert_eq!(url_decode("%41%42%43"), "ABC");
        assert_eq!(url_decode("%7e"), "~");
    }

    #[test]
    fn malformed_percent_passes_through() {
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%4"), "%4");
        assert_eq!(url_decode("%G1"), "%G1");
        assert_eq!(url_decode("50%%20"), "50% ");
    }

    #[test]
    fn request_path_takes_second_token() {
        assert_eq!(
            request_path("GET /data HTTP/1.1\r\nHost: node\r\n\r\n"),
            "/data"
        );
        assert_eq!(request_path("POST /?led=on HTTP/1.0\r\n"), "/?led=on");
    }

    #[test]
    fn malformed_request_line_falls_back_to_root() {
        assert_eq!(request_path(""), "/");
        assert_eq!(request_path("GET\r\n"), "/");
        assert_eq!(request_path("\r\nGET /data HTTP/1.1"), "/");
    }

    #[test]
    fn duplicate_keys_last_occurrence_wins() {
        let params = query_params("/?led=on&led=off&lcd=dist");
        assert_eq!(params.get("led").map(String::as_str), Some("off"));
        assert_eq!(params.get("lcd").map(String::as_str), Some("dist"));
    }

    #[test]
    fn params_require_the_query_prefix() {
        assert!(query_params("/data").is_empty());
        assert!(query_params("/data?led=on").is_empty());
        assert!(query_params("/").is_empty());
    }

    #[test]
    fn pairs_without_equals_are_skipped() {
        let params = query_params("/?led&lcdtext=hi%21");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("lcdtext").map(String::as_str), Some("hi!"));
    }

    #[test]
    fn values_are_decoded_keys_are_not() {
        let params = query_params("/?lcdtext=line+one%2Fline+two");
        assert_eq!(
            params.get("lcdtext").map(String::as_str),
            Some("line one/line two")
        );
    }
}
