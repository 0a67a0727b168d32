//! Request-line parsing.
//!
//! Only the first line matters: `METHOD SP /PATH ...CRLF`. The method is
//! lower-cased in place and must be `post`; the path token (with its
//! leading `/` stripped) is the numeric argument for the handler.
//!
//! Tokenizing is destructive, like `strtok_r`: each delimiter that ends a
//! token is overwritten with NUL in the caller's buffer.

use ringrpc_core::error::RequestError;

const METHOD_DELIMS: &[u8] = b" \t";
const PATH_DELIMS: &[u8] = b" \t/";

/// The only accepted method, after lower-casing.
pub const POST: &[u8] = b"post";

#[derive(Debug, PartialEq, Eq)]
pub struct RequestLine<'a> {
    /// Lower-cased method token.
    pub method: &'a [u8],
    /// Path token without slashes.
    pub path: &'a [u8],
}

impl RequestLine<'_> {
    /// The path as a number, with C `strtol(path, NULL, 0)` semantics.
    pub fn argument(&self) -> i64 {
        parse_c_long(self.path)
    }
}

/// Length of the first line, if its CRLF starts within `max_line` bytes.
pub fn find_line(buf: &[u8], max_line: usize) -> Result<usize, RequestError> {
    buf.windows(2)
        .take(max_line)
        .position(|w| w == b"\r\n")
        .ok_or(RequestError::LineTooLong(max_line))
}

/// Parse the request line at the start of `buf`, mutating it in place.
pub fn parse_request_line(buf: &mut [u8], max_line: usize) -> Result<RequestLine<'_>, RequestError> {
    let len = find_line(buf, max_line)?;
    let mut tokens = Tokenizer::new(&mut buf[..len]);

    let method = tokens.next(METHOD_DELIMS).ok_or(RequestError::EmptyLine)?;
    method.make_ascii_lowercase();
    if method != POST {
        return Err(RequestError::UnsupportedMethod);
    }

    let path = tokens.next(PATH_DELIMS).ok_or(RequestError::MissingPath)?;
    Ok(RequestLine { method, path })
}

/// In-place tokenizer over a mutable byte slice.
struct Tokenizer<'a> {
    rest: &'a mut [u8],
}

impl<'a> Tokenizer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { rest: buf }
    }

    fn next(&mut self, delims: &[u8]) -> Option<&'a mut [u8]> {
        let rest = std::mem::take(&mut self.rest);
        let start = rest.iter().position(|b| !delims.contains(b))?;
        let (_, rest) = rest.split_at_mut(start);

        match rest.iter().position(|b| delims.contains(b)) {
            Some(end) => {
                let (token, tail) = rest.split_at_mut(end);
                tail[0] = 0;
                let (_, tail) = tail.split_at_mut(1);
                self.rest = tail;
                Some(token)
            }
            None => Some(rest),
        }
    }
}

/// `strtol(s, NULL, 0)`: optional leading whitespace and sign, then a
/// `0x`/`0X` hex, `0` octal, or decimal number. The longest valid prefix
/// counts; no digits gives 0; out of range saturates.
pub fn parse_c_long(s: &[u8]) -> i64 {
    let mut i = 0;
    while s.get(i).is_some_and(|b| b.is_ascii_whitespace() || *b == 0x0b) {
        i += 1;
    }

    let negative = match s.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };

    let hex_prefix = s.get(i) == Some(&b'0')
        && matches!(s.get(i + 1), Some(b'x' | b'X'))
        && s.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
    let (radix, start) = if hex_prefix {
        (16, i + 2)
    } else if s.get(i) == Some(&b'0') {
        (8, i)
    } else {
        (10, i)
    };

    let mut magnitude: u64 = 0;
    let mut overflow = false;
    for &b in &s[start.min(s.len())..] {
        let Some(digit) = (b as char).to_digit(radix) else { break };
        match magnitude
            .checked_mul(radix as u64)
            .and_then(|m| m.checked_add(digit as u64))
        {
            Some(m) => magnitude = m,
            None => overflow = true,
        }
    }

    if negative {
        if overflow || magnitude > i64::MAX as u64 + 1 {
            i64::MIN
        } else {
            (magnitude as i64).wrapping_neg()
        }
    } else if overflow || magnitude > i64::MAX as u64 {
        i64::MAX
    } else {
        magnitude as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<(Vec<u8>, i64), RequestError> {
        let mut buf = raw.as_bytes().to_vec();
        parse_request_line(&mut buf, 1024).map(|r| (r.method.to_vec(), r.argument()))
    }

    #[test]
    fn post_with_decimal_path() {
        assert_eq!(parse("POST /21 HTTP/1.0\r\n\r\n"), Ok((b"post".to_vec(), 21)));
    }

    #[test]
    fn method_is_case_insensitive() {
        assert_eq!(parse("pOsT /7 HTTP/1.1\r\n").map(|r| r.1), Ok(7));
    }

    #[test]
    fn hex_octal_and_negative_paths() {
        assert_eq!(parse("POST /0x1f HTTP/1.0\r\n").map(|r| r.1), Ok(31));
        assert_eq!(parse("POST /017 HTTP/1.0\r\n").map(|r| r.1), Ok(15));
        assert_eq!(parse("POST /-5 HTTP/1.0\r\n").map(|r| r.1), Ok(-5));
    }

    #[test]
    fn get_is_rejected() {
        assert_eq!(parse("GET / HTTP/1.0\r\n\r\n"), Err(RequestError::UnsupportedMethod));
    }

    #[test]
    fn post_without_path_token() {
        assert_eq!(parse("POST\r\n"), Err(RequestError::MissingPath));
        assert_eq!(parse("POST /\r\n"), Err(RequestError::MissingPath));
    }

    #[test]
    fn blank_line_is_empty() {
        assert_eq!(parse("\r\n"), Err(RequestError::EmptyLine));
        assert_eq!(parse("   \r\n"), Err(RequestError::EmptyLine));
    }

    #[test]
    fn missing_crlf_within_bound() {
        let long = "a".repeat(2000);
        assert_eq!(parse(&long), Err(RequestError::LineTooLong(1024)));
        assert_eq!(parse("POST /1 HTTP/1.0"), Err(RequestError::LineTooLong(1024)));
    }

    #[test]
    fn crlf_just_inside_and_outside_the_bound() {
        // CR at index 9.
        let mut inside = b"POST /11 \r\n".to_vec();
        assert!(parse_request_line(&mut inside.clone(), 10).is_ok());
        assert_eq!(
            parse_request_line(&mut inside, 9),
            Err(RequestError::LineTooLong(9))
        );
    }

    #[test]
    fn tokenizer_mutates_the_buffer() {
        let mut buf = b"POST /42 HTTP/1.0\r\n".to_vec();
        let line = parse_request_line(&mut buf, 1024).expect("parse");
        assert_eq!(line.path, b"42");
        assert_eq!(&buf[..5], b"post\0");
    }

    #[test]
    fn strtol_prefixes_and_garbage() {
        assert_eq!(parse_c_long(b"21"), 21);
        assert_eq!(parse_c_long(b"  +8"), 8);
        assert_eq!(parse_c_long(b"12abc"), 12);
        assert_eq!(parse_c_long(b"abc"), 0);
        assert_eq!(parse_c_long(b""), 0);
        assert_eq!(parse_c_long(b"0x"), 0);
        assert_eq!(parse_c_long(b"0xg"), 0);
        assert_eq!(parse_c_long(b"0X10"), 16);
        assert_eq!(parse_c_long(b"09"), 0);
        assert_eq!(parse_c_long(b"-0x10"), -16);
    }

    #[test]
    fn strtol_saturates() {
        assert_eq!(parse_c_long(b"9223372036854775807"), i64::MAX);
        assert_eq!(parse_c_long(b"9223372036854775808"), i64::MAX);
        assert_eq!(parse_c_long(b"-9223372036854775808"), i64::MIN);
        assert_eq!(parse_c_long(b"-99999999999999999999999"), i64::MIN);
    }
}
