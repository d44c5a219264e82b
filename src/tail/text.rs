/// Decode as much of `pending` as forms complete UTF-8, leaving an incomplete
/// trailing sequence for the next read. Invalid bytes become U+FFFD.
pub fn take_utf8(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    let mut consumed = 0;

    loop {
        match std::str::from_utf8(&pending[consumed..]) {
            Ok(valid) => {
                out.push_str(valid);
                consumed = pending.len();
                break;
            }
            Err(e) => {
                let good = consumed + e.valid_up_to();
                // valid_up_to marks a char boundary, so this slice is valid
                out.push_str(&String::from_utf8_lossy(&pending[consumed..good]));
                match e.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        consumed = good + bad;
                    }
                    None => {
                        consumed = good;
                        break;
                    }
                }
            }
        }
    }

    pending.drain(..consumed);
    out
}

/// `\n` to `\r\n`, leaving existing `\r\n` pairs alone
pub fn to_crlf(text: &str) -> String {
    CrlfEncoder::default().encode(text)
}

/// [`to_crlf`] over a sequence of chunks; a `\r\n` pair split between two
/// chunks is still left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrlfEncoder {
    after_cr: bool,
}

impl CrlfEncoder {
    pub fn encode(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + text.len() / 16);
        for c in text.chars() {
            if c == '\n' && !self.after_cr {
                out.push('\r');
            }
            out.push(c);
            self.after_cr = c == '\r';
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_sequence_is_carried() {
        let euro = "€".as_bytes();
        let mut pending = b"ab".to_vec();
        pending.extend_from_slice(&euro[..2]);

        assert_eq!(take_utf8(&mut pending), "ab");
        assert_eq!(pending, &euro[..2]);

        pending.extend_from_slice(&euro[2..]);
        pending.push(b'\n');
        assert_eq!(take_utf8(&mut pending), "€\n");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut pending = vec![b'a', 0xFF, b'b'];
        assert_eq!(take_utf8(&mut pending), "a\u{FFFD}b");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_to_crlf() {
        assert_eq!(to_crlf("a\nb\r\nc\n"), "a\r\nb\r\nc\r\n");
        assert_eq!(to_crlf("no newline"), "no newline");
    }

    #[test]
    fn test_crlf_pair_split_across_chunks() {
        let mut encoder = CrlfEncoder::default();
        assert_eq!(encoder.encode("a\r"), "a\r");
        assert_eq!(encoder.encode("\nb\n"), "\nb\r\n");
        assert_eq!(encoder.encode("\n"), "\r\n");
    }
}
