//! Line codec for the connection transport.
//!
//! Decodes inbound lines terminated by CR, LF, or CRLF and encodes outbound
//! lines through the configured character encoding. Inbound decoding is
//! lossy: a stray byte in somebody's quit message must not kill the
//! connection.

use bytes::{Buf, BufMut, BytesMut};
use encoding_rs::Encoding;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ParseError;

/// Newline-delimited codec with a length cap and a configurable encoding.
pub struct LineCodec {
    encoding: &'static Encoding,
    /// Index of the next byte to scan for a terminator.
    next_index: usize,
    /// Maximum framed line length in bytes, terminator included.
    max_len: usize,
    /// When an overlong line is seen we drop bytes until the next terminator
    /// instead of giving up on the connection.
    discarding: bool,
}

impl LineCodec {
    /// Create a codec for the given encoding label (e.g. `utf-8`).
    pub fn new(label: &str, max_len: usize) -> Result<Self, ParseError> {
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| ParseError::UnknownEncoding(label.to_owned()))?;
        Ok(Self {
            encoding,
            next_index: 0,
            max_len,
            discarding: false,
        })
    }

    /// The resolved encoding.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn take_line(&mut self, src: &mut BytesMut, term_at: usize) -> String {
        let line = src.split_to(term_at);
        let term = src[0];
        src.advance(1);
        if term == b'\r' && src.first() == Some(&b'\n') {
            src.advance(1);
        }
        self.next_index = 0;
        let (decoded, _, _) = self.encoding.decode(&line);
        decoded.into_owned()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ParseError> {
        loop {
            let Some(offset) = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r')
            else {
                self.next_index = src.len();
                if src.len() > self.max_len && !self.discarding {
                    self.discarding = true;
                    src.clear();
                    self.next_index = 0;
                    return Err(ParseError::LineTooLong {
                        limit: self.max_len,
                    });
                }
                if self.discarding {
                    src.clear();
                    self.next_index = 0;
                }
                return Ok(None);
            };

            let term_at = self.next_index + offset;
            if self.discarding {
                src.advance(term_at + 1);
                self.next_index = 0;
                self.discarding = false;
                continue;
            }

            if term_at + 1 > self.max_len {
                let line = self.take_line(src, term_at);
                tracing::debug!(len = line.len(), "discarding overlong line");
                return Err(ParseError::LineTooLong {
                    limit: self.max_len,
                });
            }

            let line = self.take_line(src, term_at);
            if line.is_empty() {
                // Bare terminator or the LF of a CRLF pair.
                continue;
            }
            return Ok(Some(line));
        }
    }
}

impl Encoder<Vec<u8>> for LineCodec {
    type Error = ParseError;

    /// Write pre-encoded bytes. Truncation and CRLF framing happen upstream
    /// in the raw output layer, which owns the length budget.
    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), ParseError> {
        dst.put_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> LineCodec {
        LineCodec::new("utf-8", 512).unwrap()
    }

    #[test]
    fn test_decode_crlf() {
        let mut c = codec();
        let mut buf = BytesMut::from("PING :test\r\nNEXT");
        assert_eq!(c.decode(&mut buf).unwrap(), Some("PING :test".to_owned()));
        assert_eq!(&buf[..], b"NEXT");
    }

    #[test]
    fn test_decode_lf_only() {
        let mut c = codec();
        let mut buf = BytesMut::from(":a PRIVMSG #b :hi\n");
        assert_eq!(
            c.decode(&mut buf).unwrap(),
            Some(":a PRIVMSG #b :hi".to_owned())
        );
    }

    #[test]
    fn test_decode_cr_only() {
        let mut c = codec();
        let mut buf = BytesMut::from("NOTICE x :y\rPING :z\r");
        assert_eq!(c.decode(&mut buf).unwrap(), Some("NOTICE x :y".to_owned()));
        assert_eq!(c.decode(&mut buf).unwrap(), Some("PING :z".to_owned()));
    }

    #[test]
    fn test_decode_partial() {
        let mut c = codec();
        let mut buf = BytesMut::from("PING :half");
        assert_eq!(c.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\r\n");
        assert_eq!(c.decode(&mut buf).unwrap(), Some("PING :half".to_owned()));
    }

    #[test]
    fn test_decode_skips_blank_lines() {
        let mut c = codec();
        let mut buf = BytesMut::from("\r\n\r\nPING :a\r\n");
        assert_eq!(c.decode(&mut buf).unwrap(), Some("PING :a".to_owned()));
    }

    #[test]
    fn test_overlong_line_resyncs() {
        let mut c = LineCodec::new("utf-8", 16).unwrap();
        let mut buf = BytesMut::from("AAAAAAAAAAAAAAAAAAAAAAAA\r\nPING :ok\r\n");
        assert!(matches!(
            c.decode(&mut buf),
            Err(ParseError::LineTooLong { .. })
        ));
        assert_eq!(c.decode(&mut buf).unwrap(), Some("PING :ok".to_owned()));
    }

    #[test]
    fn test_lossy_decode() {
        let mut c = codec();
        let mut buf = BytesMut::from(&b":a PRIVMSG #b :caf\xe9\r\n"[..]);
        let line = c.decode(&mut buf).unwrap().unwrap();
        assert!(line.starts_with(":a PRIVMSG #b :caf"));
    }

    #[test]
    fn test_unknown_encoding() {
        assert!(matches!(
            LineCodec::new("no-such-encoding", 512),
            Err(ParseError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_encode_passthrough() {
        let mut c = codec();
        let mut buf = BytesMut::new();
        c.encode(b"QUIT :bye\r\n".to_vec(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"QUIT :bye\r\n");
    }
}
