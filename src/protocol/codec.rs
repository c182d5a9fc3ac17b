//! Line codec for OPI connections.
//!
//! Frames on `\n` with [`tokio_util::codec::AnyDelimiterCodec`] and a
//! maximum line length, so a client that never sends a newline cannot make
//! the server buffer without bound. Over-long lines are dropped in the
//! codec itself, since a framed stream stops at the first decoder error.
//! Lines are decoded leniently: a trailing `\r` is stripped and invalid
//! UTF-8 is replaced with U+FFFD, leaving rejection of the damaged tokens
//! to parameter validation.
//!
//! # Usage
//!
//! Use [`OpiCodec`] as the codec parameter for
//! [`tokio_util::codec::FramedRead`] (requests) and
//! [`tokio_util::codec::FramedWrite`] (replies).

use std::borrow::Cow;

use bytes::BytesMut;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};
use tracing::warn;

use crate::{AppError, Result};

/// Maximum request line length: 64 KiB.
///
/// The longest legitimate line is a background of 18 short numeric tokens.
pub const MAX_LINE_BYTES: usize = 65_536;

const NEWLINE: &[u8] = b"\n";

/// Newline-framed codec with a [`MAX_LINE_BYTES`] limit.
///
/// # Decoder
///
/// Lines longer than the limit are logged and discarded up to the next
/// newline; decoding resumes with the following line. Bytes that are not
/// valid UTF-8 never end the stream. I/O errors map to [`AppError::Io`].
///
/// # Encoder
///
/// Outbound strings are written as `item\n`.
#[derive(Debug)]
pub struct OpiCodec(AnyDelimiterCodec);

impl OpiCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(AnyDelimiterCodec::new_with_max_length(
            NEWLINE.to_vec(),
            NEWLINE.to_vec(),
            MAX_LINE_BYTES,
        ))
    }
}

impl Default for OpiCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for OpiCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.0.decode(src) {
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => warn_discarded(),
                other => {
                    return other
                        .map(|chunk| chunk.map(|c| to_line(&c)))
                        .map_err(map_codec_error);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.0.decode_eof(src) {
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => warn_discarded(),
                other => {
                    return other
                        .map(|chunk| chunk.map(|c| to_line(&c)))
                        .map_err(map_codec_error);
                }
            }
        }
    }
}

impl Encoder<String> for OpiCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

/// Decode one framed chunk, stripping `\r` and replacing invalid UTF-8.
fn to_line(chunk: &[u8]) -> String {
    let bytes = chunk.strip_suffix(b"\r").unwrap_or(chunk);
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(line) => line.to_owned(),
        Cow::Owned(line) => {
            warn!("request line is not valid UTF-8, undecodable bytes replaced");
            line
        }
    }
}

fn warn_discarded() {
    warn!(limit = MAX_LINE_BYTES, "request line too long, discarded");
}

fn map_codec_error(e: AnyDelimiterCodecError) -> AppError {
    match e {
        AnyDelimiterCodecError::MaxChunkLengthExceeded => {
            AppError::Protocol(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        AnyDelimiterCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
