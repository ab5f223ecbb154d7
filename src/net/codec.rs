//! Newline-delimited JSON framing
//!
//! Wraps `LinesCodec` so that a bad line never ends the stream: malformed or
//! oversized lines come out as `Err(ProtocolError)` items and only I/O
//! failures surface as stream errors.

use std::io;
use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// A line that could not be turned into a message
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("line longer than {max} bytes")]
    LineTooLong { max: usize },

    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Decodes one `D` per line and encodes any serializable value as one line
#[derive(Debug)]
pub struct JsonLinesCodec<D> {
    lines: LinesCodec,
    max_length: usize,
    _decoded: PhantomData<fn() -> D>,
}

impl<D> JsonLinesCodec<D> {
    pub fn new(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
            max_length,
            _decoded: PhantomData,
        }
    }

    fn parse(&self, line: String) -> Option<Result<D, ProtocolError>>
    where
        D: DeserializeOwned,
    {
        if line.trim().is_empty() {
            return None;
        }
        Some(serde_json::from_str(&line).map_err(ProtocolError::from))
    }

    fn lift(
        &self,
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<LineOutcome<D>, io::Error>
    where
        D: DeserializeOwned,
    {
        match result {
            Ok(Some(line)) => Ok(match self.parse(line) {
                Some(item) => LineOutcome::Item(item),
                None => LineOutcome::Blank,
            }),
            Ok(None) => Ok(LineOutcome::NeedMore),
            // LinesCodec discards up to the next newline after this
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Ok(LineOutcome::Item(Err(ProtocolError::LineTooLong {
                    max: self.max_length,
                })))
            }
            // Raised after the line was split off, so the buffer stays aligned
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Ok(LineOutcome::Item(Err(ProtocolError::InvalidUtf8)))
            }
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

enum LineOutcome<D> {
    Item(Result<D, ProtocolError>),
    Blank,
    NeedMore,
}

impl<D: DeserializeOwned> Decoder for JsonLinesCodec<D> {
    type Item = Result<D, ProtocolError>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let next = self.lines.decode(src);
            match self.lift(next)? {
                LineOutcome::Item(item) => return Ok(Some(item)),
                LineOutcome::Blank => continue,
                LineOutcome::NeedMore => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let next = self.lines.decode_eof(src);
            match self.lift(next)? {
                LineOutcome::Item(item) => return Ok(Some(item)),
                LineOutcome::Blank => continue,
                LineOutcome::NeedMore => return Ok(None),
            }
        }
    }
}

impl<D, T: Serialize> Encoder<T> for JsonLinesCodec<D> {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}
