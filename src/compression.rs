//! Compression utilities for writer output
//!
//! Destinations are streamed through an encoder chosen from the pool
//! configuration. Gzip output must be finished explicitly so the trailer
//! lands on disk before the file is released.

use std::io::{self, Write};

use flate2::write::GzEncoder;

use crate::config::{CompressionAlgorithm, CompressionSettings};

/// Streaming writer that optionally compresses everything written through it
pub enum CompressedWriter<W: Write> {
    /// Passthrough, no compression
    Plain(W),
    /// Gzip member written incrementally
    Gzip(GzEncoder<W>),
}

impl<W: Write> CompressedWriter<W> {
    /// Wrap `inner` according to the compression settings
    pub fn new(inner: W, settings: &CompressionSettings) -> Self {
        match settings.algorithm {
            CompressionAlgorithm::None => Self::Plain(inner),
            CompressionAlgorithm::Gzip => {
                let level = flate2::Compression::new(settings.level.min(9));
                Self::Gzip(GzEncoder::new(inner, level))
            }
        }
    }

    /// Get the compression algorithm in use
    pub fn algorithm(&self) -> CompressionAlgorithm {
        match self {
            Self::Plain(_) => CompressionAlgorithm::None,
            Self::Gzip(_) => CompressionAlgorithm::Gzip,
        }
    }

    /// Flush pending data, write any trailer and hand back the inner writer
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Plain(mut inner) => {
                inner.flush()?;
                Ok(inner)
            }
            Self::Gzip(encoder) => {
                let mut inner = encoder.finish()?;
                inner.flush()?;
                Ok(inner)
            }
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(inner) => inner.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(inner) => inner.flush(),
            Self::Gzip(encoder) => encoder.flush(),
        }
    }
}
