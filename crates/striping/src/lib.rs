//! Striping-policy record: the byte-exact description of how a file's
//! content is split across its replica set's OSDs.

mod error;

pub use error::StripingError;

use bytes::{Buf, BufMut};
use std::fmt;

/// Fixed 16-byte prefix before the pattern bytes: stripeSize, width,
/// parityWidth, ecWriteQuorum, each a big-endian u32.
const PREFIX_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripingPolicy {
    pattern: String,
    stripe_size: u32,
    width: u32,
    parity_width: u32,
    ec_write_quorum: u32,
}

impl StripingPolicy {
    pub fn new(
        pattern: impl Into<String>,
        stripe_size: u32,
        width: u32,
        parity_width: u32,
        ec_write_quorum: u32,
    ) -> Result<Self, StripingError> {
        let pattern = pattern.into();
        if pattern.is_empty() || !pattern.is_ascii() {
            return Err(StripingError::InvalidPolicy(
                "pattern must be non-empty ASCII".to_string(),
            ));
        }
        if width < 1 {
            return Err(StripingError::InvalidPolicy(
                "width must be at least 1".to_string(),
            ));
        }
        if parity_width >= width {
            return Err(StripingError::InvalidPolicy(format!(
                "parityWidth ({parity_width}) must be less than width ({width})"
            )));
        }
        if stripe_size == 0 {
            return Err(StripingError::InvalidPolicy(
                "stripeSize must be positive".to_string(),
            ));
        }
        Ok(Self {
            pattern,
            stripe_size,
            width,
            parity_width,
            ec_write_quorum,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn stripe_size(&self) -> u32 {
        self.stripe_size
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn parity_width(&self) -> u32 {
        self.parity_width
    }

    pub fn ec_write_quorum(&self) -> u32 {
        self.ec_write_quorum
    }

    /// Encodes the fixed 16-byte big-endian prefix followed by the raw
    /// pattern bytes. Deliberately bypasses `denc::Denc` — that trait's
    /// generic integer impls are little-endian and this wire format isn't.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.stripe_size);
        buf.put_u32(self.width);
        buf.put_u32(self.parity_width);
        buf.put_u32(self.ec_write_quorum);
        buf.put_slice(self.pattern.as_bytes());
    }

    pub fn encoded_size(&self) -> usize {
        PREFIX_LEN + self.pattern.len()
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, StripingError> {
        if buf.remaining() < PREFIX_LEN {
            return Err(StripingError::MalformedRecord(format!(
                "need at least {PREFIX_LEN} bytes, have {}",
                buf.remaining()
            )));
        }
        let stripe_size = buf.get_u32();
        let width = buf.get_u32();
        let parity_width = buf.get_u32();
        let ec_write_quorum = buf.get_u32();
        let mut pattern_bytes = vec![0u8; buf.remaining()];
        buf.copy_to_slice(&mut pattern_bytes);
        let pattern = String::from_utf8(pattern_bytes)
            .map_err(|e| StripingError::MalformedRecord(format!("pattern not UTF-8: {e}")))?;

        StripingPolicy::new(pattern, stripe_size, width, parity_width, ec_write_quorum)
            .map_err(|e| StripingError::MalformedRecord(e.to_string()))
    }
}

impl fmt::Display for StripingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parity_width != 0 || self.ec_write_quorum != 0 {
            write!(
                f,
                "{}, {}, {}, {}, {}",
                self.pattern, self.stripe_size, self.width, self.parity_width, self.ec_write_quorum
            )
        } else {
            write!(f, "{}, {}, {}", self.pattern, self.stripe_size, self.width)
        }
    }
}
