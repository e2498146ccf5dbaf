//! Factory identity block.
//!
//! The identity is burned once into one-time-programmable storage, so the
//! layout below is a storage format and must stay byte-for-byte stable:
//!
//! | bytes    | field        | example    |
//! |----------|--------------|------------|
//! | `0..8`   | serial       | `2301-001` |
//! | `8..14`  | random id    | `A1B2C3`   |
//! | `14..16` | model id     | `A1`       |
//! | `16..19` | hw version   | `1.1`      |
//! | `19..32` | reserved (0) |            |

use crate::error::{FactoryError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

pub const IDENTITY_BLOCK_LEN: usize = 32;

pub const SERIAL_LEN: usize = 8;
pub const RANDOM_ID_LEN: usize = 6;
pub const MODEL_ID_LEN: usize = 2;
pub const HW_VERSION_LEN: usize = 3;

const SERIAL_RANGE: Range<usize> = 0..8;
const RANDOM_ID_RANGE: Range<usize> = 8..14;
const MODEL_ID_RANGE: Range<usize> = 14..16;
const HW_VERSION_RANGE: Range<usize> = 16..19;
const RESERVED_RANGE: Range<usize> = 19..IDENTITY_BLOCK_LEN;

pub type IdentityBlock = [u8; IDENTITY_BLOCK_LEN];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub serial: String,
    pub random_id: String,
    pub model_id: String,
    pub hw_version: String,
}

impl Identity {
    #[must_use]
    pub fn new(
        serial: impl Into<String>,
        random_id: impl Into<String>,
        model_id: impl Into<String>,
        hw_version: impl Into<String>,
    ) -> Self {
        Self {
            serial: serial.into(),
            random_id: random_id.into(),
            model_id: model_id.into(),
            hw_version: hw_version.into(),
        }
    }

    /// Builds an identity with a freshly generated random id.
    #[must_use]
    pub fn with_generated_random_id(
        serial: impl Into<String>,
        model_id: impl Into<String>,
        hw_version: impl Into<String>,
    ) -> Self {
        Self::new(serial, Self::generate_random_id(), model_id, hw_version)
    }

    /// Six uppercase hexadecimal characters.
    #[must_use]
    pub fn generate_random_id() -> String {
        let value: u32 = rand::rng().random();
        format!("{:06X}", value & 0x00FF_FFFF)
    }

    /// Returns `true` only when every field has the expected format.
    #[must_use]
    pub fn validate(&self) -> bool {
        is_valid_serial(&self.serial)
            && is_valid_random_id(&self.random_id)
            && is_valid_model_id(&self.model_id)
            && is_valid_hw_version(&self.hw_version)
    }

    /// Like [`Identity::validate`], but names the first offending field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` for the first field that fails its format check.
    pub fn check(&self) -> Result<()> {
        if !is_valid_serial(&self.serial) {
            return Err(FactoryError::invalid(
                "serial",
                format!("'{}' is not in YYMM-NNN form", self.serial),
            ));
        }
        if !is_valid_random_id(&self.random_id) {
            return Err(FactoryError::invalid(
                "random_id",
                format!(
                    "'{}' must be {RANDOM_ID_LEN} alphanumeric characters",
                    self.random_id
                ),
            ));
        }
        if !is_valid_model_id(&self.model_id) {
            return Err(FactoryError::invalid(
                "model_id",
                format!("'{}' must be a letter followed by a digit", self.model_id),
            ));
        }
        if !is_valid_hw_version(&self.hw_version) {
            return Err(FactoryError::invalid(
                "hw_version",
                format!("'{}' must be digit.digit", self.hw_version),
            ));
        }
        Ok(())
    }

    /// Packs the identity into its 32-byte block.
    ///
    /// The output is decoded again before it is returned; any difference is
    /// reported as `EncodingIntegrity`.
    ///
    /// # Errors
    ///
    /// `InvalidField` when a field has the wrong length or is not ASCII,
    /// `EncodingIntegrity` when the block does not decode back to `self`.
    pub fn encode(&self) -> Result<IdentityBlock> {
        let fields = [
            ("serial", &self.serial, SERIAL_RANGE),
            ("random_id", &self.random_id, RANDOM_ID_RANGE),
            ("model_id", &self.model_id, MODEL_ID_RANGE),
            ("hw_version", &self.hw_version, HW_VERSION_RANGE),
        ];

        for (name, value, range) in &fields {
            check_width(*name, value, range.len())?;
        }

        let mut block = [0u8; IDENTITY_BLOCK_LEN];
        for (_, value, range) in fields {
            block[range].copy_from_slice(value.as_bytes());
        }

        let decoded = Self::decode(&block)
            .map_err(|e| FactoryError::EncodingIntegrity(format!("block does not decode: {e}")))?;
        if decoded != *self {
            return Err(FactoryError::EncodingIntegrity(format!(
                "decoded {decoded:?} differs from {self:?}"
            )));
        }

        Ok(block)
    }

    /// Unpacks a 32-byte block.
    ///
    /// # Errors
    ///
    /// `InvalidField` when the input is not exactly 32 bytes, a field is not
    /// ASCII, or the reserved tail is not zero-filled.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IDENTITY_BLOCK_LEN {
            return Err(FactoryError::invalid(
                "identity block",
                format!(
                    "expected {IDENTITY_BLOCK_LEN} bytes, got {}",
                    bytes.len()
                ),
            ));
        }

        if bytes[RESERVED_RANGE].iter().any(|&b| b != 0) {
            return Err(FactoryError::invalid(
                "reserved",
                format!("bytes {RESERVED_RANGE:?} must be zero"),
            ));
        }

        Ok(Self {
            serial: ascii_field("serial", &bytes[SERIAL_RANGE])?,
            random_id: ascii_field("random_id", &bytes[RANDOM_ID_RANGE])?,
            model_id: ascii_field("model_id", &bytes[MODEL_ID_RANGE])?,
            hw_version: ascii_field("hw_version", &bytes[HW_VERSION_RANGE])?,
        })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Factory Data:")?;
        writeln!(f, "  Model ID: {}", self.model_id)?;
        writeln!(f, "  HW Version: {}", self.hw_version)?;
        writeln!(f, "  Serial: {}", self.serial)?;
        write!(f, "  Random ID: {}", self.random_id)
    }
}

fn check_width(field: &'static str, value: &str, width: usize) -> Result<()> {
    if !value.is_ascii() {
        return Err(FactoryError::invalid(
            field,
            format!("'{value}' contains non-ASCII characters"),
        ));
    }
    if value.len() != width {
        return Err(FactoryError::invalid(
            field,
            format!("expected {width} characters, got {}", value.len()),
        ));
    }
    Ok(())
}

fn ascii_field(field: &'static str, bytes: &[u8]) -> Result<String> {
    if !bytes.is_ascii() {
        return Err(FactoryError::invalid(field, "field is not valid ASCII"));
    }
    Ok(bytes.iter().map(|&b| char::from(b)).collect())
}

/// `YYMM-NNN`: exactly one dash, four characters before it and three after.
#[must_use]
pub fn is_valid_serial(serial: &str) -> bool {
    let parts: Vec<&str> = serial.split('-').collect();
    matches!(parts.as_slice(), [head, tail] if head.len() == 4 && tail.len() == 3)
}

#[must_use]
pub fn is_valid_random_id(random_id: &str) -> bool {
    random_id.len() == RANDOM_ID_LEN && random_id.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[must_use]
pub fn is_valid_model_id(model_id: &str) -> bool {
    matches!(
        model_id.as_bytes(),
        [letter, digit] if letter.is_ascii_alphabetic() && digit.is_ascii_digit()
    )
}

#[must_use]
pub fn is_valid_hw_version(hw_version: &str) -> bool {
    matches!(
        hw_version.as_bytes(),
        [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit()
    )
}
