//! Serial number arithmetic for series-mode provisioning.

use crate::error::{FactoryError, Result};
use crate::identity::is_valid_serial;

/// Largest numeric suffix a serial can carry.
pub const SERIAL_SUFFIX_MAX: u16 = 999;

/// Returns the serial that follows `serial` in its batch.
///
/// `2301-001` becomes `2301-002`. The suffix never wraps: incrementing
/// `2301-999` fails with `Overflow` so an operator has to pick a new batch.
///
/// # Errors
///
/// `InvalidField` if `serial` is malformed or its suffix is not numeric,
/// `Overflow` if the suffix is already at [`SERIAL_SUFFIX_MAX`].
pub fn increment_serial(serial: &str) -> Result<String> {
    if !is_valid_serial(serial) {
        return Err(FactoryError::invalid(
            "serial",
            format!("'{serial}' is not in YYMM-NNN form"),
        ));
    }

    let Some((batch, suffix)) = serial.split_once('-') else {
        return Err(FactoryError::invalid("serial", "missing '-'"));
    };

    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FactoryError::invalid(
            "serial",
            format!("suffix '{suffix}' is not numeric"),
        ));
    }

    let number: u16 = suffix.parse().map_err(|_| {
        FactoryError::invalid("serial", format!("suffix '{suffix}' is not numeric"))
    })?;

    if number >= SERIAL_SUFFIX_MAX {
        return Err(FactoryError::Overflow(format!(
            "'{serial}' is the last serial of batch {batch}"
        )));
    }

    Ok(format!("{batch}-{:03}", number + 1))
}

/// Consecutive serials starting from a given one.
///
/// Yields the start serial first. After the suffix is exhausted the iterator
/// yields a single `Overflow` error and then stops.
#[derive(Debug, Clone)]
pub struct SerialSeries {
    state: SeriesState,
}

#[derive(Debug, Clone)]
enum SeriesState {
    Next(String),
    Overflowed(String),
    Done,
}

impl SerialSeries {
    /// # Errors
    ///
    /// `InvalidField` if `first` is not a valid serial.
    pub fn starting_at(first: impl Into<String>) -> Result<Self> {
        let first = first.into();
        if !is_valid_serial(&first) {
            return Err(FactoryError::invalid(
                "serial",
                format!("'{first}' is not in YYMM-NNN form"),
            ));
        }
        Ok(Self {
            state: SeriesState::Next(first),
        })
    }

    /// Collects the next `count` serials, failing as a whole on overflow.
    ///
    /// # Errors
    ///
    /// Propagates the first error the series produces.
    pub fn take_batch(&mut self, count: usize) -> Result<Vec<String>> {
        self.by_ref().take(count).collect()
    }
}

impl Iterator for SerialSeries {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.state, SeriesState::Done) {
            SeriesState::Next(current) => {
                match increment_serial(&current) {
                    Ok(following) => self.state = SeriesState::Next(following),
                    Err(FactoryError::Overflow(_)) => {
                        self.state = SeriesState::Overflowed(current.clone());
                    }
                    Err(e) => return Some(Err(e)),
                }
                Some(Ok(current))
            }
            SeriesState::Overflowed(last) => Some(Err(FactoryError::Overflow(format!(
                "series ended at '{last}'"
            )))),
            SeriesState::Done => None,
        }
    }
}
