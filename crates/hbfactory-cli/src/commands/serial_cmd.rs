use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use hbfactory::protocol::{increment_serial, SerialSeries, SERIAL_SUFFIX_MAX};

#[derive(Args)]
pub struct SerialCommand {
    #[command(subcommand)]
    pub action: SerialAction,
}

#[derive(Subcommand)]
pub enum SerialAction {
    /// Print the serial that follows SERIAL
    Next {
        /// Serial number, YYMM-NNN
        serial: String,
    },
    /// Print COUNT consecutive serials, starting with START
    Series {
        /// First serial of the series
        #[arg(long, short)]
        start: String,

        /// Number of serials to print
        #[arg(long, short, default_value = "10")]
        count: usize,
    },
}

fn series(start: &str, count: usize) -> Result<Vec<String>> {
    let mut serials = Vec::with_capacity(count.min(usize::from(SERIAL_SUFFIX_MAX) + 1));
    for item in SerialSeries::starting_at(start)?.take(count) {
        match item {
            Ok(serial) => serials.push(serial),
            Err(e) => {
                for serial in &serials {
                    println!("{serial}");
                }
                return Err(e).context("Series halted, start a new batch to continue");
            }
        }
    }
    Ok(serials)
}

pub fn execute(cmd: SerialCommand, verbose: bool, debug: bool) -> Result<()> {
    crate::init_basic_tracing(verbose, debug);

    match cmd.action {
        SerialAction::Next { serial } => {
            let next = increment_serial(&serial)
                .with_context(|| format!("Cannot increment serial '{serial}'"))?;
            println!("{next}");
        }
        SerialAction::Series { start, count } => {
            for serial in series(&start, count)? {
                println!("{serial}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series() {
        assert_eq!(
            series("2301-008", 3).unwrap(),
            vec!["2301-008", "2301-009", "2301-010"]
        );
        assert!(series("2301-008", 0).unwrap().is_empty());
    }

    #[test]
    fn test_series_halts_at_batch_end() {
        let err = series("2301-998", 5).unwrap_err();
        assert!(format!("{err:#}").contains("overflow"));
    }

    #[test]
    fn test_series_with_huge_count_halts_on_overflow() {
        let err = series("2301-998", usize::MAX).unwrap_err();
        assert!(format!("{err:#}").contains("overflow"));

        let err = series("2301-000", usize::MAX).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Series halted, start a new batch to continue"
        );
    }

    #[test]
    fn test_series_rejects_bad_start() {
        assert!(series("2301001", 2).is_err());
    }
}
