use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::data::LogLevel;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Inspect, extract and pack GameCube file system tables")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    #[clap(long, short, default_value = "warn", value_enum, global = true)]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the directory tree of a disc image
    List {
        image: PathBuf,
        /// Absolute offset of the table; read from the disc header when omitted
        #[clap(long, value_parser = parse_offset)]
        fst_offset: Option<u64>,
    },
    /// Write every file of a disc image into a directory
    Extract {
        image: PathBuf,
        output: PathBuf,
        #[clap(long, value_parser = parse_offset)]
        fst_offset: Option<u64>,
    },
    /// Build a standalone table and payload region from a project's fst.yaml
    Pack {
        output: PathBuf,
        /// The directory holding fst.yaml
        #[clap(long, short, default_value = ".")]
        root: PathBuf,
    },
}

/// Accepts decimal or `0x`-prefixed hexadecimal offsets.
fn parse_offset(value: &str) -> Result<u64, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed.map_err(|err| format!("invalid offset '{value}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1060", 1060)]
    #[case("0x424", 0x424)]
    #[case("0X1F", 0x1F)]
    fn parses_offsets(#[case] value: &str, #[case] expected: u64) {
        assert_eq!(parse_offset(value), Ok(expected));
    }

    #[test]
    fn rejects_garbage_offsets() {
        assert!(parse_offset("0xZZ").is_err());
        assert!(parse_offset("-1").is_err());
    }

    #[test]
    fn parses_subcommands_with_global_log_level() {
        let cli = Cli::try_parse_from(["gcfst", "list", "game.iso", "--fst-offset", "0x456", "-l", "debug"])
            .unwrap();

        assert!(matches!(cli.log_level, LogLevel::Debug));
        match cli.command {
            Command::List { image, fst_offset } => {
                assert_eq!(image, PathBuf::from("game.iso"));
                assert_eq!(fst_offset, Some(0x456));
            }
            other => panic!("Expected list command, got {other:?}"),
        }
    }
}
