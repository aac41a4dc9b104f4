//! Operator control commands.
//!
//! Commands arrive one per line on the control input; the name is
//! case-insensitive and arguments are space-separated. The fixed set is
//! a closed enum so dispatch in the event loop is exhaustive.

use dvr_wire::ServerId;
use thiserror::Error;

/// A parsed control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Change the cost of the link between two servers
    Update {
        /// One end of the link
        a: ServerId,
        /// The other end of the link
        b: ServerId,
        /// New link cost
        cost: u16,
    },
    /// Broadcast the routing table immediately
    Step,
    /// Print and reset the received-frame counter
    Packets,
    /// Print the routing table
    Display,
    /// Placeholder: log intent to disable a link
    Disable {
        /// Neighbor whose link would be disabled
        id: ServerId,
    },
    /// Close all neighbor connections; the process keeps running
    Crash,
}

/// Control-input parse errors, reported and otherwise ignored
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// Command name not in the fixed set
    #[error("invalid command: {0}")]
    Unknown(String),

    /// Wrong argument count or non-numeric argument
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parse one control-input line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or("").to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        match name.as_str() {
            "update" => {
                const USAGE: &str = "update <server-id1> <server-id2> <link-cost>";
                if args.len() != 3 {
                    return Err(CommandError::Usage(USAGE));
                }
                let a = parse_arg(args[0], USAGE)?;
                let b = parse_arg(args[1], USAGE)?;
                let cost = parse_arg(args[2], USAGE)?;
                Ok(Command::Update { a, b, cost })
            }
            "step" => Ok(Command::Step),
            "packets" => Ok(Command::Packets),
            "display" => Ok(Command::Display),
            "disable" => {
                const USAGE: &str = "disable <server-id>";
                if args.len() != 1 {
                    return Err(CommandError::Usage(USAGE));
                }
                Ok(Command::Disable {
                    id: parse_arg(args[0], USAGE)?,
                })
            }
            "crash" => Ok(Command::Crash),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_arg(arg: &str, usage: &'static str) -> Result<u16, CommandError> {
    arg.parse().map_err(|_| CommandError::Usage(usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update() {
        assert_eq!(
            Command::parse("update 1 2 10").unwrap(),
            Command::Update { a: 1, b: 2, cost: 10 }
        );
    }

    #[test]
    fn test_name_is_case_insensitive() {
        assert_eq!(Command::parse("DISPLAY").unwrap(), Command::Display);
        assert_eq!(Command::parse("Step").unwrap(), Command::Step);
    }

    #[test]
    fn test_parse_disable_and_crash() {
        assert_eq!(Command::parse("disable 3").unwrap(), Command::Disable { id: 3 });
        assert_eq!(Command::parse("crash").unwrap(), Command::Crash);
    }

    #[test]
    fn test_unknown_command() {
        let err = Command::parse("reboot now").unwrap_err();
        assert_eq!(err, CommandError::Unknown("reboot".to_string()));
    }

    #[test]
    fn test_update_arity_checked() {
        assert!(matches!(
            Command::parse("update 1 2").unwrap_err(),
            CommandError::Usage(_)
        ));
        assert!(matches!(
            Command::parse("update 1 2 lots").unwrap_err(),
            CommandError::Usage(_)
        ));
    }

    #[test]
    fn test_disable_requires_id() {
        assert!(matches!(
            Command::parse("disable").unwrap_err(),
            CommandError::Usage(_)
        ));
    }
}
