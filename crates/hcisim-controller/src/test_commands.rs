//! Test-channel commands understood by the controller.
//!
//! A test driver sends `NAME|arg|arg` lines; the transport splits them and
//! the controller turns the pieces into a [`TestCommand`].
//!
//! | Name                | Arguments        | Effect                                  |
//! |---------------------|------------------|-----------------------------------------|
//! | `CLEAR`             |                  | drop fault injection and fake peers     |
//! | `SET_EVENT_DELAY`   | milliseconds     | post every event with this delay        |
//! | `CLEAR_EVENT_DELAY` |                  | post events immediately again           |
//! | `TIMEOUT_ALL`       |                  | swallow every HCI command               |
//! | `DISCOVER`          | peer names       | add fake peers (one random if none)     |
//! | `DISCOVER_INTERVAL` | milliseconds     | add a random fake peer periodically     |

use std::str::FromStr;
use std::time::Duration;

/// A parsed test-channel command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestCommand {
    Clear,
    SetEventDelay(Duration),
    ClearEventDelay,
    TimeoutAll,
    /// Names of the peers to add. Empty means one peer with a random name.
    Discover(Vec<String>),
    DiscoverInterval(Duration),
}

/// Why a test-channel line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TestCommandError {
    #[error("unknown test command '{0}'")]
    Unknown(String),

    #[error("{command}: missing {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },

    #[error("{command}: invalid argument '{value}'")]
    InvalidArgument {
        command: &'static str,
        value: String,
    },
}

impl TestCommand {
    /// Build a command from a directive name and its arguments.
    pub fn from_directive(name: &str, args: &[String]) -> Result<TestCommand, TestCommandError> {
        match name {
            "CLEAR" => Ok(TestCommand::Clear),
            "SET_EVENT_DELAY" => {
                millis_arg("SET_EVENT_DELAY", args).map(TestCommand::SetEventDelay)
            }
            "CLEAR_EVENT_DELAY" => Ok(TestCommand::ClearEventDelay),
            "TIMEOUT_ALL" => Ok(TestCommand::TimeoutAll),
            "DISCOVER" => Ok(TestCommand::Discover(
                args.iter()
                    .filter(|a| !a.is_empty())
                    .cloned()
                    .collect(),
            )),
            "DISCOVER_INTERVAL" => {
                let period = millis_arg("DISCOVER_INTERVAL", args)?;
                if period.is_zero() {
                    return Err(TestCommandError::InvalidArgument {
                        command: "DISCOVER_INTERVAL",
                        value: "0".into(),
                    });
                }
                Ok(TestCommand::DiscoverInterval(period))
            }
            other => Err(TestCommandError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TestCommand::Clear => "CLEAR",
            TestCommand::SetEventDelay(_) => "SET_EVENT_DELAY",
            TestCommand::ClearEventDelay => "CLEAR_EVENT_DELAY",
            TestCommand::TimeoutAll => "TIMEOUT_ALL",
            TestCommand::Discover(_) => "DISCOVER",
            TestCommand::DiscoverInterval(_) => "DISCOVER_INTERVAL",
        }
    }
}

/// Parses a whole `NAME|arg|arg` line.
impl FromStr for TestCommand {
    type Err = TestCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.trim().split('|').map(|f| f.trim().to_string());
        let name = fields.next().unwrap_or_default();
        let args: Vec<String> = fields.collect();
        TestCommand::from_directive(&name, &args)
    }
}

fn millis_arg(command: &'static str, args: &[String]) -> Result<Duration, TestCommandError> {
    let value = args.first().ok_or(TestCommandError::MissingArgument {
        command,
        what: "delay in milliseconds",
    })?;
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| TestCommandError::InvalidArgument {
            command,
            value: value.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        assert_eq!("CLEAR".parse(), Ok(TestCommand::Clear));
        assert_eq!(
            "SET_EVENT_DELAY|250".parse(),
            Ok(TestCommand::SetEventDelay(Duration::from_millis(250)))
        );
        assert_eq!("CLEAR_EVENT_DELAY".parse(), Ok(TestCommand::ClearEventDelay));
        assert_eq!("TIMEOUT_ALL".parse(), Ok(TestCommand::TimeoutAll));
        assert_eq!(
            "DISCOVER|alpha|beta".parse(),
            Ok(TestCommand::Discover(vec!["alpha".into(), "beta".into()]))
        );
        assert_eq!(
            "DISCOVER_INTERVAL|100".parse(),
            Ok(TestCommand::DiscoverInterval(Duration::from_millis(100)))
        );
    }

    #[test]
    fn discover_without_names() {
        assert_eq!("DISCOVER".parse(), Ok(TestCommand::Discover(vec![])));
        assert_eq!("DISCOVER||".parse(), Ok(TestCommand::Discover(vec![])));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            "timeout_all".parse::<TestCommand>(),
            Err(TestCommandError::Unknown("timeout_all".into()))
        );
    }

    #[test]
    fn rejects_bad_delays() {
        assert!(matches!(
            "SET_EVENT_DELAY".parse::<TestCommand>(),
            Err(TestCommandError::MissingArgument { .. })
        ));
        assert!(matches!(
            "SET_EVENT_DELAY|soon".parse::<TestCommand>(),
            Err(TestCommandError::InvalidArgument { .. })
        ));
        assert!(matches!(
            "DISCOVER_INTERVAL|0".parse::<TestCommand>(),
            Err(TestCommandError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn error_display() {
        let e = TestCommandError::InvalidArgument {
            command: "SET_EVENT_DELAY",
            value: "soon".into(),
        };
        assert_eq!(e.to_string(), "SET_EVENT_DELAY: invalid argument 'soon'");
    }

    #[test]
    fn name_round_trips() {
        for line in ["CLEAR", "CLEAR_EVENT_DELAY", "TIMEOUT_ALL", "DISCOVER"] {
            assert_eq!(line.parse::<TestCommand>().unwrap().name(), line);
        }
    }
}
