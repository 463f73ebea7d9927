//! Script command definitions
//!
//! Each script line parses into one [`Command`]. Argument counts, variable
//! name prefixes and the READ keyword are checked here, before anything runs.
//! Value tokens stay as text since they may reference variables that only
//! get their value at run time.

use crate::common::{Error, Result};
use crate::session::variables::validate_name;

/// A parsed script command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Close the open test case and start a new one
    Test { id: String, title: String },
    /// Define (or redefine) a variable
    DefVar { name: String, initial: Option<String> },
    /// Set an instrument endpoint
    Config { key: String, value: String },
    /// Power on, with optional voltage and current setpoints
    PowerOn {
        voltage: Option<String>,
        current: Option<String>,
    },
    PowerOff,
    /// Off, pause, on; setpoints unchanged
    PowerCycle,
    /// Set resistance and connect the relay
    ResSet { value: String },
    /// Disconnect the resistance relay
    ResOpen,
    /// Connect the resistance relay
    ResClose,
    /// Capture a scope screenshot
    Screenshot { label: Option<String> },
    /// Pause for a number of seconds
    Wait { seconds: f64 },
    /// Read a scope channel into a variable
    Read { channel: String, var: String },
    /// Assign a value to a defined variable
    SetVar { name: String, value: String },
    /// Assert `actual` lies within `expected ± tolerance`
    CheckRange {
        actual: String,
        expected: String,
        tolerance: String,
    },
    /// Assert `|a - b| <= max_diff`
    CheckDiff {
        a: String,
        b: String,
        max_diff: String,
    },
}

impl Command {
    /// Parse one non-comment script line
    pub fn parse(line: &str) -> Result<Command> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((head, args)) = parts.split_first() else {
            return Err(Error::UnknownCommand(String::new()));
        };

        let keyword = head.to_uppercase();

        match keyword.as_str() {
            "TEST" => {
                let (id, rest) = args.split_first().ok_or(Error::Usage {
                    command: "TEST",
                    usage: "TEST <ID> <Title...>",
                })?;
                Ok(Command::Test {
                    id: id.to_string(),
                    title: rest.join(" ").trim_matches('"').to_string(),
                })
            }

            "DEF_VAR" => {
                let name = args.first().ok_or(Error::Usage {
                    command: "DEF_VAR",
                    usage: "DEF_VAR <$VAR> [Value]",
                })?;
                validate_name(name)?;
                Ok(Command::DefVar {
                    name: name.to_string(),
                    initial: args.get(1).map(|s| s.to_string()),
                })
            }

            "CONFIG" => {
                if args.len() < 2 {
                    return Err(Error::Usage {
                        command: "CONFIG",
                        usage: "CONFIG <Key> <Value>",
                    });
                }
                Ok(Command::Config {
                    key: args[0].to_uppercase(),
                    value: args[1].to_string(),
                })
            }

            "POWER_ON" => Ok(Command::PowerOn {
                voltage: args.first().map(|s| s.to_string()),
                current: args.get(1).map(|s| s.to_string()),
            }),

            "POWER_OFF" => Ok(Command::PowerOff),
            "POWER_CYCLE" => Ok(Command::PowerCycle),

            "RES_SET" => {
                let value = args.first().ok_or(Error::Usage {
                    command: "RES_SET",
                    usage: "RES_SET <Value>",
                })?;
                Ok(Command::ResSet {
                    value: value.to_string(),
                })
            }

            "RES_OPEN" => Ok(Command::ResOpen),
            "RES_CLOSE" => Ok(Command::ResClose),

            "SCREENSHOT" => Ok(Command::Screenshot {
                label: args.first().map(|s| s.to_string()),
            }),

            "WAIT" => {
                let raw = args.first().copied().unwrap_or_default();
                let seconds: f64 = raw
                    .parse()
                    .map_err(|_| Error::InvalidDuration(raw.to_string()))?;
                if std::time::Duration::try_from_secs_f64(seconds).is_err() {
                    return Err(Error::InvalidDuration(raw.to_string()));
                }
                Ok(Command::Wait { seconds })
            }

            "READ" => {
                if args.len() != 3 {
                    return Err(Error::Usage {
                        command: "READ",
                        usage: "READ <CH> TO <$VAR>",
                    });
                }
                if !args[1].eq_ignore_ascii_case("TO") {
                    return Err(Error::ExpectedTo(args[1].to_string()));
                }
                validate_name(args[2])?;
                Ok(Command::Read {
                    channel: args[0].replace("CH", "").replace("ch", ""),
                    var: args[2].to_string(),
                })
            }

            "SET_VAR" => {
                if args.len() != 2 {
                    return Err(Error::Usage {
                        command: "SET_VAR",
                        usage: "SET_VAR <$VAR> <Value>",
                    });
                }
                validate_name(args[0])?;
                Ok(Command::SetVar {
                    name: args[0].to_string(),
                    value: args[1].to_string(),
                })
            }

            "CHECK_RANGE" => {
                if args.len() < 3 {
                    return Err(Error::Usage {
                        command: "CHECK_RANGE",
                        usage: "CHECK_RANGE <Actual> <Expected> <Tolerance>",
                    });
                }
                Ok(Command::CheckRange {
                    actual: args[0].to_string(),
                    expected: args[1].to_string(),
                    tolerance: args[2].to_string(),
                })
            }

            "CHECK_DIFF" => {
                if args.len() < 3 {
                    return Err(Error::Usage {
                        command: "CHECK_DIFF",
                        usage: "CHECK_DIFF <A> <B> <MaxDiff>",
                    });
                }
                Ok(Command::CheckDiff {
                    a: args[0].to_string(),
                    b: args[1].to_string(),
                    max_diff: args[2].to_string(),
                })
            }

            _ => Err(Error::UnknownCommand(keyword)),
        }
    }

    /// The script keyword for this command
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Test { .. } => "TEST",
            Command::DefVar { .. } => "DEF_VAR",
            Command::Config { .. } => "CONFIG",
            Command::PowerOn { .. } => "POWER_ON",
            Command::PowerOff => "POWER_OFF",
            Command::PowerCycle => "POWER_CYCLE",
            Command::ResSet { .. } => "RES_SET",
            Command::ResOpen => "RES_OPEN",
            Command::ResClose => "RES_CLOSE",
            Command::Screenshot { .. } => "SCREENSHOT",
            Command::Wait { .. } => "WAIT",
            Command::Read { .. } => "READ",
            Command::SetVar { .. } => "SET_VAR",
            Command::CheckRange { .. } => "CHECK_RANGE",
            Command::CheckDiff { .. } => "CHECK_DIFF",
        }
    }
}
