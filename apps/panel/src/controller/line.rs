//! Parsing of operator command lines.

use crate::backend_bridge::commands::BackendCommand;

pub const HELP: &str = "\
commands:
  speed <rpm>     set speed (alias: rpm, slider); clamped to the panel limits
  divide <n>      divide the circle into n equal steps
  next            advance to the next division (alias: n)
  move <deg>      precise move by <deg> degrees (alias: goto)
  reset           return to 0 degrees
  stop            emergency stop (alias: estop)
  enable          re-enable the motor
  show            redraw the panel
  help            this text
  quit            leave (alias: exit)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Send(BackendCommand),
    Help,
    Quit,
    Empty,
    Usage(&'static str),
    Unknown(String),
}

pub fn parse_line(line: &str) -> LineAction {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb.to_ascii_lowercase().as_str() {
        "" => LineAction::Empty,
        "speed" | "rpm" | "slider" => with_argument(rest, "speed <rpm>", |raw| {
            BackendCommand::ChangeRpm { raw }
        }),
        "divide" => with_argument(rest, "divide <n>", |raw| BackendCommand::Divide { raw }),
        "move" | "goto" => with_argument(rest, "move <degrees>", |raw| {
            BackendCommand::PreciseMove { raw }
        }),
        "next" | "n" => LineAction::Send(BackendCommand::NextDivision),
        "reset" => LineAction::Send(BackendCommand::Reset),
        "stop" | "estop" => LineAction::Send(BackendCommand::EmergencyStop),
        "enable" => LineAction::Send(BackendCommand::EnableMotor),
        "show" => LineAction::Send(BackendCommand::Show),
        "help" | "?" => LineAction::Help,
        "quit" | "exit" => LineAction::Quit,
        _ => LineAction::Unknown(verb.to_string()),
    }
}

fn with_argument(
    rest: &str,
    usage: &'static str,
    build: impl FnOnce(String) -> BackendCommand,
) -> LineAction {
    if rest.is_empty() {
        LineAction::Usage(usage)
    } else {
        LineAction::Send(build(rest.to_string()))
    }
}
