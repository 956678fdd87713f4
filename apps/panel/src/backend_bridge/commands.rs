//! Backend commands queued from UI to backend worker.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    ChangeRpm { raw: String },
    Divide { raw: String },
    NextDivision,
    PreciseMove { raw: String },
    Reset,
    EmergencyStop,
    EnableMotor,
    Show,
    Shutdown,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::ChangeRpm { .. } => "change_rpm",
            BackendCommand::Divide { .. } => "divide",
            BackendCommand::NextDivision => "next_division",
            BackendCommand::PreciseMove { .. } => "precise_move",
            BackendCommand::Reset => "reset",
            BackendCommand::EmergencyStop => "emergency_stop",
            BackendCommand::EnableMotor => "enable_motor",
            BackendCommand::Show => "show",
            BackendCommand::Shutdown => "shutdown",
        }
    }
}
