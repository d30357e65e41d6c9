use crate::error::PumpError;
use std::fmt;

/// Prompt the pump prints after every reply, reflecting its motion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prompt {
    /// `:`
    Idle,
    /// `>`
    Infusing,
    /// `<`
    Withdrawing,
    /// `*`
    Stalled,
    /// `T*`
    TargetReached,
}

impl Prompt {
    /// Parse a complete prompt token (`T*` already joined).
    pub fn parse(token: &str) -> Result<Self, PumpError> {
        match token {
            ":" => Ok(Prompt::Idle),
            ">" => Ok(Prompt::Infusing),
            "<" => Ok(Prompt::Withdrawing),
            "*" => Ok(Prompt::Stalled),
            "T*" => Ok(Prompt::TargetReached),
            other => Err(PumpError::parse("prompt", other)),
        }
    }

    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Prompt::Idle => ":",
            Prompt::Infusing => ">",
            Prompt::Withdrawing => "<",
            Prompt::Stalled => "*",
            Prompt::TargetReached => "T*",
        }
    }

    /// Human readable meaning.
    pub fn message(self) -> &'static str {
        match self {
            Prompt::Idle => "The pump is idle",
            Prompt::Infusing => "The pump is infusing",
            Prompt::Withdrawing => "The pump is withdrawing",
            Prompt::Stalled => "The pump stalled",
            Prompt::TargetReached => "The target was reached",
        }
    }

    /// Alarm prompts are surfaced as errors.
    pub fn is_alarm(self) -> bool {
        matches!(self, Prompt::Stalled)
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
