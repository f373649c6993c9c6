//! Prompt commands
//!
//! A plain line is a chat message; lines starting with `/` are commands.

use agent_chat_core::AgentId;

/// Action requested from the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(String),
    SwitchAgent(AgentId),
    ReloadHistory,
    Metrics,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Usage: /agent <id>")]
    MissingAgentId,

    #[error("Unknown command: /{0} (try /help)")]
    Unknown(String),
}

pub const HELP: &str = "\
/agent <id>   switch to another agent
/history      reload the transcript from the server
/metrics      show usage and cost
/help         show this help
/quit         exit";

impl Command {
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            return Ok(Command::Send(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or("");
        match name {
            "agent" => parts
                .next()
                .map(|id| Command::SwitchAgent(AgentId::new(id)))
                .ok_or(CommandError::MissingAgentId),
            "history" => Ok(Command::ReloadHistory),
            "metrics" => Ok(Command::Metrics),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
