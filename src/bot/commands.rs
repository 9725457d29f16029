use teloxide::utils::command::BotCommands;

/// Supported commands
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "These commands are supported:")]
pub enum Command {
    /// List all commands
    #[command(description = "List commands supported by this bot.")]
    Commands,
    /// Alias of [`Command::Commands`]
    #[command(description = "Show this help.")]
    Help,
    /// Show entity counts and message metrics
    #[command(description = "List bot statistics.")]
    Stats,
    /// Trigger the bot manually
    #[command(description = "Trigger the bot manually. Reply to a message to answer it.")]
    Mudda,
    /// Show chat settings
    #[command(description = "Show settings for the current chat.")]
    Settings,
    /// Switch antispam on or off
    #[command(description = "Turn antispam on/off: /set_antispam on|off")]
    SetAntispam(String),
    /// Set the trigger probability
    #[command(description = "Set the trigger probability: /set_chance 0.13")]
    SetChance(String),
    /// Ban a user
    #[command(description = "Ban a user: /ban @username")]
    Ban(String),
    /// Lift a ban or timeout
    #[command(description = "Unban a user: /unban @username")]
    Unban(String),
    /// List chat members
    #[command(description = "List known users of this chat.")]
    Users,
    /// Rate the replied-to answer as bad
    #[command(description = "Reply to one of my answers to never give it again.")]
    Bad,
    /// Rate the replied-to answer as good, lifting a bad rating
    #[command(description = "Reply to one of my answers to allow it again.")]
    Good,
    /// Show the bot version
    #[command(description = "Show the bot version.")]
    Version,
    /// Show the effective configuration
    #[command(description = "Show the bot configuration.")]
    Config,
}

impl Command {
    /// Usage line for commands taking an argument
    #[must_use]
    pub const fn usage(&self) -> &'static str {
        match self {
            Self::SetAntispam(_) => "/set_antispam on|off",
            Self::SetChance(_) => "/set_chance <probability between 0 and 1, e.g. 0.13>",
            Self::Ban(_) => "/ban <@username|user id>",
            Self::Unban(_) => "/unban <@username|user id>",
            Self::Bad => "reply to one of my answers with /bad",
            Self::Good => "reply to one of my answers with /good",
            Self::Commands
            | Self::Help
            | Self::Stats
            | Self::Mudda
            | Self::Settings
            | Self::Users
            | Self::Version
            | Self::Config => "",
        }
    }
}

/// Whether `text` looks like a bot command
#[must_use]
pub fn is_command(text: &str) -> bool {
    text.starts_with('/') && text.len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("/set_chance 0.5", "mudda_bot").ok(),
            Some(Command::SetChance("0.5".to_string()))
        );
        assert_eq!(
            Command::parse("/set_antispam@mudda_bot off", "mudda_bot").ok(),
            Some(Command::SetAntispam("off".to_string()))
        );
        assert_eq!(
            Command::parse("/ban", "mudda_bot").ok(),
            Some(Command::Ban(String::new()))
        );
        assert_eq!(Command::parse("/mudda", "mudda_bot").ok(), Some(Command::Mudda));
        assert_eq!(Command::parse("/bad", "mudda_bot").ok(), Some(Command::Bad));
        assert!(Command::parse("/unknown", "mudda_bot").is_err());
    }

    #[test]
    fn test_descriptions_list_every_command() {
        let descriptions = Command::descriptions().to_string();
        for name in ["/commands", "/stats", "/set_antispam", "/set_chance", "/unban", "/bad", "/good", "/config"] {
            assert!(descriptions.contains(name), "{name} missing");
        }
    }

    #[test]
    fn test_is_command() {
        assert!(is_command("/foo"));
        assert!(!is_command("/"));
        assert!(!is_command("deine mudda"));
    }
}
