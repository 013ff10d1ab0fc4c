use anyhow::Result;

use crate::app::App;
use crate::models::PeerId;

pub const HELP_TEXT: &str =
    "/search <name>  /open <user id>  /link <url>  /refresh  |  Tab focus  Ctrl+R refresh  Ctrl+Q quit";

pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim_start().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let name = parts.next()?.to_lowercase();
        let args = parts.map(|s| s.to_string()).collect();

        Some(Command { name, args })
    }
}

/// What a slash command asks the app to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Search(String),
    Open(PeerId),
    Link(String),
    Refresh,
    Help,
    /// Known command with bad arguments; carries the usage line.
    Usage(&'static str),
}

impl Action {
    pub fn from_command(cmd: &Command) -> Option<Self> {
        let action = match cmd.name.as_str() {
            "search" | "s" => Action::Search(cmd.args.join(" ")),
            "open" | "o" => match cmd.args.first().map(|a| a.parse::<PeerId>()) {
                Some(Ok(id)) if id.0 > 0 => Action::Open(id),
                _ => Action::Usage("Usage: /open <user id>"),
            },
            "link" => match cmd.args.first() {
                Some(url) => Action::Link(url.clone()),
                None => Action::Usage("Usage: /link <url with ?user_id=N>"),
            },
            "refresh" | "r" => Action::Refresh,
            "help" | "h" | "?" => Action::Help,
            _ => return None,
        };
        Some(action)
    }
}

pub struct CommandHandler;

impl CommandHandler {
    /// Run `text` as a slash command. Returns false when it is not one.
    pub async fn handle(app: &mut App, text: &str) -> Result<bool> {
        let cmd = match Command::parse(text) {
            Some(c) => c,
            None => return Ok(false),
        };
        let action = match Action::from_command(&cmd) {
            Some(a) => a,
            None => {
                app.notify(&format!("Unknown command: /{}", cmd.name));
                return Ok(true);
            }
        };
        crate::debug_log!("commands: {:?}", action);

        match action {
            Action::Search(query) => app.start_search(query).await,
            Action::Open(id) => app.open_peer(id),
            Action::Link(url) => app.follow_link(url),
            Action::Refresh => app.refresh(),
            Action::Help => app.notify_with_duration(HELP_TEXT, 8),
            Action::Usage(usage) => app.notify(usage),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(text: &str) -> Option<Action> {
        Command::parse(text).and_then(|c| Action::from_command(&c))
    }

    #[test]
    fn test_parse_splits_name_and_args() {
        let cmd = Command::parse("/search  dark   knight ").unwrap();
        assert_eq!(cmd.name, "search");
        assert_eq!(cmd.args, vec!["dark", "knight"]);
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert!(Command::parse("gg wp").is_none());
        assert!(Command::parse("/").is_none());
        assert!(Command::parse("").is_none());
    }

    #[test]
    fn test_actions() {
        assert_eq!(action("/s dark knight"), Some(Action::Search("dark knight".to_string())));
        assert_eq!(action("/open 42"), Some(Action::Open(PeerId(42))));
        assert_eq!(
            action("/link https://squad.example/messages?user_id=3"),
            Some(Action::Link("https://squad.example/messages?user_id=3".to_string()))
        );
        assert_eq!(action("/Refresh"), Some(Action::Refresh));
        assert_eq!(action("/help"), Some(Action::Help));
        assert_eq!(action("/dance"), None);
    }

    #[test]
    fn test_bad_arguments_yield_usage() {
        assert!(matches!(action("/open"), Some(Action::Usage(_))));
        assert!(matches!(action("/open bob"), Some(Action::Usage(_))));
        assert!(matches!(action("/open 0"), Some(Action::Usage(_))));
        assert!(matches!(action("/link"), Some(Action::Usage(_))));
    }
}
