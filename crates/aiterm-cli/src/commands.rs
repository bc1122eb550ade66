//! Slash command parsing for the chat prompt.

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Command(SlashCommand),
    /// A recognized command used wrongly; the text is the usage hint.
    Usage(&'static str),
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Exit,
    Clear,
    Info,
    Squash,
    Watch(String),
    Config(ConfigAction),
    Kb(KbAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    List,
    Get(String),
    Set { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KbAction {
    List,
    Load(String),
    Unload(String),
}

pub const HELP: &str = "\
Commands:
  /help                     Show this help
  /exit, /quit              Leave aiterm
  /clear                    Start over (keeps knowledge bases and settings)
  /info                     Context usage and session details
  /squash                   Summarize older messages now if context is over 80%
  /watch <goal>             Watch the other panes and suggest things (q/Esc stops)
  /config                   List settings
  /config get <key>         Show one setting
  /config set <key> <value> Override a setting for this session
  /kb                       List knowledge bases
  /kb load <name>           Add a knowledge base to the instructions
  /kb unload <name>         Remove it again
Anything else is sent to the AI.
While waiting: p or space pauses, q or Esc interrupts.";

const WATCH_USAGE: &str = "usage: /watch <goal>";
const CONFIG_USAGE: &str = "usage: /config [get <key> | set <key> <value>]";
const KB_USAGE: &str = "usage: /kb [list | load <name> | unload <name>]";

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(body) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let (name, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
    let rest = rest.trim();
    let command = match name {
        "help" => SlashCommand::Help,
        "exit" | "quit" => SlashCommand::Exit,
        "clear" => SlashCommand::Clear,
        "info" => SlashCommand::Info,
        "squash" => SlashCommand::Squash,
        "watch" if rest.is_empty() => return Input::Usage(WATCH_USAGE),
        "watch" => SlashCommand::Watch(rest.to_string()),
        "config" => match parse_config(rest) {
            Some(action) => SlashCommand::Config(action),
            None => return Input::Usage(CONFIG_USAGE),
        },
        "kb" => match parse_kb(rest) {
            Some(action) => SlashCommand::Kb(action),
            None => return Input::Usage(KB_USAGE),
        },
        _ => return Input::Message(line.to_string()),
    };
    Input::Command(command)
}

fn parse_config(rest: &str) -> Option<ConfigAction> {
    if rest.is_empty() {
        return Some(ConfigAction::List);
    }
    let (verb, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();
    match verb {
        "list" if args.is_empty() => Some(ConfigAction::List),
        "get" if !args.is_empty() && !args.contains(char::is_whitespace) => {
            Some(ConfigAction::Get(args.to_string()))
        }
        "set" => {
            let (key, value) = args.split_once(char::is_whitespace)?;
            let value = value.trim();
            (!value.is_empty()).then(|| ConfigAction::Set {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
        _ => None,
    }
}

fn parse_kb(rest: &str) -> Option<KbAction> {
    let mut words = rest.split_whitespace();
    let action = match (words.next(), words.next()) {
        (None, _) | (Some("list"), None) => KbAction::List,
        (Some("load"), Some(name)) => KbAction::Load(name.to_string()),
        (Some("unload"), Some(name)) => KbAction::Unload(name.to_string()),
        _ => return None,
    };
    words.next().is_none().then_some(action)
}
