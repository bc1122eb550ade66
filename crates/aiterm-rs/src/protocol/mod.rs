//! The tagged reply protocol between the engine and the AI.
//!
//! The model is instructed (see [`PROTOCOL_GUIDE`]) to answer with free
//! text plus a closed set of tagged fields:
//!
//! ```text
//! reply := (text | field)*
//! field := "<" name ">" body "</" name ">"
//! name  := ExecCommand | SendKeys | PasteMultilineContent
//!        | RequestAccomplished | ExecPaneSeemsBusy
//!        | WaitingForUserResponse | NoComment
//! ```
//!
//! [`ResponseParser`] turns a reply into an [`Action`]. Parsing never fails
//! from the caller's point of view: a reply without usable structure becomes
//! a plain message.

pub mod parser;

pub use parser::{ResponseParser, normalize_blank_lines};

/// Tag names understood by the parser.
pub mod tags {
    pub const EXEC_COMMAND: &str = "ExecCommand";
    pub const SEND_KEYS: &str = "SendKeys";
    pub const PASTE_MULTILINE_CONTENT: &str = "PasteMultilineContent";
    pub const REQUEST_ACCOMPLISHED: &str = "RequestAccomplished";
    pub const EXEC_PANE_SEEMS_BUSY: &str = "ExecPaneSeemsBusy";
    pub const WAITING_FOR_USER_RESPONSE: &str = "WaitingForUserResponse";
    pub const NO_COMMENT: &str = "NoComment";

    /// Every known tag, in the order payload tags take precedence.
    pub const ALL: [&str; 7] = [
        EXEC_COMMAND,
        SEND_KEYS,
        PASTE_MULTILINE_CONTENT,
        REQUEST_ACCOMPLISHED,
        EXEC_PANE_SEEMS_BUSY,
        WAITING_FOR_USER_RESPONSE,
        NO_COMMENT,
    ];
}

/// Reply-format instructions embedded in every system prompt.
pub const PROTOCOL_GUIDE: &str = "\
Reply with plain text for the user, plus at most one kind of action expressed \
with these tags (each tag must be closed):

- <ExecCommand>command</ExecCommand>: run a shell command in the exec pane. \
Repeat the tag to run several commands in order.
- <SendKeys>key</SendKeys>: send one key or key name (e.g. `q`, `Enter`, `C-c`) \
to the exec pane. Repeat the tag for a key sequence.
- <PasteMultilineContent>text</PasteMultilineContent>: paste a multi-line block \
verbatim into the exec pane.
- <RequestAccomplished>1</RequestAccomplished>: the user's request is complete.
- <ExecPaneSeemsBusy>1</ExecPaneSeemsBusy>: the exec pane is still busy; wait and look again.
- <WaitingForUserResponse>1</WaitingForUserResponse>: you asked the user a question.
- <NoComment>1</NoComment>: you have nothing to say to the user this turn.

Use only one of ExecCommand, SendKeys or PasteMultilineContent per reply. \
Never wrap tags in code fences.";

/// One turn's decision, parsed from an AI reply.
///
/// At most one of `send_keys`, `exec_command` and `paste_multiline_content`
/// is populated (see [`Action::payload`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Action {
    pub message: String,
    pub send_keys: Vec<String>,
    pub exec_command: Vec<String>,
    pub paste_multiline_content: String,
    pub request_accomplished: bool,
    pub exec_pane_seems_busy: bool,
    pub waiting_for_user_response: bool,
    pub no_comment: bool,
}

impl Action {
    /// A plain message with every other field zero-valued.
    pub fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// The single populated payload, if any.
    pub fn payload(&self) -> Option<Payload> {
        if !self.exec_command.is_empty() {
            Some(Payload::Commands(self.exec_command.clone()))
        } else if !self.send_keys.is_empty() {
            Some(Payload::Keys(self.send_keys.clone()))
        } else if !self.paste_multiline_content.is_empty() {
            Some(Payload::Paste(self.paste_multiline_content.clone()))
        } else {
            None
        }
    }

    /// Whether the user should see [`message`](Self::message).
    pub fn has_visible_message(&self) -> bool {
        !self.no_comment && !self.message.trim().is_empty()
    }
}

/// Something the AI asked the engine to do in the exec pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Commands(Vec<String>),
    Keys(Vec<String>),
    Paste(String),
}

/// What kind of payload is being gated or dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Command,
    Keys,
    Paste,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Command => write!(f, "command"),
            ActionKind::Keys => write!(f, "keys"),
            ActionKind::Paste => write!(f, "paste"),
        }
    }
}
