//! Tokenizer for the bridge's plain-text command grammar.

/// One parsed bridge command line. The grammar is case-sensitive and
/// whitespace-delimited; anything that does not match a known form is
/// `Unknown` and left for the bridge to interpret or reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Connect { address: String, port: String },
    Disconnect { address: Option<String> },
    Help,
    Unknown,
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("list") => match tokens.next() {
                None => Command::List,
                Some(_) => Command::Unknown,
            },
            Some("connect") => match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(address), Some(port), None) => Command::Connect {
                    address: address.to_string(),
                    port: port.to_string(),
                },
                _ => Command::Unknown,
            },
            Some("disconnect") => match (tokens.next(), tokens.next()) {
                (None, _) => Command::Disconnect { address: None },
                (Some(address), None) => Command::Disconnect {
                    address: Some(address.to_string()),
                },
                _ => Command::Unknown,
            },
            Some("help") => Command::Help,
            _ => Command::Unknown,
        }
    }
}

const HELP_TEXT: &str = "*** bridge:\n \
*** list -> show all active connections\n \
*** connect {address} {port} -> open an outbound connection\n \
*** disconnect {address} -> close an open connection";

const ERROR_TEXT: &str = "***: command not valid, try *** help";

/// The help text with the bridge's invocation name substituted in.
pub fn help_text(name: &str) -> String {
    HELP_TEXT.replace("***", name)
}

/// The fixed reply for a command line the bridge does not recognize.
pub fn error_text(name: &str) -> String {
    ERROR_TEXT.replace("***", name)
}
