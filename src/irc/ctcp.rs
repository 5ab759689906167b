//! CTCP framing inside PRIVMSG/NOTICE text.

pub const DELIMITER: char = '\x01';

pub fn is_ctcp(text: &str) -> bool {
    text.starts_with(DELIMITER)
}

/// Wrap a payload, e.g. `VERSION` becomes `\x01VERSION\x01`.
pub fn encode(payload: &str) -> String {
    format!("{DELIMITER}{payload}{DELIMITER}")
}

/// Strip every delimiter byte from the text.
pub fn decode(text: &str) -> String {
    text.replace(DELIMITER, "")
}
