//! Protocol units and their wire encoding.
//!
//! Every client-to-server unit opens with one string frame, the tag. Known
//! tags are followed by their fields; any other tag is treated as plain
//! broadcast text. Server-to-client traffic is plain string frames, except
//! file deliveries, which open with the reserved `TAG_FILE` string followed
//! by sender, filename, a u64 size and exactly that many raw bytes.
//! Server-composed strings never equal a bare tag, so the reserved word
//! stays unambiguous; a client broadcasting a bare line that collides with
//! a tag must pad it (the reference client appends a space).

use std::io::{Read, Write};

use crate::error::Result;
use crate::net;

pub const TAG_MESSAGE: &str = "MSG";
pub const TAG_FILE: &str = "FILE";
pub const TAG_USERS: &str = "USERS";
pub const TAG_EXIT: &str = "EXIT";

/// Bounds on client-supplied fields. Text leaves headroom for the
/// `"<name>: "` prefix the router prepends, so a relayed frame never
/// exceeds `net::MAX_STRING_LEN`; names and filenames are short enough
/// that every notice embedding them stays under the cap as well.
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_FILENAME_LEN: usize = 1024;
pub const MAX_TEXT_LEN: usize = net::MAX_STRING_LEN as usize - MAX_NAME_LEN - 2;

/// One decoded client-to-server protocol unit.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Directed text for one recipient.
    Message { to: String, text: String },
    /// Directed file transfer. The payload bytes are *not* decoded here:
    /// they are the next `size` bytes on the stream and must be relayed or
    /// drained by the caller before the next unit is read.
    File {
        to: String,
        filename: String,
        size: u64,
    },
    ListUsers,
    Disconnect,
    /// Unaddressed text, fanned out to every other client.
    Broadcast(String),
}

pub fn is_reserved_tag(s: &str) -> bool {
    matches!(s, TAG_MESSAGE | TAG_FILE | TAG_USERS | TAG_EXIT)
}

/// Check field bounds on a decoded unit, returning the reason it must be
/// rejected. A rejected `File` still owes its payload bytes to the stream;
/// the caller has to drain them.
pub fn validate(command: &Command) -> Option<&'static str> {
    match command {
        Command::Message { to, text } => {
            if to.len() > MAX_NAME_LEN {
                Some("recipient name too long")
            } else if text.len() > MAX_TEXT_LEN {
                Some("message text too long")
            } else {
                None
            }
        }
        Command::File { to, filename, .. } => {
            if to.len() > MAX_NAME_LEN {
                Some("recipient name too long")
            } else if filename.len() > MAX_FILENAME_LEN {
                Some("filename too long")
            } else {
                None
            }
        }
        Command::Broadcast(text) if text.len() > MAX_TEXT_LEN => Some("message text too long"),
        _ => None,
    }
}

/// Decode the next protocol unit from `r`.
pub fn read_command<R: Read>(r: &mut R) -> Result<Command> {
    let tag = net::read_string(r)?;
    match tag.as_str() {
        TAG_MESSAGE => Ok(Command::Message {
            to: net::read_string(r)?,
            text: net::read_string(r)?,
        }),
        TAG_FILE => Ok(Command::File {
            to: net::read_string(r)?,
            filename: net::read_string(r)?,
            size: net::read_u64(r)?,
        }),
        TAG_USERS => Ok(Command::ListUsers),
        TAG_EXIT => Ok(Command::Disconnect),
        _ => Ok(Command::Broadcast(tag)),
    }
}

pub fn write_message<W: Write>(w: &mut W, to: &str, text: &str) -> Result<()> {
    net::write_string(w, TAG_MESSAGE)?;
    net::write_string(w, to)?;
    net::write_string(w, text)
}

/// Header of a file transfer, shared by both directions: `name` is the
/// recipient client-to-server and the sender server-to-client. The caller
/// follows it with exactly `size` raw bytes.
pub fn write_file_frame<W: Write>(w: &mut W, name: &str, filename: &str, size: u64) -> Result<()> {
    net::write_string(w, TAG_FILE)?;
    net::write_string(w, name)?;
    net::write_string(w, filename)?;
    net::write_u64(w, size)
}

pub fn write_list_users<W: Write>(w: &mut W) -> Result<()> {
    net::write_string(w, TAG_USERS)
}

pub fn write_disconnect<W: Write>(w: &mut W) -> Result<()> {
    net::write_string(w, TAG_EXIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn message_round_trip() {
        let mut buf = Vec::new();
        write_message(&mut buf, "bob", "hello there").unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(
            read_command(&mut cur).unwrap(),
            Command::Message {
                to: "bob".to_string(),
                text: "hello there".to_string()
            }
        );
    }

    #[test]
    fn file_header_round_trip_leaves_payload_on_the_stream() {
        let mut buf = Vec::new();
        write_file_frame(&mut buf, "bob", "notes.txt", 5).unwrap();
        buf.extend_from_slice(b"12345");
        let mut cur = Cursor::new(buf);
        assert_eq!(
            read_command(&mut cur).unwrap(),
            Command::File {
                to: "bob".to_string(),
                filename: "notes.txt".to_string(),
                size: 5
            }
        );
        let mut payload = Vec::new();
        std::io::Read::read_to_end(&mut cur, &mut payload).unwrap();
        assert_eq!(payload, b"12345");
    }

    #[test]
    fn bare_tags_decode_to_their_commands() {
        for (tag, expected) in [
            (TAG_USERS, Command::ListUsers),
            (TAG_EXIT, Command::Disconnect),
        ] {
            let mut buf = Vec::new();
            net::write_string(&mut buf, tag).unwrap();
            let mut cur = Cursor::new(buf);
            assert_eq!(read_command(&mut cur).unwrap(), expected);
        }
    }

    #[test]
    fn text_at_the_cap_passes_validation_and_over_it_does_not() {
        let at_cap = Command::Message {
            to: "bob".to_string(),
            text: "x".repeat(MAX_TEXT_LEN),
        };
        assert_eq!(validate(&at_cap), None);
        let over = Command::Message {
            to: "bob".to_string(),
            text: "x".repeat(MAX_TEXT_LEN + 1),
        };
        assert_eq!(validate(&over), Some("message text too long"));
        let chatty = Command::Broadcast("y".repeat(MAX_TEXT_LEN + 1));
        assert_eq!(validate(&chatty), Some("message text too long"));
    }

    #[test]
    fn oversized_names_and_filenames_are_rejected() {
        let long_name = Command::Message {
            to: "n".repeat(MAX_NAME_LEN + 1),
            text: "hi".to_string(),
        };
        assert_eq!(validate(&long_name), Some("recipient name too long"));
        let long_filename = Command::File {
            to: "bob".to_string(),
            filename: "f".repeat(MAX_FILENAME_LEN + 1),
            size: 10,
        };
        assert_eq!(validate(&long_filename), Some("filename too long"));
        let fine = Command::File {
            to: "bob".to_string(),
            filename: "notes.txt".to_string(),
            size: 10,
        };
        assert_eq!(validate(&fine), None);
    }

    #[test]
    fn unknown_tag_is_plain_broadcast_text() {
        let mut buf = Vec::new();
        net::write_string(&mut buf, "good morning everyone").unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(
            read_command(&mut cur).unwrap(),
            Command::Broadcast("good morning everyone".to_string())
        );
    }
}
