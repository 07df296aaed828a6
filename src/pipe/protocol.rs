//! Parser for the three-line wire format.

use super::{ParseError, PipeMessage};
use crate::controller::{Action, Axis, Button, Stick};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Result of reading one message from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Message(PipeMessage),
    /// Blank first line, nothing to do.
    Skipped,
    Malformed(ParseError),
    /// The writer closed its end.
    Eof,
}

/// Parses the three lines of a message (already stripped of line endings).
///
/// Line 2 decides the kind: `press`/`release` make a button message and line 3
/// is ignored, `x`/`y` make an analog message with line 3 as the value.
pub fn parse_message(name: &str, token: &str, value: &str) -> Result<PipeMessage, ParseError> {
    if let Ok(action) = token.parse::<Action>() {
        let button: Button = name.parse()?;
        return Ok(PipeMessage::Button { button, action });
    }

    if let Ok(axis) = token.parse::<Axis>() {
        let stick: Stick = name.parse()?;
        let parsed: f32 = value
            .parse()
            .map_err(|_| ParseError::InvalidValue(value.to_string()))?;
        if !parsed.is_finite() {
            return Err(ParseError::InvalidValue(value.to_string()));
        }
        return Ok(PipeMessage::analog(stick, axis, parsed));
    }

    Err(ParseError::UnknownFormat {
        name: name.to_string(),
        token: token.to_string(),
    })
}

async fn next_line<R>(reader: &mut R, buf: &mut String) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_line(buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim().to_string()))
}

/// Reads one message. Only I/O failures are returned as errors; a bad message
/// is reported as [`ReadOutcome::Malformed`] so the caller can keep reading.
pub async fn read_message<R>(reader: &mut R, buf: &mut String) -> io::Result<ReadOutcome>
where
    R: AsyncBufRead + Unpin,
{
    let Some(name) = next_line(reader, buf).await? else {
        return Ok(ReadOutcome::Eof);
    };
    if name.is_empty() {
        return Ok(ReadOutcome::Skipped);
    }

    let Some(token) = next_line(reader, buf).await? else {
        return Ok(ReadOutcome::Malformed(ParseError::Incomplete("line 2")));
    };
    if token.is_empty() {
        return Ok(ReadOutcome::Malformed(ParseError::Incomplete("line 2")));
    }

    let value = match next_line(reader, buf).await? {
        Some(value) => value,
        // button messages do not need a value
        None if token.parse::<Action>().is_ok() => String::new(),
        None => return Ok(ReadOutcome::Malformed(ParseError::Incomplete("line 3"))),
    };

    Ok(match parse_message(&name, &token, &value) {
        Ok(message) => ReadOutcome::Message(message),
        Err(e) => ReadOutcome::Malformed(e),
    })
}
