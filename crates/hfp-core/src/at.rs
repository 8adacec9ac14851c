//! Decoding of unsolicited AT responses from the audio gateway
//!
//! The engine interprets three response forms when the transport surfaces
//! raw lines: `+CLCC` (current call list), `+COPS` (operator selection) and
//! `+CLIP` (calling line identification). Parsing is tolerant: surrounding
//! whitespace and CR/LF are ignored, quotes are stripped, and anything
//! malformed yields `None` rather than an error. These functions never touch
//! engine state.

use crate::call::{CallDirection, CallInfo, CallStatus};

/// Strip one pair of surrounding double quotes, plus whitespace
fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(field)
}

/// Strip the line's prefix (e.g. `+CLCC:`) and return the payload
fn payload<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.trim().strip_prefix(prefix).map(str::trim)
}

/// Parse a `+CLCC: <idx>,<dir>,<stat>,<mode>,<mpty>[,"<number>",<type>]` line
///
/// Returns a call record carrying the gateway's index, direction, status and
/// (when present) the unquoted number.
pub fn parse_clcc(line: &str) -> Option<CallInfo> {
    let body = payload(line, "+CLCC:")?;
    let fields: Vec<&str> = body.split(',').map(str::trim).collect();
    if fields.len() < 5 {
        return None;
    }

    let index: u32 = fields[0].parse().ok()?;
    let direction = match fields[1].parse::<u8>().ok()? {
        0 => CallDirection::Outgoing,
        1 => CallDirection::Incoming,
        _ => return None,
    };
    let status = match fields[2].parse::<u8>().ok()? {
        0 => CallStatus::Active,
        1 => CallStatus::Held,
        2 => CallStatus::Dialing,
        3 => CallStatus::Alerting,
        4 => CallStatus::Incoming,
        5 => CallStatus::Waiting,
        _ => CallStatus::Idle,
    };
    let number = fields
        .get(5)
        .map(|f| unquote(f))
        .filter(|n| !n.is_empty())
        .map(str::to_owned);

    let mut call = CallInfo::new(direction, status, number);
    call.index = index;
    Some(call)
}

/// Parse a `+COPS: <mode>,<format>,"<oper>"` line into the operator name
pub fn parse_cops(line: &str) -> Option<String> {
    let body = payload(line, "+COPS:")?;
    let fields: Vec<&str> = body.split(',').map(str::trim).collect();
    if fields.len() < 3 {
        return None;
    }
    let name = unquote(fields[2]);
    if name.is_empty() {
        return None;
    }
    Some(name.to_owned())
}

/// Parse a `+CLIP: "<number>",<type>[,<sub>,<satype>[,"<alpha>"]]` line
///
/// Returns the caller's number and, when the fifth field is non-empty, the
/// caller's name.
pub fn parse_clip(line: &str) -> Option<(String, Option<String>)> {
    let body = payload(line, "+CLIP:")?;
    let fields: Vec<&str> = body.split(',').map(str::trim).collect();
    if fields.len() < 2 {
        return None;
    }
    let number = unquote(fields[0]);
    if number.is_empty() {
        return None;
    }
    let name = fields
        .get(4)
        .map(|f| unquote(f))
        .filter(|n| !n.is_empty())
        .map(str::to_owned);
    Some((number.to_owned(), name))
}
