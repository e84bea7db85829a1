//! Minimal line grammar for the chat protocol.
//!
//! Lines look like `[:prefix] VERB param* [ :trailing]`. Only the verbs the
//! router cares about are interpreted; everything else is reported upward as
//! a diagnostic rather than an error.

/// Parsed form of one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    pub prefix: Option<String>,
    pub verb: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

pub(crate) fn parse(raw: &str) -> Option<Line> {
    let mut rest = raw.trim_end_matches(['\r', '\n']).trim_start();
    if rest.is_empty() {
        return None;
    }

    let prefix = if let Some(stripped) = rest.strip_prefix(':') {
        let (prefix, tail) = stripped.split_once(' ')?;
        rest = tail.trim_start();
        Some(prefix.to_string())
    } else {
        None
    };

    let (head, trailing) = match rest.split_once(" :") {
        Some((head, trailing)) => (head, Some(trailing.to_string())),
        None => (rest, None),
    };

    let mut tokens = head.split_whitespace();
    let verb = tokens.next()?.to_string();
    let params = tokens.map(str::to_string).collect();

    Some(Line {
        prefix,
        verb,
        params,
        trailing,
    })
}

/// Nick portion of a `nick!user@host` prefix.
pub(crate) fn nick_of(prefix: &str) -> &str {
    prefix.split('!').next().unwrap_or(prefix)
}

/// Lowercases and `#`-prefixes a channel name.
pub(crate) fn normalize_channel(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase();
    if name.starts_with('#') {
        name
    } else {
        format!("#{name}")
    }
}

/// Strips line breaks so a payload cannot smuggle extra protocol lines.
pub(crate) fn sanitize(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

pub(crate) fn pass_line(pass: &str) -> String {
    format!("PASS {pass}")
}

pub(crate) fn nick_line(login: &str) -> String {
    format!("NICK {login}")
}

pub(crate) fn join_line(channel: &str) -> String {
    format!("JOIN {channel}")
}

pub(crate) fn part_line(channel: &str) -> String {
    format!("PART {channel}")
}

pub(crate) fn privmsg_line(channel: &str, text: &str) -> String {
    format!("PRIVMSG {channel} :{text}")
}

pub(crate) fn pong_line(payload: &str) -> String {
    if payload.is_empty() {
        "PONG".to_string()
    } else {
        format!("PONG :{payload}")
    }
}
