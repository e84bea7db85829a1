use cb_core::events::{
    ChatMessageEvent, CommandEvent, MembershipAction, MembershipEvent, RawLineEvent,
    RoomStateEvent, RoomStateKind, UserStateEvent,
};

use crate::proto;

/// Classified inbound line. `Welcome`, `AuthFailure` and `Ping` are control
/// results consumed by the connection manager; the rest become bus events.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Chat(ChatMessageEvent),
    Command(CommandEvent),
    RoomState(RoomStateEvent),
    UserState(UserStateEvent),
    Membership(MembershipEvent),
    Welcome,
    AuthFailure(String),
    Ping(String),
    Raw(RawLineEvent),
}

/// Splits protocol control lines from chat messages and matches chat text
/// against the registered command triggers. The trigger set is fixed at
/// construction; matching is longest-prefix with ties broken by
/// first-registered order.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    triggers: Vec<String>,
}

impl CommandRouter {
    pub fn new(triggers: Vec<String>) -> Self {
        Self { triggers }
    }

    pub fn route(&self, raw: &str) -> Vec<Routed> {
        let Some(line) = proto::parse(raw) else {
            return vec![diagnostic(raw, "unparseable line")];
        };

        match line.verb.as_str() {
            "001" => vec![Routed::Welcome],
            "PING" => {
                let payload = line
                    .trailing
                    .or_else(|| line.params.first().cloned())
                    .unwrap_or_default();
                vec![Routed::Ping(payload)]
            }
            "PONG" => Vec::new(),
            "PRIVMSG" => self.route_privmsg(raw, &line),
            "JOIN" | "PART" => route_membership(raw, &line),
            "ROOMSTATE" => route_roomstate(raw, &line),
            "USERSTATE" => route_userstate(raw, &line),
            "NOTICE" => route_notice(raw, &line),
            _ => vec![diagnostic(raw, "unhandled verb")],
        }
    }

    fn route_privmsg(&self, raw: &str, line: &proto::Line) -> Vec<Routed> {
        let sender = line.prefix.as_deref().map(proto::nick_of);
        let channel = line.params.first();
        let text = line.trailing.as_deref();
        let (Some(sender), Some(channel), Some(text)) = (sender, channel, text) else {
            return vec![diagnostic(raw, "malformed privmsg")];
        };

        match self.match_trigger(text) {
            Some(trigger) => vec![Routed::Command(CommandEvent {
                channel: channel.clone(),
                sender: sender.to_string(),
                trigger: trigger.to_string(),
                args: text[trigger.len()..].trim_start().to_string(),
            })],
            None => vec![Routed::Chat(ChatMessageEvent {
                channel: channel.clone(),
                sender: sender.to_string(),
                text: text.to_string(),
            })],
        }
    }

    /// Longest registered prefix of `text`; the first-registered trigger
    /// wins among equal lengths.
    fn match_trigger(&self, text: &str) -> Option<&str> {
        let mut best: Option<&str> = None;
        for trigger in &self.triggers {
            if text.starts_with(trigger.as_str())
                && best.is_none_or(|current| trigger.len() > current.len())
            {
                best = Some(trigger);
            }
        }
        best
    }
}

fn route_membership(raw: &str, line: &proto::Line) -> Vec<Routed> {
    let user = line.prefix.as_deref().map(proto::nick_of);
    let channel = line
        .params
        .first()
        .cloned()
        .or_else(|| line.trailing.clone());
    let (Some(user), Some(channel)) = (user, channel) else {
        return vec![diagnostic(raw, "membership line without prefix or channel")];
    };
    let action = if line.verb == "JOIN" {
        MembershipAction::Joined
    } else {
        MembershipAction::Parted
    };
    vec![Routed::Membership(MembershipEvent {
        channel,
        user: user.to_string(),
        action,
    })]
}

fn route_roomstate(raw: &str, line: &proto::Line) -> Vec<Routed> {
    let Some(channel) = line.params.first() else {
        return vec![diagnostic(raw, "roomstate without channel")];
    };

    let mut routed = Vec::new();
    for pair in &line.params[1..] {
        let Some((key, value)) = pair.split_once('=') else {
            routed.push(diagnostic(raw, "roomstate entry is not key=value"));
            continue;
        };
        let Some(kind) = RoomStateKind::from_key(key) else {
            routed.push(diagnostic(raw, "unknown roomstate key"));
            continue;
        };
        let Ok(value) = value.parse::<i64>() else {
            routed.push(diagnostic(raw, "roomstate value is not numeric"));
            continue;
        };
        routed.push(Routed::RoomState(RoomStateEvent {
            channel: channel.clone(),
            kind,
            value,
        }));
    }
    if routed.is_empty() {
        routed.push(diagnostic(raw, "roomstate without state entries"));
    }
    routed
}

fn route_userstate(raw: &str, line: &proto::Line) -> Vec<Routed> {
    let Some(channel) = line.params.first() else {
        return vec![diagnostic(raw, "userstate without channel")];
    };

    let mut routed = Vec::new();
    for pair in &line.params[1..] {
        let Some((key, value)) = pair.split_once('=') else {
            routed.push(diagnostic(raw, "userstate entry is not key=value"));
            continue;
        };
        routed.push(Routed::UserState(UserStateEvent {
            channel: channel.clone(),
            key: key.to_string(),
            value: value.to_string(),
        }));
    }
    if routed.is_empty() {
        routed.push(diagnostic(raw, "userstate without state entries"));
    }
    routed
}

fn route_notice(raw: &str, line: &proto::Line) -> Vec<Routed> {
    let text = line.trailing.clone().unwrap_or_default();
    if text.contains("Login authentication failed")
        || text.contains("Improperly formatted auth")
    {
        vec![Routed::AuthFailure(text)]
    } else {
        vec![diagnostic(raw, "unhandled notice")]
    }
}

fn diagnostic(raw: &str, reason: &str) -> Routed {
    Routed::Raw(RawLineEvent {
        line: raw.to_string(),
        reason: reason.to_string(),
    })
}
