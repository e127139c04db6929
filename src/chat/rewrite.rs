//! Rewriting of external-platform markup into display form.
//!
//! Bodies arrive HTML-escaped, so a user mention typed on the platform as
//! `<@123456789012345678>` reaches us as `&lt;@123456789012345678&gt;`.
//! Four passes run in order: user mentions, role mentions, channel mentions,
//! spoilers. Each pass is one left-to-right scan whose output is never
//! scanned again by the same pass.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};

use crate::config::BridgeConfig;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&lt;@!?([0-9]{17,19})&gt;").expect("valid mention regex"));
static ROLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&lt;@&amp;([0-9]{17,19})&gt;").expect("valid role regex"));
static CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&lt;#([0-9]{17,19})&gt;").expect("valid channel regex"));

const SPOILER_MARK: &str = "||";
const SPOILER_OPEN: &str = "<span class=\"spoiler\">";
const SPOILER_CLOSE: &str = "</span>";

/// Fallback shown for a user ID the resolver does not know.
pub const UNKNOWN_USER: &str = "unknown-user";
/// Fallback shown for a role ID the resolver does not know.
pub const UNKNOWN_ROLE: &str = "unknown-role";
/// Fallback shown for a channel ID the resolver does not know.
pub const UNKNOWN_CHANNEL: &str = "unknown-channel";

/// Resolves external platform IDs to display strings.
///
/// Implementations never fail: an unknown ID yields a placeholder. Returned
/// strings must not contain the token they replace.
pub trait MentionResolver: Send + Sync {
    /// Display name for a user ID.
    fn nickname(&self, id: &str) -> String;
    /// Name of a role ID.
    fn role(&self, id: &str) -> String;
    /// Name of a channel ID.
    fn channel(&self, id: &str) -> String;
}

/// A resolver backed by fixed ID maps.
#[derive(Debug, Clone, Default)]
pub struct DirectoryResolver {
    users: HashMap<String, String>,
    roles: HashMap<String, String>,
    channels: HashMap<String, String>,
}

impl DirectoryResolver {
    /// Create an empty directory. Every lookup falls back to a placeholder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from the bridge configuration maps.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            users: config.users.clone(),
            roles: config.roles.clone(),
            channels: config.channels.clone(),
        }
    }

    pub fn with_user(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.users.insert(id.into(), name.into());
        self
    }

    pub fn with_role(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.roles.insert(id.into(), name.into());
        self
    }

    pub fn with_channel(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.channels.insert(id.into(), name.into());
        self
    }
}

impl MentionResolver for DirectoryResolver {
    fn nickname(&self, id: &str) -> String {
        self.users
            .get(id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_USER.to_string())
    }

    fn role(&self, id: &str) -> String {
        self.roles
            .get(id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_ROLE.to_string())
    }

    fn channel(&self, id: &str) -> String {
        self.channels
            .get(id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_CHANNEL.to_string())
    }
}

/// Rewrites mention, role, channel and spoiler tokens in message bodies.
///
/// Without a resolver the bridge is considered unconfigured and bodies pass
/// through untouched.
#[derive(Clone, Default)]
pub struct TokenRewriter {
    resolver: Option<Arc<dyn MentionResolver>>,
}

impl TokenRewriter {
    /// Create a rewriter using the given resolver.
    pub fn new(resolver: Arc<dyn MentionResolver>) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Create a rewriter that leaves every body unchanged.
    pub fn disabled() -> Self {
        Self { resolver: None }
    }

    /// Build a rewriter from the bridge configuration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        if config.enabled {
            Self::new(Arc::new(DirectoryResolver::from_config(config)))
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.resolver.is_some()
    }

    /// Rewrite a message body for display.
    pub fn rewrite(&self, msg: &str) -> String {
        let Some(resolver) = &self.resolver else {
            return msg.to_string();
        };

        let msg = fill_ids(&MENTION_RE, msg, |id| format!("@{}", resolver.nickname(id)));
        let msg = fill_ids(&ROLE_RE, &msg, |id| format!("@{}", resolver.role(id)));
        let msg = fill_ids(&CHANNEL_RE, &msg, |id| format!("#{}", resolver.channel(id)));
        replace_spoilers(&msg)
    }
}

impl std::fmt::Debug for TokenRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRewriter")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Replace every ID token matched by `re`, resolving each distinct ID once.
fn fill_ids(re: &Regex, msg: &str, mut resolve: impl FnMut(&str) -> String) -> String {
    let mut resolved: HashMap<String, String> = HashMap::new();
    re.replace_all(msg, |caps: &Captures<'_>| {
        let id = &caps[1];
        resolved
            .entry(id.to_string())
            .or_insert_with(|| resolve(id))
            .clone()
    })
    .into_owned()
}

/// Wrap `||text||` in a spoiler span until no spoiler is left.
///
/// A spoiler opens at the start of the body or after a space and closes at
/// the first following `||` that ends the body or precedes a space. The text
/// is non-empty and stays on one line. A span's text can itself hold a
/// complete spoiler (`||a ||x|| b||`), so scans repeat until one replaces
/// nothing. Every replacement consumes two markers.
fn replace_spoilers(msg: &str) -> String {
    let mut out = msg.to_string();
    while let Some(next) = scan_spoilers(&out) {
        out = next;
    }
    out
}

/// One left-to-right scan. Returns None if no spoiler was found.
fn scan_spoilers(msg: &str) -> Option<String> {
    let bytes = msg.as_bytes();
    let mut out = String::with_capacity(msg.len());
    let mut copied = 0;
    let mut pos = 0;

    while let Some(found) = msg[pos..].find(SPOILER_MARK) {
        let open = pos + found;
        let at_boundary = open == 0 || bytes[open - 1] == b' ';
        let text_start = open + SPOILER_MARK.len();

        if at_boundary {
            if let Some(close) = find_spoiler_close(msg, text_start) {
                out.push_str(&msg[copied..open]);
                out.push_str(SPOILER_OPEN);
                out.push_str(&msg[text_start..close]);
                out.push_str(SPOILER_CLOSE);
                copied = close + SPOILER_MARK.len();
                pos = copied;
                continue;
            }
        }
        pos = open + 1;
    }

    if copied == 0 {
        return None;
    }
    out.push_str(&msg[copied..]);
    Some(out)
}

fn find_spoiler_close(msg: &str, text_start: usize) -> Option<usize> {
    let bytes = msg.as_bytes();
    let mut search = text_start;

    while let Some(found) = msg[search..].find(SPOILER_MARK) {
        let close = search + found;
        if msg[text_start..close].contains('\n') {
            return None;
        }
        let after = close + SPOILER_MARK.len();
        if close > text_start && (after == bytes.len() || bytes[after] == b' ') {
            return Some(close);
        }
        search = close + 1;
    }
    None
}
