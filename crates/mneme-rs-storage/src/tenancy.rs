//! Tenancy key resolution.
//!
//! Every stored value lives under a prefix derived from its subsystem and
//! tenancy fields. Components are escaped so that no identifier can produce
//! another tenant's prefix, and every prefix ends in `/` so that `app` never
//! matches `app2`.

use crate::StorageError;

/// Memory subsystem a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// Per-conversation event logs.
    ShortTerm,
    /// Per-user archive.
    LongTerm,
    /// Per-application shared knowledge.
    Knowledge,
}

impl Subsystem {
    /// Key namespace of this subsystem.
    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::ShortTerm => "short_term",
            Subsystem::LongTerm => "long_term",
            Subsystem::Knowledge => "knowledge",
        }
    }
}

/// Tenancy fields of a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tenancy<'a> {
    pub app: &'a str,
    pub user: Option<&'a str>,
    pub conversation: Option<&'a str>,
}

impl<'a> Tenancy<'a> {
    /// Application scope.
    pub fn app(app: &'a str) -> Self {
        Self {
            app,
            user: None,
            conversation: None,
        }
    }

    /// User scope within an application.
    pub fn user(app: &'a str, user: &'a str) -> Self {
        Self {
            app,
            user: Some(user),
            conversation: None,
        }
    }

    /// Single conversation scope.
    pub fn conversation(app: &'a str, user: &'a str, conversation: &'a str) -> Self {
        Self {
            app,
            user: Some(user),
            conversation: Some(conversation),
        }
    }
}

/// Resolved key namespace for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenancyKey {
    subsystem: Subsystem,
    app: String,
    user: Option<String>,
    prefix: String,
}

impl TenancyKey {
    /// Subsystem this key belongs to.
    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    /// Key prefix; always ends with `/`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Sub-namespace under this prefix (ends with `/`).
    pub fn child_prefix(&self, segment: &str) -> String {
        format!("{}{}/", self.prefix, escape_component(segment))
    }

    /// Full key for a leaf under this prefix, built from escaped segments.
    pub fn key<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let mut key = self.prefix.clone();
        for (idx, segment) in segments.iter().enumerate() {
            if idx > 0 {
                key.push('/');
            }
            key.push_str(&escape_component(segment.as_ref()));
        }
        key
    }

    /// Whether a stored key falls inside this tenant's namespace.
    pub fn contains(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Index/collection name for search engines that need one per tenant.
    pub fn index_name(&self) -> String {
        let raw = match &self.user {
            Some(user) => format!("{}_{}", self.app, user),
            None => self.app.clone(),
        };
        collection_name(&raw)
    }
}

/// Resolve the key namespace for a request.
///
/// Short-term keys need app, user and conversation; long-term keys need app
/// and user; knowledge keys need the app only.
pub fn resolve(subsystem: Subsystem, tenancy: &Tenancy<'_>) -> Result<TenancyKey, StorageError> {
    let app = require_component("app", Some(tenancy.app))?;
    let (user, conversation) = match subsystem {
        Subsystem::ShortTerm => (
            Some(require_component("user", tenancy.user)?),
            Some(require_component("conversation", tenancy.conversation)?),
        ),
        Subsystem::LongTerm => (Some(require_component("user", tenancy.user)?), None),
        Subsystem::Knowledge => (None, None),
    };
    Ok(build_key(subsystem, app, user, conversation))
}

/// Resolve the namespace holding all of a user's conversations for a subsystem.
///
/// Used to enumerate short-term conversations; the returned prefix is a
/// parent of every conversation prefix resolved for the same user.
pub fn resolve_user_scope(
    subsystem: Subsystem,
    app: &str,
    user: &str,
) -> Result<TenancyKey, StorageError> {
    let app = require_component("app", Some(app))?;
    let user = require_component("user", Some(user))?;
    Ok(build_key(subsystem, app, Some(user), None))
}

fn build_key(
    subsystem: Subsystem,
    app: &str,
    user: Option<&str>,
    conversation: Option<&str>,
) -> TenancyKey {
    let mut prefix = format!("{}/{}/", subsystem.as_str(), escape_component(app));
    if let Some(user) = user {
        prefix.push_str(&escape_component(user));
        prefix.push('/');
    }
    if let Some(conversation) = conversation {
        prefix.push_str(&escape_component(conversation));
        prefix.push('/');
    }
    TenancyKey {
        subsystem,
        app: app.to_string(),
        user: user.map(str::to_string),
        prefix,
    }
}

fn require_component<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, StorageError> {
    match value {
        None => Err(StorageError::InvalidTenancy(format!("missing {name}"))),
        Some(value) if value.trim().is_empty() => {
            Err(StorageError::InvalidTenancy(format!("empty {name}")))
        }
        Some(value) if value.chars().any(char::is_control) => Err(StorageError::InvalidTenancy(
            format!("control characters in {name}"),
        )),
        Some(value) => Ok(value),
    }
}

/// Escape a key component so it cannot contain the separator.
pub fn escape_component(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Reverse [`escape_component`].
pub fn unescape_component(escaped: &str) -> String {
    escaped.replace("%2F", "/").replace("%25", "%")
}

/// Lowercased `[a-z0-9_]` collection name.
fn collection_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|ch| if ch == '-' || ch == ' ' { '_' } else { ch })
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '_')
        .collect()
}
