//! Query-string options and the table of keys each scheme recognizes.
//!
//! Blank values are dropped while parsing, so a key given as `key=` behaves
//! exactly like a missing key. Every default listed below is therefore the
//! "absent or empty" default.

use url::form_urlencoded;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pairs: Vec<(String, String)>,
}

/// A recognized key carrying free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextOption {
    pub key: &'static str,
    pub absent: Option<&'static str>,
}

impl TextOption {
    /// Key with no fallback value.
    pub const fn optional(key: &'static str) -> Self {
        TextOption { key, absent: None }
    }

    pub const fn with_default(key: &'static str, absent: &'static str) -> Self {
        TextOption {
            key,
            absent: Some(absent),
        }
    }
}

/// A recognized key read as a boolean: on when the value equals `on`,
/// `absent` when the key is missing, off for any other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagOption {
    pub key: &'static str,
    pub on: &'static str,
    pub absent: bool,
}

impl QueryOptions {
    pub fn parse(query: &str) -> Self {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            // later duplicates overwrite earlier ones
            match pairs.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value.into_owned(),
                None => pairs.push((key.into_owned(), value.into_owned())),
            }
        }
        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn text(&self, option: TextOption) -> Option<&str> {
        self.get(option.key).or(option.absent)
    }

    pub fn flag(&self, option: FlagOption) -> bool {
        match self.get(option.key) {
            Some(value) => value == option.on,
            None => {
                log::debug!(
                    "query key {} absent, defaulting to {}",
                    option.key,
                    option.absent
                );
                option.absent
            }
        }
    }

    /// Keys present in the query that are not in `known`.
    pub fn unrecognized<'a>(&'a self, known: &'a [&'a str]) -> impl Iterator<Item = &'a str> {
        self.pairs
            .iter()
            .map(|(k, _)| k.as_str())
            .filter(move |k| !known.contains(k))
    }
}

pub mod shadowsocks {
    /// SIP003 plugin; rejected because the emitted record cannot carry it.
    pub const PLUGIN: &str = "plugin";

    pub const KEYS: &[&str] = &[];
}

pub mod vless {
    use super::TextOption;

    pub const SECURITY: TextOption = TextOption::optional("security");
    pub const PUBLIC_KEY: TextOption = TextOption::with_default("pbk", "");
    pub const SHORT_ID: TextOption = TextOption::with_default("sid", "");
    pub const NETWORK: TextOption = TextOption::with_default("type", "tcp");
    pub const SNI: TextOption = TextOption::optional("sni");
    pub const FINGERPRINT: TextOption = TextOption::optional("fp");
    pub const FLOW: TextOption = TextOption::optional("flow");
    pub const WS_PATH: TextOption = TextOption::optional("path");
    pub const WS_HOST: TextOption = TextOption::optional("host");
    pub const GRPC_SERVICE: TextOption = TextOption::optional("serviceName");

    pub const KEYS: &[&str] = &[
        "security",
        "pbk",
        "sid",
        "type",
        "sni",
        "fp",
        "flow",
        "path",
        "host",
        "serviceName",
        // carried by most share links, implied by the emitted record
        "encryption",
    ];
}

pub mod trojan {
    use super::{FlagOption, TextOption};

    // A missing allowInsecure means certificate checks are skipped. Kept for
    // compatibility with existing share links.
    pub const ALLOW_INSECURE: FlagOption = FlagOption {
        key: "allowInsecure",
        on: "1",
        absent: true,
    };
    pub const SNI: TextOption = TextOption::with_default("sni", "");

    pub const KEYS: &[&str] = &["allowInsecure", "sni"];
}

pub mod hysteria2 {
    use super::{FlagOption, TextOption};

    // Same absent-means-insecure behavior as trojan's allowInsecure.
    pub const INSECURE: FlagOption = FlagOption {
        key: "insecure",
        on: "1",
        absent: true,
    };
    pub const SNI: TextOption = TextOption::with_default("sni", "");
    pub const OBFS: TextOption = TextOption::optional("obfs");
    pub const OBFS_PASSWORD: TextOption = TextOption::optional("obfs-password");

    /// The only obfuscation type that is passed through.
    pub const SALAMANDER: &str = "salamander";

    pub const KEYS: &[&str] = &["insecure", "sni", "obfs", "obfs-password"];
}
