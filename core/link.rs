//! Share-link grammar shared by every scheme parser.
//!
//! A link is taken apart in a fixed order: scheme prefix, fragment, query,
//! authority, userinfo, host and port. The scheme parsers only decide which
//! of these pieces they need and how the credentials inside them are encoded.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use percent_encoding::percent_decode_str;

use crate::options::QueryOptions;
use crate::proxy::Scheme;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("unsupported proxy type: {0}")]
    Unsupported(String),
    #[error("malformed {scheme} url: {reason}")]
    Malformed { scheme: Scheme, reason: String },
}

/// Which `:` separates the host from the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSplit {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkParts<'a> {
    /// Everything between the prefix and the query, trailing `/` removed.
    pub authority: &'a str,
    pub query: QueryOptions,
    /// Decoded fragment, or the scheme's placeholder name.
    pub name: String,
}

impl<'a> LinkParts<'a> {
    /// Splits the authority at the first `@`.
    pub fn userinfo(&self) -> (Option<&'a str>, &'a str) {
        match self.authority.split_once('@') {
            Some((userinfo, rest)) => (Some(userinfo), rest),
            None => (None, self.authority),
        }
    }
}

pub fn split_link(raw: &str, scheme: Scheme) -> Result<LinkParts<'_>, String> {
    let body = raw
        .strip_prefix(scheme.prefix())
        .ok_or_else(|| format!("expected {} prefix", scheme.prefix()))?;

    let (body, fragment) = match body.split_once('#') {
        Some((body, fragment)) => (body, Some(fragment)),
        None => (body, None),
    };
    let (authority, query) = match body.split_once('?') {
        Some((authority, query)) => (authority, QueryOptions::parse(query)),
        None => (body, QueryOptions::default()),
    };
    let authority = authority.strip_suffix('/').unwrap_or(authority);
    if authority.is_empty() {
        return Err("missing server".to_string());
    }

    let name = fragment
        .map(decode_component)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| scheme.default_name().to_string());

    Ok(LinkParts {
        authority,
        query,
        name,
    })
}

pub fn split_host_port(value: &str, split: PortSplit) -> Result<(&str, u16), String> {
    let pair = match split {
        PortSplit::First => value.split_once(':'),
        PortSplit::Last => value.rsplit_once(':'),
    };
    let (host, port) = pair.ok_or_else(|| format!("missing port in {:?}", value))?;
    validate_host(host)?;
    Ok((host, parse_port(port)?))
}

pub fn parse_port(value: &str) -> Result<u16, String> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid port: {:?}", value));
    }
    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("port out of range: {}", value)),
        Ok(port) => Ok(port),
    }
}

pub fn validate_host(host: &str) -> Result<(), String> {
    if host.is_empty() {
        return Err("server is empty".to_string());
    }
    if host
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '@' | '/' | '?' | '#' | ','))
    {
        return Err(format!("invalid server: {:?}", host));
    }
    Ok(())
}

/// Percent-decodes a component; invalid UTF-8 is replaced, never rejected.
pub fn decode_component(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Decodes base64 after padding with `=` to a multiple of four. Share links
/// mix the standard and URL-safe alphabets, so both are tried.
pub fn decode_base64_padded(value: &str) -> Result<Vec<u8>, String> {
    let mut padded = value.trim().to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    STANDARD
        .decode(&padded)
        .or_else(|_| URL_SAFE.decode(&padded))
        .map_err(|e| e.to_string())
}

/// Scheme token of an unsupported line: text before `://`, or the whole line.
pub fn scheme_token(line: &str) -> &str {
    line.split_once("://").map_or(line, |(token, _)| token)
}
