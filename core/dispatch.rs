use crate::link::{scheme_token, LinkError};
use crate::proxy::{ProxyRecord, Scheme};
use crate::schemes::{parse_hysteria2, parse_shadowsocks, parse_trojan, parse_vless};

/// Outcome for one non-blank input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    /// 1-based line number in the original text.
    pub line_no: usize,
    pub line: String,
    pub result: Result<ProxyRecord, LinkError>,
}

impl ParseOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn message(&self) -> String {
        match &self.result {
            Ok(_) => format!("Success: {}", self.line),
            Err(err) => format!("Failed to parse line {}: {} ({})", self.line_no, self.line, err),
        }
    }
}

/// Per-line outcomes, always in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<ParseOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ParseOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn records(&self) -> impl Iterator<Item = &ProxyRecord> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }
}

pub fn dispatch_line(line: &str) -> Result<ProxyRecord, LinkError> {
    let line = line.trim();
    let scheme = Scheme::ALL
        .into_iter()
        .find(|scheme| line.starts_with(scheme.prefix()))
        .ok_or_else(|| LinkError::Unsupported(scheme_token(line).to_string()))?;

    match scheme {
        Scheme::Shadowsocks => parse_shadowsocks(line),
        Scheme::Vless => parse_vless(line),
        Scheme::Trojan => parse_trojan(line),
        Scheme::Hysteria2 => parse_hysteria2(line),
    }
}

/// Parses newline-delimited share links. Blank lines are skipped; every other
/// line yields exactly one outcome.
pub fn parse_proxy_list(text: &str) -> BatchReport {
    let mut outcomes = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let result = dispatch_line(line);
        match &result {
            Ok(record) => log::debug!(
                "line {}: parsed {} proxy {:?}",
                idx + 1,
                record.scheme(),
                record.name
            ),
            Err(err) => log::warn!("line {}: {}", idx + 1, err),
        }
        outcomes.push(ParseOutcome {
            line_no: idx + 1,
            line: line.to_string(),
            result,
        });
    }
    BatchReport { outcomes }
}
