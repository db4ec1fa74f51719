use std::collections::{HashMap, HashSet};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::proxy::ProxyRecord;
use crate::template::{GeneralSettings, RoutingTemplate, Rule, RuleProvider, DIRECT, REJECT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClashConfig {
    #[serde(flatten)]
    pub general: GeneralSettings,
    pub proxies: Vec<ProxyRecord>,
    #[serde(rename = "proxy-groups")]
    pub proxy_groups: Vec<ProxyGroup>,
    #[serde(rename = "rule-providers", serialize_with = "serialize_providers")]
    pub rule_providers: Vec<RuleProvider>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyGroup {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: GroupKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    pub proxies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupKind {
    #[serde(rename = "select")]
    Select,
    #[serde(rename = "url-test")]
    UrlTest,
}

pub fn build_clash_config(
    mut proxies: Vec<ProxyRecord>,
    template: &RoutingTemplate,
) -> ClashConfig {
    let [select, url_test] = template.group_names();
    disambiguate_names(&mut proxies, &[DIRECT, REJECT, select, url_test]);

    let names: Vec<String> = proxies.iter().map(|p| p.name.clone()).collect();

    ClashConfig {
        general: template.general.clone(),
        proxies,
        proxy_groups: build_groups(&names, template),
        rule_providers: template.rule_providers.clone(),
        rules: template.rules.clone(),
    }
}

/// Renames repeated display names to `"<name> 2"`, `"<name> 3"`, ... in
/// input order. The first occurrence keeps its name unless it is one of the
/// `reserved` routing targets, which count as already used. A generated name
/// that is already taken is skipped, so the result never contains duplicates.
pub fn disambiguate_names(proxies: &mut [ProxyRecord], reserved: &[&str]) {
    let mut taken: HashSet<String> = proxies.iter().map(|p| p.name.clone()).collect();
    taken.extend(reserved.iter().map(|name| name.to_string()));
    let mut seen: HashSet<String> = reserved.iter().map(|name| name.to_string()).collect();
    let mut counters: HashMap<String, usize> = HashMap::new();

    for proxy in proxies.iter_mut() {
        if seen.insert(proxy.name.clone()) {
            continue;
        }
        let counter = counters.entry(proxy.name.clone()).or_insert(1);
        let renamed = loop {
            *counter += 1;
            let candidate = format!("{} {}", proxy.name, counter);
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        log::debug!("renaming duplicate proxy {:?} to {:?}", proxy.name, renamed);
        taken.insert(renamed.clone());
        seen.insert(renamed.clone());
        proxy.name = renamed;
    }
}

fn build_groups(names: &[String], template: &RoutingTemplate) -> Vec<ProxyGroup> {
    let groups = &template.groups;
    let mut selectable = Vec::with_capacity(names.len() + 1);
    selectable.push(DIRECT.to_string());
    selectable.extend(names.iter().cloned());

    vec![
        ProxyGroup {
            name: groups.select.clone(),
            kind: GroupKind::Select,
            url: None,
            interval: None,
            proxies: selectable,
        },
        ProxyGroup {
            name: groups.url_test.clone(),
            kind: GroupKind::UrlTest,
            url: Some(groups.test_url.clone()),
            interval: Some(groups.test_interval),
            proxies: names.to_vec(),
        },
    ]
}

fn serialize_providers<S>(providers: &[RuleProvider], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(providers.len()))?;
    for provider in providers {
        map.serialize_entry(&provider.name, provider)?;
    }
    map.end()
}

pub fn render_yaml(config: &ClashConfig) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatch_line;
    use crate::template::default_template;

    fn record(line: &str) -> ProxyRecord {
        dispatch_line(line).expect("valid line")
    }

    fn names(config: &ClashConfig) -> Vec<&str> {
        config.proxies.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn duplicate_names_get_counters() {
        let proxies = vec![
            record("trojan://a@a.com:443#Node"),
            record("trojan://b@b.com:443#Other"),
            record("trojan://c@c.com:443#Node"),
            record("trojan://d@d.com:443#Node"),
        ];
        let config = build_clash_config(proxies, default_template().unwrap());
        assert_eq!(names(&config), vec!["Node", "Other", "Node 2", "Node 3"]);
    }

    #[test]
    fn generated_name_never_collides() {
        let proxies = vec![
            record("trojan://a@a.com:443#Node"),
            record("trojan://b@b.com:443#Node"),
            record("trojan://c@c.com:443#Node 2"),
        ];
        let config = build_clash_config(proxies, default_template().unwrap());
        assert_eq!(names(&config), vec!["Node", "Node 3", "Node 2"]);
    }

    #[test]
    fn proxy_names_avoid_routing_targets() {
        let proxies = vec![
            record("trojan://a@a.com:443#DIRECT"),
            record("trojan://b@b.com:443#PROXY"),
            record("trojan://c@c.com:443#DIRECT"),
            record("trojan://d@d.com:443#AUTO"),
        ];
        let config = build_clash_config(proxies, default_template().unwrap());
        assert_eq!(names(&config), vec!["DIRECT 2", "PROXY 2", "DIRECT 3", "AUTO 2"]);
        let select = &config.proxy_groups[0];
        assert_eq!(
            select.proxies,
            vec!["DIRECT", "DIRECT 2", "PROXY 2", "DIRECT 3", "AUTO 2"]
        );
        let group_names: Vec<&str> = config
            .proxy_groups
            .iter()
            .map(|g| g.name.as_str())
            .collect();
        for proxy in &config.proxies {
            assert!(!group_names.contains(&proxy.name.as_str()));
        }
    }

    #[test]
    fn disambiguation_is_idempotent() {
        let mut proxies = vec![
            record("trojan://a@a.com:443#Node"),
            record("trojan://b@b.com:443#Node"),
        ];
        disambiguate_names(&mut proxies, &[DIRECT, REJECT]);
        let once: Vec<String> = proxies.iter().map(|p| p.name.clone()).collect();
        disambiguate_names(&mut proxies, &[DIRECT, REJECT]);
        let twice: Vec<String> = proxies.iter().map(|p| p.name.clone()).collect();
        assert_eq!(once, vec!["Node", "Node 2"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn groups_cover_every_proxy() {
        let proxies = vec![
            record("hysteria2://h.com#H"),
            record("vless://id@v.com:443#V"),
        ];
        let config = build_clash_config(proxies, default_template().unwrap());
        let select = &config.proxy_groups[0];
        assert_eq!(select.name, "PROXY");
        assert_eq!(select.kind, GroupKind::Select);
        assert_eq!(select.proxies, vec!["DIRECT", "H", "V"]);
        let auto = &config.proxy_groups[1];
        assert_eq!(auto.name, "AUTO");
        assert_eq!(auto.kind, GroupKind::UrlTest);
        assert_eq!(auto.interval, Some(300));
        assert_eq!(
            auto.url.as_deref(),
            Some("http://www.gstatic.com/generate_204")
        );
        assert_eq!(auto.proxies, vec!["H", "V"]);
    }

    #[test]
    fn empty_input_still_builds_a_document() {
        let config = build_clash_config(Vec::new(), default_template().unwrap());
        assert!(config.proxies.is_empty());
        assert_eq!(config.proxy_groups[0].proxies, vec!["DIRECT"]);
        assert!(config.proxy_groups[1].proxies.is_empty());
        assert!(config.rules.last().unwrap().is_match());
        assert!(render_yaml(&config).is_ok());
    }

    #[test]
    fn yaml_keeps_top_level_order() {
        let config = build_clash_config(
            vec![record("ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@1.2.3.4:8388#节点")],
            default_template().unwrap(),
        );
        let yaml = render_yaml(&config).unwrap();
        let keys: Vec<&str> = yaml
            .lines()
            .filter(|l| !l.starts_with(' ') && !l.starts_with('-') && l.contains(':'))
            .map(|l| l.split(':').next().unwrap())
            .collect();
        assert_eq!(
            keys,
            vec![
                "port",
                "socks-port",
                "redir-port",
                "allow-lan",
                "mode",
                "log-level",
                "external-controller",
                "proxies",
                "proxy-groups",
                "rule-providers",
                "rules",
            ]
        );
        assert!(yaml.contains("节点"));
        assert!(yaml.contains("  AD:\n    type: http\n    behavior: domain\n"));
        assert!(yaml.trim_end().ends_with("- MATCH,PROXY"));
    }
}
