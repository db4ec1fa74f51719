use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scheme {
    #[serde(rename = "ss")]
    Shadowsocks,
    #[serde(rename = "vless")]
    Vless,
    #[serde(rename = "trojan")]
    Trojan,
    #[serde(rename = "hysteria2")]
    Hysteria2,
}

impl Scheme {
    /// Dispatch priority order.
    pub const ALL: [Scheme; 4] = [
        Scheme::Shadowsocks,
        Scheme::Vless,
        Scheme::Trojan,
        Scheme::Hysteria2,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Scheme::Shadowsocks => "ss://",
            Scheme::Vless => "vless://",
            Scheme::Trojan => "trojan://",
            Scheme::Hysteria2 => "hysteria2://",
        }
    }

    pub fn default_name(self) -> &'static str {
        match self {
            Scheme::Shadowsocks => "SS Proxy",
            Scheme::Vless => "VLESS Proxy",
            Scheme::Trojan => "Trojan Proxy",
            Scheme::Hysteria2 => "Hysteria2 Proxy",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Shadowsocks => "ss",
            Scheme::Vless => "vless",
            Scheme::Trojan => "trojan",
            Scheme::Hysteria2 => "hysteria2",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed proxy endpoint, serialized as a Clash `proxies` entry.
///
/// The `type` key is derived from the attribute bag at construction, so the
/// two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyRecord {
    pub name: String,
    #[serde(rename = "type")]
    scheme: Scheme,
    pub server: String,
    pub port: u16,
    #[serde(flatten)]
    attributes: Attributes,
}

impl ProxyRecord {
    pub fn new(name: String, server: String, port: u16, attributes: Attributes) -> Self {
        Self {
            name,
            scheme: attributes.scheme(),
            server,
            port,
            attributes,
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Attributes {
    Shadowsocks(ShadowsocksAttrs),
    Vless(VlessAttrs),
    Trojan(TrojanAttrs),
    Hysteria2(Hysteria2Attrs),
}

impl Attributes {
    pub fn scheme(&self) -> Scheme {
        match self {
            Attributes::Shadowsocks(_) => Scheme::Shadowsocks,
            Attributes::Vless(_) => Scheme::Vless,
            Attributes::Trojan(_) => Scheme::Trojan,
            Attributes::Hysteria2(_) => Scheme::Hysteria2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowsocksAttrs {
    pub cipher: String,
    pub password: String,
    pub udp: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VlessAttrs {
    pub uuid: String,
    pub udp: bool,
    pub skip_cert_verify: bool,
    pub tls: bool,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servername: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reality_opts: Option<RealityOpts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_opts: Option<WsOpts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grpc_opts: Option<GrpcOpts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RealityOpts {
    pub public_key: String,
    pub short_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WsOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<WsHeaders>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WsHeaders {
    #[serde(rename = "Host")]
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GrpcOpts {
    pub grpc_service_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrojanAttrs {
    pub password: String,
    pub udp: bool,
    pub skip_cert_verify: bool,
    pub sni: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Hysteria2Attrs {
    pub password: String,
    pub skip_cert_verify: bool,
    pub sni: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfs_password: Option<String>,
}
