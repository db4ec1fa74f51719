//! Parsers for the four supported share-link schemes.
//!
//! Each public parser returns either a complete `ProxyRecord` or a
//! `LinkError::Malformed` naming the scheme; nothing is partially filled in.

use crate::link::{
    decode_base64_padded, decode_component, parse_port, split_host_port, split_link,
    validate_host, LinkError, LinkParts, PortSplit,
};
use crate::options::{self, QueryOptions};
use crate::proxy::{
    Attributes, GrpcOpts, Hysteria2Attrs, ProxyRecord, RealityOpts, Scheme, ShadowsocksAttrs,
    TrojanAttrs, VlessAttrs, WsHeaders, WsOpts,
};

const HYSTERIA2_DEFAULT_PORT: u16 = 443;

pub fn parse_shadowsocks(raw: &str) -> Result<ProxyRecord, LinkError> {
    shadowsocks(raw).map_err(malformed(Scheme::Shadowsocks))
}

pub fn parse_vless(raw: &str) -> Result<ProxyRecord, LinkError> {
    vless(raw).map_err(malformed(Scheme::Vless))
}

pub fn parse_trojan(raw: &str) -> Result<ProxyRecord, LinkError> {
    trojan(raw).map_err(malformed(Scheme::Trojan))
}

pub fn parse_hysteria2(raw: &str) -> Result<ProxyRecord, LinkError> {
    hysteria2(raw).map_err(malformed(Scheme::Hysteria2))
}

fn malformed(scheme: Scheme) -> impl Fn(String) -> LinkError {
    move |reason| LinkError::Malformed { scheme, reason }
}

fn shadowsocks(raw: &str) -> Result<ProxyRecord, String> {
    let parts = split_link(raw, Scheme::Shadowsocks)?;
    if parts.query.contains(options::shadowsocks::PLUGIN) {
        return Err("plugin parameters are not supported".to_string());
    }
    log_unrecognized(&parts, Scheme::Shadowsocks, options::shadowsocks::KEYS);

    let (userinfo, hostport) = parts.userinfo();
    let userinfo = userinfo.ok_or_else(|| "missing '@' before server".to_string())?;
    let (cipher, password) = shadowsocks_credentials(userinfo)?;
    let (server, port) = split_host_port(hostport, PortSplit::First)?;

    Ok(ProxyRecord::new(
        parts.name,
        server.to_string(),
        port,
        Attributes::Shadowsocks(ShadowsocksAttrs {
            cipher,
            password,
            udp: true,
        }),
    ))
}

/// `method:password` in the clear, or the same text base64 encoded.
fn shadowsocks_credentials(userinfo: &str) -> Result<(String, String), String> {
    let plain = if userinfo.contains(':') {
        userinfo.to_string()
    } else {
        let decoded = decode_base64_padded(&decode_component(userinfo))
            .map_err(|e| format!("credentials are not valid base64: {}", e))?;
        String::from_utf8(decoded).map_err(|_| "decoded credentials are not UTF-8".to_string())?
    };

    let (method, password) = plain
        .split_once(':')
        .ok_or_else(|| "credentials missing ':' between method and password".to_string())?;
    if method.is_empty() {
        return Err("cipher method is empty".to_string());
    }
    Ok((method.to_string(), password.to_string()))
}

fn vless(raw: &str) -> Result<ProxyRecord, String> {
    use crate::options::vless as opt;

    let parts = split_link(raw, Scheme::Vless)?;
    log_unrecognized(&parts, Scheme::Vless, opt::KEYS);

    let (uuid, hostport) = parts.userinfo();
    let uuid = uuid
        .filter(|uuid| !uuid.is_empty())
        .ok_or_else(|| "missing uuid".to_string())?;
    let (server, port) = split_host_port(hostport, PortSplit::First)?;

    let query = &parts.query;
    let security = query
        .text(opt::SECURITY)
        .map(str::to_lowercase)
        .unwrap_or_default();
    let reality = security.contains("reality");
    let network = query.text(opt::NETWORK).unwrap_or("tcp").to_string();

    let reality_opts = reality.then(|| RealityOpts {
        public_key: query.text(opt::PUBLIC_KEY).unwrap_or_default().to_string(),
        short_id: query.text(opt::SHORT_ID).unwrap_or_default().to_string(),
    });

    Ok(ProxyRecord::new(
        parts.name.clone(),
        server.to_string(),
        port,
        Attributes::Vless(VlessAttrs {
            uuid: uuid.to_string(),
            udp: true,
            skip_cert_verify: true,
            tls: security == "tls" || reality,
            ws_opts: ws_opts(&network, query),
            grpc_opts: grpc_opts(&network, query),
            network,
            flow: owned(query.text(opt::FLOW)),
            servername: owned(query.text(opt::SNI)),
            client_fingerprint: owned(query.text(opt::FINGERPRINT)),
            reality_opts,
        }),
    ))
}

fn ws_opts(network: &str, query: &QueryOptions) -> Option<WsOpts> {
    if network != "ws" {
        return None;
    }
    let path = owned(query.text(options::vless::WS_PATH));
    let headers = query
        .text(options::vless::WS_HOST)
        .map(|host| WsHeaders {
            host: host.to_string(),
        });
    if path.is_none() && headers.is_none() {
        return None;
    }
    Some(WsOpts { path, headers })
}

fn grpc_opts(network: &str, query: &QueryOptions) -> Option<GrpcOpts> {
    if network != "grpc" {
        return None;
    }
    query
        .text(options::vless::GRPC_SERVICE)
        .map(|name| GrpcOpts {
            grpc_service_name: name.to_string(),
        })
}

fn trojan(raw: &str) -> Result<ProxyRecord, String> {
    use crate::options::trojan as opt;

    let parts = split_link(raw, Scheme::Trojan)?;
    log_unrecognized(&parts, Scheme::Trojan, opt::KEYS);

    let (password, hostport) = parts.userinfo();
    let password = password
        .filter(|password| !password.is_empty())
        .ok_or_else(|| "missing password".to_string())?;
    let (server, port) = split_host_port(hostport, PortSplit::Last)?;

    Ok(ProxyRecord::new(
        parts.name.clone(),
        server.to_string(),
        port,
        Attributes::Trojan(TrojanAttrs {
            password: password.to_string(),
            udp: true,
            skip_cert_verify: parts.query.flag(opt::ALLOW_INSECURE),
            sni: parts.query.text(opt::SNI).unwrap_or_default().to_string(),
        }),
    ))
}

fn hysteria2(raw: &str) -> Result<ProxyRecord, String> {
    use crate::options::hysteria2 as opt;

    let parts = split_link(raw, Scheme::Hysteria2)?;
    log_unrecognized(&parts, Scheme::Hysteria2, opt::KEYS);

    let (password, hostport) = parts.userinfo();
    let (server, port) = match hostport.rsplit_once(':') {
        Some((server, port_text)) => {
            let digits: String = port_text.chars().filter(char::is_ascii_digit).collect();
            if digits.is_empty() {
                (server, HYSTERIA2_DEFAULT_PORT)
            } else {
                (server, parse_port(&digits)?)
            }
        }
        None => (hostport, HYSTERIA2_DEFAULT_PORT),
    };
    validate_host(server)?;

    let query = &parts.query;
    let obfs = query.text(opt::OBFS).filter(|obfs| *obfs == opt::SALAMANDER);
    let obfs_password = obfs.and(query.text(opt::OBFS_PASSWORD));

    Ok(ProxyRecord::new(
        parts.name.clone(),
        server.to_string(),
        port,
        Attributes::Hysteria2(Hysteria2Attrs {
            password: password.unwrap_or_default().to_string(),
            skip_cert_verify: query.flag(opt::INSECURE),
            sni: query.text(opt::SNI).unwrap_or_default().to_string(),
            obfs: owned(obfs),
            obfs_password: owned(obfs_password),
        }),
    ))
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn log_unrecognized(parts: &LinkParts<'_>, scheme: Scheme, known: &[&str]) {
    for key in parts.query.unrecognized(known) {
        log::debug!("{}: ignoring query key {}", scheme, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(record: &ProxyRecord) -> &Attributes {
        record.attributes()
    }

    #[test]
    fn shadowsocks_base64_credentials() {
        let record = parse_shadowsocks("ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@1.2.3.4:8388#MyNode")
            .expect("parse ss");
        assert_eq!(record.name, "MyNode");
        assert_eq!(record.server, "1.2.3.4");
        assert_eq!(record.port, 8388);
        match attrs(&record) {
            Attributes::Shadowsocks(ss) => {
                assert_eq!(ss.cipher, "aes-256-gcm");
                assert_eq!(ss.password, "password");
                assert!(ss.udp);
            }
            other => panic!("expected shadowsocks, got {:?}", other),
        }
    }

    #[test]
    fn shadowsocks_unpadded_and_percent_encoded_base64() {
        let unpadded = parse_shadowsocks("ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ@h.com:1").unwrap();
        let escaped = parse_shadowsocks("ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ%3D@h.com:1").unwrap();
        assert_eq!(unpadded.attributes(), escaped.attributes());
    }

    #[test]
    fn shadowsocks_plain_credentials() {
        let record = parse_shadowsocks("ss://chacha20-ietf-poly1305:p:w@host.net:443").unwrap();
        assert_eq!(record.name, "SS Proxy");
        match attrs(&record) {
            Attributes::Shadowsocks(ss) => {
                assert_eq!(ss.cipher, "chacha20-ietf-poly1305");
                assert_eq!(ss.password, "p:w");
            }
            other => panic!("expected shadowsocks, got {:?}", other),
        }
    }

    #[test]
    fn shadowsocks_rejects_malformed_segments() {
        for raw in [
            "ss://%%%badbase64%%%@host:1",
            "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=",
            "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@host",
            "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@host:http",
            "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@host:70000",
            "ss://bm9jb2xvbg==@host:1",
            "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@host:1?plugin=obfs-local",
        ] {
            match parse_shadowsocks(raw) {
                Err(LinkError::Malformed { scheme, .. }) => {
                    assert_eq!(scheme, Scheme::Shadowsocks, "{}", raw)
                }
                other => panic!("expected malformed for {}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn shadowsocks_rejects_non_utf8_payload() {
        // base64 of [0xff, 0xfe, b':', b'x']
        let err = parse_shadowsocks("ss:////46eA==@host:1").unwrap_err();
        assert!(err.to_string().contains("UTF-8"), "{}", err);
    }

    #[test]
    fn vless_reality() {
        let record = parse_vless(
            "vless://uuid-1234@example.com:443?security=reality&pbk=KEY&sid=ID&sni=a.com#Node1",
        )
        .expect("parse vless");
        assert_eq!(record.name, "Node1");
        assert_eq!(record.server, "example.com");
        assert_eq!(record.port, 443);
        match attrs(&record) {
            Attributes::Vless(v) => {
                assert_eq!(v.uuid, "uuid-1234");
                assert!(v.tls);
                assert!(v.udp);
                assert!(v.skip_cert_verify);
                assert_eq!(v.network, "tcp");
                assert_eq!(v.servername.as_deref(), Some("a.com"));
                let reality = v.reality_opts.as_ref().expect("reality opts");
                assert_eq!(reality.public_key, "KEY");
                assert_eq!(reality.short_id, "ID");
            }
            other => panic!("expected vless, got {:?}", other),
        }
    }

    #[test]
    fn vless_plain_tcp_defaults() {
        let record = parse_vless("vless://id@10.0.0.1:8443").unwrap();
        assert_eq!(record.name, "VLESS Proxy");
        match attrs(&record) {
            Attributes::Vless(v) => {
                assert!(!v.tls);
                assert!(v.reality_opts.is_none());
                assert!(v.servername.is_none());
                assert!(v.client_fingerprint.is_none());
            }
            other => panic!("expected vless, got {:?}", other),
        }
    }

    #[test]
    fn vless_websocket_transport() {
        let record = parse_vless(
            "vless://id@cdn.example.com:443/?type=ws&security=tls&path=%2Fray&host=cdn.example.com&fp=chrome#WS",
        )
        .unwrap();
        match attrs(&record) {
            Attributes::Vless(v) => {
                assert!(v.tls);
                assert_eq!(v.network, "ws");
                assert_eq!(v.client_fingerprint.as_deref(), Some("chrome"));
                let ws = v.ws_opts.as_ref().expect("ws opts");
                assert_eq!(ws.path.as_deref(), Some("/ray"));
                assert_eq!(
                    ws.headers.as_ref().map(|h| h.host.as_str()),
                    Some("cdn.example.com")
                );
                assert!(v.grpc_opts.is_none());
            }
            other => panic!("expected vless, got {:?}", other),
        }
    }

    #[test]
    fn vless_grpc_transport() {
        let record = parse_vless(
            "vless://id@g.example.com:443?type=grpc&security=tls&serviceName=tunnel&sni=g.example.com#GRPC",
        )
        .unwrap();
        match attrs(&record) {
            Attributes::Vless(v) => {
                assert!(v.tls);
                assert_eq!(v.network, "grpc");
                assert_eq!(v.servername.as_deref(), Some("g.example.com"));
                let grpc = v.grpc_opts.as_ref().expect("grpc opts");
                assert_eq!(grpc.grpc_service_name, "tunnel");
                assert!(v.ws_opts.is_none());
            }
            other => panic!("expected vless, got {:?}", other),
        }

        let record = parse_vless("vless://id@g.example.com:443?type=grpc#G").unwrap();
        match attrs(&record) {
            Attributes::Vless(v) => assert!(v.grpc_opts.is_none()),
            other => panic!("expected vless, got {:?}", other),
        }
    }

    #[test]
    fn vless_requires_uuid_and_port() {
        assert!(parse_vless("vless://@example.com:443").is_err());
        assert!(parse_vless("vless://id@example.com").is_err());
        assert!(parse_vless("vless://id@example.com:abc").is_err());
    }

    #[test]
    fn trojan_defaults_to_skip_verify() {
        let record = parse_trojan("trojan://pw@host.com:443?sni=host.com#T1").unwrap();
        assert_eq!(record.name, "T1");
        assert_eq!(record.server, "host.com");
        assert_eq!(record.port, 443);
        match attrs(&record) {
            Attributes::Trojan(t) => {
                assert_eq!(t.password, "pw");
                assert!(t.skip_cert_verify);
                assert!(t.udp);
                assert_eq!(t.sni, "host.com");
            }
            other => panic!("expected trojan, got {:?}", other),
        }
    }

    #[test]
    fn trojan_explicit_secure() {
        let record = parse_trojan("trojan://pw@host.com:443?allowInsecure=0").unwrap();
        match attrs(&record) {
            Attributes::Trojan(t) => {
                assert!(!t.skip_cert_verify);
                assert_eq!(t.sni, "");
            }
            other => panic!("expected trojan, got {:?}", other),
        }
    }

    #[test]
    fn trojan_splits_port_on_last_colon() {
        let record = parse_trojan("trojan://pw@fe80::1:8443").unwrap();
        assert_eq!(record.server, "fe80::1");
        assert_eq!(record.port, 8443);
    }

    #[test]
    fn hysteria2_without_port_or_password() {
        let record = parse_hysteria2("hysteria2://host.com?sni=x.com#H1").unwrap();
        assert_eq!(record.name, "H1");
        assert_eq!(record.server, "host.com");
        assert_eq!(record.port, 443);
        match attrs(&record) {
            Attributes::Hysteria2(h) => {
                assert_eq!(h.password, "");
                assert_eq!(h.sni, "x.com");
                assert!(h.skip_cert_verify);
                assert!(h.obfs.is_none());
            }
            other => panic!("expected hysteria2, got {:?}", other),
        }
    }

    #[test]
    fn hysteria2_strips_stray_port_characters() {
        let record = parse_hysteria2("hysteria2://secret@1.1.1.1:8443/?insecure=0").unwrap();
        assert_eq!(record.port, 8443);
        let record = parse_hysteria2("hysteria2://secret@1.1.1.1:8443,").unwrap();
        assert_eq!(record.port, 8443);
        let record = parse_hysteria2("hysteria2://secret@1.1.1.1:").unwrap();
        assert_eq!(record.port, 443);
        assert!(parse_hysteria2("hysteria2://secret@1.1.1.1:99999").is_err());
    }

    #[test]
    fn hysteria2_obfs_only_for_salamander() {
        let record = parse_hysteria2(
            "hysteria2://pw@h.com:443?obfs=salamander&obfs-password=xyz&insecure=0#O",
        )
        .unwrap();
        match attrs(&record) {
            Attributes::Hysteria2(h) => {
                assert_eq!(h.password, "pw");
                assert!(!h.skip_cert_verify);
                assert_eq!(h.obfs.as_deref(), Some("salamander"));
                assert_eq!(h.obfs_password.as_deref(), Some("xyz"));
            }
            other => panic!("expected hysteria2, got {:?}", other),
        }

        let record =
            parse_hysteria2("hysteria2://pw@h.com:443?obfs=other&obfs-password=xyz").unwrap();
        match attrs(&record) {
            Attributes::Hysteria2(h) => {
                assert!(h.obfs.is_none());
                assert!(h.obfs_password.is_none());
            }
            other => panic!("expected hysteria2, got {:?}", other),
        }
    }
}
