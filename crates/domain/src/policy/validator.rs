//! Semantic validation of parsed manifests.
//!
//! Validation is pure and side-effect free. Errors accumulate across every
//! manifest in the batch so one pass reports all problems; each message
//! carries a `[namespace/name]` prefix plus rule/server/peer position where
//! relevant.

use std::net::IpAddr;

use crate::common::entity::{CtState, NatType, Protocol};
use crate::policy::entity::{
    FirewallPolicySpec, LoadBalancerPolicySpec, Manifest, NatPolicySpec, PolicySpec, VpnPolicySpec,
};
use crate::policy::error::ValidationError;

const VALID_ACTIONS: [&str; 4] = ["ALLOW", "DROP", "REJECT", "LOG"];
const VALID_LB_ALGORITHMS: [&str; 4] = ["roundrobin", "leastconn", "source", "random"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a whole batch, aggregating every error found.
    pub fn validate_all(&self, manifests: &[Manifest]) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        for manifest in manifests {
            self.collect(manifest, &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors })
        }
    }

    /// Validate a single manifest.
    pub fn validate(&self, manifest: &Manifest) -> Result<(), ValidationError> {
        self.validate_all(std::slice::from_ref(manifest))
    }

    fn collect(&self, manifest: &Manifest, errors: &mut Vec<String>) {
        let ctx = format!(
            "[{}/{}]",
            manifest.metadata.namespace, manifest.metadata.name
        );

        if manifest.metadata.name.is_empty() {
            errors.push(format!("{ctx}: metadata.name is required"));
        }

        match manifest.spec {
            PolicySpec::Firewall(ref spec) => validate_firewall(&ctx, spec, errors),
            PolicySpec::Nat(ref spec) => validate_nat(&ctx, spec, errors),
            PolicySpec::LoadBalancer(ref spec) => validate_lb(&ctx, spec, errors),
            PolicySpec::Vpn(ref spec) => validate_vpn(&ctx, spec, errors),
            // IDS policies are loosely validated: the spec block is opaque to
            // the core and forwarded to the detection engine adapter as-is.
            PolicySpec::Ids(_) => {}
        }
    }
}

fn validate_firewall(ctx: &str, spec: &FirewallPolicySpec, errors: &mut Vec<String>) {
    if !spec.default_action.is_empty() && !VALID_ACTIONS.contains(&spec.default_action.as_str()) {
        errors.push(format!(
            "{ctx}: invalid defaultAction \"{}\"",
            spec.default_action
        ));
    }

    for (i, rule) in spec.rules.iter().enumerate() {
        let rctx = format!("{ctx} rule[{i}] \"{}\"", rule.name);

        if rule.name.is_empty() {
            errors.push(format!("{rctx}: name is required"));
        }
        if !VALID_ACTIONS.contains(&rule.action.as_str()) {
            errors.push(format!("{rctx}: invalid action \"{}\"", rule.action));
        }
        if Protocol::parse(&rule.protocol).is_none() {
            errors.push(format!("{rctx}: invalid protocol \"{}\"", rule.protocol));
        }

        for addr in rule
            .source
            .addresses
            .iter()
            .chain(rule.destination.addresses.iter())
        {
            if !is_ip_or_cidr(addr) {
                errors.push(format!("{rctx}: invalid address \"{addr}\""));
            }
        }

        for port in rule.source.ports.iter().chain(rule.destination.ports.iter()) {
            if !(1..=65535).contains(port) {
                errors.push(format!("{rctx}: port {port} out of range"));
            }
        }
        for range in rule
            .source
            .port_ranges
            .iter()
            .chain(rule.destination.port_ranges.iter())
        {
            if range.start >= range.end {
                errors.push(format!(
                    "{rctx}: portRange start >= end ({}-{})",
                    range.start, range.end
                ));
            }
            for bound in [range.start, range.end] {
                if !(1..=65535).contains(&bound) {
                    errors.push(format!("{rctx}: port {bound} out of range"));
                }
            }
        }

        for state in &rule.state {
            if CtState::parse(state).is_none() {
                errors.push(format!("{rctx}: invalid state \"{state}\""));
            }
        }
    }
}

fn validate_nat(ctx: &str, spec: &NatPolicySpec, errors: &mut Vec<String>) {
    for (i, rule) in spec.rules.iter().enumerate() {
        if NatType::parse(&rule.nat_type).is_none() {
            errors.push(format!("{ctx} rule[{i}]: invalid type \"{}\"", rule.nat_type));
        }
    }
}

fn validate_lb(ctx: &str, spec: &LoadBalancerPolicySpec, errors: &mut Vec<String>) {
    if spec.frontend.bind.is_empty() {
        errors.push(format!("{ctx}: frontend.bind is required"));
    }
    if spec.frontend.mode.is_empty() {
        errors.push(format!("{ctx}: frontend.mode is required (tcp|http)"));
    }

    let algo = spec.backend.algorithm.as_str();
    if !algo.is_empty() && !VALID_LB_ALGORITHMS.contains(&algo) {
        errors.push(format!("{ctx}: unknown algorithm \"{algo}\""));
    }

    if spec.backend.servers.is_empty() {
        errors.push(format!("{ctx}: backend must have at least one server"));
    }
    for (i, server) in spec.backend.servers.iter().enumerate() {
        if server.address.is_empty() {
            errors.push(format!("{ctx} server[{i}]: address is required"));
        } else if !is_host_port(&server.address) {
            errors.push(format!(
                "{ctx} server[{i}]: invalid address \"{}\"",
                server.address
            ));
        }
    }
}

fn validate_vpn(ctx: &str, spec: &VpnPolicySpec, errors: &mut Vec<String>) {
    if spec.interface.is_empty() {
        errors.push(format!("{ctx}: interface is required"));
    }
    if !(1..=65535).contains(&spec.listen_port) {
        errors.push(format!("{ctx}: invalid listenPort {}", spec.listen_port));
    }
    if !is_cidr(&spec.address) {
        errors.push(format!("{ctx}: invalid address CIDR \"{}\"", spec.address));
    }
    for (i, peer) in spec.peers.iter().enumerate() {
        if peer.public_key.is_empty() {
            errors.push(format!("{ctx} peer[{i}]: publicKey is required"));
        }
        for allowed in &peer.allowed_ips {
            if !is_cidr(allowed) {
                errors.push(format!("{ctx} peer[{i}]: invalid allowedIP \"{allowed}\""));
            }
        }
    }
}

// ── Format helpers ──────────────────────────────────────────────────

/// A bare IP literal or a CIDR block, v4 or v6.
fn is_ip_or_cidr(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok() || is_cidr(s)
}

/// A CIDR block with a prefix length valid for the address family.
fn is_cidr(s: &str) -> bool {
    let Some((addr, prefix)) = s.split_once('/') else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => prefix <= 32,
        Ok(IpAddr::V6(_)) => prefix <= 128,
        Err(_) => false,
    }
}

/// `host:port` where host is non-empty (name or IP) and port is 1-65535.
/// Bracketed IPv6 hosts (`[::1]:80`) are accepted.
fn is_host_port(s: &str) -> bool {
    let Some((host, port)) = s.rsplit_once(':') else {
        return false;
    };
    let host_ok = if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        inner.parse::<std::net::Ipv6Addr>().is_ok()
    } else {
        !host.is_empty() && !host.contains(':')
    };
    host_ok && port.parse::<u16>().is_ok_and(|p| p >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::entity::{
        FirewallRule, LbBackend, LbFrontend, LbServer, Metadata, NatRule, PortRange,
        TrafficSelector, VpnPeer,
    };

    fn firewall_manifest(name: &str, spec: FirewallPolicySpec) -> Manifest {
        Manifest {
            api_version: crate::common::entity::API_VERSION.to_string(),
            metadata: Metadata {
                name: name.to_string(),
                ..Metadata::default()
            },
            spec: PolicySpec::Firewall(spec),
        }
    }

    fn basic_rule(name: &str) -> FirewallRule {
        FirewallRule {
            name: name.to_string(),
            action: "ALLOW".to_string(),
            protocol: "tcp".to_string(),
            ..FirewallRule::default()
        }
    }

    #[test]
    fn valid_firewall_passes() {
        let spec = FirewallPolicySpec {
            default_action: "DROP".to_string(),
            rules: vec![basic_rule("allow-http")],
        };
        let m = firewall_manifest("web", spec);
        assert!(Validator::new().validate_all(&[m]).is_ok());
    }

    #[test]
    fn missing_name_is_reported() {
        let m = firewall_manifest("", FirewallPolicySpec::default());
        let err = Validator::new().validate_all(&[m]).unwrap_err();
        assert!(err.errors[0].contains("metadata.name is required"));
    }

    #[test]
    fn invalid_address_includes_rule_context() {
        let mut rule = basic_rule("bad-addr");
        rule.source.addresses = vec!["not-an-ip".to_string()];
        let m = firewall_manifest("web", FirewallPolicySpec {
            rules: vec![rule],
            ..FirewallPolicySpec::default()
        });

        let err = Validator::new().validate_all(&[m]).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(err.errors[0].contains("default/web"), "got: {}", err.errors[0]);
        assert!(err.errors[0].contains("rule[0]"), "got: {}", err.errors[0]);
        assert!(
            err.errors[0].contains("invalid address \"not-an-ip\""),
            "got: {}",
            err.errors[0]
        );
    }

    #[test]
    fn cidr_and_plain_ip_addresses_pass() {
        let mut rule = basic_rule("addrs");
        rule.source.addresses = vec![
            "10.0.0.1".to_string(),
            "192.168.1.0/24".to_string(),
            "2001:db8::/32".to_string(),
            "::1".to_string(),
        ];
        let m = firewall_manifest("web", FirewallPolicySpec {
            rules: vec![rule],
            ..FirewallPolicySpec::default()
        });
        assert!(Validator::new().validate_all(&[m]).is_ok());
    }

    #[test]
    fn bad_prefix_length_is_rejected() {
        let mut rule = basic_rule("bad-cidr");
        rule.destination.addresses = vec!["10.0.0.0/33".to_string()];
        let m = firewall_manifest("web", FirewallPolicySpec {
            rules: vec![rule],
            ..FirewallPolicySpec::default()
        });
        assert!(Validator::new().validate_all(&[m]).is_err());
    }

    #[test]
    fn port_out_of_range_is_rejected() {
        let mut rule = basic_rule("big-port");
        rule.destination.ports = vec![0, 70000];
        let m = firewall_manifest("web", FirewallPolicySpec {
            rules: vec![rule],
            ..FirewallPolicySpec::default()
        });
        let err = Validator::new().validate_all(&[m]).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert!(err.errors[0].contains("port 0 out of range"));
        assert!(err.errors[1].contains("port 70000 out of range"));
    }

    #[test]
    fn inverted_port_range_is_rejected() {
        let mut rule = basic_rule("inverted");
        rule.source.port_ranges = vec![PortRange { start: 443, end: 80 }];
        let m = firewall_manifest("web", FirewallPolicySpec {
            rules: vec![rule],
            ..FirewallPolicySpec::default()
        });
        let err = Validator::new().validate_all(&[m]).unwrap_err();
        assert!(err.errors[0].contains("portRange start >= end (443-80)"));
    }

    #[test]
    fn invalid_action_protocol_and_state_are_rejected() {
        let mut rule = basic_rule("bad-enums");
        rule.action = "SHUN".to_string();
        rule.protocol = "gre".to_string();
        rule.state = vec!["untracked".to_string()];
        let m = firewall_manifest("web", FirewallPolicySpec {
            rules: vec![rule],
            ..FirewallPolicySpec::default()
        });
        let err = Validator::new().validate_all(&[m]).unwrap_err();
        assert_eq!(err.errors.len(), 3);
        assert!(err.errors[0].contains("invalid action \"SHUN\""));
        assert!(err.errors[1].contains("invalid protocol \"gre\""));
        assert!(err.errors[2].contains("invalid state \"untracked\""));
    }

    #[test]
    fn invalid_default_action_is_rejected() {
        let m = firewall_manifest("web", FirewallPolicySpec {
            default_action: "PERMIT".to_string(),
            rules: vec![],
        });
        let err = Validator::new().validate_all(&[m]).unwrap_err();
        assert!(err.errors[0].contains("invalid defaultAction \"PERMIT\""));
    }

    #[test]
    fn errors_aggregate_across_manifests() {
        let bad_fw = firewall_manifest("", FirewallPolicySpec::default());
        let bad_nat = Manifest {
            api_version: crate::common::entity::API_VERSION.to_string(),
            metadata: Metadata {
                name: "nat".to_string(),
                ..Metadata::default()
            },
            spec: PolicySpec::Nat(NatPolicySpec {
                rules: vec![NatRule {
                    name: "r".to_string(),
                    nat_type: "REWRITE".to_string(),
                    ..NatRule::default()
                }],
            }),
        };

        let err = Validator::new().validate_all(&[bad_fw, bad_nat]).unwrap_err();
        assert!(err.errors.len() >= 2);
    }

    #[test]
    fn nat_type_membership() {
        let m = Manifest {
            api_version: crate::common::entity::API_VERSION.to_string(),
            metadata: Metadata {
                name: "nat".to_string(),
                ..Metadata::default()
            },
            spec: PolicySpec::Nat(NatPolicySpec {
                rules: vec![
                    NatRule {
                        name: "ok".to_string(),
                        nat_type: "SNAT".to_string(),
                        ..NatRule::default()
                    },
                    NatRule {
                        name: "bad".to_string(),
                        nat_type: "snat".to_string(),
                        ..NatRule::default()
                    },
                ],
            }),
        };
        let err = Validator::new().validate_all(&[m]).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(err.errors[0].contains("rule[1]"));
    }

    fn lb_manifest(spec: LoadBalancerPolicySpec) -> Manifest {
        Manifest {
            api_version: crate::common::entity::API_VERSION.to_string(),
            metadata: Metadata {
                name: "edge".to_string(),
                ..Metadata::default()
            },
            spec: PolicySpec::LoadBalancer(spec),
        }
    }

    #[test]
    fn lb_requires_frontend_and_servers() {
        let err = Validator::new()
            .validate_all(&[lb_manifest(LoadBalancerPolicySpec::default())])
            .unwrap_err();
        let joined = err.errors.join("\n");
        assert!(joined.contains("frontend.bind is required"));
        assert!(joined.contains("frontend.mode is required"));
        assert!(joined.contains("at least one server"));
    }

    #[test]
    fn lb_valid_config_passes() {
        let spec = LoadBalancerPolicySpec {
            frontend: LbFrontend {
                bind: "0.0.0.0:443".to_string(),
                mode: "tcp".to_string(),
                max_conn: 0,
            },
            backend: LbBackend {
                algorithm: "leastconn".to_string(),
                servers: vec![LbServer {
                    name: "app-1".to_string(),
                    address: "10.0.1.10:8443".to_string(),
                    ..LbServer::default()
                }],
                ..LbBackend::default()
            },
            tls: None,
        };
        assert!(Validator::new().validate_all(&[lb_manifest(spec)]).is_ok());
    }

    #[test]
    fn lb_bad_algorithm_and_address() {
        let spec = LoadBalancerPolicySpec {
            frontend: LbFrontend {
                bind: ":80".to_string(),
                mode: "http".to_string(),
                max_conn: 0,
            },
            backend: LbBackend {
                algorithm: "fastest".to_string(),
                servers: vec![LbServer {
                    name: "s".to_string(),
                    address: "no-port-here".to_string(),
                    ..LbServer::default()
                }],
                ..LbBackend::default()
            },
            tls: None,
        };
        let err = Validator::new().validate_all(&[lb_manifest(spec)]).unwrap_err();
        let joined = err.errors.join("\n");
        assert!(joined.contains("unknown algorithm \"fastest\""));
        assert!(joined.contains("server[0]"));
    }

    fn vpn_manifest(spec: VpnPolicySpec) -> Manifest {
        Manifest {
            api_version: crate::common::entity::API_VERSION.to_string(),
            metadata: Metadata {
                name: "wg".to_string(),
                ..Metadata::default()
            },
            spec: PolicySpec::Vpn(spec),
        }
    }

    #[test]
    fn vpn_valid_config_passes() {
        let spec = VpnPolicySpec {
            interface: "wg0".to_string(),
            listen_port: 51820,
            address: "10.200.0.1/24".to_string(),
            dns: vec![],
            peers: vec![VpnPeer {
                name: "laptop".to_string(),
                public_key: "pubkey=".to_string(),
                allowed_ips: vec!["10.200.0.2/32".to_string()],
                ..VpnPeer::default()
            }],
        };
        assert!(Validator::new().validate_all(&[vpn_manifest(spec)]).is_ok());
    }

    #[test]
    fn vpn_rejects_bad_fields() {
        let spec = VpnPolicySpec {
            interface: String::new(),
            listen_port: 0,
            address: "10.200.0.1".to_string(), // bare IP, CIDR required
            dns: vec![],
            peers: vec![VpnPeer {
                name: "p".to_string(),
                public_key: String::new(),
                allowed_ips: vec!["bogus".to_string()],
                ..VpnPeer::default()
            }],
        };
        let err = Validator::new().validate_all(&[vpn_manifest(spec)]).unwrap_err();
        let joined = err.errors.join("\n");
        assert!(joined.contains("interface is required"));
        assert!(joined.contains("invalid listenPort 0"));
        assert!(joined.contains("invalid address CIDR"));
        assert!(joined.contains("peer[0]: publicKey is required"));
        assert!(joined.contains("peer[0]: invalid allowedIP \"bogus\""));
    }

    #[test]
    fn ids_spec_is_loosely_validated() {
        let m = Manifest {
            api_version: crate::common::entity::API_VERSION.to_string(),
            metadata: Metadata {
                name: "ids".to_string(),
                ..Metadata::default()
            },
            spec: PolicySpec::Ids(crate::policy::entity::IdsPolicySpec::default()),
        };
        assert!(Validator::new().validate_all(&[m]).is_ok());
    }

    #[test]
    fn host_port_forms() {
        assert!(is_host_port("10.0.0.1:80"));
        assert!(is_host_port("backend.internal:8443"));
        assert!(is_host_port("[::1]:80"));
        assert!(!is_host_port("bare-host"));
        assert!(!is_host_port(":80")); // empty host
        assert!(!is_host_port("host:0"));
        assert!(!is_host_port("host:notaport"));
    }

    #[test]
    fn zone_names_are_free_form_tags() {
        // Zone existence is deliberately not cross-checked.
        let mut rule = basic_rule("zoned");
        rule.source.zones = vec!["made-up-zone".to_string()];
        let m = firewall_manifest("web", FirewallPolicySpec {
            rules: vec![rule],
            ..FirewallPolicySpec::default()
        });
        assert!(Validator::new().validate_all(&[m]).is_ok());
    }
}
