//! Typed policy manifests as they arrive from YAML.
//!
//! These structs sit at the YAML boundary: enumerated fields stay raw strings
//! here so the validator can report membership errors with full context, and
//! the compiler converts them to the closed enums in `common::entity` and
//! `ir::entity`. Unknown YAML fields are ignored for forward compatibility.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::entity::Kind;

// ── Top-level manifest ──────────────────────────────────────────────

/// A single parsed policy document (one YAML `---` block).
///
/// Immutable after parsing. The populated spec variant always corresponds to
/// the document's `kind`; the parser enforces this by selecting the spec type
/// from the kind, so the invariant holds by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub api_version: String,
    pub metadata: Metadata,
    pub spec: PolicySpec,
}

impl Manifest {
    pub fn kind(&self) -> Kind {
        match self.spec {
            PolicySpec::Firewall(_) => Kind::FirewallPolicy,
            PolicySpec::Nat(_) => Kind::NatPolicy,
            PolicySpec::LoadBalancer(_) => Kind::LoadBalancerPolicy,
            PolicySpec::Vpn(_) => Kind::VpnPolicy,
            PolicySpec::Ids(_) => Kind::IdsPolicy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: "default".to_string(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }
}

/// Exactly one kind-specific spec per manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PolicySpec {
    Firewall(FirewallPolicySpec),
    Nat(NatPolicySpec),
    LoadBalancer(LoadBalancerPolicySpec),
    Vpn(VpnPolicySpec),
    Ids(IdsPolicySpec),
}

// ── Firewall policy ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirewallPolicySpec {
    /// ALLOW | DROP | REJECT; empty means no synthetic catch-all rule.
    pub default_action: String,
    pub rules: Vec<FirewallRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirewallRule {
    pub name: String,
    /// Lower fires earlier; 0 or negative means auto-assign by position.
    pub priority: i64,
    /// ALLOW | DROP | REJECT | LOG
    pub action: String,
    /// tcp | udp | icmp | any | ""
    pub protocol: String,
    pub source: TrafficSelector,
    pub destination: TrafficSelector,
    /// Subset of: new, established, related, invalid.
    pub state: Vec<String>,
    pub rate_limit: Option<RateLimit>,
    pub log: bool,
    pub comment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrafficSelector {
    pub zones: Vec<String>,
    /// IP literals or CIDR blocks.
    pub addresses: Vec<String>,
    /// Wide integers so out-of-range values reach the validator instead of
    /// failing to decode.
    pub ports: Vec<i64>,
    pub port_ranges: Vec<PortRange>,
    pub ipsets: Vec<String>,
}

impl TrafficSelector {
    pub fn has_zone(&self, zone: &str) -> bool {
        self.zones.iter().any(|z| z == zone)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortRange {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    /// e.g. "100/second"
    pub rate: String,
    pub burst: i64,
}

// ── NAT policy ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NatPolicySpec {
    pub rules: Vec<NatRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NatRule {
    pub name: String,
    /// SNAT | DNAT | MASQUERADE
    #[serde(rename = "type")]
    pub nat_type: String,
    pub source: String,
    pub destination: String,
    pub to_source: String,
    pub to_dest: String,
    #[serde(rename = "outInterface")]
    pub out_interface: String,
}

// ── Load balancer policy ────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerPolicySpec {
    pub frontend: LbFrontend,
    pub backend: LbBackend,
    pub tls: Option<LbTlsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LbFrontend {
    pub bind: String,
    /// tcp | http
    pub mode: String,
    pub max_conn: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LbBackend {
    /// roundrobin | leastconn | source | random
    pub algorithm: String,
    pub servers: Vec<LbServer>,
    pub health_check: Option<LbHealthCheck>,
    pub timeout: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LbServer {
    pub name: String,
    /// host:port
    pub address: String,
    pub weight: i64,
    pub max_conn: i64,
    pub backup: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LbHealthCheck {
    pub interval: String,
    pub timeout: String,
    pub rise: i64,
    pub fall: i64,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LbTlsConfig {
    pub cert: String,
    pub key: String,
    pub min_version: String,
}

// ── VPN policy ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VpnPolicySpec {
    pub interface: String,
    pub listen_port: i64,
    /// Tunnel CIDR.
    pub address: String,
    pub dns: Vec<String>,
    pub peers: Vec<VpnPeer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VpnPeer {
    pub name: String,
    pub public_key: String,
    #[serde(rename = "allowedIPs")]
    pub allowed_ips: Vec<String>,
    /// host:port
    pub endpoint: String,
    pub preshared_key: String,
    /// Persistent keepalive, seconds.
    pub keep_alive: i64,
}

// ── IDS policy ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdsPolicySpec {
    /// ids | ips
    pub mode: String,
    pub rule_sets: Vec<String>,
    pub custom_rules: Vec<IdsRule>,
    pub thresholds: Vec<IdsThreshold>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdsRule {
    pub id: String,
    pub message: String,
    /// Raw engine rule string, forwarded verbatim.
    pub rule: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdsThreshold {
    pub gid: i64,
    pub sid: i64,
    /// limit | threshold | both
    #[serde(rename = "type")]
    pub threshold_type: String,
    /// by_src | by_dst
    pub track: String,
    pub count: i64,
    pub seconds: i64,
}
