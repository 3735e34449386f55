//! Intermediate representation: the compiled, backend-agnostic form of a
//! policy set.
//!
//! An `Ir` is created by the compiler, consumed by the ruleset translator,
//! and cached by the controller as the single last-applied value. It is never
//! mutated after creation. `id`/`version` identify one application attempt,
//! not the logical policy set: two compilations of identical input produce
//! identical rules under distinct identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::entity::{Chain, CtState, NatType, Protocol, Verdict};
use crate::policy::entity::{LbBackend, LbFrontend, LbTlsConfig, VpnPeer};

/// Priority of the synthesised default-action rule. High enough that every
/// explicit rule fires first.
pub const DEFAULT_ACTION_PRIORITY: i64 = 99_999;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ir {
    /// Random 128-bit identity, fresh per compilation.
    pub id: Uuid,
    /// Millisecond timestamp taken at compile time; monotonic across
    /// well-behaved clocks.
    pub version: i64,
    pub created_at: DateTime<Utc>,

    /// Sorted by ascending priority; input order breaks ties.
    pub firewall_rules: Vec<CompiledFirewallRule>,
    pub nat_rules: Vec<CompiledNatRule>,
    pub load_balancers: Vec<CompiledLoadBalancer>,
    pub vpn_configs: Vec<CompiledVpnConfig>,
    pub ids_rules: Vec<CompiledIdsRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFirewallRule {
    pub priority: i64,
    pub chain: Chain,
    pub action: Verdict,
    pub protocol: Protocol,
    pub src_addrs: Vec<String>,
    pub dst_addrs: Vec<String>,
    /// Formatted `"N"` for single ports, `"A-B"` for ranges.
    pub src_ports: Vec<String>,
    pub dst_ports: Vec<String>,
    pub states: Vec<CtState>,
    /// Rate expression such as `"100/second"`; empty when unlimited.
    pub rate_limit: String,
    pub log: bool,
    /// `{namespace}/{policy-name}/{rule-name}`
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledNatRule {
    #[serde(rename = "type")]
    pub nat_type: NatType,
    pub src_addr: String,
    pub dst_addr: String,
    pub to_addr: String,
    pub out_iface: String,
}

/// Opaque payload for the out-of-core load balancer adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledLoadBalancer {
    pub name: String,
    pub frontend: LbFrontend,
    pub backend: LbBackend,
    pub tls: Option<LbTlsConfig>,
}

/// Opaque payload for the out-of-core VPN adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledVpnConfig {
    pub interface: String,
    pub listen_port: i64,
    pub address: String,
    pub peers: Vec<VpnPeer>,
}

/// Opaque payload for the out-of-core detection engine adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledIdsRule {
    pub raw: String,
    pub enabled: bool,
}
