//! Compilation of validated manifests into a deterministic IR.
//!
//! Deterministic for identical input apart from the IR identity: rule output
//! is a pure function of the manifests, while `id` and `version` are fresh
//! per compilation because they name an application attempt.

use chrono::Utc;
use uuid::Uuid;

use crate::common::entity::{Chain, CtState, NatType, Protocol, Verdict};
use crate::ir::entity::{
    CompiledFirewallRule, CompiledIdsRule, CompiledLoadBalancer, CompiledNatRule,
    CompiledVpnConfig, DEFAULT_ACTION_PRIORITY, Ir,
};
use crate::policy::entity::{
    FirewallPolicySpec, IdsPolicySpec, LoadBalancerPolicySpec, Manifest, Metadata, NatPolicySpec,
    PolicySpec, PortRange, VpnPolicySpec,
};
use crate::policy::error::CompileError;
use crate::policy::validator::Validator;

/// Zone name that pins a rule to the host itself rather than transit
/// traffic. Destination wins over source when both mention it.
const LOCALHOST_ZONE: &str = "localhost";

#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler {
    validator: Validator,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            validator: Validator::new(),
        }
    }

    /// Validate and compile a batch of manifests into one IR.
    pub fn compile(&self, manifests: &[Manifest]) -> Result<Ir, CompileError> {
        self.validator.validate_all(manifests)?;

        let now = Utc::now();
        let mut ir = Ir {
            id: Uuid::new_v4(),
            version: now.timestamp_millis(),
            created_at: now,
            firewall_rules: Vec::new(),
            nat_rules: Vec::new(),
            load_balancers: Vec::new(),
            vpn_configs: Vec::new(),
            ids_rules: Vec::new(),
        };

        for manifest in manifests {
            match manifest.spec {
                PolicySpec::Firewall(ref spec) => {
                    ir.firewall_rules
                        .extend(compile_firewall(&manifest.metadata, spec));
                }
                PolicySpec::Nat(ref spec) => ir.nat_rules.extend(compile_nat(spec)),
                PolicySpec::LoadBalancer(ref spec) => {
                    ir.load_balancers.push(compile_lb(&manifest.metadata, spec));
                }
                PolicySpec::Vpn(ref spec) => ir.vpn_configs.push(compile_vpn(spec)),
                PolicySpec::Ids(ref spec) => ir.ids_rules.extend(compile_ids(spec)),
            }
        }

        // Stable: equal priorities keep input order.
        ir.firewall_rules.sort_by_key(|r| r.priority);

        Ok(ir)
    }
}

// ── Firewall compilation ────────────────────────────────────────────

fn compile_firewall(meta: &Metadata, spec: &FirewallPolicySpec) -> Vec<CompiledFirewallRule> {
    let mut compiled = Vec::with_capacity(spec.rules.len() + 1);

    for (i, rule) in spec.rules.iter().enumerate() {
        let priority = if rule.priority > 0 {
            rule.priority
        } else {
            (i as i64 + 1) * 100
        };

        let chain = if rule.destination.has_zone(LOCALHOST_ZONE) {
            Chain::Input
        } else if rule.source.has_zone(LOCALHOST_ZONE) {
            Chain::Output
        } else {
            Chain::Forward
        };

        compiled.push(CompiledFirewallRule {
            priority,
            chain,
            action: Verdict::from_action(&rule.action),
            protocol: Protocol::parse(&rule.protocol).unwrap_or(Protocol::Any),
            src_addrs: rule.source.addresses.clone(),
            dst_addrs: rule.destination.addresses.clone(),
            src_ports: compile_ports(&rule.source.ports, &rule.source.port_ranges),
            dst_ports: compile_ports(&rule.destination.ports, &rule.destination.port_ranges),
            states: rule.state.iter().filter_map(|s| CtState::parse(s)).collect(),
            rate_limit: rule
                .rate_limit
                .as_ref()
                .map(|rl| rl.rate.clone())
                .unwrap_or_default(),
            log: rule.log,
            comment: format!("{}/{}/{}", meta.namespace, meta.name, rule.name),
        });
    }

    if !spec.default_action.is_empty() {
        compiled.push(CompiledFirewallRule {
            priority: DEFAULT_ACTION_PRIORITY,
            chain: Chain::Forward,
            action: Verdict::from_action(&spec.default_action),
            protocol: Protocol::Any,
            src_addrs: Vec::new(),
            dst_addrs: Vec::new(),
            src_ports: Vec::new(),
            dst_ports: Vec::new(),
            states: Vec::new(),
            rate_limit: String::new(),
            log: false,
            comment: format!("{}/{}/default", meta.namespace, meta.name),
        });
    }

    compiled
}

fn compile_ports(ports: &[i64], ranges: &[PortRange]) -> Vec<String> {
    let mut out = Vec::with_capacity(ports.len() + ranges.len());
    for port in ports {
        out.push(port.to_string());
    }
    for range in ranges {
        out.push(format!("{}-{}", range.start, range.end));
    }
    out
}

// ── NAT compilation ─────────────────────────────────────────────────

fn compile_nat(spec: &NatPolicySpec) -> Vec<CompiledNatRule> {
    spec.rules
        .iter()
        .map(|rule| {
            // The validator has confirmed membership; Masquerade is a safe
            // fallback for hand-built specs since it needs no target address.
            let nat_type = NatType::parse(&rule.nat_type).unwrap_or(NatType::Masquerade);
            let to_addr = match nat_type {
                NatType::Dnat => rule.to_dest.clone(),
                NatType::Snat => rule.to_source.clone(),
                NatType::Masquerade => String::new(),
            };
            CompiledNatRule {
                nat_type,
                src_addr: rule.source.clone(),
                dst_addr: rule.destination.clone(),
                to_addr,
                out_iface: rule.out_interface.clone(),
            }
        })
        .collect()
}

// ── Pass-through compilation for out-of-core adapters ───────────────

fn compile_lb(meta: &Metadata, spec: &LoadBalancerPolicySpec) -> CompiledLoadBalancer {
    CompiledLoadBalancer {
        name: meta.name.clone(),
        frontend: spec.frontend.clone(),
        backend: spec.backend.clone(),
        tls: spec.tls.clone(),
    }
}

fn compile_vpn(spec: &VpnPolicySpec) -> CompiledVpnConfig {
    CompiledVpnConfig {
        interface: spec.interface.clone(),
        listen_port: spec.listen_port,
        address: spec.address.clone(),
        peers: spec.peers.clone(),
    }
}

fn compile_ids(spec: &IdsPolicySpec) -> Vec<CompiledIdsRule> {
    spec.custom_rules
        .iter()
        .map(|r| CompiledIdsRule {
            raw: r.rule.clone(),
            enabled: r.enabled,
        })
        .collect()
}
