use serde::{Deserialize, Serialize};

/// Known manifest API version. Documents declaring anything else are rejected
/// by the parser before a spec is ever decoded.
pub const API_VERSION: &str = "aegisx.io/v1";

// ── Manifest kinds ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    FirewallPolicy,
    NatPolicy,
    LoadBalancerPolicy,
    VpnPolicy,
    IdsPolicy,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirewallPolicy => "FirewallPolicy",
            Self::NatPolicy => "NATPolicy",
            Self::LoadBalancerPolicy => "LoadBalancerPolicy",
            Self::VpnPolicy => "VPNPolicy",
            Self::IdsPolicy => "IDSPolicy",
        }
    }

    /// Look up a kind by its manifest string. Returns `None` for anything
    /// outside the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FirewallPolicy" => Some(Self::FirewallPolicy),
            "NATPolicy" => Some(Self::NatPolicy),
            "LoadBalancerPolicy" => Some(Self::LoadBalancerPolicy),
            "VPNPolicy" => Some(Self::VpnPolicy),
            "IDSPolicy" => Some(Self::IdsPolicy),
            _ => None,
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Protocol ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    /// Wildcard: matches every protocol and emits no protocol clause.
    #[default]
    Any,
}

impl Protocol {
    /// The nftables match token. `Any` stringifies to the empty string so
    /// callers can skip the clause entirely.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
            Self::Any => "",
        }
    }

    /// Parse a manifest protocol string. Empty, `any` and `ANY` are all the
    /// wildcard.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            "icmp" => Some(Self::Icmp),
            "" | "any" | "ANY" => Some(Self::Any),
            _ => None,
        }
    }
}

// ── Verdicts ────────────────────────────────────────────────────────

/// Terminal clause of a compiled rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Drop,
    Reject,
    Log,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Drop => "drop",
            Self::Reject => "reject",
            Self::Log => "log",
        }
    }

    /// Canonicalise a manifest action string to a verdict. Unrecognised
    /// actions fall back to `Drop`; the validator has already rejected them,
    /// so the fallback only matters for IRs built by hand.
    pub fn from_action(s: &str) -> Self {
        match s {
            "ALLOW" | "allow" | "ACCEPT" | "accept" => Self::Accept,
            "REJECT" | "reject" => Self::Reject,
            "LOG" | "log" => Self::Log,
            _ => Self::Drop,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Chains ──────────────────────────────────────────────────────────

/// Filter chain a compiled rule lands in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Input,
    #[default]
    Forward,
    Output,
}

impl Chain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Forward => "forward",
            Self::Output => "output",
        }
    }
}

// ── Connection tracking states ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtState {
    New,
    Established,
    Related,
    Invalid,
}

impl CtState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Established => "established",
            Self::Related => "related",
            Self::Invalid => "invalid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "established" => Some(Self::Established),
            "related" => Some(Self::Related),
            "invalid" => Some(Self::Invalid),
            _ => None,
        }
    }
}

// ── NAT types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NatType {
    Snat,
    Dnat,
    Masquerade,
}

impl NatType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Snat => "SNAT",
            Self::Dnat => "DNAT",
            Self::Masquerade => "MASQUERADE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SNAT" => Some(Self::Snat),
            "DNAT" => Some(Self::Dnat),
            "MASQUERADE" => Some(Self::Masquerade),
            _ => None,
        }
    }
}
