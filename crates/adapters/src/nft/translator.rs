//! IR to nftables ruleset text.
//!
//! Translation is a pure function of the IR and the fixed template: the
//! header derives from IR identity rather than the wall clock, so two calls
//! over the same IR are byte-identical.

use std::fmt::Write;

use domain::common::entity::{Chain, NatType, Protocol, Verdict};
use domain::ir::entity::{CompiledFirewallRule, CompiledNatRule, Ir};

#[derive(Debug, Clone)]
pub struct Translator {
    table_name: String,
}

impl Translator {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Emit the full replace-mode ruleset for `ir`.
    pub fn translate(&self, ir: &Ir) -> String {
        let mut input = Vec::new();
        let mut forward = Vec::new();
        let mut output = Vec::new();
        for rule in &ir.firewall_rules {
            let line = firewall_rule_line(rule);
            match rule.chain {
                Chain::Input => input.push(line),
                Chain::Forward => forward.push(line),
                Chain::Output => output.push(line),
            }
        }

        let mut dnat = Vec::new();
        let mut snat = Vec::new();
        for rule in &ir.nat_rules {
            match rule.nat_type {
                NatType::Dnat => dnat.push(dnat_line(rule)),
                NatType::Snat => snat.push(snat_line(rule)),
                NatType::Masquerade => snat.push(masquerade_line(rule)),
            }
        }

        let mut out = String::new();
        let table = &self.table_name;

        let _ = writeln!(out, "# aegisx nftables ruleset for ir {} (version {})", ir.id, ir.version);
        let _ = writeln!(out, "# DO NOT EDIT MANUALLY - managed by aegisx");
        let _ = writeln!(out);
        let _ = writeln!(out, "table inet {table} {{");

        // Shared connection-tracking helper.
        let _ = writeln!(out, "    chain ct_state {{");
        let _ = writeln!(out, "        ct state invalid drop comment \"drop invalid\"");
        let _ = writeln!(
            out,
            "        ct state {{ established, related }} accept comment \"accept established\""
        );
        let _ = writeln!(out, "    }}");

        write_chain(
            &mut out,
            "input",
            "type filter hook input priority 0; policy drop;",
            &["jump ct_state", "iif \"lo\" accept comment \"loopback\""],
            &input,
        );
        write_chain(
            &mut out,
            "forward",
            "type filter hook forward priority 0; policy drop;",
            &["jump ct_state"],
            &forward,
        );
        write_chain(
            &mut out,
            "output",
            "type filter hook output priority 0; policy accept;",
            &["jump ct_state"],
            &output,
        );
        write_chain(
            &mut out,
            "prerouting",
            "type nat hook prerouting priority dstnat;",
            &[],
            &dnat,
        );
        write_chain(
            &mut out,
            "postrouting",
            "type nat hook postrouting priority srcnat;",
            &[],
            &snat,
        );

        let _ = writeln!(out, "}}");
        out
    }
}

fn write_chain(out: &mut String, name: &str, header: &str, preamble: &[&str], rules: &[String]) {
    let _ = writeln!(out);
    let _ = writeln!(out, "    chain {name} {{");
    let _ = writeln!(out, "        {header}");
    for line in preamble {
        let _ = writeln!(out, "        {line}");
    }
    for rule in rules {
        let _ = writeln!(out, "        {rule}");
    }
    let _ = writeln!(out, "    }}");
}

/// One firewall rule as an nft statement, clauses in fixed order: protocol,
/// saddr, daddr, sport, dport, ct state, limit, log, verdict, comment.
fn firewall_rule_line(rule: &CompiledFirewallRule) -> String {
    let mut parts: Vec<String> = Vec::new();

    if rule.protocol != Protocol::Any {
        parts.push(format!("meta l4proto {}", rule.protocol.as_str()));
    }

    if let Some(m) = addr_match("ip saddr", &rule.src_addrs) {
        parts.push(m);
    }
    if let Some(m) = addr_match("ip daddr", &rule.dst_addrs) {
        parts.push(m);
    }

    // Port matches need a transport selector; `th` covers protocol-agnostic
    // rules.
    let transport = match rule.protocol {
        Protocol::Any => "th",
        proto => proto.as_str(),
    };
    if let Some(m) = port_match(transport, "sport", &rule.src_ports) {
        parts.push(m);
    }
    if let Some(m) = port_match(transport, "dport", &rule.dst_ports) {
        parts.push(m);
    }

    if !rule.states.is_empty() {
        let states: Vec<&str> = rule.states.iter().map(|s| s.as_str()).collect();
        parts.push(format!("ct state {{ {} }}", states.join(", ")));
    }

    if !rule.rate_limit.is_empty() {
        parts.push(format!("limit rate {}", rule.rate_limit));
    }

    if rule.log && rule.action != Verdict::Log {
        parts.push(format!("log prefix \"[aegisx] {}: \"", rule.comment));
    }

    parts.push(rule.action.as_str().to_string());

    if !rule.comment.is_empty() {
        parts.push(format!("comment \"{}\"", rule.comment));
    }

    parts.join(" ")
}

fn addr_match(selector: &str, addrs: &[String]) -> Option<String> {
    match addrs {
        [] => None,
        [single] => Some(format!("{selector} {single}")),
        many => Some(format!("{selector} {{ {} }}", many.join(", "))),
    }
}

fn port_match(transport: &str, direction: &str, ports: &[String]) -> Option<String> {
    match ports {
        [] => None,
        [single] => Some(format!("{transport} {direction} {single}")),
        many => Some(format!("{transport} {direction} {{ {} }}", many.join(", "))),
    }
}

fn dnat_line(rule: &CompiledNatRule) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !rule.src_addr.is_empty() {
        parts.push(format!("ip saddr {}", rule.src_addr));
    }
    if !rule.dst_addr.is_empty() {
        parts.push(format!("ip daddr {}", rule.dst_addr));
    }
    parts.push(format!("dnat to {}", rule.to_addr));
    parts.join(" ")
}

fn snat_line(rule: &CompiledNatRule) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !rule.src_addr.is_empty() {
        parts.push(format!("ip saddr {}", rule.src_addr));
    }
    if !rule.out_iface.is_empty() {
        parts.push(format!("oif \"{}\"", rule.out_iface));
    }
    parts.push(format!("snat to {}", rule.to_addr));
    parts.join(" ")
}

fn masquerade_line(rule: &CompiledNatRule) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !rule.src_addr.is_empty() {
        parts.push(format!("ip saddr {}", rule.src_addr));
    }
    if !rule.out_iface.is_empty() {
        parts.push(format!("oif \"{}\"", rule.out_iface));
    }
    parts.push("masquerade".to_string());
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::policy::compiler::Compiler;
    use domain::policy::parser::ManifestParser;

    fn compile(yaml: &str) -> Ir {
        let manifests = ManifestParser::new().parse_str(yaml).unwrap();
        Compiler::new().compile(&manifests).unwrap()
    }

    fn empty_ir() -> Ir {
        Compiler::new().compile(&[]).unwrap()
    }

    #[test]
    fn skeleton_has_all_chains_and_policies() {
        let text = Translator::new("aegisx").translate(&empty_ir());
        assert!(text.contains("table inet aegisx {"));
        assert!(text.contains("chain ct_state {"));
        assert!(text.contains("type filter hook input priority 0; policy drop;"));
        assert!(text.contains("type filter hook forward priority 0; policy drop;"));
        assert!(text.contains("type filter hook output priority 0; policy accept;"));
        assert!(text.contains("type nat hook prerouting priority dstnat;"));
        assert!(text.contains("type nat hook postrouting priority srcnat;"));
        assert!(text.contains("iif \"lo\" accept"));
        assert_eq!(text.matches("jump ct_state").count(), 3);
    }

    #[test]
    fn translation_is_pure() {
        let ir = compile(
            r#"
apiVersion: aegisx.io/v1
kind: FirewallPolicy
metadata:
  name: web
spec:
  defaultAction: DROP
  rules:
    - name: allow-http
      action: ALLOW
      protocol: tcp
      destination:
        ports: [80, 443]
"#,
        );
        let translator = Translator::new("aegisx");
        assert_eq!(translator.translate(&ir), translator.translate(&ir));
    }

    #[test]
    fn rule_clause_order() {
        let ir = compile(
            r#"
apiVersion: aegisx.io/v1
kind: FirewallPolicy
metadata:
  name: web
spec:
  rules:
    - name: guarded
      action: ALLOW
      protocol: tcp
      source:
        addresses: ["10.0.0.0/24"]
      destination:
        addresses: ["192.168.1.1"]
        ports: [443]
      state: [new]
      rateLimit:
        rate: "100/second"
        burst: 10
      log: true
"#,
        );
        let text = Translator::new("aegisx").translate(&ir);
        let line = text
            .lines()
            .find(|l| l.contains("default/web/guarded") && l.contains("accept"))
            .unwrap()
            .trim();
        assert_eq!(
            line,
            "meta l4proto tcp ip saddr 10.0.0.0/24 ip daddr 192.168.1.1 tcp dport 443 \
             ct state { new } limit rate 100/second \
             log prefix \"[aegisx] default/web/guarded: \" accept \
             comment \"default/web/guarded\""
        );
    }

    #[test]
    fn multi_value_sets_use_braces() {
        let ir = compile(
            r#"
apiVersion: aegisx.io/v1
kind: FirewallPolicy
metadata:
  name: web
spec:
  rules:
    - name: multi
      action: DROP
      protocol: tcp
      source:
        addresses: ["10.0.0.1", "10.0.0.2"]
      destination:
        ports: [80, 443]
        portRanges:
          - start: 8080
            end: 8090
"#,
        );
        let text = Translator::new("aegisx").translate(&ir);
        assert!(text.contains("ip saddr { 10.0.0.1, 10.0.0.2 }"));
        assert!(text.contains("tcp dport { 80, 443, 8080-8090 }"));
    }

    #[test]
    fn any_protocol_ports_use_th_selector() {
        let ir = compile(
            r#"
apiVersion: aegisx.io/v1
kind: FirewallPolicy
metadata:
  name: web
spec:
  rules:
    - name: portonly
      action: DROP
      destination:
        ports: [53]
"#,
        );
        let text = Translator::new("aegisx").translate(&ir);
        assert!(text.contains("th dport 53"), "got:\n{text}");
        assert!(!text.contains("meta l4proto  "));
    }

    #[test]
    fn rules_land_in_their_chain() {
        let ir = compile(
            r#"
apiVersion: aegisx.io/v1
kind: FirewallPolicy
metadata:
  name: zones
spec:
  rules:
    - name: to-host
      action: ALLOW
      destination:
        zones: [localhost]
"#,
        );
        let text = Translator::new("aegisx").translate(&ir);
        let input_chain: String = text
            .split("chain input {")
            .nth(1)
            .unwrap()
            .split("chain forward {")
            .next()
            .unwrap()
            .to_string();
        assert!(input_chain.contains("default/zones/to-host"));
    }

    #[test]
    fn nat_rules_translate_per_type() {
        let ir = compile(
            r#"
apiVersion: aegisx.io/v1
kind: NATPolicy
metadata:
  name: nat
spec:
  rules:
    - name: publish
      type: DNAT
      destination: "203.0.113.10"
      toDest: "10.0.0.5:8080"
    - name: egress
      type: SNAT
      source: "10.0.0.0/24"
      toSource: "203.0.113.1"
    - name: fallback
      type: MASQUERADE
      source: "10.0.1.0/24"
      outInterface: eth0
"#,
        );
        let text = Translator::new("aegisx").translate(&ir);
        assert!(text.contains("ip daddr 203.0.113.10 dnat to 10.0.0.5:8080"));
        assert!(text.contains("ip saddr 10.0.0.0/24 snat to 203.0.113.1"));
        assert!(text.contains("ip saddr 10.0.1.0/24 oif \"eth0\" masquerade"));
    }

    #[test]
    fn log_verdict_has_no_duplicate_log_clause() {
        let ir = compile(
            r#"
apiVersion: aegisx.io/v1
kind: FirewallPolicy
metadata:
  name: audit
spec:
  rules:
    - name: watch
      action: LOG
      log: true
"#,
        );
        let text = Translator::new("aegisx").translate(&ir);
        let line = text
            .lines()
            .find(|l| l.contains("default/audit/watch"))
            .unwrap();
        assert_eq!(line.matches("log").count(), 1, "got: {line}");
    }
}
