//! YAML manifest decoding.
//!
//! Decoding runs in two passes per document: a generic value first, to read
//! `apiVersion`, `kind` and `metadata`, then the `spec` node into the typed
//! spec selected by the kind. This keeps spec decoding strict per kind while
//! unknown fields stay forward compatible.

use std::path::Path;

use serde::Deserialize;
use serde_yaml_ng::Value;

use crate::common::entity::{API_VERSION, Kind};
use crate::policy::entity::{
    FirewallPolicySpec, IdsPolicySpec, LoadBalancerPolicySpec, Manifest, Metadata, NatPolicySpec,
    PolicySpec, VpnPolicySpec,
};
use crate::policy::error::ParseError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestParser;

impl ManifestParser {
    pub fn new() -> Self {
        Self
    }

    /// Decode every document in a byte stream.
    ///
    /// An empty stream parses to an empty vector; empty trailing documents
    /// are skipped. Never panics and never touches the dataplane.
    pub fn parse_stream(&self, bytes: &[u8]) -> Result<Vec<Manifest>, ParseError> {
        let text = std::str::from_utf8(bytes)?;
        self.parse_str(text)
    }

    /// Decode every document in a string.
    pub fn parse_str(&self, input: &str) -> Result<Vec<Manifest>, ParseError> {
        let mut manifests = Vec::new();

        for (index, doc) in serde_yaml_ng::Deserializer::from_str(input).enumerate() {
            let value = Value::deserialize(doc).map_err(|e| ParseError::Yaml {
                index,
                message: e.to_string(),
            })?;

            // Empty documents (`---` with nothing after it) are not an error.
            if value.is_null() {
                continue;
            }

            manifests.push(decode_document(index, &value)?);
        }

        Ok(manifests)
    }

    /// Decode one YAML file, which may hold multiple `---` documents.
    pub fn parse_file(&self, path: &Path) -> Result<Vec<Manifest>, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&text).map_err(|e| e.in_file(path))
    }

    /// Decode every `*.yaml` / `*.yml` file in a directory, in lexicographic
    /// filename order, concatenating the results in that order.
    pub fn parse_dir(&self, dir: &Path) -> Result<Vec<Manifest>, ParseError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ParseError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        let mut all = Vec::new();
        for path in &paths {
            all.extend(self.parse_file(path)?);
        }
        Ok(all)
    }
}

fn decode_document(index: usize, value: &Value) -> Result<Manifest, ParseError> {
    let api_version = str_field(value, "apiVersion");
    if api_version != API_VERSION {
        return Err(ParseError::UnsupportedApiVersion {
            index,
            found: api_version.to_string(),
            want: API_VERSION,
        });
    }

    let kind_str = str_field(value, "kind");
    let Some(kind) = Kind::parse(kind_str) else {
        return Err(ParseError::UnknownKind {
            index,
            kind: kind_str.to_string(),
        });
    };

    let metadata = match value.get("metadata") {
        Some(node) if !node.is_null() => {
            serde_yaml_ng::from_value::<Metadata>(node.clone()).map_err(|e| ParseError::Yaml {
                index,
                message: format!("decode metadata: {e}"),
            })?
        }
        _ => Metadata::default(),
    };

    // A document with no spec still yields a manifest; the validator catches
    // any required fields the empty spec is missing.
    let spec_node = value.get("spec").filter(|v| !v.is_null()).cloned();
    let spec = decode_spec(index, kind, spec_node)?;

    Ok(Manifest {
        api_version: api_version.to_string(),
        metadata,
        spec,
    })
}

fn decode_spec(index: usize, kind: Kind, node: Option<Value>) -> Result<PolicySpec, ParseError> {
    fn typed<T: serde::de::DeserializeOwned + Default>(
        index: usize,
        kind: Kind,
        node: Option<Value>,
    ) -> Result<T, ParseError> {
        match node {
            Some(v) => serde_yaml_ng::from_value(v).map_err(|e| ParseError::Spec {
                index,
                kind: kind.as_str(),
                message: e.to_string(),
            }),
            None => Ok(T::default()),
        }
    }

    Ok(match kind {
        Kind::FirewallPolicy => {
            PolicySpec::Firewall(typed::<FirewallPolicySpec>(index, kind, node)?)
        }
        Kind::NatPolicy => PolicySpec::Nat(typed::<NatPolicySpec>(index, kind, node)?),
        Kind::LoadBalancerPolicy => {
            PolicySpec::LoadBalancer(typed::<LoadBalancerPolicySpec>(index, kind, node)?)
        }
        Kind::VpnPolicy => PolicySpec::Vpn(typed::<VpnPolicySpec>(index, kind, node)?),
        Kind::IdsPolicy => PolicySpec::Ids(typed::<IdsPolicySpec>(index, kind, node)?),
    })
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREWALL_DOC: &str = r#"
apiVersion: aegisx.io/v1
kind: FirewallPolicy
metadata:
  name: web-allow
  namespace: prod
spec:
  defaultAction: DROP
  rules:
    - name: allow-http
      action: ALLOW
      protocol: tcp
      destination:
        ports: [80, 443]
"#;

    #[test]
    fn parses_single_firewall_document() {
        let manifests = ManifestParser::new().parse_str(FIREWALL_DOC).unwrap();
        assert_eq!(manifests.len(), 1);

        let m = &manifests[0];
        assert_eq!(m.kind(), Kind::FirewallPolicy);
        assert_eq!(m.metadata.name, "web-allow");
        assert_eq!(m.metadata.namespace, "prod");

        let PolicySpec::Firewall(ref spec) = m.spec else {
            panic!("expected firewall spec");
        };
        assert_eq!(spec.default_action, "DROP");
        assert_eq!(spec.rules.len(), 1);
        assert_eq!(spec.rules[0].destination.ports, vec![80, 443]);
    }

    #[test]
    fn parses_multi_document_stream() {
        let input = format!(
            "{FIREWALL_DOC}\n---\napiVersion: aegisx.io/v1\nkind: NATPolicy\nmetadata:\n  name: outbound\nspec:\n  rules:\n    - name: masq\n      type: MASQUERADE\n"
        );
        let manifests = ManifestParser::new().parse_str(&input).unwrap();
        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[0].kind(), Kind::FirewallPolicy);
        assert_eq!(manifests[1].kind(), Kind::NatPolicy);
    }

    #[test]
    fn empty_stream_is_not_an_error() {
        let manifests = ManifestParser::new().parse_str("").unwrap();
        assert!(manifests.is_empty());

        let manifests = ManifestParser::new().parse_stream(b"").unwrap();
        assert!(manifests.is_empty());
    }

    #[test]
    fn trailing_empty_documents_are_skipped() {
        let input = format!("{FIREWALL_DOC}\n---\n\n---\n");
        let manifests = ManifestParser::new().parse_str(&input).unwrap();
        assert_eq!(manifests.len(), 1);
    }

    #[test]
    fn unsupported_api_version_is_rejected() {
        let input = "apiVersion: aegisx.io/v2\nkind: FirewallPolicy\n";
        let err = ManifestParser::new().parse_str(input).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedApiVersion { .. }));
        assert!(err.to_string().contains("aegisx.io/v2"));
    }

    #[test]
    fn missing_api_version_is_rejected() {
        let input = "kind: FirewallPolicy\nmetadata:\n  name: x\n";
        let err = ManifestParser::new().parse_str(input).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedApiVersion { .. }));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let input = "apiVersion: aegisx.io/v1\nkind: RoutingPolicy\n";
        let err = ManifestParser::new().parse_str(input).unwrap_err();
        assert!(matches!(err, ParseError::UnknownKind { .. }));
    }

    #[test]
    fn document_without_spec_gets_empty_spec() {
        let input = "apiVersion: aegisx.io/v1\nkind: FirewallPolicy\nmetadata:\n  name: bare\n";
        let manifests = ManifestParser::new().parse_str(input).unwrap();
        assert_eq!(manifests.len(), 1);
        let PolicySpec::Firewall(ref spec) = manifests[0].spec else {
            panic!("expected firewall spec");
        };
        assert!(spec.rules.is_empty());
        assert!(spec.default_action.is_empty());
    }

    #[test]
    fn malformed_yaml_is_an_error_not_a_panic() {
        let input = "apiVersion: aegisx.io/v1\nkind: [unterminated\n";
        assert!(ManifestParser::new().parse_str(input).is_err());
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let err = ManifestParser::new().parse_stream(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ParseError::Utf8(_)));
    }

    #[test]
    fn spec_of_wrong_shape_is_a_spec_error() {
        let input = "apiVersion: aegisx.io/v1\nkind: FirewallPolicy\nspec: [1, 2]\n";
        let err = ManifestParser::new().parse_str(input).unwrap_err();
        assert!(matches!(err, ParseError::Spec { .. }));
    }

    #[test]
    fn parse_dir_reads_yaml_files_in_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "apiVersion: aegisx.io/v1\nkind: NATPolicy\nmetadata:\n  name: second\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.yml"),
            "apiVersion: aegisx.io/v1\nkind: FirewallPolicy\nmetadata:\n  name: first\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let manifests = ManifestParser::new().parse_dir(dir.path()).unwrap();
        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[0].metadata.name, "first");
        assert_eq!(manifests[1].metadata.name, "second");
    }

    #[test]
    fn parse_dir_propagates_file_context() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "apiVersion: wrong/v9\nkind: X\n").unwrap();

        let err = ManifestParser::new().parse_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"), "got: {err}");
    }

    #[test]
    fn parse_file_missing_path_is_io_error() {
        let err = ManifestParser::new()
            .parse_file(Path::new("/nonexistent/x.yaml"))
            .unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
