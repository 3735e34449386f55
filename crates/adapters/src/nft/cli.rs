//! `nft` binary invocation.
//!
//! All three operations shell out to the host's nftables CLI and capture
//! stdout and stderr into a single buffer; that text is the only diagnostic
//! an operator gets for a rejected ruleset.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use ports::secondary::ruleset_loader::{LoaderError, RulesetLoader};

const NFT_BIN: &str = "nft";
const FAMILY: &str = "inet";

#[derive(Debug, Clone)]
pub struct NftCli {
    table_name: String,
}

impl NftCli {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, LoaderError> {
        let output = Command::new(NFT_BIN)
            .args(args)
            .output()
            .await
            .map_err(|e| LoaderError {
                code: None,
                output: format!("spawn {NFT_BIN}: {e}"),
            })?;

        let combined = combine_output(&output.stdout, &output.stderr);
        if output.status.success() {
            Ok(combined)
        } else {
            Err(LoaderError {
                code: output.status.code(),
                output: combined,
            })
        }
    }
}

#[async_trait]
impl RulesetLoader for NftCli {
    async fn load_file(&self, path: &Path) -> Result<(), LoaderError> {
        // `nft -f` commits the whole file transactionally: the kernel takes
        // the entire ruleset or rejects it as a unit.
        let path = path.display().to_string();
        self.run(&["-f", &path]).await.map(|_| ())
    }

    async fn dump_table(&self) -> Result<String, LoaderError> {
        self.run(&["-s", "list", "table", FAMILY, &self.table_name])
            .await
    }

    async fn delete_table(&self) -> Result<(), LoaderError> {
        match self.run(&["delete", "table", FAMILY, &self.table_name]).await {
            Ok(_) => Ok(()),
            // Deleting an absent table is success; nft reports it as ENOENT.
            Err(e) if is_missing_table(&e.output) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&stderr);
    }
    combined
}

fn is_missing_table(output: &str) -> bool {
    output.contains("No such file or directory") || output.contains("does not exist")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_detection() {
        assert!(is_missing_table(
            "Error: Could not process rule: No such file or directory"
        ));
        assert!(is_missing_table("table 'aegisx' does not exist"));
        assert!(!is_missing_table("Error: syntax error"));
    }

    #[test]
    fn combine_joins_stdout_and_stderr() {
        let combined = combine_output(b"partial table", b"Error: rejected");
        assert_eq!(combined, "partial table\nError: rejected");
    }

    #[test]
    fn combine_with_empty_stderr() {
        assert_eq!(
            combine_output(b"table inet aegisx {\n}\n", b""),
            "table inet aegisx {\n}\n"
        );
    }

    #[test]
    fn combine_with_empty_stdout() {
        assert_eq!(combine_output(b"", b"Error: rejected"), "Error: rejected");
    }
}
