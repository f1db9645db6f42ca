//! Output formatting for CLI results
//!
//! Three output formats are supported:
//! - Table: Human-readable tables (default)
//! - JSON: Structured JSON for scripting and automation
//! - Quiet: Minimal output, exit codes only

use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use nitella_core::offline::ScanResult;

use crate::identity::IdentityInfo;
use crate::nodes::NodeInfo;
use crate::qr::{QrInspection, SignedReply};
use crate::ExitCode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// Standard JSON response wrapper
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }

    pub fn success_with_command(data: T, command: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            ..Self::success(data)
        }
    }
}

impl JsonResponse<()> {
    pub fn error(message: &str) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }
}

/// Pairing code output
#[derive(Debug, Clone, Serialize)]
pub struct CodeOutput {
    pub code: String,
    pub valid: bool,
}

/// Formats output for the selected mode
pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    pub fn format_identity(&self, info: &IdentityInfo, mnemonic: Option<&str>) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = property_table();
                table.add_row(vec!["Subject", &info.subject]);
                table.add_row(vec!["Fingerprint", &info.fingerprint]);
                table.add_row(vec!["Emoji Hash", &info.emoji_hash]);
                table.add_row(vec!["Expires", &info.expires]);
                table.add_row(vec!["Data Dir", &info.data_dir.display().to_string()]);
                table.add_row(vec!["Key Encrypted", if info.encrypted { "yes" } else { "no" }]);
                if let Some(words) = mnemonic {
                    table.add_row(vec!["Recovery Phrase", words]);
                }
                table.to_string()
            }
            OutputFormat::Json => {
                #[derive(Serialize)]
                struct Out<'a> {
                    #[serde(flatten)]
                    info: &'a IdentityInfo,
                    #[serde(skip_serializing_if = "Option::is_none")]
                    mnemonic: Option<&'a str>,
                }
                self.to_json_response(&Out { info, mnemonic }, "identity")
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_nodes(&self, nodes: &[NodeInfo]) -> String {
        match self.format {
            OutputFormat::Table => {
                if nodes.is_empty() {
                    return "No node certificates found.".to_string();
                }
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Node ID", "Expires", "Emoji Hash"]);
                for node in nodes {
                    table.add_row(vec![&node.node_id, &node.not_after, &node.emoji_hash]);
                }
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(&nodes, "nodes list"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_node(&self, node: &NodeInfo) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = property_table();
                table.add_row(vec!["Node ID", &node.node_id]);
                table.add_row(vec!["Subject", &node.subject]);
                table.add_row(vec!["Issuer", &node.issuer]);
                table.add_row(vec!["Serial", &node.serial]);
                table.add_row(vec!["Not Before", &node.not_before]);
                table.add_row(vec!["Not After", &node.not_after]);
                table.add_row(vec!["Fingerprint", &node.fingerprint]);
                table.add_row(vec!["Emoji Hash", &node.emoji_hash]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(node, "nodes show"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_inspection(&self, inspection: &QrInspection) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = property_table();
                table.add_row(vec!["Type", &inspection.kind]);
                table.add_row(vec!["Node ID", inspection.node_id.as_deref().unwrap_or("-")]);
                table.add_row(vec!["Common Name", &inspection.common_name]);
                table.add_row(vec![
                    "Payload Fingerprint",
                    &format!(
                        "{} ({})",
                        inspection.fingerprint,
                        if inspection.fingerprint_valid { "valid" } else { "MISMATCH" }
                    ),
                ]);
                table.add_row(vec!["Key Fingerprint", &inspection.key_fingerprint]);
                table.add_row(vec!["Key Emoji Hash", &inspection.key_emoji_hash]);
                table.add_row(vec!["Includes CA", if inspection.has_ca { "yes" } else { "no" }]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(inspection, "qr inspect"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Scan summary shown before the user confirms signing.
    pub fn format_scan(&self, scan: &ScanResult) -> String {
        let mut table = property_table();
        table.add_row(vec!["Node ID", &scan.node_id]);
        table.add_row(vec!["Fingerprint", &scan.fingerprint]);
        table.add_row(vec!["Emoji Hash", &scan.emoji_hash]);
        table.to_string()
    }

    pub fn format_reply(&self, reply: &SignedReply) -> String {
        match self.format {
            OutputFormat::Table => reply.qr_data.clone(),
            OutputFormat::Json => self.to_json_response(reply, "qr sign"),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_code(&self, code: &CodeOutput, command: &str) -> String {
        match self.format {
            OutputFormat::Table => code.code.clone(),
            OutputFormat::Json => self.to_json_response(code, command),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Error report, with the exit code in JSON mode.
    pub fn format_error_with_code(&self, error: &anyhow::Error, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table => format!("Error: {error:#}"),
            OutputFormat::Json => {
                #[derive(Serialize)]
                struct Out {
                    #[serde(flatten)]
                    response: JsonResponse<()>,
                    exit_code: i32,
                    exit_code_name: &'static str,
                }
                self.to_json(&Out {
                    response: JsonResponse::error(&format!("{error:#}")),
                    exit_code: code.into(),
                    exit_code_name: code.name(),
                })
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Progress message, verbose table mode only
    pub fn progress(&self, message: &str) {
        if self.verbose && self.format == OutputFormat::Table {
            eprintln!("... {message}");
        }
    }

    pub fn success(&self, message: &str) {
        if self.format == OutputFormat::Table {
            println!("✓ {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if self.format == OutputFormat::Table {
            eprintln!("⚠ {message}");
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    fn to_json_response<T: Serialize>(&self, value: &T, command: &str) -> String {
        self.to_json(&JsonResponse::success_with_command(value, command))
    }
}

fn property_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Property", "Value"]);
    table
}
