//! CLI command definitions and argument parsing

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use nitella_core::config::Config;
use nitella_core::node_store::NodeCertStore;
use nitella_crypto::wordlist::{generate_pairing_code, parse_pairing_code};

use crate::identity::{self, IdentityInfo};
use crate::output::{CodeOutput, OutputFormat, OutputFormatter};
use crate::{nodes, qr, ExitCode};

/// Nitella CLI - root CA identity and node trust management
#[derive(Parser, Debug)]
#[command(name = "nitella")]
#[command(version, about = "Nitella CLI - root CA identity and node trust management")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: table, json, quiet
    #[arg(long, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides config)
    #[arg(long, global = true, env = "NITELLA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl Cli {
    /// Execute the command with a resolved configuration.
    pub async fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        let formatter = OutputFormatter::new(self.output, self.verbose);
        match self.command {
            Commands::Identity(args) => args.execute(&formatter, &config).await,
            Commands::Code(args) => args.execute(&formatter),
            Commands::Qr(args) => args.execute(&formatter, &config).await,
            Commands::Nodes(args) => args.execute(&formatter, &config),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the root CA identity
    Identity(IdentityArgs),
    /// Generate or check pairing codes
    Code(CodeArgs),
    /// Offline pairing through QR payloads
    Qr(QrArgs),
    /// Manage signed node certificates
    Nodes(NodesArgs),
}

/// Ask a yes/no question on stderr.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    eprint!("{prompt} [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

// ============================================================================
// identity
// ============================================================================

#[derive(Parser, Debug)]
pub struct IdentityArgs {
    #[command(subcommand)]
    pub action: IdentityAction,
}

#[derive(Subcommand, Debug)]
pub enum IdentityAction {
    /// Create the identity, or load it when it exists
    Init {
        /// Replace an existing identity
        #[arg(long)]
        force: bool,

        /// Recover from a 12 or 24 word recovery phrase
        #[arg(long)]
        mnemonic: Option<String>,
    },
    /// Show the identity
    Show,
    /// Import a root CA from PEM files
    Import {
        #[arg(long)]
        cert: PathBuf,

        #[arg(long)]
        key: PathBuf,

        /// Replace an existing identity
        #[arg(long)]
        force: bool,
    },
}

impl IdentityArgs {
    pub async fn execute(self, formatter: &OutputFormatter, config: &Config) -> anyhow::Result<ExitCode> {
        let identity_config = identity::identity_config(config)?;
        let data_dir = identity_config.data_dir.clone();

        match self.action {
            IdentityAction::Init { force, mnemonic } => {
                formatter.progress("Initializing identity...");
                let outcome = tokio::task::spawn_blocking(move || {
                    identity::init(identity_config, force, mnemonic.as_deref())
                })
                .await
                .context("identity task failed")??;

                let info = IdentityInfo::new(&outcome.identity, &data_dir)?;
                // The recovery phrase only exists for freshly generated keys.
                let mnemonic = outcome.identity.mnemonic();
                if outcome.created {
                    formatter.success("Identity created");
                    if mnemonic.is_some() {
                        formatter.warning("Write down the recovery phrase; it is not stored");
                    }
                    if !info.encrypted {
                        formatter.warning("Root key is not encrypted; set NITELLA_PASSPHRASE to protect it");
                    }
                } else {
                    formatter.success("Existing identity loaded");
                }
                println!("{}", formatter.format_identity(&info, mnemonic));
                Ok(ExitCode::Success)
            }
            IdentityAction::Show => {
                formatter.progress("Loading identity...");
                let identity = tokio::task::spawn_blocking(move || identity::load(&identity_config))
                    .await
                    .context("identity task failed")??;
                let info = IdentityInfo::new(&identity, &data_dir)?;
                println!("{}", formatter.format_identity(&info, None));
                Ok(ExitCode::Success)
            }
            IdentityAction::Import { cert, key, force } => {
                formatter.progress(&format!("Importing {}...", cert.display()));
                let identity = tokio::task::spawn_blocking(move || {
                    identity::import(&identity_config, &cert, &key, force)
                })
                .await
                .context("identity task failed")??;
                let info = IdentityInfo::new(&identity, &data_dir)?;
                formatter.success("Identity imported");
                println!("{}", formatter.format_identity(&info, None));
                Ok(ExitCode::Success)
            }
        }
    }
}

// ============================================================================
// code
// ============================================================================

#[derive(Parser, Debug)]
pub struct CodeArgs {
    #[command(subcommand)]
    pub action: CodeAction,
}

#[derive(Subcommand, Debug)]
pub enum CodeAction {
    /// Generate a pairing code
    Generate,
    /// Validate and normalize a pairing code
    Check { code: String },
}

impl CodeArgs {
    pub fn execute(self, formatter: &OutputFormatter) -> anyhow::Result<ExitCode> {
        match self.action {
            CodeAction::Generate => {
                let output = CodeOutput {
                    code: generate_pairing_code(),
                    valid: true,
                };
                println!("{}", formatter.format_code(&output, "code generate"));
                Ok(ExitCode::Success)
            }
            CodeAction::Check { code } => {
                let normalized = parse_pairing_code(&code)?;
                let output = CodeOutput {
                    code: normalized,
                    valid: true,
                };
                println!("{}", formatter.format_code(&output, "code check"));
                Ok(ExitCode::Success)
            }
        }
    }
}

// ============================================================================
// qr
// ============================================================================

#[derive(Parser, Debug)]
pub struct QrArgs {
    #[command(subcommand)]
    pub action: QrAction,
}

#[derive(Subcommand, Debug)]
pub enum QrAction {
    /// Decode a QR payload ("-" reads stdin)
    Inspect { file: PathBuf },
    /// Sign a node CSR payload and print the reply payload
    Sign {
        file: PathBuf,

        /// Expected node ID
        #[arg(long)]
        node_id: Option<String>,

        /// Skip the fingerprint confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

impl QrArgs {
    pub async fn execute(self, formatter: &OutputFormatter, config: &Config) -> anyhow::Result<ExitCode> {
        match self.action {
            QrAction::Inspect { file } => {
                let data = qr::read_payload(&file)?;
                let inspection = qr::inspect(&data)?;
                println!("{}", formatter.format_inspection(&inspection));
                if !inspection.fingerprint_valid {
                    formatter.warning("Payload fingerprint does not match its contents");
                }
                Ok(ExitCode::Success)
            }
            QrAction::Sign { file, node_id, yes } => {
                let data = qr::read_payload(&file)?;
                let identity_config = identity::identity_config(config)?;
                formatter.progress("Loading identity...");
                let ca = tokio::task::spawn_blocking(move || identity::load(&identity_config))
                    .await
                    .context("identity task failed")??;
                let store = NodeCertStore::new(config.data_dir());
                let offline = config.offline_pairing();

                let reply = qr::sign(&offline, &data, node_id.as_deref(), &ca, &store, |scan| {
                    if yes {
                        return Ok(true);
                    }
                    eprintln!("{}", formatter.format_scan(scan));
                    confirm("Does this match the fingerprint shown on the node?")
                })?;

                match reply {
                    Some(reply) => {
                        formatter.success(&format!("Signed certificate for {}", reply.node_id));
                        println!("{}", formatter.format_reply(&reply));
                        Ok(ExitCode::Success)
                    }
                    None => {
                        formatter.warning("Signing cancelled");
                        Ok(ExitCode::GeneralError)
                    }
                }
            }
        }
    }
}

// ============================================================================
// nodes
// ============================================================================

#[derive(Parser, Debug)]
pub struct NodesArgs {
    #[command(subcommand)]
    pub action: NodesAction,
}

#[derive(Subcommand, Debug)]
pub enum NodesAction {
    /// List stored node certificates
    List,
    /// Show one node certificate
    Show { node_id: String },
    /// Delete a node certificate
    Remove {
        node_id: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

impl NodesArgs {
    pub fn execute(self, formatter: &OutputFormatter, config: &Config) -> anyhow::Result<ExitCode> {
        let store = NodeCertStore::new(config.data_dir());

        match self.action {
            NodesAction::List => {
                formatter.progress(&format!("Reading {}...", store.dir().display()));
                let nodes = nodes::list(&store)?;
                println!("{}", formatter.format_nodes(&nodes));
                Ok(ExitCode::Success)
            }
            NodesAction::Show { node_id } => {
                let node = nodes::node_info(&store, &node_id)?;
                println!("{}", formatter.format_node(&node));
                Ok(ExitCode::Success)
            }
            NodesAction::Remove { node_id, force } => {
                if !force && !confirm(&format!("Remove certificate for {node_id}?"))? {
                    formatter.warning("Nothing removed");
                    return Ok(ExitCode::GeneralError);
                }
                store.delete(&node_id)?;
                formatter.success(&format!("Removed certificate for {node_id}"));
                Ok(ExitCode::Success)
            }
        }
    }
}
