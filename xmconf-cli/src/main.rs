use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use xmconf_core::{paths, DomainStore, OpenMode, StoreConfig};

mod commands;

#[derive(Parser)]
#[command(name = "xmconf")]
#[command(about = "Inspect and edit inactive Xen domain definitions", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Settings file (defaults to $XDG_CONFIG_HOME/xmconf/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Definitions directory (overrides the settings file)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Configuration-format version of the local toolstack
    #[arg(long, global = true)]
    format_version: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List defined domains that are not running
    List {
        /// Maximum number of names to show
        #[arg(short, long)]
        max: Option<usize>,

        /// Names to treat as running (repeatable)
        #[arg(long)]
        running: Vec<String>,
    },

    /// Show resource information for a domain
    Info {
        /// Domain name
        name: String,
    },

    /// Print a domain's XML
    Dump {
        /// Domain name
        name: String,

        /// Include secrets such as VNC passwords
        #[arg(long)]
        secure: bool,
    },

    /// Define (or redefine) a domain from an XML file
    Define {
        /// Path to the domain XML
        file: PathBuf,
    },

    /// Remove a domain's configuration file
    Undefine {
        /// Domain name
        name: String,
    },

    /// Set current memory in KiB
    SetMemory { name: String, kib: u64 },

    /// Set maximum memory in KiB
    SetMaxMemory { name: String, kib: u64 },

    /// Set the number of virtual CPUs
    SetVcpus { name: String, count: u32 },

    /// Pin a domain to a set of physical CPUs
    Pin {
        /// Domain name
        name: String,

        /// Physical CPUs, e.g. "0-3,^2"
        cpus: String,

        /// Virtual CPU number
        #[arg(long, default_value = "0")]
        vcpu: u32,
    },

    /// Attach a disk or interface described by an XML file
    Attach { name: String, file: PathBuf },

    /// Detach a disk or interface described by an XML file
    Detach { name: String, file: PathBuf },

    /// Convert between configuration files and domain XML
    #[command(subcommand)]
    Translate(TranslateCommands),
}

#[derive(Subcommand)]
enum TranslateCommands {
    /// Configuration file to domain XML
    ToXml {
        /// Path to the configuration file
        file: PathBuf,
    },

    /// Domain XML to configuration file
    ToConf {
        /// Path to the domain XML
        file: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let settings = cli.config.clone().unwrap_or_else(paths::settings_path);
    let mut config = StoreConfig::load(&settings)
        .with_context(|| format!("Failed to load settings from {}", settings.display()))?;
    if let Some(dir) = &cli.dir {
        config.config_dir = dir.clone();
    }
    if let Some(version) = cli.format_version {
        config.format_version = version;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    xmconf_core::init_observability(level).map_err(|e| anyhow::anyhow!(e))?;

    let config = load_config(&cli)?;
    tracing::debug!(dir = %config.config_dir.display(), version = config.format_version, "Using definitions");

    if let Commands::Translate(cmd) = &cli.command {
        let translator = xmconf_core::Translator::xen_default(config.format_version);
        return match cmd {
            TranslateCommands::ToXml { file } => commands::translate::to_xml(&translator, file),
            TranslateCommands::ToConf { file } => commands::translate::to_conf(&translator, file),
        };
    }

    let read_only = matches!(cli.command, Commands::List { .. } | Commands::Info { .. } | Commands::Dump { .. });
    let mode = if read_only { OpenMode::ReadOnly } else { OpenMode::ReadWrite };

    let mut store = DomainStore::with_config(config);
    let session = store.open(mode);

    let result = match cli.command {
        Commands::List { max, running } => commands::domains::list(&mut store, &session, max, running),
        Commands::Info { name } => commands::domains::info(&mut store, &session, &name),
        Commands::Dump { name, secure } => commands::domains::dump(&mut store, &session, &name, secure),
        Commands::Define { file } => commands::domains::define(&mut store, &session, &file),
        Commands::Undefine { name } => commands::domains::undefine(&mut store, &session, &name),
        Commands::SetMemory { name, kib } => commands::tune::set_memory(&mut store, &session, &name, kib),
        Commands::SetMaxMemory { name, kib } => {
            commands::tune::set_max_memory(&mut store, &session, &name, kib)
        }
        Commands::SetVcpus { name, count } => commands::tune::set_vcpus(&mut store, &session, &name, count),
        Commands::Pin { name, cpus, vcpu } => commands::tune::pin(&mut store, &session, &name, vcpu, &cpus),
        Commands::Attach { name, file } => commands::devices::attach(&mut store, &session, &name, &file),
        Commands::Detach { name, file } => commands::devices::detach(&mut store, &session, &name, &file),
        Commands::Translate(_) => Ok(()),
    };

    store.close(session);
    result
}
