use std::path::PathBuf;

use clap::Parser;

use crate::common::cpuset::CpuSet;
use crate::config::{DEFAULT_CDI_ROOT, DEFAULT_PLUGIN_DIR};

#[derive(Parser)]
pub struct CommonOpts {
    /// Name of the node this plugin is running on
    #[arg(long, env = "NODE_NAME", global = true, help_heading("GLOBAL OPTIONS"))]
    pub node_name: Option<String>,

    /// Directory where CDI spec files are written
    #[arg(
        long,
        env = "CDI_ROOT",
        default_value = DEFAULT_CDI_ROOT,
        value_hint = clap::ValueHint::DirPath,
        global = true,
        help_heading("GLOBAL OPTIONS")
    )]
    pub cdi_root: PathBuf,

    /// Directory holding the plugin checkpoint
    #[arg(
        long,
        env = "PLUGIN_DIR",
        default_value = DEFAULT_PLUGIN_DIR,
        value_hint = clap::ValueHint::DirPath,
        global = true,
        help_heading("GLOBAL OPTIONS")
    )]
    pub plugin_dir: PathBuf,

    /// Directory of resource claim documents stored as `<namespace>/<name>.json`
    #[arg(
        long,
        env = "CLAIMS_DIR",
        value_hint = clap::ValueHint::DirPath,
        global = true,
        help_heading("GLOBAL OPTIONS")
    )]
    pub claims_dir: Option<PathBuf>,

    /// CPUs reserved for the system (cpulist, e.g. `0-1`)
    #[arg(
        long,
        env = "RESERVED_CPUS",
        default_value = "",
        global = true,
        help_heading("CPU PARTITION")
    )]
    pub reserved_cpus: CpuSet,

    /// CPUs that can be exclusively allocated to claims
    #[arg(
        long,
        env = "ALLOCATABLE_CPUS",
        default_value = "",
        global = true,
        help_heading("CPU PARTITION")
    )]
    pub allocatable_cpus: CpuSet,

    /// CPUs shared by all containers
    #[arg(
        long,
        env = "SHARED_CPUS",
        default_value = "",
        global = true,
        help_heading("CPU PARTITION")
    )]
    pub shared_cpus: CpuSet,

    /// Enables more detailed log output
    #[arg(long, env = "CPUDRA_DEBUG", global = true, help_heading("GLOBAL OPTIONS"))]
    pub debug: bool,
}

// Kubelet plugin of the CPU resource driver
#[derive(Parser)]
#[command(author, about, version(crate::CPUDRA_VERSION))]
#[command(name = "cpudra-kubeletplugin")]
pub struct RootOptions {
    #[clap(flatten)]
    pub common: CommonOpts,

    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Parser)]
pub enum SubCommand {
    /// Publishes the CPU devices and serves until a termination signal arrives
    Run,
    /// Prepares the claims stored in the given JSON files
    Prepare(PrepareOpts),
    /// Unprepares the claims with the given UIDs
    Unprepare(UnprepareOpts),
    /// Prints the claims recorded in the checkpoint
    Checkpoint,
}

#[derive(Parser)]
pub struct PrepareOpts {
    /// Paths to resource claim documents, or `<namespace>/<name>=<uid>`
    /// references resolved in `--claims-dir` when it is set
    #[arg(required = true)]
    pub claims: Vec<String>,
}

#[derive(Parser)]
pub struct UnprepareOpts {
    /// UIDs of prepared claims
    #[arg(required = true)]
    pub uids: Vec<String>,
}
