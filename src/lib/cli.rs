use clap::{Args, Parser, Subcommand};

use crate::lib::commands::{CostDimension, CostOptions};
use crate::lib::config::{
    Config, DEFAULT_KUBECOST_NAMESPACE, DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_PORT, TransportMode,
};
use crate::lib::table::{DisplayOptions, QueryMode};

/// kubectl cost
///
/// View cluster cost information from the cost-analysis service, grouped by
/// namespace, deployment or pod.
#[derive(Parser, Debug)]
#[command(name = "kubectl-cost", author, version, about, styles=get_styles())]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress log output to stderr (logs still written to file)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Provide context name
    ///
    /// Use if you have multiple clusters in your kubeconfig
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Namespace the cost-analysis service runs in
    #[arg(long, env = "KUBECOST_NAMESPACE", default_value = DEFAULT_KUBECOST_NAMESPACE, global = true)]
    pub kubecost_namespace: String,

    /// Name of the cost-analysis service
    #[arg(long, default_value = DEFAULT_SERVICE_NAME, global = true)]
    pub service_name: String,

    /// Port of the cost-analysis service
    #[arg(long, default_value_t = DEFAULT_SERVICE_PORT, global = true)]
    pub service_port: u16,

    /// Reach the service through the API server proxy instead of port-forwarding
    #[arg(long, global = true)]
    pub use_proxy: bool,

    /// HTTP timeout in seconds for port-forwarded queries
    #[arg(long, default_value = "30", global = true)]
    pub timeout_secs: u64,

    /// Currency code printed after every cost
    #[arg(long, default_value = "USD", global = true)]
    pub currency: String,

    #[command(subcommand)]
    pub command: CostCommand,
}

#[derive(Subcommand, Debug)]
pub enum CostCommand {
    /// View cost information aggregated by namespace
    Namespace(CostArgs),
    /// View cost information aggregated by deployment
    Deployment(CostArgs),
    /// View cost information per pod container
    Pod(CostArgs),
}

/// Flags shared by every cost subcommand
#[derive(Args, Debug, Clone)]
pub struct CostArgs {
    /// The window of data to query
    #[arg(long, default_value = "yesterday")]
    pub window: String,

    /// Show the total cost during the window instead of the projected monthly rate
    #[arg(long, conflicts_with = "rate")]
    pub historical: bool,

    /// Show the projected monthly rate based on the data in the window (default)
    #[arg(long)]
    pub rate: bool,

    /// Show data for CPU cost
    #[arg(long)]
    pub show_cpu: bool,

    /// Show data for memory cost
    #[arg(long)]
    pub show_memory: bool,

    /// Show data for GPU cost
    #[arg(long)]
    pub show_gpu: bool,

    /// Show data for PV (persistent volume) cost
    #[arg(long)]
    pub show_pv: bool,

    /// Show data for network cost
    #[arg(long)]
    pub show_network: bool,

    /// Show efficiency of cost. Only works with --historical
    #[arg(long)]
    pub show_efficiency: bool,

    /// Equivalent to --show-cpu --show-memory --show-gpu --show-pv --show-network
    #[arg(short = 'A', long)]
    pub show_all_resources: bool,

    /// Limit results to only one namespace. Defaults to all namespaces
    #[arg(short = 'N', long, default_value = "")]
    pub namespace_filter: String,
}

impl CostCommand {
    pub fn dimension(&self) -> CostDimension {
        match self {
            CostCommand::Namespace(_) => CostDimension::Namespace,
            CostCommand::Deployment(_) => CostDimension::Deployment,
            CostCommand::Pod(_) => CostDimension::Pod,
        }
    }

    pub fn args(&self) -> &CostArgs {
        match self {
            CostCommand::Namespace(args)
            | CostCommand::Deployment(args)
            | CostCommand::Pod(args) => args,
        }
    }
}

impl CostArgs {
    pub fn display_options(&self) -> DisplayOptions {
        let options = DisplayOptions {
            show_cpu: self.show_cpu,
            show_memory: self.show_memory,
            show_gpu: self.show_gpu,
            show_pv: self.show_pv,
            show_network: self.show_network,
            show_efficiency: self.show_efficiency,
        };
        if self.show_all_resources {
            options.show_all_resources()
        } else {
            options
        }
    }

    pub fn mode(&self) -> QueryMode {
        if self.historical {
            QueryMode::Historical
        } else {
            QueryMode::Rate
        }
    }

    pub fn cost_options(&self, currency: &str) -> CostOptions {
        CostOptions {
            window: self.window.clone(),
            mode: self.mode(),
            display: self.display_options(),
            namespace_filter: self.namespace_filter.clone(),
            currency: currency.to_string(),
        }
    }
}

impl Cli {
    pub fn config(&self) -> Config {
        let transport = if self.use_proxy {
            TransportMode::Proxy
        } else {
            TransportMode::PortForward
        };

        Config::new(
            self.context.clone(),
            self.kubecost_namespace.clone(),
            self.service_name.clone(),
            self.service_port,
            transport,
        )
        .with_timeout(std::time::Duration::from_secs(self.timeout_secs))
        .with_currency(self.currency.clone())
    }
}

/// Set color and variants for help description
///
/// Thanks to [Praveen Perera](https://stackoverflow.com/a/76916424)
fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .header(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .literal(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .placeholder(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
}
