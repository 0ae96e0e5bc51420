//! kubectl cost
//!
//! This library retrieves cost-accounting data from a cluster-resident
//! cost-analysis service and renders it as tables grouped by namespace,
//! deployment or pod.

pub mod lib {
    pub mod cli;
    pub mod commands;
    pub mod config;
    pub mod error;
    pub mod filter;
    pub mod identifier;
    pub mod kubernetes;
    pub mod logger;
    pub mod model;
    pub mod query;
    pub mod table;
    pub mod transport;
}

// Re-export commonly used types at the root level for convenience
pub use lib::cli::{Cli, CostArgs, CostCommand};
pub use lib::commands::{CostDimension, CostOptions, run_cost};
pub use lib::config::{Config, TransportMode};
pub use lib::error::{
    ConfigError, CostError, DecodeError, KubernetesError, ParseError, RenderError, Result,
    TransportError,
};
pub use lib::filter::{exclude_unallocated, filter_by_namespace};
pub use lib::identifier::{
    AllocationName, AllocationTitle, Dimension, GroupTitle, IDLE_KEY, TitleParser,
    UNALLOCATED_KEY, parse_group_title,
};
pub use lib::kubernetes::{BackendPod, KubernetesLoader};
pub use lib::logger::init_logger;
pub use lib::model::{
    AggregationRecord, AggregationSet, AllocationRecord, AllocationSet, CostMetrics,
    decode_accumulated_allocation, decode_aggregation, decode_allocation,
};
pub use lib::query::{query_aggregated_cost_model, query_allocation};
pub use lib::table::{DisplayOptions, QueryMode, Report, build_report, write_report};
pub use lib::transport::{
    CostTransport, PortForwardTransport, ProxyTransport, QueryParams, Transport,
};
