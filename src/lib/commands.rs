use std::io::Write;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::lib::error::{CostError, Result};
use crate::lib::filter::{exclude_unallocated, filter_by_namespace};
use crate::lib::identifier::{AllocationTitle, Dimension, GroupTitle};
use crate::lib::query::{query_aggregated_cost_model, query_allocation};
use crate::lib::table::{DisplayOptions, QueryMode, write_report};
use crate::lib::transport::CostTransport;

/// The resource dimension a cost command reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostDimension {
    Namespace,
    Deployment,
    Pod,
}

/// Options shared by every cost command
#[derive(Debug, Clone)]
pub struct CostOptions {
    pub window: String,
    pub mode: QueryMode,
    pub display: DisplayOptions,
    /// Empty means all namespaces
    pub namespace_filter: String,
    pub currency: String,
}

impl CostOptions {
    /// Rejects combinations the backend cannot serve. Runs before any query.
    pub fn validate(&self, dimension: CostDimension) -> Result<()> {
        if self.display.show_efficiency && self.mode == QueryMode::Rate {
            return Err(CostError::UnsupportedMode(
                "--show-efficiency only works with --historical".to_string(),
            ));
        }

        // The allocation API does not return deployment names.
        if dimension == CostDimension::Deployment && self.mode == QueryMode::Historical {
            return Err(CostError::UnsupportedMode(
                "deployment does not yet support historical queries".to_string(),
            ));
        }

        Ok(())
    }
}

/// Query the cost service for `dimension` and write the report to `out`
pub async fn run_cost<T, W>(
    dimension: CostDimension,
    transport: &T,
    options: &CostOptions,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<()>
where
    T: CostTransport,
    W: Write + ?Sized,
{
    options.validate(dimension)?;
    info!(
        "Querying {:?} costs for window '{}' ({:?})",
        dimension, options.window, options.mode
    );

    match dimension {
        CostDimension::Namespace => run_namespace(transport, options, out, cancel).await,
        CostDimension::Deployment => run_deployment(transport, options, out, cancel).await,
        CostDimension::Pod => run_pod(transport, options, out, cancel).await,
    }
}

async fn run_namespace<T, W>(
    transport: &T,
    options: &CostOptions,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<()>
where
    T: CostTransport,
    W: Write + ?Sized,
{
    let parser = GroupTitle::new(vec![Dimension::Namespace]);

    match options.mode {
        QueryMode::Rate => {
            let mut data =
                query_aggregated_cost_model(transport, &options.window, Dimension::Namespace, cancel)
                    .await?;
            filter_by_namespace(&mut data, &options.namespace_filter, &parser);
            write_report(out, &data, &parser, &options.display, options.mode, &options.currency)?;
        }
        QueryMode::Historical => {
            let mut data =
                query_allocation(transport, &options.window, Some(Dimension::Namespace), cancel)
                    .await?;
            filter_by_namespace(&mut data, &options.namespace_filter, &parser);
            write_report(out, &data, &parser, &options.display, options.mode, &options.currency)?;
        }
    }

    Ok(())
}

async fn run_deployment<T, W>(
    transport: &T,
    options: &CostOptions,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<()>
where
    T: CostTransport,
    W: Write + ?Sized,
{
    let parser = GroupTitle::new(vec![Dimension::Namespace, Dimension::Deployment]);

    let mut data =
        query_aggregated_cost_model(transport, &options.window, Dimension::Deployment, cancel)
            .await?;

    exclude_unallocated(&mut data);
    filter_by_namespace(&mut data, &options.namespace_filter, &parser);

    write_report(out, &data, &parser, &options.display, options.mode, &options.currency)?;
    Ok(())
}

async fn run_pod<T, W>(
    transport: &T,
    options: &CostOptions,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<()>
where
    T: CostTransport,
    W: Write + ?Sized,
{
    match options.mode {
        QueryMode::Rate => {
            let parser = GroupTitle::new(vec![Dimension::Namespace, Dimension::Pod]);
            let mut data =
                query_aggregated_cost_model(transport, &options.window, Dimension::Pod, cancel)
                    .await?;
            exclude_unallocated(&mut data);
            filter_by_namespace(&mut data, &options.namespace_filter, &parser);
            write_report(out, &data, &parser, &options.display, options.mode, &options.currency)?;
        }
        QueryMode::Historical => {
            // unaggregated allocations are keyed cluster/node/namespace/pod/container
            let parser =
                AllocationTitle::new(vec![Dimension::Namespace, Dimension::Pod, Dimension::Container]);
            let mut data = query_allocation(transport, &options.window, None, cancel).await?;
            debug!("Filtering {} allocations", data.len());
            filter_by_namespace(&mut data, &options.namespace_filter, &parser);
            write_report(out, &data, &parser, &options.display, options.mode, &options.currency)?;
        }
    }

    Ok(())
}
