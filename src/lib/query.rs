use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::lib::error::Result;
use crate::lib::identifier::Dimension;
use crate::lib::model::{
    AggregationSet, AllocationSet, decode_accumulated_allocation, decode_aggregation,
};
use crate::lib::transport::{CostTransport, QueryParams};

pub const ALLOCATION_PATH: &str = "/model/allocation";
pub const AGGREGATED_COST_MODEL_PATH: &str = "/model/aggregatedCostModel";

/// Parameters for an accumulated `/model/allocation` query.
///
/// `window` is passed through untouched; the backend interprets it.
pub fn allocation_params(window: &str, aggregate: Option<Dimension>) -> QueryParams {
    // accumulate=false would return one bucket per day
    let mut params: QueryParams = vec![
        ("window", window.to_string()),
        ("accumulate", "true".to_string()),
    ];
    if let Some(dimension) = aggregate {
        params.push(("aggregate", dimension.as_str().to_string()));
    }
    params
}

pub fn aggregated_cost_model_params(window: &str, aggregation: Dimension) -> QueryParams {
    vec![
        ("window", window.to_string()),
        ("aggregation", aggregation.as_str().to_string()),
        ("rate", "monthly".to_string()),
    ]
}

/// Total cost per allocation over `window`, accumulated into a single bucket
pub async fn query_allocation<T: CostTransport>(
    transport: &T,
    window: &str,
    aggregate: Option<Dimension>,
    cancel: &CancellationToken,
) -> Result<AllocationSet> {
    let params = allocation_params(window, aggregate);
    debug!("Querying {} with {:?}", ALLOCATION_PATH, params);

    let bytes = transport.fetch(ALLOCATION_PATH, &params, cancel).await?;
    let allocations = decode_accumulated_allocation(&bytes)?;

    info!("Retrieved {} allocations", allocations.len());
    Ok(allocations)
}

/// Projected monthly cost per `aggregation` group, based on `window`
pub async fn query_aggregated_cost_model<T: CostTransport>(
    transport: &T,
    window: &str,
    aggregation: Dimension,
    cancel: &CancellationToken,
) -> Result<AggregationSet> {
    let params = aggregated_cost_model_params(window, aggregation);
    debug!("Querying {} with {:?}", AGGREGATED_COST_MODEL_PATH, params);

    let bytes = transport
        .fetch(AGGREGATED_COST_MODEL_PATH, &params, cancel)
        .await?;
    let aggregations = decode_aggregation(&bytes)?;

    info!("Retrieved {} aggregations", aggregations.len());
    Ok(aggregations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_params_always_accumulate() {
        assert_eq!(
            allocation_params("yesterday", None),
            vec![
                ("window", "yesterday".to_string()),
                ("accumulate", "true".to_string()),
            ]
        );
        assert_eq!(
            allocation_params("7d", Some(Dimension::Namespace)).last(),
            Some(&("aggregate", "namespace".to_string()))
        );
    }

    #[test]
    fn aggregated_params_request_monthly_rate() {
        let params = aggregated_cost_model_params("1d", Dimension::Deployment);
        assert!(params.contains(&("aggregation", "deployment".to_string())));
        assert!(params.contains(&("rate", "monthly".to_string())));
        assert!(params.contains(&("window", "1d".to_string())));
    }
}
