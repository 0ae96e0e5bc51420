//! Response shapes returned by the cost service and their decoders.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;

use crate::lib::error::DecodeError;

/// Cost values the report can show, common to both response shapes
pub trait CostMetrics {
    fn cpu_cost(&self) -> f64;
    fn ram_cost(&self) -> f64;
    fn gpu_cost(&self) -> f64;
    fn pv_cost(&self) -> f64;
    fn network_cost(&self) -> f64;
    fn shared_cost(&self) -> f64;
    /// Total as reported by the backend, zero when absent
    fn reported_total(&self) -> f64;
    /// Usage over request ratio as reported by the backend
    fn efficiency(&self) -> f64;

    /// Reported total, or the sum of the components when the backend sent none
    fn total_cost(&self) -> f64 {
        let reported = self.reported_total();
        if reported > 0.0 {
            return reported;
        }
        self.cpu_cost()
            + self.ram_cost()
            + self.gpu_cost()
            + self.pv_cost()
            + self.network_cost()
            + self.shared_cost()
    }
}

/// One entry of a `/model/allocation` time bucket
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllocationRecord {
    pub name: String,
    pub properties: Option<AllocationProperties>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub minutes: f64,
    pub cpu_cores: f64,
    pub cpu_core_hours: f64,
    pub cpu_cost: f64,
    pub cpu_efficiency: f64,
    pub gpu_hours: f64,
    pub gpu_cost: f64,
    pub network_cost: f64,
    pub load_balancer_cost: f64,
    pub pv_byte_hours: f64,
    pub pv_cost: f64,
    pub ram_bytes: f64,
    pub ram_byte_hours: f64,
    pub ram_cost: f64,
    pub ram_efficiency: f64,
    pub shared_cost: f64,
    pub external_cost: f64,
    pub total_cost: f64,
    pub total_efficiency: f64,
}

/// Metadata the backend attaches to an allocation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AllocationProperties {
    pub cluster: Option<String>,
    pub node: Option<String>,
    pub namespace: Option<String>,
    pub pod: Option<String>,
    pub container: Option<String>,
    pub controller: Option<String>,
    #[serde(rename = "controllerKind")]
    pub controller_kind: Option<String>,
}

impl CostMetrics for AllocationRecord {
    fn cpu_cost(&self) -> f64 {
        self.cpu_cost
    }
    fn ram_cost(&self) -> f64 {
        self.ram_cost
    }
    fn gpu_cost(&self) -> f64 {
        self.gpu_cost
    }
    fn pv_cost(&self) -> f64 {
        self.pv_cost
    }
    fn network_cost(&self) -> f64 {
        self.network_cost
    }
    fn shared_cost(&self) -> f64 {
        self.shared_cost
    }
    fn reported_total(&self) -> f64 {
        self.total_cost
    }
    fn efficiency(&self) -> f64 {
        self.total_efficiency
    }
}

/// One entry of an aggregated cost model response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregationRecord {
    pub aggregation: String,
    pub environment: String,
    pub cluster: Option<String>,
    pub cpu_cost: f64,
    pub gpu_cost: f64,
    #[serde(alias = "memoryCost")]
    pub ram_cost: f64,
    pub pv_cost: f64,
    pub network_cost: f64,
    pub shared_cost: f64,
    pub total_cost: f64,
    pub cpu_efficiency: f64,
    pub ram_efficiency: f64,
    pub efficiency: f64,
}

impl CostMetrics for AggregationRecord {
    fn cpu_cost(&self) -> f64 {
        self.cpu_cost
    }
    fn ram_cost(&self) -> f64 {
        self.ram_cost
    }
    fn gpu_cost(&self) -> f64 {
        self.gpu_cost
    }
    fn pv_cost(&self) -> f64 {
        self.pv_cost
    }
    fn network_cost(&self) -> f64 {
        self.network_cost
    }
    fn shared_cost(&self) -> f64 {
        self.shared_cost
    }
    fn reported_total(&self) -> f64 {
        self.total_cost
    }
    fn efficiency(&self) -> f64 {
        self.efficiency
    }
}

pub type AllocationSet = HashMap<String, AllocationRecord>;
pub type AggregationSet = HashMap<String, AggregationRecord>;

#[derive(Debug, Deserialize)]
struct AllocationResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Vec<AllocationSet>,
}

#[derive(Debug, Deserialize)]
struct AggregationResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: AggregationSet,
}

fn check_code(code: i64, message: Option<String>) -> Result<(), DecodeError> {
    if (200..300).contains(&code) {
        return Ok(());
    }
    Err(DecodeError::BackendCode {
        code,
        message: message.unwrap_or_default(),
    })
}

/// Decodes a `/model/allocation` body into one map per time bucket
pub fn decode_allocation(bytes: &[u8]) -> Result<Vec<AllocationSet>, DecodeError> {
    let response: AllocationResponse = serde_json::from_slice(bytes)?;
    check_code(response.code, response.message)?;

    debug!("Decoded {} allocation bucket(s)", response.data.len());
    Ok(response.data)
}

/// Decodes an accumulated allocation body, which must hold exactly one bucket
pub fn decode_accumulated_allocation(bytes: &[u8]) -> Result<AllocationSet, DecodeError> {
    let mut buckets = decode_allocation(bytes)?;
    if buckets.len() != 1 {
        return Err(DecodeError::BucketCount {
            expected: 1,
            found: buckets.len(),
        });
    }
    Ok(buckets.remove(0))
}

/// Decodes an aggregated cost model body
pub fn decode_aggregation(bytes: &[u8]) -> Result<AggregationSet, DecodeError> {
    let response: AggregationResponse = serde_json::from_slice(bytes)?;
    check_code(response.code, response.message)?;

    debug!("Decoded {} aggregation entries", response.data.len());
    Ok(response.data)
}
