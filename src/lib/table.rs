//! Projection of cost maps into column-selectable reports.

use std::collections::HashMap;
use std::io::Write;

use log::warn;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::lib::error::{ParseError, RenderError};
use crate::lib::identifier::TitleParser;
use crate::lib::model::CostMetrics;

/// Whether costs are a projected monthly rate or totals over the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Rate,
    Historical,
}

impl QueryMode {
    fn total_header(&self) -> &'static str {
        match self {
            QueryMode::Rate => "Monthly Rate",
            QueryMode::Historical => "Total Cost",
        }
    }
}

/// Which optional columns the report shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayOptions {
    pub show_cpu: bool,
    pub show_memory: bool,
    pub show_gpu: bool,
    pub show_pv: bool,
    pub show_network: bool,
    pub show_efficiency: bool,
}

impl DisplayOptions {
    /// Turns on every cost column. Efficiency is left as is.
    pub fn show_all_resources(mut self) -> Self {
        self.show_cpu = true;
        self.show_memory = true;
        self.show_gpu = true;
        self.show_pv = true;
        self.show_network = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Cpu,
    Memory,
    Gpu,
    Pv,
    Network,
    Efficiency,
    Total,
}

impl Column {
    fn header(&self, mode: QueryMode) -> &'static str {
        match self {
            Column::Cpu => "CPU",
            Column::Memory => "Memory",
            Column::Gpu => "GPU",
            Column::Pv => "PV",
            Column::Network => "Network",
            Column::Efficiency => "Efficiency",
            Column::Total => mode.total_header(),
        }
    }

    fn value(&self, metrics: &impl CostMetrics) -> f64 {
        let value = match self {
            Column::Cpu => metrics.cpu_cost(),
            Column::Memory => metrics.ram_cost(),
            Column::Gpu => metrics.gpu_cost(),
            Column::Pv => metrics.pv_cost(),
            Column::Network => metrics.network_cost(),
            Column::Efficiency => metrics.efficiency(),
            Column::Total => metrics.total_cost(),
        };
        if value.is_finite() { value } else { 0.0 }
    }

    fn is_cost(&self) -> bool {
        !matches!(self, Column::Efficiency)
    }
}

/// Canonical column order, filtered by the toggles
fn columns(options: &DisplayOptions) -> Vec<Column> {
    [
        (options.show_cpu, Column::Cpu),
        (options.show_memory, Column::Memory),
        (options.show_gpu, Column::Gpu),
        (options.show_pv, Column::Pv),
        (options.show_network, Column::Network),
        (options.show_efficiency, Column::Efficiency),
        (true, Column::Total),
    ]
    .into_iter()
    .filter_map(|(shown, column)| shown.then_some(column))
    .collect()
}

pub fn format_cost(amount: f64, currency: &str) -> String {
    // adding positive zero turns -0.0 into 0.0
    let amount = if amount.is_finite() { amount + 0.0 } else { 0.0 };
    format!("{:.2} {}", amount, currency)
}

pub fn format_efficiency(ratio: f64) -> String {
    let ratio = if ratio.is_finite() { ratio + 0.0 } else { 0.0 };
    format!("{:.1}%", ratio * 100.0)
}

/// One rendered data row
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Title fields, one per grouping dimension
    pub fields: Vec<String>,
    /// Formatted metric cells in column order
    pub cells: Vec<String>,
    values: Vec<f64>,
}

/// A fully projected report, ready to be written
#[derive(Debug, Clone)]
pub struct Report {
    pub headers: Vec<String>,
    pub rows: Vec<ReportRow>,
    pub summary: Vec<String>,
}

/// Builds report rows lazily, yielding a parse error for each unreadable title.
///
/// Rows come out sorted by title so the report is stable across runs.
pub fn report_rows<'a, R, P>(
    data: &'a HashMap<String, R>,
    parser: &'a P,
    options: &DisplayOptions,
    currency: &'a str,
) -> impl Iterator<Item = Result<ReportRow, ParseError>> + 'a
where
    R: CostMetrics,
    P: TitleParser + ?Sized,
{
    let columns = columns(options);
    let mut titles: Vec<&String> = data.keys().collect();
    titles.sort();

    titles.into_iter().map(move |title| {
        let fields = parser.fields(title)?;
        let record = &data[title];
        let values: Vec<f64> = columns.iter().map(|c| c.value(record)).collect();
        let cells = columns
            .iter()
            .zip(&values)
            .map(|(column, value)| match column {
                Column::Efficiency => format_efficiency(*value),
                _ => format_cost(*value, currency),
            })
            .collect();
        Ok(ReportRow {
            fields,
            cells,
            values,
        })
    })
}

/// Projects `data` into a report, skipping rows whose title cannot be parsed
pub fn build_report<R, P>(
    data: &HashMap<String, R>,
    parser: &P,
    options: &DisplayOptions,
    mode: QueryMode,
    currency: &str,
) -> Report
where
    R: CostMetrics,
    P: TitleParser + ?Sized,
{
    let columns = columns(options);

    let headers = parser
        .dimensions()
        .iter()
        .map(|d| d.header().to_string())
        .chain(columns.iter().map(|c| c.header(mode).to_string()))
        .collect();

    let rows: Vec<ReportRow> = report_rows(data, parser, options, currency)
        .filter_map(|row| match row {
            Ok(row) => Some(row),
            Err(e) => {
                warn!("Skipping row: {}", e);
                None
            }
        })
        .collect();

    let mut summary = vec![String::new(); parser.dimensions().len()];
    if let Some(first) = summary.first_mut() {
        *first = "SUMMED".to_string();
    }
    summary.extend(columns.iter().enumerate().map(|(i, column)| {
        if column.is_cost() {
            format_cost(rows.iter().fold(0.0, |sum, r| sum + r.values[i]), currency)
        } else {
            String::new()
        }
    }));

    Report {
        headers,
        rows,
        summary,
    }
}

impl Report {
    pub fn to_table_string(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.headers.iter().cloned());
        for row in &self.rows {
            builder.push_record(row.fields.iter().chain(row.cells.iter()).cloned());
        }
        builder.push_record(self.summary.iter().cloned());

        builder.build().with(Style::rounded()).to_string()
    }
}

/// Writes the report for `data` to `out`
pub fn write_report<W, R, P>(
    out: &mut W,
    data: &HashMap<String, R>,
    parser: &P,
    options: &DisplayOptions,
    mode: QueryMode,
    currency: &str,
) -> Result<(), RenderError>
where
    W: Write + ?Sized,
    R: CostMetrics,
    P: TitleParser + ?Sized,
{
    let report = build_report(data, parser, options, mode, currency);
    writeln!(out, "{}", report.to_table_string())?;
    out.flush()?;
    Ok(())
}
