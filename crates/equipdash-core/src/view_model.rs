use std::fmt;

use serde::Serialize;

use crate::summary::{DistributionEntry, RecordRow, SummaryPayload};

pub const PREVIEW_ROWS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub kpis: [Kpi; 4],
    pub chart: ChartSeries,
    pub preview_rows: Vec<RecordRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub title: &'static str,
    pub value: KpiValue,
    pub unit: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiValue {
    Integer(i64),
    Decimal(String),
}

impl fmt::Display for KpiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiValue::Integer(v) => write!(f, "{v}"),
            KpiValue::Decimal(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}

impl ChartSeries {
    pub fn from_distribution(distribution: &[DistributionEntry]) -> Self {
        let (labels, values) = distribution
            .iter()
            .map(|entry| (entry.equipment_type.clone(), entry.count))
            .unzip();
        Self { labels, values }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Builds the chart-ready view of a summary. Pure: the payload is only read.
pub fn derive(payload: &SummaryPayload) -> DashboardView {
    let stats = &payload.stats;
    let kpis = [
        Kpi {
            title: "Total Units",
            value: KpiValue::Integer(i64::try_from(stats.total_count).unwrap_or(i64::MAX)),
            unit: "",
        },
        Kpi {
            title: "Avg Flowrate",
            value: KpiValue::Integer(round_half_up(stats.avg_flow)),
            unit: "m³/h",
        },
        Kpi {
            title: "Avg Pressure",
            value: KpiValue::Decimal(one_decimal(stats.avg_pressure)),
            unit: "bar",
        },
        Kpi {
            title: "Avg Temp",
            value: KpiValue::Integer(round_half_up(stats.avg_temp)),
            unit: "°C",
        },
    ];

    DashboardView {
        kpis,
        chart: ChartSeries::from_distribution(&payload.distribution),
        preview_rows: payload.data.iter().take(PREVIEW_ROWS).cloned().collect(),
    }
}

/// Ties round toward positive infinity.
pub fn round_half_up(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor as i64 + 1
    } else {
        floor as i64
    }
}

/// One decimal place of the exact binary value. Only exact ties (`x.x5` with
/// a finite binary expansion, i.e. `4 * value` odd) round away from zero.
pub fn one_decimal(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0.0".to_string();
    }
    let quarters = value * 4.0;
    if quarters.fract() == 0.0 && quarters.rem_euclid(2.0) == 1.0 {
        let tenths = (value.abs() * 10.0 + 0.5).floor();
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}{:.1}", tenths / 10.0);
    }
    format!("{value:.1}")
}
