pub mod client;
pub mod config;
pub mod controller;
pub mod report;
pub mod summary;
pub mod view_model;

#[cfg(test)]
mod report_tests;

pub use client::{ClientError, HttpSummaryClient, ReportDocument, SummaryClient};
pub use config::DashboardConfig;
pub use controller::{
    DashboardAction, DashboardController, DashboardState, FetchOutcome, Phase, UploadOutcome,
};
pub use report::ReportArchive;
pub use summary::{DistributionEntry, RecordRow, Stats, SummaryPayload, UploadFile, UploadRecord};
pub use view_model::{derive, ChartSeries, DashboardView, Kpi, KpiValue};
