//! Per-scrape traffic collector.
//!
//! [`TrafficCollector`] reads the whole traffic table on every scrape and
//! turns each row into an upload and a download counter sample. It keeps no
//! state between scrapes: all failures are logged and contained here, so a
//! broken store yields an empty scrape instead of a failed response.

use crate::store::{RowDecodeError, StoreError, TrafficRecord, TrafficStore};
use prometheus::core::{Collector, Desc};
use prometheus::proto;
use std::collections::HashMap;

/// Counter of bytes uploaded per account.
pub const UPLOAD_METRIC: &str = "email_upload_bytes_total";
/// Counter of bytes downloaded per account.
pub const DOWNLOAD_METRIC: &str = "email_download_bytes_total";
/// Label carrying the account identifier.
pub const LABEL_EMAIL: &str = "email";
/// Label carrying the raw status column.
pub const LABEL_ENABLE: &str = "enable";

const UPLOAD_HELP: &str = "Total bytes uploaded by each email.";
const DOWNLOAD_HELP: &str = "Total bytes downloaded by each email.";

/// Kind of an exposed metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonic, non-negative cumulative value.
    Counter,
}

/// Static description of a metric this collector can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Fully qualified metric name.
    pub name: &'static str,
    /// Help text shown in the exposition.
    pub help: &'static str,
    /// Variable label names, in exposition order.
    pub label_names: [&'static str; 2],
    /// Metric type.
    pub kind: MetricKind,
}

const DESCRIPTORS: [MetricDescriptor; 2] = [
    MetricDescriptor {
        name: UPLOAD_METRIC,
        help: UPLOAD_HELP,
        label_names: [LABEL_EMAIL, LABEL_ENABLE],
        kind: MetricKind::Counter,
    },
    MetricDescriptor {
        name: DOWNLOAD_METRIC,
        help: DOWNLOAD_HELP,
        label_names: [LABEL_EMAIL, LABEL_ENABLE],
        kind: MetricKind::Counter,
    },
];

/// Labels identifying one account's series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelSet {
    /// Account identifier.
    pub email: String,
    /// Status column as a decimal string.
    pub enable: String,
}

/// One counter value ready for exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// One of [`UPLOAD_METRIC`] or [`DOWNLOAD_METRIC`].
    pub name: &'static str,
    /// Series labels.
    pub labels: LabelSet,
    /// Counter value.
    pub value: f64,
    /// Metric type.
    pub kind: MetricKind,
}

impl TrafficRecord {
    /// Maps the row to its upload and download samples.
    pub fn to_samples(&self) -> [MetricSample; 2] {
        let labels = LabelSet {
            email: self.account.clone(),
            enable: self.status_flag.to_string(),
        };
        [
            MetricSample {
                name: UPLOAD_METRIC,
                labels: labels.clone(),
                value: self.bytes_uploaded as f64,
                kind: MetricKind::Counter,
            },
            MetricSample {
                name: DOWNLOAD_METRIC,
                labels,
                value: self.bytes_downloaded as f64,
                kind: MetricKind::Counter,
            },
        ]
    }
}

/// Result of a single scrape.
#[derive(Debug, Default)]
pub struct CollectReport {
    /// Samples in store row order.
    pub samples: Vec<MetricSample>,
    /// Rows that were skipped, by their position in the result set.
    pub skipped_rows: Vec<(usize, RowDecodeError)>,
    /// Query or stream failure, if any.
    pub failure: Option<StoreError>,
}

/// Exposes the traffic table as Prometheus counters.
pub struct TrafficCollector<S> {
    store: S,
    descs: Vec<Desc>,
}

impl<S: TrafficStore> TrafficCollector<S> {
    /// Creates a collector over `store`.
    ///
    /// Fails only if the static descriptors are rejected by the client library.
    pub fn new(store: S) -> Result<Self, prometheus::Error> {
        let descs = DESCRIPTORS
            .iter()
            .map(|d| {
                Desc::new(
                    d.name.to_string(),
                    d.help.to_string(),
                    d.label_names.iter().map(|l| l.to_string()).collect(),
                    HashMap::new(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { store, descs })
    }

    /// The metrics this collector may emit. Never touches the store.
    pub fn describe(&self) -> [MetricDescriptor; 2] {
        DESCRIPTORS
    }

    /// Reads the store and returns the current samples.
    pub fn collect(&self) -> Vec<MetricSample> {
        self.scrape().samples
    }

    /// Reads the store and returns the samples along with everything that
    /// went wrong.
    pub fn scrape(&self) -> CollectReport {
        let mut report = CollectReport::default();

        let scan = match self.store.scan() {
            Ok(scan) => scan,
            Err(e) => {
                tracing::error!(error = %e, "Error querying traffic table");
                report.failure = Some(e);
                return report;
            }
        };

        let row_count = scan.rows.len();
        for (index, row) in scan.rows.into_iter().enumerate() {
            match row {
                Ok(record) => report.samples.extend(record.to_samples()),
                Err(e) => {
                    tracing::warn!(row = index, error = %e, "Error decoding traffic row");
                    report.skipped_rows.push((index, e));
                }
            }
        }

        if let Some(e) = scan.interrupted {
            tracing::error!(
                error = %e,
                rows_read = row_count,
                "Error iterating traffic rows"
            );
            report.failure = Some(e);
        }

        tracing::debug!(
            rows = row_count,
            samples = report.samples.len(),
            skipped = report.skipped_rows.len(),
            "Traffic scrape complete"
        );
        report
    }
}

impl<S: TrafficStore> Collector for TrafficCollector<S> {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let samples = self.scrape().samples;

        DESCRIPTORS
            .iter()
            .map(|d| {
                let metrics: Vec<proto::Metric> = samples
                    .iter()
                    .filter(|s| s.name == d.name)
                    .map(to_proto_metric)
                    .collect();

                let mut family = proto::MetricFamily::default();
                family.set_name(d.name.to_string());
                family.set_help(d.help.to_string());
                family.set_field_type(proto::MetricType::COUNTER);
                family.set_metric(metrics.into());
                family
            })
            .collect()
    }
}

fn to_proto_metric(sample: &MetricSample) -> proto::Metric {
    let mut email = proto::LabelPair::default();
    email.set_name(LABEL_EMAIL.to_string());
    email.set_value(sample.labels.email.clone());

    let mut enable = proto::LabelPair::default();
    enable.set_name(LABEL_ENABLE.to_string());
    enable.set_value(sample.labels.enable.clone());

    let mut counter = proto::Counter::default();
    counter.set_value(sample.value);

    let mut metric = proto::Metric::default();
    metric.set_label(vec![email, enable].into());
    metric.set_counter(counter);
    metric
}
