use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use parking_lot::RwLock;
use serde::Serialize;

use super::format::{format_plain, ValueFormat};
use crate::core::config::{TimezoneSetting, DEFAULT_HISTORY};

/// One timestamped sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<FixedOffset>,
    pub value: f64,
}

/// Anything a worker can push samples into.
pub trait MetricSink: Send + Sync {
    fn append(&self, value: f64);
}

/// Fixed-capacity time series with optional display metadata.
#[derive(Debug, Clone)]
pub struct MetricSeries {
    name: String,
    capacity: usize,
    timezone: TimezoneSetting,
    points: VecDeque<MetricPoint>,
    upper_bound: Option<f64>,
    value_format: Option<ValueFormat>,
}

impl MetricSeries {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_capacity(name, DEFAULT_HISTORY, TimezoneSetting::Local)
    }

    pub fn with_capacity<S: Into<String>>(
        name: S,
        capacity: usize,
        timezone: TimezoneSetting,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            capacity,
            timezone,
            points: VecDeque::with_capacity(capacity),
            upper_bound: None,
            value_format: None,
        }
    }

    /// Builder-style initial upper bound (e.g. 100 for percentages).
    pub fn with_upper_bound(mut self, upper: f64) -> Self {
        self.upper_bound = Some(upper);
        self
    }

    pub fn with_format(mut self, format: ValueFormat) -> Self {
        self.value_format = Some(format);
        self
    }

    /// Stamp `value` with the current time and push it.
    pub fn append(&mut self, value: f64) {
        let timestamp = self.timezone.now();
        self.push_point(MetricPoint { timestamp, value });
    }

    pub fn push_point(&mut self, point: MetricPoint) {
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Set the formatter unless one is already bound. Returns whether it took.
    pub fn bind_format_once(&mut self, format: ValueFormat) -> bool {
        if self.value_format.is_some() {
            return false;
        }
        self.value_format = Some(format);
        true
    }

    /// Same first-writer-wins policy as [`Self::bind_format_once`].
    pub fn set_upper_bound_once(&mut self, upper: f64) -> bool {
        if self.upper_bound.is_some() {
            return false;
        }
        self.upper_bound = Some(upper);
        true
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn upper_bound(&self) -> Option<f64> {
        self.upper_bound
    }

    pub fn value_format(&self) -> Option<&ValueFormat> {
        self.value_format.as_ref()
    }

    pub fn format_is_set(&self) -> bool {
        self.value_format.is_some()
    }

    pub fn latest(&self) -> Option<MetricPoint> {
        self.points.back().copied()
    }

    /// Owned copy for readers; never aliases the live buffer.
    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            name: self.name.clone(),
            points: self.points.iter().copied().collect(),
            upper_bound: self.upper_bound,
            value_format: self.value_format.clone(),
        }
    }
}

/// Immutable view of a series at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    pub name: String,
    pub points: Vec<MetricPoint>,
    pub upper_bound: Option<f64>,
    pub value_format: Option<ValueFormat>,
}

impl SeriesSnapshot {
    pub fn latest(&self) -> Option<&MetricPoint> {
        self.points.last()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    /// Latest value rendered with the bound format, if any.
    pub fn formatted_latest(&self) -> Option<String> {
        let value = self.latest()?.value;
        Some(match &self.value_format {
            Some(format) => format.format(value),
            None => format_plain(value),
        })
    }
}

/// Shared handle to a series: one writing worker, any number of readers.
#[derive(Debug, Clone)]
pub struct SeriesHandle {
    inner: Arc<RwLock<MetricSeries>>,
}

impl SeriesHandle {
    pub fn new(series: MetricSeries) -> Self {
        Self {
            inner: Arc::new(RwLock::new(series)),
        }
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        self.inner.read().snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn format_is_set(&self) -> bool {
        self.inner.read().format_is_set()
    }

    pub fn bind_format_once(&self, format: ValueFormat) -> bool {
        self.inner.write().bind_format_once(format)
    }

    pub fn set_upper_bound_once(&self, upper: f64) -> bool {
        self.inner.write().set_upper_bound_once(upper)
    }
}

impl MetricSink for SeriesHandle {
    fn append(&self, value: f64) {
        self.inner.write().append(value);
    }
}
