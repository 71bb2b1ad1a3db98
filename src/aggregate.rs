//! # Insight Aggregator
//! Pure mapping from an ordered insight sequence to the trend chart series.
//! No I/O, no state; cheap enough to run on every update without memoization.
//!
//! Policy: one label per insight (its UTC calendar day, `M/D/YYYY`) and a
//! constant value of 1 per insight. Labels are not merged by day, so two
//! insights on the same day yield two points.

use chrono::{DateTime, Datelike, Utc};

use crate::model::{Insight, TimeSeries};

/// Builds the chart series in input order. Empty input gives an empty series.
pub fn aggregate(insights: &[Insight]) -> TimeSeries {
    let mut series = TimeSeries {
        labels: Vec::with_capacity(insights.len()),
        values: Vec::with_capacity(insights.len()),
    };
    for insight in insights {
        series.labels.push(day_label(&insight.date));
        series.values.push(1);
    }
    series
}

/// US-style calendar day without zero padding, e.g. `1/1/2024`.
pub fn day_label(ts: &DateTime<Utc>) -> String {
    format!("{}/{}/{}", ts.month(), ts.day(), ts.year())
}
