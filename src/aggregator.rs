// ==============================================================================
// aggregator.rs - Chunked Mean and Fixed-Width Bin Aggregation
// ==============================================================================
// Description: Reduces filtered lab values to a small derived table
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Policies:
//   chunk_mean  - mean of consecutive windows of N rows (last may be shorter)
//   fixed_bins  - count per (left, right] interval, lowest interval [e0, e1]
// ==============================================================================

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::AggregationPolicy;
use crate::models::{AggregateTable, BinCountRecord, GroupMeanRecord};

/// Errors that can occur during aggregation
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("rows_per_group must be at least 1")]
    ZeroWindow,

    #[error("Invalid bin edges: {0}")]
    InvalidEdges(String),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Apply the configured policy to values in filtered-row order
pub fn aggregate(values: &[f64], policy: &AggregationPolicy) -> Result<AggregateTable, AggregateError> {
    match policy {
        AggregationPolicy::ChunkMean { rows_per_group } => {
            chunk_means(values, *rows_per_group).map(AggregateTable::GroupMeans)
        }
        AggregationPolicy::FixedBins { edges } => {
            let edges = edges.resolve()?;
            bin_counts(values, &edges).map(AggregateTable::BinCounts)
        }
    }
}

/// Mean of each consecutive window of `rows_per_group` values
///
/// Produces `ceil(len / rows_per_group)` records; empty input yields none.
pub fn chunk_means(values: &[f64], rows_per_group: usize) -> Result<Vec<GroupMeanRecord>, AggregateError> {
    if rows_per_group == 0 {
        return Err(AggregateError::ZeroWindow);
    }

    let records: Vec<GroupMeanRecord> = values
        .chunks(rows_per_group)
        .enumerate()
        .map(|(group_index, chunk)| GroupMeanRecord {
            group_index,
            group_mean: chunk.iter().sum::<f64>() / chunk.len() as f64,
        })
        .collect();

    debug!(
        "Chunked {} values into {} groups of up to {}",
        values.len(),
        records.len(),
        rows_per_group
    );
    Ok(records)
}

/// Count values per bin interval, keeping only populated bins
///
/// Intervals are right-closed `(left, right]`; the lowest interval also
/// includes its left edge. Values outside `[edges[0], edges[last]]` (and NaN)
/// are dropped.
pub fn bin_counts(values: &[f64], edges: &[f64]) -> Result<Vec<BinCountRecord>, AggregateError> {
    if edges.len() < 2 {
        return Err(AggregateError::InvalidEdges(format!(
            "at least two edges required, got {}",
            edges.len()
        )));
    }
    if edges.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(AggregateError::InvalidEdges(
            "edges must be strictly increasing".to_string(),
        ));
    }

    let lowest = edges[0];
    let highest = edges[edges.len() - 1];
    let mut counts = vec![0usize; edges.len() - 1];
    let mut dropped = 0usize;

    for &value in values {
        if !(value >= lowest && value <= highest) {
            dropped += 1;
            continue;
        }
        // First edge >= value; the value belongs to the interval ending there
        let upper = edges.partition_point(|&e| e < value);
        let bin = upper.saturating_sub(1);
        counts[bin] += 1;
    }

    let records: Vec<BinCountRecord> = counts
        .iter()
        .enumerate()
        .filter(|(_, &n)| n > 0)
        .map(|(i, &n)| BinCountRecord {
            left: edges[i],
            right: edges[i + 1],
            closed_left: i == 0,
            n,
            midpoint: (edges[i] + edges[i + 1]) / 2.0,
        })
        .collect();

    debug!(
        "Binned {} values into {} populated bins ({} outside edges)",
        values.len() - dropped,
        records.len(),
        dropped
    );
    Ok(records)
}

#[derive(Serialize)]
struct BinCountRow {
    bin: String,
    n: usize,
    midpoint: f64,
}

/// Serialize an aggregate as CSV. The header is written even with no records.
pub fn to_csv(table: &AggregateTable) -> Result<Vec<u8>, AggregateError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    match table {
        AggregateTable::GroupMeans(records) => {
            writer.write_record(["group_index", "group_mean"])?;
            for record in records {
                writer.serialize(record)?;
            }
        }
        AggregateTable::BinCounts(records) => {
            writer.write_record(["bin", "n", "midpoint"])?;
            for record in records {
                writer.serialize(BinCountRow {
                    bin: record.label(),
                    n: record.n,
                    midpoint: record.midpoint,
                })?;
            }
        }
    }

    writer
        .into_inner()
        .map_err(|e| AggregateError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BinEdges;

    #[test]
    fn test_chunk_means_partial_last_window() {
        let values: Vec<f64> = (1..=25).map(|v| v as f64).collect();
        let records = chunk_means(&values, 10).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().map(|r| r.group_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(records[0].group_mean, 5.5);
        assert_eq!(records[1].group_mean, 15.5);
        // Last window holds 21..=25 only
        assert_eq!(records[2].group_mean, 23.0);
    }

    #[test]
    fn test_chunk_means_count_is_ceiling() {
        for n in [0usize, 1, 9, 10, 11, 30, 31] {
            let values = vec![1.0; n];
            for w in [1usize, 3, 10] {
                let records = chunk_means(&values, w).unwrap();
                assert_eq!(records.len(), n.div_ceil(w), "n={n}, w={w}");
            }
        }
    }

    #[test]
    fn test_chunk_means_windows_partition_input() {
        let values = vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0];
        let records = chunk_means(&values, 3).unwrap();
        // Weighted recombination of window means recovers the total
        let total: f64 = records
            .iter()
            .map(|r| {
                let start = r.group_index * 3;
                let len = (values.len() - start).min(3);
                r.group_mean * len as f64
            })
            .sum();
        assert_eq!(total, values.iter().sum::<f64>());
    }

    #[test]
    fn test_chunk_means_empty_and_zero_window() {
        assert!(chunk_means(&[], 10).unwrap().is_empty());
        assert!(matches!(chunk_means(&[1.0], 0), Err(AggregateError::ZeroWindow)));
    }

    #[test]
    fn test_bin_counts_edges_and_midpoints() {
        let edges = [0.0, 10.0, 20.0, 30.0];
        let values = [0.0, 5.0, 10.0, 10.5, 30.0, 31.0, -1.0];
        let records = bin_counts(&values, &edges).unwrap();

        assert_eq!(records.len(), 3);
        // 0.0 and 10.0 land in the closed lowest bin [0, 10]
        assert_eq!(records[0].n, 3);
        assert!(records[0].closed_left);
        assert_eq!(records[0].midpoint, 5.0);
        assert_eq!(records[1].n, 1);
        assert_eq!(records[1].left, 10.0);
        assert_eq!(records[1].midpoint, 15.0);
        assert_eq!(records[2].n, 1);
        assert_eq!(records[2].right, 30.0);

        let total: usize = records.iter().map(|r| r.n).sum();
        let in_range = values.iter().filter(|v| **v >= 0.0 && **v <= 30.0).count();
        assert_eq!(total, in_range);
    }

    #[test]
    fn test_bin_counts_skips_empty_bins_and_orders_by_left_edge() {
        let edges = [0.0, 1.0, 2.0, 3.0, 4.0];
        let values = [3.5, 0.5, 3.2, f64::NAN];
        let records = bin_counts(&values, &edges).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].left, 0.0);
        assert_eq!(records[1].left, 3.0);
        assert_eq!(records[1].n, 2);
    }

    #[test]
    fn test_bin_counts_invalid_edges() {
        assert!(bin_counts(&[1.0], &[1.0]).is_err());
        assert!(bin_counts(&[1.0], &[2.0, 1.0]).is_err());
    }

    #[test]
    fn test_aggregate_dispatch() {
        let values = [1.0, 2.0, 3.0];
        let chunk = aggregate(&values, &AggregationPolicy::ChunkMean { rows_per_group: 2 }).unwrap();
        assert!(matches!(chunk, AggregateTable::GroupMeans(ref r) if r.len() == 2));

        let bins = aggregate(
            &values,
            &AggregationPolicy::FixedBins {
                edges: BinEdges::Explicit(vec![0.0, 2.0, 4.0]),
            },
        )
        .unwrap();
        assert!(matches!(bins, AggregateTable::BinCounts(ref r) if r.len() == 2));
    }

    #[test]
    fn test_csv_group_means() {
        let table = AggregateTable::GroupMeans(vec![
            GroupMeanRecord {
                group_index: 0,
                group_mean: 12.5,
            },
            GroupMeanRecord {
                group_index: 1,
                group_mean: 7.0,
            },
        ]);
        let csv = String::from_utf8(to_csv(&table).unwrap()).unwrap();
        assert_eq!(csv, "group_index,group_mean\n0,12.5\n1,7.0\n");
    }

    #[test]
    fn test_csv_header_only_when_empty() {
        let csv = to_csv(&AggregateTable::GroupMeans(vec![])).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "group_index,group_mean\n");

        let csv = to_csv(&AggregateTable::BinCounts(vec![])).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "bin,n,midpoint\n");
    }

    #[test]
    fn test_csv_bin_counts() {
        let records = bin_counts(&[1.0, 15.0, 16.0], &[0.0, 10.0, 20.0]).unwrap();
        let csv = String::from_utf8(to_csv(&AggregateTable::BinCounts(records)).unwrap()).unwrap();
        assert_eq!(csv, "bin,n,midpoint\n\"[0, 10]\",1,5.0\n\"(10, 20]\",2,15.0\n");
    }
}
