//! Uniform-grid signal lookup.
//!
//! Signals are bucketed into square cells twice the match tolerance wide, so
//! any signal within tolerance of a point sits in the point's cell or one of
//! its eight neighbours.

use crate::route::GeoPoint;
use crate::signal::{Signal, SignalLookup, effective_tolerance};
use std::collections::HashMap;

type CellKey = (i64, i64);

#[derive(Debug, Clone)]
pub struct GridIndex<'a> {
    signals: &'a [Signal],
    tolerance_deg: f64,
    cell_size_deg: f64,
    cells: HashMap<CellKey, Vec<usize>>,
}

impl<'a> GridIndex<'a> {
    pub fn new(signals: &'a [Signal], tolerance_deg: f64) -> Self {
        let tolerance_deg = effective_tolerance(tolerance_deg);
        let cell_size_deg = tolerance_deg * 2.0;

        let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
        for (index, signal) in signals.iter().enumerate() {
            if !signal.lat.is_finite() || !signal.lng.is_finite() {
                continue;
            }
            cells
                .entry(cell_of(signal.location(), cell_size_deg))
                .or_default()
                .push(index);
        }

        Self {
            signals,
            tolerance_deg,
            cell_size_deg,
            cells,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

impl SignalLookup for GridIndex<'_> {
    fn find(&self, point: GeoPoint) -> Option<&Signal> {
        let (row, col) = cell_of(point, self.cell_size_deg);
        let mut best: Option<usize> = None;

        for d_row in -1..=1 {
            for d_col in -1..=1 {
                let Some(indices) = self.cells.get(&(row + d_row, col + d_col)) else {
                    continue;
                };
                // Indices within a cell are ascending, so the first hit is
                // the cell's earliest catalog entry.
                let hit = indices
                    .iter()
                    .copied()
                    .find(|&index| self.signals[index].is_near(point, self.tolerance_deg));
                if let Some(index) = hit {
                    best = Some(best.map_or(index, |current| current.min(index)));
                }
            }
        }

        best.map(|index| &self.signals[index])
    }

    fn len(&self) -> usize {
        self.signals.len()
    }
}

fn cell_of(point: GeoPoint, cell_size_deg: f64) -> CellKey {
    (
        (point.lat / cell_size_deg).floor() as i64,
        (point.lng / cell_size_deg).floor() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{DEFAULT_MATCH_TOLERANCE_DEG, LinearScan};
    use crate::signal::tests::signal;

    #[test]
    fn finds_signal_across_cell_boundary() {
        // 0.0004-degree cells: 30.0003 and 30.00041 fall into adjacent rows.
        let signals = vec![signal(1, 30.00041, -97.0)];
        let index = GridIndex::new(&signals, DEFAULT_MATCH_TOLERANCE_DEG);

        let matched = index.find(GeoPoint::new(30.0003, -97.0)).map(|s| s.id);

        assert_eq!(matched, Some(1));
    }

    #[test]
    fn keeps_catalog_order_tie_break_across_cells() {
        let signals = vec![
            signal(10, 30.00041, -97.0),
            signal(20, 30.0003, -97.0),
        ];
        let index = GridIndex::new(&signals, DEFAULT_MATCH_TOLERANCE_DEG);

        let matched = index.find(GeoPoint::new(30.00035, -97.0)).map(|s| s.id);

        assert_eq!(matched, Some(10));
    }

    #[test]
    fn agrees_with_linear_scan_on_dense_catalog() {
        let mut signals = Vec::new();
        let mut id = 0;
        for row in 0..20 {
            for col in 0..20 {
                signals.push(signal(
                    id,
                    30.0 + row as f64 * 0.00013,
                    -97.0 + col as f64 * 0.00017,
                ));
                id += 1;
            }
        }
        let grid = GridIndex::new(&signals, DEFAULT_MATCH_TOLERANCE_DEG);
        let linear = LinearScan::new(&signals, DEFAULT_MATCH_TOLERANCE_DEG);

        for step in 0..400 {
            let point = GeoPoint::new(
                29.9995 + step as f64 * 0.0000091,
                -97.0005 + (step % 37) as f64 * 0.00011,
            );
            assert_eq!(
                grid.find(point).map(|s| s.id),
                linear.find(point).map(|s| s.id),
                "lookups disagree at {point:?}"
            );
        }
    }

    #[test]
    fn invalid_tolerance_falls_back_to_default() {
        let signals = vec![signal(1, 30.0, -97.0)];
        let index = GridIndex::new(&signals, 0.0);

        assert!(index.find(GeoPoint::new(30.0001, -97.0)).is_some());
        assert!(index.find(GeoPoint::new(30.001, -97.0)).is_none());
    }

    #[test]
    fn skips_signals_with_non_finite_coordinates() {
        let signals = vec![signal(1, f64::NAN, -97.0), signal(2, 30.0, -97.0)];
        let index = GridIndex::new(&signals, DEFAULT_MATCH_TOLERANCE_DEG);

        assert_eq!(index.cell_count(), 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.find(GeoPoint::new(30.0, -97.0)).map(|s| s.id), Some(2));
    }
}
