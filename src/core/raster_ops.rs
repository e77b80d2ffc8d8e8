//! Narrow raster-algebra primitives used by the post-classification filters
//!
//! These mirror the per-band engine calls the filters are written against:
//! focal mode in a square window, connected-pixel counting with a size cap,
//! sentinel substitution for no-data, and conditional overlay. Everything
//! operates on a single `ClassBand` and is free of filter vocabulary.

use crate::types::{ClassBand, ClassValue};
use ndarray::{ArrayView2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Pixel adjacency used for connected-component analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    /// Von Neumann neighborhood (edge-adjacent)
    Four,
    /// Moore neighborhood (edge- and corner-adjacent)
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
            Connectivity::Eight => &[
                (-1, -1),
                (-1, 0),
                (-1, 1),
                (0, -1),
                (0, 1),
                (1, -1),
                (1, 0),
                (1, 1),
            ],
        }
    }
}

/// Majority class value within a square window centered on each pixel
///
/// The window has side `2 * radius + 1` and includes the center pixel;
/// at the grid edge it is clipped to the valid extent. Every cell value
/// votes, the sentinel included. Ties resolve to the lowest class value so
/// results do not depend on traversal or partition order.
pub fn focal_mode(band: &ArrayView2<'_, ClassValue>, radius: usize) -> ClassBand {
    let (rows, cols) = band.dim();
    let mut out = ClassBand::zeros((rows, cols));

    let mode_at = |r: usize, c: usize| -> ClassValue {
        let mut histogram = [0u32; 256];
        let r_start = r.saturating_sub(radius);
        let r_end = (r + radius + 1).min(rows);
        let c_start = c.saturating_sub(radius);
        let c_end = (c + radius + 1).min(cols);

        for wr in r_start..r_end {
            for wc in c_start..c_end {
                histogram[band[[wr, wc]] as usize] += 1;
            }
        }

        let mut best_value = 0usize;
        let mut best_count = 0u32;
        for (value, &count) in histogram.iter().enumerate() {
            if count > best_count {
                best_count = count;
                best_value = value;
            }
        }
        best_value as ClassValue
    };

    #[cfg(feature = "parallel")]
    Zip::indexed(&mut out).par_for_each(|(r, c), v| *v = mode_at(r, c));

    #[cfg(not(feature = "parallel"))]
    Zip::indexed(&mut out).for_each(|(r, c), v| *v = mode_at(r, c));

    out
}

/// Size of each pixel's same-value connected component, clamped to `max_size`
///
/// Components are enumerated fully and their reported size clamped, so a
/// threshold decision anywhere below the cap is exact. Sentinel-valued
/// regions form components like any other value.
pub fn connected_component_sizes(
    band: &ArrayView2<'_, ClassValue>,
    connectivity: Connectivity,
    max_size: usize,
) -> ndarray::Array2<u32> {
    let (rows, cols) = band.dim();
    let mut sizes = ndarray::Array2::<u32>::zeros((rows, cols));
    let mut visited = vec![false; rows * cols];
    let mut component = Vec::new();
    let mut queue = VecDeque::new();
    let offsets = connectivity.offsets();
    let cap = max_size as u32;

    for seed_r in 0..rows {
        for seed_c in 0..cols {
            if visited[seed_r * cols + seed_c] {
                continue;
            }
            let value = band[[seed_r, seed_c]];

            component.clear();
            queue.clear();
            visited[seed_r * cols + seed_c] = true;
            queue.push_back((seed_r, seed_c));

            while let Some((r, c)) = queue.pop_front() {
                component.push((r, c));
                for &(dr, dc) in offsets {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if !visited[nr * cols + nc] && band[[nr, nc]] == value {
                        visited[nr * cols + nc] = true;
                        queue.push_back((nr, nc));
                    }
                }
            }

            let size = (component.len() as u32).min(cap);
            for &(r, c) in &component {
                sizes[[r, c]] = size;
            }
        }
    }

    sizes
}

/// Substitute the no-data sentinel with zero so window statistics are
/// well-defined
pub fn unmask(band: &ArrayView2<'_, ClassValue>, no_data: ClassValue) -> ClassBand {
    band.mapv(|v| if v == no_data { 0 } else { v })
}

/// Map zero-valued pixels back to the no-data sentinel
pub fn remask(band: &ArrayView2<'_, ClassValue>, no_data: ClassValue) -> ClassBand {
    band.mapv(|v| if v == 0 { no_data } else { v })
}

/// Conditional overlay: take `overlay` where `condition` holds, `base`
/// elsewhere
pub fn blend_where(
    base: &ArrayView2<'_, ClassValue>,
    overlay: &ArrayView2<'_, ClassValue>,
    condition: &ndarray::Array2<bool>,
) -> ClassBand {
    let mut out = base.to_owned();
    Zip::from(&mut out)
        .and(overlay)
        .and(condition)
        .for_each(|o, &v, &take| {
            if take {
                *o = v;
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_focal_mode_uniform_neighborhood() {
        let band = array![[7, 7, 7], [7, 5, 7], [7, 7, 7]];
        let mode = focal_mode(&band.view(), 1);
        // Center pixel: eight 7s against one 5
        assert_eq!(mode[[1, 1]], 7);
        // Corner window is 2x2 and still majority 7
        assert_eq!(mode[[0, 0]], 7);
    }

    #[test]
    fn test_focal_mode_tie_breaks_low() {
        // 2x2 window at the corner sees two 3s and two 9s
        let band = array![[3, 9], [9, 3]];
        let mode = focal_mode(&band.view(), 1);
        assert_eq!(mode[[0, 0]], 3);
    }

    #[test]
    fn test_focal_mode_counts_sentinel_votes() {
        let band = array![[0, 0, 0], [0, 4, 0], [0, 0, 0]];
        let mode = focal_mode(&band.view(), 1);
        assert_eq!(mode[[1, 1]], 0);
    }

    #[test]
    fn test_component_sizes_four_connected() {
        let band = array![
            [1, 1, 0, 2],
            [1, 0, 0, 2],
            [0, 0, 2, 2],
            [3, 0, 2, 2]
        ];
        let sizes = connected_component_sizes(&band.view(), Connectivity::Four, 100);
        assert_eq!(sizes[[0, 0]], 3); // the 1-region
        assert_eq!(sizes[[3, 0]], 1); // isolated 3
        assert_eq!(sizes[[2, 2]], 6); // the 2-region
        assert_eq!(sizes[[1, 1]], 7); // the 0-region
    }

    #[test]
    fn test_component_sizes_diagonal_needs_eight() {
        let band = array![[5, 0], [0, 5]];
        let four = connected_component_sizes(&band.view(), Connectivity::Four, 100);
        let eight = connected_component_sizes(&band.view(), Connectivity::Eight, 100);
        assert_eq!(four[[0, 0]], 1);
        assert_eq!(eight[[0, 0]], 2);
    }

    #[test]
    fn test_component_sizes_clamped_to_cap() {
        let band = ClassBand::from_elem((20, 20), 9);
        let sizes = connected_component_sizes(&band.view(), Connectivity::Four, 100);
        assert!(sizes.iter().all(|&s| s == 100));
    }

    #[test]
    fn test_unmask_remask_roundtrip() {
        let band = array![[255, 3], [4, 255]];
        let unmasked = unmask(&band.view(), 255);
        assert_eq!(unmasked, array![[0, 3], [4, 0]]);
        let remasked = remask(&unmasked.view(), 255);
        assert_eq!(remasked, band);
    }

    #[test]
    fn test_blend_where_keeps_base_elsewhere() {
        let base = array![[1, 2], [3, 4]];
        let overlay = array![[9, 9], [9, 9]];
        let condition = array![[true, false], [false, true]];
        let blended = blend_where(&base.view(), &overlay.view(), &condition);
        assert_eq!(blended, array![[9, 2], [3, 9]]);
    }
}
