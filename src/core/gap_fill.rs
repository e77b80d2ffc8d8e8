use crate::types::{ClassValue, RasterStack, StackResult};
use ndarray::{ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Order of the temporal fill sweeps along the year axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillOrder {
    /// Fill from older into newer years, then sweep back for leading gaps
    ForwardThenBackward,
    /// Fill from newer into older years first, then sweep forward
    BackwardThenForward,
    /// Single chronological sweep; leading gaps stay unfilled
    ForwardOnly,
    /// Single reverse sweep; trailing gaps stay unfilled
    BackwardOnly,
}

/// Temporal gap-fill parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapFillParams {
    /// Sweep order along the time axis
    pub order: FillOrder,
}

impl Default for GapFillParams {
    fn default() -> Self {
        Self {
            order: FillOrder::ForwardThenBackward,
        }
    }
}

/// Temporal fill processor: closes no-data gaps along each pixel's series
///
/// Pixels are independent; within a pixel each sweep carries the nearest
/// valid value into gaps, and a run of consecutive gaps inherits the value
/// just established for its predecessor. A pixel with no valid year at all
/// is left untouched.
pub struct GapFillProcessor {
    params: GapFillParams,
}

impl GapFillProcessor {
    /// Create a new gap-fill processor
    pub fn new(params: GapFillParams) -> Self {
        Self { params }
    }

    /// Create a processor with standard parameters
    pub fn standard() -> Self {
        Self::new(GapFillParams::default())
    }

    /// Fill temporal gaps, producing a new stack of identical shape
    pub fn apply(&self, stack: &RasterStack) -> StackResult<RasterStack> {
        let no_data = stack.no_data();
        let gaps_before = count_no_data(stack);

        log::info!(
            "Applying temporal gap fill ({:?}) to {} years on a {}x{} grid",
            self.params.order,
            stack.num_years(),
            stack.geometry().rows,
            stack.geometry().cols
        );

        let mut data = stack.data().clone();
        let order = self.params.order;

        let fill_lane = |mut lane: ArrayViewMut1<'_, ClassValue>| match order {
            FillOrder::ForwardThenBackward => {
                sweep_forward(&mut lane, no_data);
                sweep_backward(&mut lane, no_data);
            }
            FillOrder::BackwardThenForward => {
                sweep_backward(&mut lane, no_data);
                sweep_forward(&mut lane, no_data);
            }
            FillOrder::ForwardOnly => sweep_forward(&mut lane, no_data),
            FillOrder::BackwardOnly => sweep_backward(&mut lane, no_data),
        };

        #[cfg(feature = "parallel")]
        Zip::from(data.lanes_mut(Axis(0))).par_for_each(fill_lane);

        #[cfg(not(feature = "parallel"))]
        Zip::from(data.lanes_mut(Axis(0))).for_each(fill_lane);

        let filled = stack.like_with_data(data)?;
        log::info!(
            "Gap fill closed {} of {} no-data pixel-years",
            gaps_before - count_no_data(&filled),
            gaps_before
        );
        Ok(filled)
    }
}

/// Carry the last seen valid value into subsequent gaps
fn sweep_forward(lane: &mut ArrayViewMut1<'_, ClassValue>, no_data: ClassValue) {
    let mut last_valid: Option<ClassValue> = None;
    for value in lane.iter_mut() {
        if *value == no_data {
            if let Some(fill) = last_valid {
                *value = fill;
            }
        } else {
            last_valid = Some(*value);
        }
    }
}

/// Carry the next seen valid value into preceding gaps
fn sweep_backward(lane: &mut ArrayViewMut1<'_, ClassValue>, no_data: ClassValue) {
    let mut last_valid: Option<ClassValue> = None;
    for value in lane.iter_mut().rev() {
        if *value == no_data {
            if let Some(fill) = last_valid {
                *value = fill;
            }
        } else {
            last_valid = Some(*value);
        }
    }
}

fn count_no_data(stack: &RasterStack) -> usize {
    let no_data = stack.no_data();
    stack.data().iter().filter(|&&v| v == no_data).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassBand, GridGeometry, DEFAULT_NO_DATA};

    fn single_pixel_stack(series: &[ClassValue]) -> RasterStack {
        let years: Vec<i32> = (2000..2000 + series.len() as i32).collect();
        let bands: Vec<ClassBand> = series
            .iter()
            .map(|&v| ClassBand::from_elem((1, 1), v))
            .collect();
        RasterStack::from_bands(years, GridGeometry::new(1, 1), DEFAULT_NO_DATA, bands).unwrap()
    }

    fn series_of(stack: &RasterStack) -> Vec<ClassValue> {
        stack.series(0, 0).to_vec()
    }

    #[test]
    fn test_forward_then_backward_fill() {
        let stack = single_pixel_stack(&[0, 0, 3, 0, 5]);
        let filled = GapFillProcessor::standard().apply(&stack).unwrap();
        assert_eq!(series_of(&filled), vec![3, 3, 3, 3, 5]);
    }

    #[test]
    fn test_all_no_data_stays_no_data() {
        let stack = single_pixel_stack(&[0, 0, 0, 0, 0]);
        let filled = GapFillProcessor::standard().apply(&stack).unwrap();
        assert_eq!(series_of(&filled), vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_valid_only_in_final_year_backfills() {
        let stack = single_pixel_stack(&[0, 0, 0, 0, 9]);
        let filled = GapFillProcessor::standard().apply(&stack).unwrap();
        assert_eq!(series_of(&filled), vec![9, 9, 9, 9, 9]);
    }

    #[test]
    fn test_valid_only_in_first_year_forward_fills() {
        let stack = single_pixel_stack(&[9, 0, 0, 0, 0]);
        let filled = GapFillProcessor::standard().apply(&stack).unwrap();
        assert_eq!(series_of(&filled), vec![9, 9, 9, 9, 9]);
    }

    #[test]
    fn test_consecutive_gaps_inherit_nearest_preceding() {
        let stack = single_pixel_stack(&[4, 0, 0, 0, 7]);
        let filled = GapFillProcessor::standard().apply(&stack).unwrap();
        assert_eq!(series_of(&filled), vec![4, 4, 4, 4, 7]);
    }

    #[test]
    fn test_forward_only_leaves_leading_gaps() {
        let stack = single_pixel_stack(&[0, 0, 3, 0, 5]);
        let processor = GapFillProcessor::new(GapFillParams {
            order: FillOrder::ForwardOnly,
        });
        let filled = processor.apply(&stack).unwrap();
        assert_eq!(series_of(&filled), vec![0, 0, 3, 3, 5]);
    }

    #[test]
    fn test_fill_completeness_across_grid() {
        // Every pixel with at least one valid year ends up fully valid;
        // the all-gap pixel stays no-data
        let years = vec![2000, 2001, 2002, 2003];
        let mut bands = vec![ClassBand::from_elem((3, 3), 0); 4];
        bands[0][[0, 0]] = 3;
        bands[3][[1, 1]] = 12;
        bands[1][[2, 0]] = 11;
        let stack =
            RasterStack::from_bands(years, GridGeometry::new(3, 3), DEFAULT_NO_DATA, bands)
                .unwrap();

        let filled = GapFillProcessor::standard().apply(&stack).unwrap();
        for row in 0..3 {
            for col in 0..3 {
                let series = filled.series(row, col);
                let had_valid = stack.series(row, col).iter().any(|&v| v != DEFAULT_NO_DATA);
                if had_valid {
                    assert!(series.iter().all(|&v| v != DEFAULT_NO_DATA));
                } else {
                    assert!(series.iter().all(|&v| v == DEFAULT_NO_DATA));
                }
            }
        }
    }

    #[test]
    fn test_fill_is_idempotent() {
        let stack = single_pixel_stack(&[0, 2, 0, 6, 0]);
        let processor = GapFillProcessor::standard();
        let once = processor.apply(&stack).unwrap();
        let twice = processor.apply(&once).unwrap();
        assert_eq!(series_of(&once), series_of(&twice));
    }

    #[test]
    fn test_geometry_and_years_preserved() {
        let years = vec![2000, 2001, 2002];
        let geometry = GridGeometry::new(4, 5);
        let bands = vec![
            ClassBand::from_elem((4, 5), 0),
            ClassBand::from_elem((4, 5), 3),
            ClassBand::from_elem((4, 5), 0),
        ];
        let stack =
            RasterStack::from_bands(years.clone(), geometry.clone(), DEFAULT_NO_DATA, bands)
                .unwrap();
        let filled = GapFillProcessor::standard().apply(&stack).unwrap();
        assert_eq!(filled.years(), years.as_slice());
        assert_eq!(filled.geometry(), &geometry);
        assert_eq!(filled.num_years(), 3);
    }

    #[test]
    fn test_nonzero_sentinel() {
        let years = vec![2000, 2001, 2002];
        let bands = vec![
            ClassBand::from_elem((1, 1), 255),
            ClassBand::from_elem((1, 1), 4),
            ClassBand::from_elem((1, 1), 255),
        ];
        let stack = RasterStack::from_bands(years, GridGeometry::new(1, 1), 255, bands).unwrap();
        let filled = GapFillProcessor::standard().apply(&stack).unwrap();
        assert_eq!(filled.series(0, 0).to_vec(), vec![4, 4, 4]);
    }
}
