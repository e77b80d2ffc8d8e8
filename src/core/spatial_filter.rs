use crate::core::raster_ops::{self, Connectivity};
use crate::types::{ClassBand, ClassValue, RasterStack, StackError, StackResult};
use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};

/// Spatial denoising parameters
///
/// During denoising the no-data sentinel is substituted with zero so window
/// statistics are well-defined; zero is therefore reserved and must not be
/// used as a live class when the stack's sentinel is nonzero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialFilterParams {
    /// Focal mode window radius (1 gives a 3x3 window)
    pub radius: usize,
    /// Components of this many pixels or fewer are treated as noise
    pub min_connected: usize,
    /// Cap on enumerated component size; larger counts report the cap
    pub max_component_size: usize,
    /// Adjacency for component analysis
    pub connectivity: Connectivity,
    /// Number of denoising passes; each pass consumes the previous output
    pub passes: usize,
    /// Focal mode window radius for the final hole fill
    pub fill_radius: usize,
    /// Year whose band serves as the data-availability template for the
    /// hole fill; `None` selects the first year of the stack
    pub reference_year: Option<i32>,
}

impl Default for SpatialFilterParams {
    fn default() -> Self {
        Self {
            radius: 1,
            min_connected: 6,
            max_component_size: 100,
            connectivity: Connectivity::Four,
            passes: 2,
            fill_radius: 4,
            reference_year: None,
        }
    }
}

impl SpatialFilterParams {
    /// Check window, pass and component-size settings
    pub fn validate(&self) -> StackResult<()> {
        if self.radius == 0 {
            return Err(StackError::Configuration(
                "Focal radius must be > 0".to_string(),
            ));
        }
        if self.fill_radius == 0 {
            return Err(StackError::Configuration(
                "Hole-fill radius must be > 0".to_string(),
            ));
        }
        if self.passes == 0 {
            return Err(StackError::Configuration(
                "Pass count must be > 0".to_string(),
            ));
        }
        if self.min_connected == 0 {
            return Err(StackError::Configuration(
                "Minimum connected area must be > 0".to_string(),
            ));
        }
        if self.max_component_size <= self.min_connected {
            return Err(StackError::Configuration(format!(
                "Component size cap {} must exceed the minimum area {}",
                self.max_component_size, self.min_connected
            )));
        }
        Ok(())
    }
}

/// Spatial denoising processor
///
/// Suppresses isolated and edge-transition pixels per year band: each pass
/// replaces pixels whose same-value component is at or below the minimum
/// area with the local focal mode, and a final wide-window pass fills the
/// holes still left against a reference band, broadcast to every year.
pub struct SpatialFilter {
    params: SpatialFilterParams,
}

impl SpatialFilter {
    /// Create a spatial filter, validating parameters up front
    pub fn new(params: SpatialFilterParams) -> StackResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Create a filter with standard parameters
    pub fn standard() -> Self {
        Self {
            params: SpatialFilterParams::default(),
        }
    }

    pub fn params(&self) -> &SpatialFilterParams {
        &self.params
    }

    /// Denoise a stack, producing a new stack of identical shape
    pub fn apply(&self, stack: &RasterStack) -> StackResult<RasterStack> {
        let reference_year = self
            .params
            .reference_year
            .unwrap_or_else(|| stack.years()[0]);
        let reference_index = stack.year_index(reference_year).ok_or_else(|| {
            StackError::MissingReference(format!(
                "Reference year {} is not in stack years {:?}",
                reference_year,
                stack.years()
            ))
        })?;

        let no_data = stack.no_data();
        log::info!(
            "Applying spatial filter: {} passes, radius {}, min area {}, reference year {}",
            self.params.passes,
            self.params.radius,
            self.params.min_connected,
            reference_year
        );

        let mut data = stack.data().clone();

        for pass in 1..=self.params.passes {
            // Bands are independent within a pass; pass N+1 starts only
            // after every band of pass N is written back
            #[cfg(feature = "parallel")]
            let denoised: Vec<ClassBand> = {
                use rayon::prelude::*;
                (0..stack.num_years())
                    .into_par_iter()
                    .map(|index| self.denoise_band(&data.slice(s![index, .., ..]), no_data))
                    .collect()
            };

            #[cfg(not(feature = "parallel"))]
            let denoised: Vec<ClassBand> = (0..stack.num_years())
                .map(|index| self.denoise_band(&data.slice(s![index, .., ..]), no_data))
                .collect();

            for (index, band) in denoised.iter().enumerate() {
                data.slice_mut(s![index, .., ..]).assign(band);
            }
            log::debug!("Spatial filter pass {} complete", pass);
        }

        // Hole fill: the reference band decides which pixels are still
        // holes and what value fills them; the decision applies to every
        // year so the data footprint stays identical across the stack.
        let reference = raster_ops::unmask(&data.slice(s![reference_index, .., ..]), no_data);
        let fill = raster_ops::focal_mode(&reference.view(), self.params.fill_radius);
        let holes = reference.mapv(|v| v == 0);
        let hole_count = holes.iter().filter(|&&h| h).count();
        log::debug!("Filling {} residual hole pixels per band", hole_count);

        for index in 0..stack.num_years() {
            let work = raster_ops::unmask(&data.slice(s![index, .., ..]), no_data);
            let filled = raster_ops::blend_where(&work.view(), &fill.view(), &holes);
            let remasked = raster_ops::remask(&filled.view(), no_data);
            data.slice_mut(s![index, .., ..]).assign(&remasked);
        }

        stack.like_with_data(data)
    }

    /// One denoising pass over a single band
    fn denoise_band(&self, band: &ArrayView2<'_, ClassValue>, no_data: ClassValue) -> ClassBand {
        let work = raster_ops::unmask(band, no_data);
        let mode = raster_ops::focal_mode(&work.view(), self.params.radius);
        let sizes = raster_ops::connected_component_sizes(
            &work.view(),
            self.params.connectivity,
            self.params.max_component_size,
        );
        let noise = sizes.mapv(|size| size <= self.params.min_connected as u32);
        let blended = raster_ops::blend_where(&work.view(), &mode.view(), &noise);
        raster_ops::remask(&blended.view(), no_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GridGeometry, DEFAULT_NO_DATA};

    fn uniform_stack(years: Vec<i32>, rows: usize, cols: usize, value: ClassValue) -> RasterStack {
        let bands = vec![ClassBand::from_elem((rows, cols), value); years.len()];
        RasterStack::from_bands(years, GridGeometry::new(rows, cols), DEFAULT_NO_DATA, bands)
            .unwrap()
    }

    #[test]
    fn test_isolated_pixel_takes_surrounding_majority() {
        let mut band = ClassBand::from_elem((9, 9), 7);
        band[[4, 4]] = 5;
        let stack = RasterStack::from_bands(
            vec![2020],
            GridGeometry::new(9, 9),
            DEFAULT_NO_DATA,
            vec![band],
        )
        .unwrap();

        let result = SpatialFilter::standard().apply(&stack).unwrap();
        assert!(result.band(0).iter().all(|&v| v == 7));
    }

    #[test]
    fn test_corner_speck_removed() {
        let mut band = ClassBand::from_elem((8, 8), 4);
        band[[0, 0]] = 9;
        let stack = RasterStack::from_bands(
            vec![2020],
            GridGeometry::new(8, 8),
            DEFAULT_NO_DATA,
            vec![band],
        )
        .unwrap();

        let result = SpatialFilter::standard().apply(&stack).unwrap();
        assert_eq!(result.band(0)[[0, 0]], 4);
    }

    #[test]
    fn test_large_block_never_altered() {
        // A solid 10x10 block sits far above the minimum area
        let stack = uniform_stack(vec![2019, 2020], 10, 10, 8);
        let result = SpatialFilter::standard().apply(&stack).unwrap();
        for index in 0..stack.num_years() {
            assert_eq!(result.band(index), stack.band(index));
        }
    }

    #[test]
    fn test_components_above_threshold_survive_passes() {
        // Two adjacent regions, both larger than the minimum area: the
        // boundary must not move
        let mut band = ClassBand::from_elem((10, 10), 3);
        band.slice_mut(s![.., 5..]).fill(12);
        let stack = RasterStack::from_bands(
            vec![2020],
            GridGeometry::new(10, 10),
            DEFAULT_NO_DATA,
            vec![band.clone()],
        )
        .unwrap();

        let result = SpatialFilter::standard().apply(&stack).unwrap();
        assert_eq!(result.band(0), band.view());
    }

    #[test]
    fn test_residual_hole_filled_from_reference_band() {
        // A 3x3 no-data hole survives the size filter (9 > 6) and is closed
        // by the wide-window fill
        let mut band = ClassBand::from_elem((9, 9), 7);
        band.slice_mut(s![3..6, 3..6]).fill(DEFAULT_NO_DATA);
        let stack = RasterStack::from_bands(
            vec![2020, 2021],
            GridGeometry::new(9, 9),
            DEFAULT_NO_DATA,
            vec![band.clone(), band],
        )
        .unwrap();

        let result = SpatialFilter::standard().apply(&stack).unwrap();
        for index in 0..stack.num_years() {
            assert!(result.band(index).iter().all(|&v| v == 7));
        }
    }

    #[test]
    fn test_all_no_data_stays_no_data() {
        let stack =
            RasterStack::filled_no_data(vec![2020], GridGeometry::new(6, 6), DEFAULT_NO_DATA)
                .unwrap();
        let result = SpatialFilter::standard().apply(&stack).unwrap();
        assert!(result.band(0).iter().all(|&v| v == DEFAULT_NO_DATA));
    }

    #[test]
    fn test_missing_reference_year_rejected() {
        let stack = uniform_stack(vec![2020, 2021], 6, 6, 3);
        let filter = SpatialFilter::new(SpatialFilterParams {
            reference_year: Some(1999),
            ..SpatialFilterParams::default()
        })
        .unwrap();
        assert!(matches!(
            filter.apply(&stack),
            Err(StackError::MissingReference(_))
        ));
    }

    #[test]
    fn test_explicit_reference_year_accepted() {
        let stack = uniform_stack(vec![2019, 2020, 2021], 8, 8, 5);
        let filter = SpatialFilter::new(SpatialFilterParams {
            reference_year: Some(2020),
            ..SpatialFilterParams::default()
        })
        .unwrap();
        let result = filter.apply(&stack).unwrap();
        assert_eq!(result.band(1), stack.band(1));
    }

    #[test]
    fn test_geometry_and_years_preserved() {
        let stack = uniform_stack(vec![2018, 2019, 2020], 7, 5, 3);
        let result = SpatialFilter::standard().apply(&stack).unwrap();
        assert_eq!(result.years(), stack.years());
        assert_eq!(result.geometry(), stack.geometry());
    }

    #[test]
    fn test_invalid_params_rejected() {
        for params in [
            SpatialFilterParams {
                radius: 0,
                ..SpatialFilterParams::default()
            },
            SpatialFilterParams {
                passes: 0,
                ..SpatialFilterParams::default()
            },
            SpatialFilterParams {
                max_component_size: 6,
                min_connected: 6,
                ..SpatialFilterParams::default()
            },
        ] {
            assert!(matches!(
                SpatialFilter::new(params),
                Err(StackError::Configuration(_))
            ));
        }
    }
}
