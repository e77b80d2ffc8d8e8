use crate::types::{ClassValue, RasterStack, StackError, StackResult};
use ndarray::{ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Persistence rule for one stable class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StableClassRule {
    /// Class code the rule promotes
    pub class: ClassValue,
    /// Minimum occurrence frequency over the series, in percent
    pub min_percent: f32,
    /// Require the frequency strictly above the threshold instead of
    /// at-or-above
    pub strict: bool,
}

impl StableClassRule {
    /// Rule satisfied at or above the threshold
    pub fn at_least(class: ClassValue, min_percent: f32) -> Self {
        Self {
            class,
            min_percent,
            strict: false,
        }
    }

    /// Rule satisfied strictly above the threshold
    pub fn above(class: ClassValue, min_percent: f32) -> Self {
        Self {
            class,
            min_percent,
            strict: true,
        }
    }

    fn matches(&self, frequency: f32) -> bool {
        if self.strict {
            frequency > self.min_percent
        } else {
            frequency >= self.min_percent
        }
    }
}

/// Frequency stabilization parameters
///
/// Rules are evaluated in the order given; every satisfied rule overwrites
/// the pending target class, so when two rules match the same pixel the
/// later one wins regardless of which frequency is higher. An empty rule
/// list makes the filter a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyFilterParams {
    /// Stable-class rules in evaluation order
    pub rules: Vec<StableClassRule>,
    /// Minimum summed frequency of all stable classes, in percent, for a
    /// pixel to be considered at all
    pub aggregate_threshold: f32,
}

impl Default for FrequencyFilterParams {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            aggregate_threshold: 90.0,
        }
    }
}

impl FrequencyFilterParams {
    /// Stock native-vegetation rule set: forest (3) at 75%, wetland (11) at
    /// 60%, grassland (12) strictly above 50%, over a 90% aggregate floor
    pub fn native_vegetation() -> Self {
        Self {
            rules: vec![
                StableClassRule::at_least(3, 75.0),
                StableClassRule::at_least(11, 60.0),
                StableClassRule::above(12, 50.0),
            ],
            aggregate_threshold: 90.0,
        }
    }

    /// Check threshold ranges and rule uniqueness
    pub fn validate(&self) -> StackResult<()> {
        if !(0.0..=100.0).contains(&self.aggregate_threshold) {
            return Err(StackError::Configuration(format!(
                "Aggregate threshold {} outside [0, 100]",
                self.aggregate_threshold
            )));
        }
        for rule in &self.rules {
            if !(0.0..=100.0).contains(&rule.min_percent) {
                return Err(StackError::Configuration(format!(
                    "Persistence threshold {} for class {} outside [0, 100]",
                    rule.min_percent, rule.class
                )));
            }
        }
        for (idx, rule) in self.rules.iter().enumerate() {
            if self.rules[..idx].iter().any(|r| r.class == rule.class) {
                return Err(StackError::Configuration(format!(
                    "Duplicate stable-class rule for class {}",
                    rule.class
                )));
            }
        }
        Ok(())
    }
}

/// Frequency stabilization processor
///
/// Reclassifies pixels whose series is overwhelmingly stable-class: when the
/// summed stable-class frequency reaches the aggregate floor and at least
/// one per-class rule is satisfied, the whole series is rewritten to the
/// last matching rule's class.
pub struct FrequencyFilter {
    params: FrequencyFilterParams,
}

impl FrequencyFilter {
    /// Create a frequency filter, validating the rule set up front
    pub fn new(params: FrequencyFilterParams) -> StackResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &FrequencyFilterParams {
        &self.params
    }

    /// Stabilize a filled stack, producing a new stack of identical shape
    pub fn apply(&self, stack: &RasterStack) -> StackResult<RasterStack> {
        let no_data = stack.no_data();
        if let Some(rule) = self.params.rules.iter().find(|r| r.class == no_data) {
            return Err(StackError::Configuration(format!(
                "Stable-class rule targets the no-data sentinel {}",
                rule.class
            )));
        }

        log::info!(
            "Applying frequency stabilization: {} rules, aggregate floor {}%",
            self.params.rules.len(),
            self.params.aggregate_threshold
        );

        if self.params.rules.is_empty() {
            log::debug!("Empty stable-class set, frequency filter is a no-op");
            return stack.like_with_data(stack.data().clone());
        }

        let mut data = stack.data().clone();
        let rules = self.params.rules.as_slice();
        let aggregate_threshold = self.params.aggregate_threshold;
        let num_years = stack.num_years() as f32;

        let stabilize_lane = |mut lane: ArrayViewMut1<'_, ClassValue>| {
            let mut counts = vec![0u32; rules.len()];
            for &value in lane.iter() {
                for (idx, rule) in rules.iter().enumerate() {
                    if value == rule.class {
                        counts[idx] += 1;
                    }
                }
            }

            let frequencies: Vec<f32> = counts
                .iter()
                .map(|&c| 100.0 * c as f32 / num_years)
                .collect();

            let aggregate: f32 = frequencies.iter().sum();
            if aggregate < aggregate_threshold {
                return;
            }

            // Sequential overwrite: the last satisfied rule claims the pixel
            let mut target: Option<ClassValue> = None;
            for (rule, &frequency) in rules.iter().zip(frequencies.iter()) {
                if rule.matches(frequency) {
                    target = Some(rule.class);
                }
            }

            if let Some(class) = target {
                lane.fill(class);
            }
        };

        #[cfg(feature = "parallel")]
        Zip::from(data.lanes_mut(Axis(0))).par_for_each(stabilize_lane);

        #[cfg(not(feature = "parallel"))]
        Zip::from(data.lanes_mut(Axis(0))).for_each(stabilize_lane);

        let changed = data
            .iter()
            .zip(stack.data().iter())
            .filter(|(a, b)| a != b)
            .count();
        log::info!("Frequency stabilization rewrote {} pixel-years", changed);

        stack.like_with_data(data)
    }
}
