//! Weighted reservoir sampling for resampled importance sampling (RIS).
//!
//! A reservoir streams candidates, keeps one with probability proportional
//! to its weight, and remembers the weight sum `S` and candidate count `M`.
//! For candidates drawn with pdf `p` and resampled by a target `p_hat`, the
//! held sample `y` gives the estimator `f(y) / p_hat(y) * S / M`.

/// One-sample weighted reservoir.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservoir<T> {
    sample: Option<T>,
    weight_sum: f32,
    count: u32,
    target: f32,
}

impl<T> Default for Reservoir<T> {
    fn default() -> Self {
        Self {
            sample: None,
            weight_sum: 0.0,
            count: 0,
            target: 0.0,
        }
    }
}

impl<T: Clone> Reservoir<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The held sample.
    pub fn sample(&self) -> Option<&T> {
        self.sample.as_ref()
    }

    /// Cumulative weight `S`.
    pub fn weight_sum(&self) -> f32 {
        self.weight_sum
    }

    /// Candidates seen, `M`.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Target value of the held sample where it was last evaluated.
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Stream one candidate with resampling weight `weight` and target value
    /// `target`; `u` is uniform in [0, 1). Returns true when the candidate
    /// replaced the held sample.
    ///
    /// Zero, negative and non-finite weights still count as candidates but
    /// can never be selected.
    pub fn update(&mut self, candidate: T, weight: f32, target: f32, u: f32) -> bool {
        self.count += 1;
        if !(weight > 0.0) || !weight.is_finite() {
            return false;
        }
        self.weight_sum += weight;
        if u * self.weight_sum < weight {
            self.sample = Some(candidate);
            self.target = target;
            true
        } else {
            false
        }
    }

    /// Merge `other`, whose held sample has target value `target_now` at the
    /// current shading point. The sample enters with weight
    /// `target_now / other.target * other.weight_sum` and contributes
    /// `other.count` candidates.
    pub fn merge(&mut self, other: &Reservoir<T>, target_now: f32, u: f32) -> bool {
        if other.count == 0 {
            return false;
        }
        let weight = match &other.sample {
            Some(_) if other.target > 0.0 => target_now / other.target * other.weight_sum,
            _ => 0.0,
        };

        self.count += other.count - 1;
        match &other.sample {
            Some(sample) => self.update(sample.clone(), weight, target_now, u),
            None => {
                self.count += 1;
                false
            }
        }
    }

    /// Copy with `count` limited to `max_count`, scaling `S` by the same
    /// factor so the per-candidate average weight is unchanged.
    pub fn capped(&self, max_count: u32) -> Self {
        if self.count <= max_count {
            return self.clone();
        }
        let scale = max_count as f32 / self.count as f32;
        Self {
            sample: self.sample.clone(),
            weight_sum: self.weight_sum * scale,
            count: max_count,
            target: self.target,
        }
    }

    /// Unbiased contribution weight `S / M` (zero when empty).
    pub fn contribution_weight(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            self.weight_sum / self.count as f32
        }
    }
}
