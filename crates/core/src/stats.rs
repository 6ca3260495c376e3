//! Streaming aggregates and batch statistics.
//!
//! The attack driver keeps [`Running`] accumulators (count, sum, sum of
//! squares) so confidence intervals are computable incrementally without
//! storing per-iteration samples. Result aggregation reduces vectors of
//! per-run values to a [`Summary`] of min/max/mean/population-variance/
//! median, the shape every CSV report row is built from.

/// Two-sided 99% critical value of the standard normal distribution.
pub const Z_99: f64 = 2.576;

/// Streaming accumulator: count, sum, and sum of squares.
#[derive(Clone, Copy, Debug, Default)]
pub struct Running {
    count: u64,
    sum: f64,
    sum_sq: f64,
}

impl Running {
    /// Empty accumulator.
    pub fn new() -> Running {
        Running::default()
    }

    /// Adds one sample.
    #[inline]
    pub fn push(&mut self, sample: f64) {
        self.count += 1;
        self.sum += sample;
        self.sum_sq += sample * sample;
    }

    /// Number of samples.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of samples.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Arithmetic mean; zero when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Population variance; clamped to zero against rounding.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        (self.sum_sq / n - mean * mean).max(0.0)
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Half-width of the normal-approximation confidence interval at
    /// critical value `z`.
    pub fn ci_half_width(&self, z: f64) -> f64 {
        if self.count == 0 {
            return f64::INFINITY;
        }
        z * self.std_dev() / (self.count as f64).sqrt()
    }

    /// Zeroes the accumulator.
    pub fn reset(&mut self) {
        *self = Running::default();
    }
}

/// Reduction of a batch of per-run values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Summary {
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Population variance.
    pub variance: f64,
    /// Median (lower middle for even counts).
    pub median: f64,
}

impl Summary {
    /// Reduces `values`; an empty slice reduces to all zeroes.
    pub fn of(values: &[f64]) -> Summary {
        if values.is_empty() {
            return Summary::default();
        }
        let mut running = Running::new();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in values {
            running.push(v);
            min = min.min(v);
            max = max.max(v);
        }

        let mut scratch = values.to_vec();
        let mid = (scratch.len() - 1) / 2;
        let (_, median, _) =
            scratch.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).expect("finite samples"));
        Summary {
            min,
            max,
            mean: running.mean(),
            variance: running.variance(),
            median: *median,
        }
    }

    /// Reduces integer-valued runs.
    pub fn of_u64(values: &[u64]) -> Summary {
        let floats: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        Summary::of(&floats)
    }

    /// The statistic selected by `field`.
    pub fn field(&self, field: SummaryField) -> f64 {
        match field {
            SummaryField::Min => self.min,
            SummaryField::Max => self.max,
            SummaryField::Mean => self.mean,
            SummaryField::Variance => self.variance,
            SummaryField::Median => self.median,
        }
    }
}

/// One of the five reduced statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryField {
    /// Minimum.
    Min,
    /// Maximum.
    Max,
    /// Mean.
    Mean,
    /// Population variance.
    Variance,
    /// Median.
    Median,
}

impl SummaryField {
    /// The four fields reported as separate CSV rows.
    pub const REPORT_ROWS: [SummaryField; 4] = [
        SummaryField::Max,
        SummaryField::Min,
        SummaryField::Mean,
        SummaryField::Median,
    ];

    /// Row-label suffix.
    pub fn label(self) -> &'static str {
        match self {
            SummaryField::Min => "MIN",
            SummaryField::Max => "MAX",
            SummaryField::Mean => "AVG",
            SummaryField::Variance => "VAR",
            SummaryField::Median => "MEDIAN",
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(min: {}, max: {}, avg: {}, variance: {}, median: {})",
            self.min, self.max, self.mean, self.variance, self.median
        )
    }
}
