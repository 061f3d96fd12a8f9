//! Per-channel sample smoothing.
//!
//! Two strategies share one interface ([`SampleFilter::add`] /
//! [`SampleFilter::average`]):
//!
//! - [`FilterKind::MovingAverage`]: fixed window of the last N raw
//!   values with a running sum.  Used for the gas/AQ channels (N = 5).
//! - [`FilterKind::MedianEma`]: median of the last three raw values,
//!   blended into a trailing exponential average
//!   `state = (state·2 + median) / 3`.
//!
//! Neither strategy has error conditions.  A NaN sample propagates into the
//! result, since it participates in the running sum / blend.

use heapless::Vec;

/// Largest supported moving-average window.
pub const MAX_WINDOW: usize = 16;

/// Filter strategy selector, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    MovingAverage { capacity: usize },
    MedianEma,
}

/// Fixed-capacity ring of raw values plus a running sum.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    values: Vec<f32, MAX_WINDOW>,
    capacity: usize,
    /// Next slot to overwrite once the window is full.
    head: usize,
    sum: f32,
}

impl MovingAverage {
    /// `capacity` is clamped to `1..=MAX_WINDOW`.
    pub fn new(capacity: usize) -> Self {
        Self {
            values: Vec::new(),
            capacity: capacity.clamp(1, MAX_WINDOW),
            head: 0,
            sum: 0.0,
        }
    }

    pub fn add(&mut self, value: f32) {
        if self.values.len() < self.capacity {
            // Cannot fail: len < capacity <= MAX_WINDOW.
            let _ = self.values.push(value);
        } else {
            self.sum -= self.values[self.head];
            self.values[self.head] = value;
            self.head = (self.head + 1) % self.capacity;
        }
        self.sum += value;
    }

    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum / self.values.len() as f32
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.head = 0;
        self.sum = 0.0;
    }
}

/// Median-of-three with a trailing exponential blend.
#[derive(Debug, Clone)]
pub struct MedianEma {
    recent: [f32; 3],
    count: usize,
    next: usize,
    state: Option<f32>,
}

impl Default for MedianEma {
    fn default() -> Self {
        Self::new()
    }
}

impl MedianEma {
    pub fn new() -> Self {
        Self {
            recent: [0.0; 3],
            count: 0,
            next: 0,
            state: None,
        }
    }

    pub fn add(&mut self, value: f32) {
        self.recent[self.next] = value;
        self.next = (self.next + 1) % 3;
        self.count = (self.count + 1).min(3);

        let median = self.median();
        // The first median seeds the blend instead of averaging against zero.
        self.state = Some(match self.state {
            Some(state) => (state * 2.0 + median) / 3.0,
            None => median,
        });
    }

    pub fn average(&self) -> f32 {
        self.state.unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn median(&self) -> f32 {
        match self.count {
            1 => self.recent[(self.next + 2) % 3],
            2 => {
                let a = self.recent[(self.next + 1) % 3];
                let b = self.recent[(self.next + 2) % 3];
                (a + b) / 2.0
            }
            _ => median3(self.recent[0], self.recent[1], self.recent[2]),
        }
    }
}

/// Median of three values.  If any input is NaN the result is NaN.
pub fn median3(a: f32, b: f32, c: f32) -> f32 {
    if a.is_nan() || b.is_nan() || c.is_nan() {
        return f32::NAN;
    }
    a.max(b).min(a.min(b).max(c))
}

/// A channel's smoothing filter, one of the [`FilterKind`] strategies.
#[derive(Debug, Clone)]
pub enum SampleFilter {
    MovingAverage(MovingAverage),
    MedianEma(MedianEma),
}

impl SampleFilter {
    pub fn new(kind: FilterKind) -> Self {
        match kind {
            FilterKind::MovingAverage { capacity } => {
                Self::MovingAverage(MovingAverage::new(capacity))
            }
            FilterKind::MedianEma => Self::MedianEma(MedianEma::new()),
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            Self::MovingAverage(f) => FilterKind::MovingAverage {
                capacity: f.capacity(),
            },
            Self::MedianEma(_) => FilterKind::MedianEma,
        }
    }

    /// Append one sample, evicting the oldest when the window is full.
    pub fn add(&mut self, value: f32) {
        match self {
            Self::MovingAverage(f) => f.add(value),
            Self::MedianEma(f) => f.add(value),
        }
    }

    /// Smoothed value, or `0.0` before any sample was added.
    pub fn average(&self) -> f32 {
        match self {
            Self::MovingAverage(f) => f.average(),
            Self::MedianEma(f) => f.average(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::MovingAverage(f) => f.len(),
            Self::MedianEma(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&mut self) {
        match self {
            Self::MovingAverage(f) => f.reset(),
            Self::MedianEma(f) => f.reset(),
        }
    }
}
