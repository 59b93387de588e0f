/// Statistics snapshot justifying a cost.
///
/// Produced by the statistics subsystem; the memo only stores and returns it.
#[derive(Clone, Debug, PartialEq)]
pub struct Statistics {
    row_count: f64,
    avg_row_width: f64,
}

impl Statistics {
    pub fn new(row_count: f64, avg_row_width: f64) -> Self {
        Self {
            row_count,
            avg_row_width,
        }
    }

    pub fn row_count(&self) -> f64 {
        self.row_count
    }

    pub fn avg_row_width(&self) -> f64 {
        self.avg_row_width
    }

    pub fn total_bytes(&self) -> f64 {
        self.row_count * self.avg_row_width
    }
}
