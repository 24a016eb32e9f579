//! # Pricewise workspace
//!
//! Umbrella crate bundling the forecasting engine and its numeric core.
//!
//! ## Example
//!
//! ```
//! use pricewise_workspace::engine::recommendation::{recommend, Recommendation};
//!
//! let (action, reason) = recommend(-8.0);
//! assert_eq!(action, Recommendation::Wait);
//! assert_eq!(reason, "Price expected to drop by 8.0%");
//! ```

/// Forecasting engine
pub use pricewise as engine;

/// Statistics, scaling and tree-ensemble regression
pub use price_math as math;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        assert_eq!(engine::NAME, "pricewise");
        let trend = math::trend::LinearTrend::fit(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(trend.forecast(1), 4.0);
    }
}
