//! Indicator trait definitions.

/// Streaming indicator that maintains internal state.
///
/// Streaming indicators are updated incrementally, one value per
/// observation, in arrival order.
pub trait StreamingIndicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Update the indicator with a new value.
    ///
    /// # Arguments
    /// * `value` - New input value
    ///
    /// # Returns
    /// The current indicator value, or None if not yet ready
    fn update(&mut self, value: f64) -> Option<Self::Output>;

    /// Get the current value without adding new data.
    fn current(&self) -> Option<Self::Output>;

    /// Reset the indicator state.
    fn reset(&mut self);

    /// Check if the indicator has enough data to produce values.
    fn is_ready(&self) -> bool {
        self.current().is_some()
    }

    /// Get the name of the indicator.
    fn name(&self) -> &str;
}
