//! Registry configuration

/// Subscription registry configuration
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Maximum live subscriptions per connection (0 = unlimited)
    pub max_subscriptions: usize,
}

impl RegistryConfig {
    /// Set the maximum number of live subscriptions
    pub fn max_subscriptions(mut self, max: usize) -> Self {
        self.max_subscriptions = max;
        self
    }

    /// Whether a limit is configured
    pub fn is_limited(&self) -> bool {
        self.max_subscriptions > 0
    }
}
