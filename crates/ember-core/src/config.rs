//! Collector configuration and default constants.

/// Default heap size, in accounted bytes, before the first collection (1 MB).
pub const DEFAULT_GC_THRESHOLD: usize = 1024 * 1024;

/// After a collection the next threshold is live bytes times this factor.
pub const DEFAULT_HEAP_GROW_FACTOR: usize = 2;

/// Default maximum operand stack size (in slots).
pub const DEFAULT_MAX_STACK_SIZE: usize = 64 * 256;

/// Options for creating a garbage collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    /// Collect before every allocation that grows the heap
    pub stress: bool,

    /// Initial (and minimum) collection threshold in bytes
    pub initial_threshold: usize,

    /// Multiplier applied to live bytes to compute the next threshold
    pub heap_grow_factor: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            stress: cfg!(feature = "stress_gc"),
            initial_threshold: DEFAULT_GC_THRESHOLD,
            heap_grow_factor: DEFAULT_HEAP_GROW_FACTOR,
        }
    }
}

impl GcConfig {
    /// Configuration that collects on every growth
    pub fn stress() -> Self {
        Self::default().with_stress(true)
    }

    /// Enable or disable stress collection
    pub fn with_stress(mut self, stress: bool) -> Self {
        self.stress = stress;
        self
    }

    /// Set the initial threshold; clamped to 1 so it can never disable collection
    pub fn with_threshold(mut self, bytes: usize) -> Self {
        self.initial_threshold = bytes.max(1);
        self
    }

    /// Set the heap grow factor; clamped to 1
    pub fn with_grow_factor(mut self, factor: usize) -> Self {
        self.heap_grow_factor = factor.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GcConfig::default();
        assert_eq!(config.initial_threshold, DEFAULT_GC_THRESHOLD);
        assert_eq!(config.heap_grow_factor, DEFAULT_HEAP_GROW_FACTOR);
        assert_eq!(config.stress, cfg!(feature = "stress_gc"));
    }

    #[test]
    fn test_builder_clamps() {
        let config = GcConfig::default().with_threshold(0).with_grow_factor(0);
        assert_eq!(config.initial_threshold, 1);
        assert_eq!(config.heap_grow_factor, 1);
    }

    #[test]
    fn test_stress() {
        assert!(GcConfig::stress().stress);
        assert!(!GcConfig::stress().with_stress(false).stress);
    }
}
