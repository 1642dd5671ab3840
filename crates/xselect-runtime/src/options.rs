//! Store behavior switches.

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Start async option loads for every satisfiable field at construction.
    pub eager_load: bool,
    /// Clear initial values of fields whose parents are all empty.
    pub normalize_initial_values: bool,
    /// Log a warning (once per name) when a caller uses an undeclared field.
    pub warn_unknown_fields: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            eager_load: true,
            normalize_initial_values: true,
            warn_unknown_fields: true,
        }
    }
}

impl StoreOptions {
    #[must_use]
    pub fn with_eager_load(mut self, eager_load: bool) -> Self {
        self.eager_load = eager_load;
        self
    }

    #[must_use]
    pub fn with_normalize_initial_values(mut self, normalize: bool) -> Self {
        self.normalize_initial_values = normalize;
        self
    }

    #[must_use]
    pub fn with_warn_unknown_fields(mut self, warn: bool) -> Self {
        self.warn_unknown_fields = warn;
        self
    }
}
