// Licensed under the Apache-2.0 license

//! Configuration for which parts of a register description are generated.

/// Peripherals LiteX describes in its SVD that have no business in a PAC.
///
/// `identifier_mem` is the SoC identification string ROM; it is exposed as a
/// peripheral with one register per character.
pub const DEFAULT_EXCLUDES: &[&str] = &["identifier_mem"];

/// Configuration for filtering which peripherals and registers are generated.
///
/// # Example
///
/// ```
/// use litex_pac_generator::config::FilterConfig;
///
/// let config = FilterConfig::with_defaults().exclude_name("ddrphy");
/// assert!(!config.should_include("IDENTIFIER_MEM"));
/// assert!(!config.should_include("ddrphy"));
/// assert!(config.should_include("uart"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterConfig {
    /// Names of peripherals or registers to skip, lower-cased.
    pub exclude_names: Vec<String>,
}

impl FilterConfig {
    /// A filter that lets everything through.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter that skips [`DEFAULT_EXCLUDES`].
    pub fn with_defaults() -> Self {
        DEFAULT_EXCLUDES
            .iter()
            .fold(Self::new(), |config, name| config.exclude_name(name))
    }

    /// Exclude peripherals or registers whose name matches (case-insensitive).
    pub fn exclude_name(mut self, name: &str) -> Self {
        let name = name.to_lowercase();
        if !self.exclude_names.contains(&name) {
            self.exclude_names.push(name);
        }
        self
    }

    /// Returns true if this filter has no constraints.
    pub fn is_empty(&self) -> bool {
        self.exclude_names.is_empty()
    }

    /// Check whether a peripheral or register with this name is generated.
    pub fn should_include(&self, name: &str) -> bool {
        let name_lower = name.to_lowercase();
        !self.exclude_names.iter().any(|n| *n == name_lower)
    }
}
