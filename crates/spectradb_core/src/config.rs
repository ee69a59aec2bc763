//! Store configuration.

/// Current file format version written by this build.
pub const CURRENT_FILE_VERSION: u32 = 1;

/// Default capacity of the undo stack.
pub const DEFAULT_UNDO_CAPACITY: usize = 64;

/// Configuration for a store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Magic bytes at the start of every database file.
    pub magic: Vec<u8>,

    /// File format version written on save. Files with a higher version
    /// are rejected on load.
    pub file_version: u32,

    /// Maximum number of transaction records kept for undo.
    pub undo_capacity: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            magic: b"SPDB".to_vec(),
            file_version: CURRENT_FILE_VERSION,
            undo_capacity: DEFAULT_UNDO_CAPACITY,
        }
    }
}

impl DbConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the magic bytes.
    #[must_use]
    pub fn magic(mut self, magic: impl Into<Vec<u8>>) -> Self {
        self.magic = magic.into();
        self
    }

    /// Sets the file format version.
    #[must_use]
    pub fn file_version(mut self, version: u32) -> Self {
        self.file_version = version;
        self
    }

    /// Sets the undo stack capacity.
    #[must_use]
    pub fn undo_capacity(mut self, capacity: usize) -> Self {
        self.undo_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = DbConfig::default();
        assert_eq!(config.magic, b"SPDB");
        assert_eq!(config.file_version, CURRENT_FILE_VERSION);
        assert_eq!(config.undo_capacity, DEFAULT_UNDO_CAPACITY);
    }

    #[test]
    fn builder_pattern() {
        let config = DbConfig::new()
            .magic(*b"SPS")
            .file_version(3)
            .undo_capacity(8);
        assert_eq!(config.magic, b"SPS");
        assert_eq!(config.file_version, 3);
        assert_eq!(config.undo_capacity, 8);
    }
}
