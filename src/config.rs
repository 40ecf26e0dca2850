use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming the data file when none is given explicitly.
pub const DATAFILE_ENV: &str = "COVTRACK_DATAFILE";

/// Data file used when neither a path nor `COVTRACK_DATAFILE` is set.
pub const DEFAULT_DATAFILE: &str = "covtrack.db";

/// Settings shared by a coverage session and a reporting pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where the cumulative snapshot lives.
    pub data_file: PathBuf,
    /// Score individual methods during the complexity pass.
    pub calculate_method_complexity: bool,
}

impl Config {
    /// Resolve the data file from `COVTRACK_DATAFILE`, falling back to
    /// `covtrack.db` in the working directory.
    pub fn from_env() -> Self {
        Self::with_data_file(resolve_data_file(None, std::env::var_os(DATAFILE_ENV)))
    }

    pub fn with_data_file(path: impl Into<PathBuf>) -> Self {
        Self {
            data_file: path.into(),
            calculate_method_complexity: false,
        }
    }

    pub fn with_method_complexity(mut self, enabled: bool) -> Self {
        self.calculate_method_complexity = enabled;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_data_file(DEFAULT_DATAFILE)
    }
}

/// Pick the data file: an explicit path, then the environment value, then
/// the default. Empty environment values are ignored.
pub fn resolve_data_file(explicit: Option<&Path>, env: Option<OsString>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match env {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_DATAFILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_data_file(Some(Path::new("a.db")), Some("b.db".into()));
        assert_eq!(path, PathBuf::from("a.db"));
    }

    #[test]
    fn test_env_then_default() {
        assert_eq!(
            resolve_data_file(None, Some("b.db".into())),
            PathBuf::from("b.db")
        );
        assert_eq!(
            resolve_data_file(None, Some(OsString::new())),
            PathBuf::from(DEFAULT_DATAFILE)
        );
        assert_eq!(resolve_data_file(None, None), PathBuf::from(DEFAULT_DATAFILE));
    }

    #[test]
    fn test_method_complexity_off_by_default() {
        let config = Config::default();
        assert!(!config.calculate_method_complexity);
        assert!(config.with_method_complexity(true).calculate_method_complexity);
    }
}
