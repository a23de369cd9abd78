use std::fmt;
use std::path::PathBuf;

/// A contract as forge addresses it: `Name` or `path/to/File.sol:Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractSpec {
    pub path: Option<PathBuf>,
    pub name: String,
}

impl ContractSpec {
    pub fn path_name(path: PathBuf, name: impl ToString) -> Self {
        Self {
            path: Some(path),
            name: name.to_string(),
        }
    }

    pub fn name(name: impl ToString) -> Self {
        Self {
            path: None,
            name: name.to_string(),
        }
    }

    /// Accepts both the bare and the fully qualified form.
    pub fn parse(spec: &str) -> Self {
        match spec.rsplit_once(':') {
            Some((path, name)) if !path.is_empty() => {
                Self::path_name(PathBuf::from(path), name)
            }
            _ => Self::name(spec),
        }
    }
}

impl fmt::Display for ContractSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = self.path.as_deref() {
            write!(f, "{}:{}", path.display(), self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}
