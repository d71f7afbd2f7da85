use {
    serde::de::DeserializeOwned,
    std::{fmt, io, path::Path, str::FromStr},
};

/// Reads `path` and parses it as yaml into `T`. Fields of `T` are expected to be optional so that
/// the schema can be checked afterwards with [`Report`], reporting everything at once.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, LoadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::Read(path.into(), e))?;
    parse(&content).map_err(|e| LoadError::Parse(path.into(), e))
}

pub fn parse<T: DeserializeOwned>(content: &str) -> Result<T, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read config file {0:?}: {1}")]
    Read(std::path::PathBuf, io::Error),
    #[error("failed to parse config file {0:?}: {1}")]
    Parse(std::path::PathBuf, serde_yaml::Error),
}

/// Collects missing and invalid fields of a loosely parsed config.
#[derive(Default, Debug)]
pub struct Report {
    missing: Vec<String>,
    invalid: Vec<(String, String)>,
}

impl Report {
    pub fn require<T>(&mut self, key: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.missing.push(key.to_owned());
        }
        value
    }

    pub fn parse<T>(&mut self, key: &str, value: Option<impl AsRef<str>>) -> Option<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let value = self.require(key, value)?;
        value
            .as_ref()
            .parse::<T>()
            .map_err(|e| self.invalid(key, e))
            .ok()
    }

    pub fn invalid(&mut self, key: &str, reason: impl fmt::Display) {
        self.invalid.push((key.to_owned(), reason.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    /// Returns the assembled value if nothing was reported. `assemble` is only called when the
    /// report is clean.
    pub fn finish<T>(self, assemble: impl FnOnce() -> Option<T>) -> Result<T, SchemaError> {
        if self.is_empty() {
            if let Some(value) = assemble() {
                return Ok(value);
            }
        }

        Err(SchemaError {
            missing: self.missing,
            invalid: self.invalid,
        })
    }
}

#[derive(Debug)]
pub struct SchemaError {
    pub missing: Vec<String>,
    pub invalid: Vec<(String, String)>,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.missing.is_empty() {
            writeln!(f, "Missing fields:")?;
            for key in &self.missing {
                writeln!(f, "\t{key}")?;
            }
        }

        if !self.invalid.is_empty() {
            writeln!(f, "Invalid fields:")?;
            for (key, reason) in &self.invalid {
                writeln!(f, "\t{key}: {reason}")?;
            }
        }

        if self.missing.is_empty() && self.invalid.is_empty() {
            write!(f, "incomplete config")?;
        }

        Ok(())
    }
}

impl std::error::Error for SchemaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Doc {
        port: Option<String>,
        name: Option<String>,
        host: Option<String>,
    }

    #[test]
    fn report_lists_everything() {
        let doc: Doc = parse("port: abc\n").unwrap();
        let mut report = Report::default();
        let port = report.parse::<u16>("port", doc.port);
        let name = report.require("name", doc.name);
        let host = report.require("host", doc.host);

        let err = report
            .finish(|| Some((port?, name?, host?)))
            .unwrap_err();
        assert_eq!(err.missing, ["name", "host"]);
        assert_eq!(err.invalid.len(), 1);
        assert_eq!(err.invalid[0].0, "port");

        let text = err.to_string();
        assert!(text.contains("Missing fields:\n\tname\n\thost\n"));
        assert!(text.contains("Invalid fields:\n\tport: "));
    }

    #[test]
    fn clean_report_assembles() {
        let doc: Doc = parse("port: '8080'\nname: a\nhost: b\n").unwrap();
        let mut report = Report::default();
        let port = report.parse::<u16>("port", doc.port);
        let name = report.require("name", doc.name);
        let host = report.require("host", doc.host);

        let value = report.finish(|| Some((port?, name?, host?))).unwrap();
        assert_eq!(value, (8080, "a".to_owned(), "b".to_owned()));
    }

    #[test]
    fn load_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(load::<Doc>(&missing), Err(LoadError::Read(..))));

        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "port: [unclosed\n").unwrap();
        assert!(matches!(load::<Doc>(&broken), Err(LoadError::Parse(..))));

        let valid = dir.path().join("valid.yaml");
        std::fs::write(&valid, "port: '80'\nname: a\n").unwrap();
        let doc = load::<Doc>(&valid).unwrap();
        assert_eq!(doc.port.as_deref(), Some("80"));
        assert!(doc.host.is_none());
    }
}
