//! Cache-size macro scraping from kernel headers

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Macros the generated helpers need, in the order they are reported
pub const REQUIRED: [&str; 3] = ["NFILE", "NIOBUF", "NINODE"];

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("File {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("Error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Value of {name} in {} does not fit in 64 bits", path.display())]
    Overflow { name: String, path: PathBuf },

    #[error(transparent)]
    Pattern(#[from] regex::Error),

    #[error("Missing macro definitions: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

/// Cache sizes used to bound the gdb helper loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSizes {
    pub nfile: u64,
    pub niobuf: u64,
    pub ninode: u64,
}

/// Scan `paths` in order; a later definition overrides an earlier one
pub fn scrape<P: AsRef<Path>>(paths: &[P]) -> Result<CacheSizes, ScrapeError> {
    let define = Regex::new(r"#define\s+(NFILE|NIOBUF|NINODE)\s+(\d+)")?;
    let mut found = BTreeMap::new();

    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScrapeError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ScrapeError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        for caps in content.lines().filter_map(|line| define.captures(line)) {
            let name = &caps[1];
            let value: u64 = caps[2].parse().map_err(|_| ScrapeError::Overflow {
                name: name.to_string(),
                path: path.to_path_buf(),
            })?;
            tracing::info!(macro_name = name, value, file = %path.display(), "Found macro");
            found.insert(name.to_string(), value);
        }
    }

    let missing: Vec<_> = REQUIRED
        .iter()
        .copied()
        .filter(|name| !found.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(ScrapeError::Missing(missing));
    }

    Ok(CacheSizes {
        nfile: found["NFILE"],
        niobuf: found["NIOBUF"],
        ninode: found["NINODE"],
    })
}
