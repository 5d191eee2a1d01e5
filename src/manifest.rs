//! Job manifest loader.
//!
//! The manifest is a stream of concatenated JSON objects, one per entry:
//!
//! ```text
//! {"inPath": "a.png", "outPath": "a_out.png", "effects": ["G", "B"]}
//! {"inPath": "b.png", "outPath": "b_out.png", "effects": ["S"]}
//! ```
//!
//! The whole file is decoded before any strategy starts. A malformed entry
//! — bad JSON or an unknown effect code — fails the entire load with a
//! descriptive error; there is never a partial manifest.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::img::Effect;

/// Raw wire form of one manifest entry.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "inPath")]
    in_path: String,
    #[serde(rename = "outPath")]
    out_path: String,
    effects: Vec<String>,
}

/// One validated manifest entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Input file name, resolved against a directory at task time.
    pub input: String,
    /// Output file name.
    pub output: String,
    /// Ordered, validated effect sequence.
    pub effects: Vec<Effect>,
}

/// Why a manifest failed to load. Always fatal to the run.
#[derive(Debug)]
pub enum ManifestError {
    /// The manifest file could not be opened.
    Io { path: PathBuf, source: io::Error },
    /// A JSON value failed to decode.
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// An entry names an effect code this build does not know.
    UnknownEffect { input: String, code: String },
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io { path, source } => {
                write!(f, "error opening manifest {}: {}", path.display(), source)
            }
            ManifestError::Decode { path, source } => {
                write!(f, "error decoding manifest {}: {}", path.display(), source)
            }
            ManifestError::UnknownEffect { input, code } => {
                write!(f, "unknown effect code {:?} in entry for {:?}", code, input)
            }
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManifestError::Io { source, .. } => Some(source),
            ManifestError::Decode { source, .. } => Some(source),
            ManifestError::UnknownEffect { .. } => None,
        }
    }
}

/// Load and validate the full manifest at `path`.
pub fn load(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let file = File::open(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    for raw in serde_json::Deserializer::from_reader(reader).into_iter::<RawEntry>() {
        let raw = raw.map_err(|source| ManifestError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let effects = raw
            .effects
            .iter()
            .map(|code| {
                Effect::from_code(code).ok_or_else(|| ManifestError::UnknownEffect {
                    input: raw.in_path.clone(),
                    code: code.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        entries.push(ManifestEntry {
            input: raw.in_path,
            output: raw.out_path,
            effects,
        });
    }
    Ok(entries)
}
