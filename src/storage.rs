//! Drawing storage: decodes uploaded data URLs and persists them as PNG files.
//!
//! Every drawing lands in a single flat directory under a generated name of
//! the form `drawing_<unixMillis>_<nonce>.png`, where the nonce is a random
//! integer in `0..10000`. Files are never rewritten or removed by the store.

use crate::{Error, Result};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use log::{debug, warn};
use rand::Rng;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix every accepted upload must carry.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

const NAME_PREFIX: &str = "drawing_";
const NAME_EXTENSION: &str = ".png";
const NONCE_RANGE: u32 = 10_000;

// Standard alphabet; padding optional and trailing bits tolerated.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// The generated identity of a stored drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawingName {
    /// Creation time in milliseconds since the Unix epoch
    pub millis: u128,
    /// Random disambiguator in `0..10000`
    pub nonce: u32,
}

impl DrawingName {
    /// Name for a drawing created right now.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let nonce = rand::thread_rng().gen_range(0..NONCE_RANGE);
        Self { millis, nonce }
    }

    /// Parse a file name produced by [`DrawingName`]'s `Display` impl.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name
            .strip_prefix(NAME_PREFIX)?
            .strip_suffix(NAME_EXTENSION)?;
        let (millis, nonce) = stem.split_once('_')?;
        if !is_digits(millis) || !is_digits(nonce) {
            return None;
        }
        let millis = millis.parse().ok()?;
        let nonce: u32 = nonce.parse().ok()?;
        if nonce >= NONCE_RANGE {
            return None;
        }
        Some(Self { millis, nonce })
    }
}

impl fmt::Display for DrawingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}_{}{}", NAME_PREFIX, self.millis, self.nonce, NAME_EXTENSION)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Strip the data URL prefix and decode the base64 body.
///
/// Fails with [`Error::InvalidInput`] only when the payload is missing, empty,
/// or lacks the PNG prefix. The body is decoded forgivingly: bytes outside the
/// standard and URL-safe alphabets are skipped, decoding stops at the first
/// `=`, and a dangling final sextet is dropped. Malformed input therefore
/// yields a corrupt drawing rather than an error, and the decoded bytes are
/// not checked for being a well-formed PNG.
pub fn decode_data_url(payload: Option<&str>) -> Result<Vec<u8>> {
    let payload = match payload {
        Some(p) if !p.is_empty() => p,
        _ => return Err(Error::InvalidInput("missing image payload".into())),
    };
    let body = payload
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .ok_or_else(|| Error::InvalidInput("payload is not a PNG data URL".into()))?;

    let mut symbols: Vec<u8> = body
        .bytes()
        .take_while(|&b| b != b'=')
        .filter_map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' => Some(b),
            b'-' => Some(b'+'),
            b'_' => Some(b'/'),
            _ => None,
        })
        .collect();
    // A lone trailing sextet carries no whole byte.
    if symbols.len() % 4 == 1 {
        symbols.pop();
    }

    LENIENT_BASE64
        .decode(&symbols)
        .map_err(|e| Error::Other(format!("base64 decode after sanitizing failed: {}", e)))
}

/// A flat directory of drawings.
#[derive(Debug, Clone)]
pub struct DrawingStore {
    dir: PathBuf,
}

impl DrawingStore {
    /// Open the store, creating the directory (and parents) if absent.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::StorageFailure(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode `payload` and write it as a new drawing; returns the file name.
    ///
    /// A name collision (same millisecond and nonce) silently overwrites the
    /// earlier file.
    pub fn save(&self, payload: Option<&str>) -> Result<String> {
        let bytes = decode_data_url(payload)?;
        let filename = DrawingName::generate().to_string();
        let path = self.dir.join(&filename);

        fs::write(&path, &bytes).map_err(|e| {
            warn!("Failed to write {}: {}", path.display(), e);
            Error::StorageFailure(format!("Failed to save {}: {}", filename, e))
        })?;

        debug!("Stored drawing {} ({} bytes)", filename, bytes.len());
        Ok(filename)
    }

    /// Paths of every entry whose name ends in `.png`, sorted by file name.
    ///
    /// Generated names start with the creation millis, so for a fixed digit
    /// count this is also upload order.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            Error::StorageFailure(format!("Failed to read {}: {}", self.dir.display(), e))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::StorageFailure(e.to_string()))?;
            if entry.file_name().to_string_lossy().ends_with(NAME_EXTENSION) {
                paths.push(entry.path());
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }
}
