//! Resource loading and character decoding.
//!
//! Template payloads, header data, scripts and dictionary mappings can be
//! referenced by path. A [`ResourceLoader`] turns the path into bytes plus an
//! optional declared charset; decoding happens in [`Resource::read_to_string`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use regex::bytes::Regex;

use crate::error::{CourierError, DecodeError, Result};

/// Prefix accepted (and stripped) in file resource paths.
pub const FILE_PREFIX: &str = "file:";

/// Charset used when nothing is declared or detected.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Raw resource content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    path: String,
    bytes: Vec<u8>,
    charset: Option<String>,
}

impl Resource {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
            charset: None,
        }
    }

    /// Declare the charset of the content.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Charset used for decoding: override, then declared, then detected.
    pub fn effective_charset(&self, charset_override: Option<&str>) -> String {
        charset_override
            .or(self.charset.as_deref())
            .map(str::to_string)
            .or_else(|| detect_charset(&self.bytes))
            .unwrap_or_else(|| DEFAULT_CHARSET.to_string())
    }

    /// Decode the content as text.
    ///
    /// # Errors
    /// Returns `Encoding` when the charset is unsupported or the bytes are not
    /// valid in that charset.
    pub fn read_to_string(&self, charset_override: Option<&str>) -> Result<String> {
        let charset = self.effective_charset(charset_override);
        decode(&self.bytes, &charset).map_err(|source| {
            tracing::error!("Failed to decode resource '{}' as {}: {}", self.path, charset, source);
            CourierError::Encoding { charset, source }
        })
    }
}

/// Resolves a path reference to resource content.
pub trait ResourceLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Resource>;
}

/// Loads resources from the file system, relative to an optional base directory.
#[derive(Debug, Clone, Default)]
pub struct FileResourceLoader {
    base_dir: Option<PathBuf>,
}

impl FileResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path.strip_prefix(FILE_PREFIX).unwrap_or(path));
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ResourceLoader for FileResourceLoader {
    fn load(&self, path: &str) -> Result<Resource> {
        let full_path = self.full_path(path);
        tracing::debug!("Loading resource {}", full_path.display());
        let bytes = std::fs::read(&full_path).map_err(|source| CourierError::Resource {
            path: full_path.display().to_string(),
            source,
        })?;
        Ok(Resource::new(path, bytes))
    }
}

/// Resources held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResourceLoader {
    resources: HashMap<String, Resource>,
}

impl InMemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Resource) {
        self.resources.insert(resource.path().to_string(), resource);
    }

    pub fn with_text(mut self, path: &str, text: &str) -> Self {
        self.add(Resource::new(path, text.as_bytes()));
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.add(resource);
        self
    }
}

impl ResourceLoader for InMemoryResourceLoader {
    fn load(&self, path: &str) -> Result<Resource> {
        let key = path.strip_prefix(FILE_PREFIX).unwrap_or(path);
        self.resources
            .get(key)
            .or_else(|| self.resources.get(path))
            .cloned()
            .ok_or_else(|| CourierError::Resource {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such in-memory resource"),
            })
    }
}

/// Detect a charset from a byte order mark or an XML declaration.
pub fn detect_charset(bytes: &[u8]) -> Option<String> {
    static XML_ENCODING: OnceLock<Regex> = OnceLock::new();

    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some("UTF-8".to_string());
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Some("UTF-16LE".to_string());
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Some("UTF-16BE".to_string());
    }

    if bytes.starts_with(b"<?xml") {
        let end = bytes
            .windows(2)
            .position(|w| w == b"?>")
            .unwrap_or(bytes.len());
        let re = XML_ENCODING.get_or_init(|| {
            Regex::new(r#"encoding\s*=\s*["']([A-Za-z0-9._\-]+)["']"#)
                .expect("encoding pattern is valid")
        });
        // A declaration readable as ASCII cannot be in a multi-byte unit charset.
        return re
            .captures(&bytes[..end])
            .map(|caps| String::from_utf8_lossy(&caps[1]).into_owned())
            .filter(|charset| !is_wide_charset(charset));
    }

    None
}

fn is_wide_charset(charset: &str) -> bool {
    let upper = charset.to_ascii_uppercase();
    upper.starts_with("UTF-16")
        || upper.starts_with("UTF16")
        || upper.starts_with("UTF-32")
        || upper.starts_with("UTF32")
        || upper.starts_with("UCS-")
}

/// Decode bytes with the named charset.
///
/// Supported: UTF-8, UTF-16 (BOM detected, big endian default), UTF-16LE,
/// UTF-16BE, ISO-8859-1 and US-ASCII.
pub fn decode(bytes: &[u8], charset: &str) -> std::result::Result<String, DecodeError> {
    match charset.to_ascii_uppercase().replace('_', "-").as_str() {
        "UTF-8" | "UTF8" => {
            let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
            std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|e| DecodeError::Malformed {
                    charset: "UTF-8",
                    offset: e.valid_up_to(),
                })
        }
        "UTF-16" | "UTF16" => {
            if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
                decode_utf16(rest, "UTF-16", u16::from_le_bytes)
            } else {
                let rest = bytes.strip_prefix(&[0xFE, 0xFF]).unwrap_or(bytes);
                decode_utf16(rest, "UTF-16", u16::from_be_bytes)
            }
        }
        "UTF-16LE" => {
            let rest = bytes.strip_prefix(&[0xFF, 0xFE]).unwrap_or(bytes);
            decode_utf16(rest, "UTF-16LE", u16::from_le_bytes)
        }
        "UTF-16BE" => {
            let rest = bytes.strip_prefix(&[0xFE, 0xFF]).unwrap_or(bytes);
            decode_utf16(rest, "UTF-16BE", u16::from_be_bytes)
        }
        "ISO-8859-1" | "ISO8859-1" | "LATIN1" | "LATIN-1" => {
            Ok(bytes.iter().map(|&b| char::from(b)).collect())
        }
        "US-ASCII" | "ASCII" => match bytes.iter().position(|b| !b.is_ascii()) {
            Some(offset) => Err(DecodeError::Malformed {
                charset: "US-ASCII",
                offset,
            }),
            None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        },
        _ => Err(DecodeError::UnsupportedCharset(charset.to_string())),
    }
}

fn decode_utf16(
    bytes: &[u8],
    charset: &'static str,
    to_unit: fn([u8; 2]) -> u16,
) -> std::result::Result<String, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::Malformed {
            charset,
            offset: bytes.len() - 1,
        });
    }

    let units = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    let mut text = String::with_capacity(bytes.len() / 2);
    let mut offset = 0;
    for decoded in char::decode_utf16(units) {
        match decoded {
            Ok(c) => {
                offset += c.len_utf16() * 2;
                text.push(c);
            }
            Err(_) => return Err(DecodeError::Malformed { charset, offset }),
        }
    }
    Ok(text)
}
