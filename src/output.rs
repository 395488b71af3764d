//! Output formatting
//!
//! Two modes over two formats. Buffered mode serializes one top-level value
//! (scalar, object, or the accumulated result slice) and writes it once.
//! Streaming mode hands out a pre-bound encoder that emits one value per
//! call, newline-terminated, holding a mutex around each record so workers
//! can share it without interleaving.
//!
//! Field names pass through as-is; the payloads own their wire naming.

use std::io::Write;
use std::sync::Mutex;

use serde::Serialize;

use crate::error::Result;

/// Serialization format selected by the top-level `--format` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn parse(s: &str) -> Option<Format> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Process-wide output selection, fixed at command initialization
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub format: Format,
    /// Compact JSON instead of indented (`--compressOutput`)
    pub compress: bool,
    /// Streaming per-record emission (`--streamOutput`)
    pub stream: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: Format::Json,
            compress: false,
            stream: false,
        }
    }
}

/// Serializes one value according to the configured format
pub fn render<T: Serialize>(cfg: &OutputConfig, value: &T) -> Result<String> {
    match cfg.format {
        Format::Json if cfg.compress => Ok(serde_json::to_string(value)?),
        Format::Json => Ok(serde_json::to_string_pretty(value)?),
        Format::Yaml => Ok(serde_yaml::to_string(value)?),
    }
}

/// Buffered mode: serialize once, write once
pub fn write_value<T: Serialize>(cfg: &OutputConfig, value: &T) -> Result<()> {
    println!("{}", render(cfg, value)?);
    Ok(())
}

/// Streaming encoder shared across batch workers
///
/// Each `emit` serializes the record, then appends it and a trailing newline
/// under the writer lock, so concurrent emitters never interleave bytes.
pub struct StreamEncoder {
    cfg: OutputConfig,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StreamEncoder {
    /// Encoder bound to stdout
    pub fn stdout(cfg: OutputConfig) -> Self {
        Self::to_writer(cfg, Box::new(std::io::stdout()))
    }

    /// Encoder bound to an arbitrary writer; tests capture output this way
    pub fn to_writer(cfg: OutputConfig, writer: Box<dyn Write + Send>) -> Self {
        Self {
            cfg,
            writer: Mutex::new(writer),
        }
    }

    /// Emits one top-level value terminated by a newline
    pub fn emit<T: Serialize>(&self, value: &T) -> Result<()> {
        // One value per line regardless of format: streamed JSON is always
        // compact, streamed YAML uses explicit document framing.
        let rendered = match self.cfg.format {
            Format::Json => serde_json::to_string(value)?,
            Format::Yaml => {
                let doc = serde_yaml::to_string(value)?;
                format!("---\n{}", doc.trim_end())
            }
        };
        let mut writer = self.writer.lock().expect("stream writer poisoned");
        writer.write_all(rendered.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
