//! Replay scripts: a canvas, an optional engine configuration and a list of
//! tool operations, applied headlessly. Every commit of a run can be logged
//! as one JSON line.

use std::io::{BufRead, Write};
use std::ops::Range;
use std::path::Path;

use engine::{CommitRecord, EngineConfig, EngineError, PaintEngine, ToolOperation};
use log::{debug, info};
use render_protocol::ToolTag;
use serde::{Deserialize, Serialize};

pub const SCRIPT_SCHEMA_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    pub canvas: CanvasSize,
    /// Canvas fields in here are ignored; `canvas` wins.
    #[serde(default)]
    pub config: Option<EngineConfig>,
    pub operations: Vec<ToolOperation>,
}

fn default_schema_version() -> u16 {
    SCRIPT_SCHEMA_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("script schema {found} is not supported (expected {SCRIPT_SCHEMA_VERSION})")]
    UnsupportedSchema { found: u16 },
    #[error("canvas {width}x{height} has no pixels")]
    EmptyCanvas { width: u32, height: u32 },
    #[error("script has no operations")]
    EmptyScript,
    #[error("operation {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("parse replay script failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("engine setup failed: {0}")]
    Setup(#[source] EngineError),
    #[error("operation {index} ({tool:?}) failed: {source}")]
    Operation {
        index: usize,
        tool: ToolTag,
        #[source]
        source: EngineError,
    },
}

impl ReplayScript {
    pub fn from_json(text: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCRIPT_SCHEMA_VERSION {
            return Err(ValidationError::UnsupportedSchema {
                found: self.schema_version,
            });
        }
        let CanvasSize { width, height } = self.canvas;
        if width == 0 || height == 0 {
            return Err(ValidationError::EmptyCanvas { width, height });
        }
        if self.operations.is_empty() {
            return Err(ValidationError::EmptyScript);
        }
        for (index, operation) in self.operations.iter().enumerate() {
            if !coordinates_finite(operation) {
                return Err(ValidationError::NonFiniteCoordinate { index });
            }
        }
        Ok(())
    }

    /// Engine configuration for this script. `base` replaces the script's
    /// own configuration when given; the canvas always comes from the script.
    pub fn engine_config(&self, base: Option<EngineConfig>) -> EngineConfig {
        let mut config = base.or_else(|| self.config.clone()).unwrap_or_default();
        config.canvas_width = self.canvas.width;
        config.canvas_height = self.canvas.height;
        config
    }

    /// Validates the script, then applies every operation in order on a new
    /// engine. Stops at the first failing operation.
    pub fn run(&self, config: Option<EngineConfig>) -> Result<ReplayOutcome, ReplayError> {
        self.validate()?;
        let mut engine = PaintEngine::new(self.engine_config(config)).map_err(ReplayError::Setup)?;
        let mut commits = Vec::with_capacity(self.operations.len());
        for (index, operation) in self.operations.iter().enumerate() {
            let record = engine.apply(operation).map_err(|source| ReplayError::Operation {
                index,
                tool: operation.tool(),
                source,
            })?;
            debug!("operation {index}: {:?} at revision {}", record.tool, record.revision);
            commits.push(CommitLine::new(index, &engine, &record));
        }
        info!(
            "replayed {} operations on {}x{}",
            commits.len(),
            self.canvas.width,
            self.canvas.height
        );
        Ok(ReplayOutcome { engine, commits })
    }
}

fn coordinates_finite(operation: &ToolOperation) -> bool {
    match operation {
        ToolOperation::Brush { points, .. } => points
            .iter()
            .all(|point| point.x.is_finite() && point.y.is_finite()),
        ToolOperation::Puff { x, y, .. }
        | ToolOperation::Fill { x, y, .. }
        | ToolOperation::Erase { x, y, .. } => x.is_finite() && y.is_finite(),
        ToolOperation::Embroidery { points, .. } => {
            points.iter().flatten().all(|value| value.is_finite())
        }
    }
}

pub struct ReplayOutcome {
    pub engine: PaintEngine,
    pub commits: Vec<CommitLine>,
}

/// One committed operation as written to the commit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLine {
    pub operation: usize,
    pub tool: ToolTag,
    pub layer_name: String,
    pub revision: u64,
    pub dirty_rows: Option<Range<u32>>,
}

impl CommitLine {
    fn new(operation: usize, engine: &PaintEngine, record: &CommitRecord) -> Self {
        let layer_name = engine
            .document()
            .layer(record.layer_id)
            .map(|layer| layer.name().to_owned())
            .unwrap_or_default();
        Self {
            operation,
            tool: record.tool,
            layer_name,
            revision: record.revision,
            dirty_rows: record.dirty_rows.clone(),
        }
    }
}

pub fn write_jsonl_commit_line(
    writer: &mut dyn Write,
    line: &CommitLine,
) -> Result<(), std::io::Error> {
    serde_json::to_writer(&mut *writer, line).map_err(|error| {
        std::io::Error::other(format!("serialize commit line as JSON failed: {error}"))
    })?;
    writer.write_all(b"\n")
}

pub fn read_jsonl_commits(reader: &mut dyn BufRead) -> Result<Vec<CommitLine>, std::io::Error> {
    let mut lines = Vec::new();
    let mut line_buffer = String::new();
    let mut line_number = 0usize;
    loop {
        line_buffer.clear();
        let bytes = reader.read_line(&mut line_buffer)?;
        if bytes == 0 {
            break;
        }
        line_number += 1;
        if line_buffer.trim().is_empty() {
            continue;
        }
        let line = serde_json::from_str::<CommitLine>(&line_buffer).map_err(|error| {
            let message = format!("parse commit line JSON at line {line_number} failed: {error}");
            std::io::Error::other(message)
        })?;
        lines.push(line);
    }
    Ok(lines)
}
