//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zi.
//! The Zi project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # JSON Lines IO
//!
//! [`ZiJsonLoader`] reads one JSON object per non-empty line from a file,
//! standard input or in-memory text. [`ZiJsonSaver`] writes records back out
//! the same way.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::errors::{Result, ZiError};
use crate::record::{type_name, ZiData, ZiRecord, ZiRecordBatch};

#[derive(Clone, Debug)]
enum ZiJsonSource {
    Path(PathBuf),
    Stdin,
    Text(Arc<String>),
}

/// Lazy reader of JSON Lines records.
///
/// Every call to [`ZiJsonLoader::iter`] starts from the beginning of the
/// source; standard input can only be consumed once.
#[derive(Clone, Debug)]
pub struct ZiJsonLoader {
    source: ZiJsonSource,
}

impl ZiJsonLoader {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            source: ZiJsonSource::Path(path.as_ref().to_path_buf()),
        }
    }

    pub fn stdin() -> Self {
        Self {
            source: ZiJsonSource::Stdin,
        }
    }

    /// Loader over JSON Lines text held in memory.
    pub fn from_json_string(text: impl Into<String>) -> Self {
        Self {
            source: ZiJsonSource::Text(Arc::new(text.into())),
        }
    }

    /// Loader over individual lines, one JSON object each.
    pub fn from_json_strings<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        for line in lines {
            text.push_str(line.as_ref());
            text.push('\n');
        }
        Self::from_json_string(text)
    }

    /// Opens the source and returns a fresh record iterator.
    pub fn iter(&self) -> Result<ZiJsonLines> {
        let reader: Box<dyn BufRead + Send> = match &self.source {
            ZiJsonSource::Path(path) => {
                let file = File::open(path).map_err(|e| {
                    ZiError::Io(format!("cannot open '{}': {e}", path.display()))
                })?;
                Box::new(BufReader::new(file))
            }
            ZiJsonSource::Stdin => Box::new(BufReader::new(std::io::stdin())),
            ZiJsonSource::Text(text) => Box::new(Cursor::new(text.as_bytes().to_vec())),
        };
        Ok(ZiJsonLines {
            reader,
            line: 0,
            done: false,
        })
    }

    /// Reads every record, stopping at the first bad line.
    pub fn load(&self) -> Result<ZiRecordBatch> {
        self.iter()?.collect()
    }
}

/// Iterator over the records of a [`ZiJsonLoader`] source.
///
/// Yields `Err(ZiError::Parse { line, .. })` for each malformed line and keeps
/// going; a read failure ends the iteration.
pub struct ZiJsonLines {
    reader: Box<dyn BufRead + Send>,
    line: usize,
    done: bool,
}

impl Iterator for ZiJsonLines {
    type Item = Result<ZiRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = String::new();
        while !self.done {
            buf.clear();
            match self.reader.read_line(&mut buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    if buf.trim().is_empty() {
                        continue;
                    }
                    return Some(parse_line(&buf, self.line));
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
            }
        }
        None
    }
}

fn parse_line(content: &str, line: usize) -> Result<ZiRecord> {
    let value: Value =
        serde_json::from_str(content.trim()).map_err(|e| ZiError::parse(line, e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ZiError::parse(
            line,
            format!("expected JSON object, got {}", type_name(&other)),
        )),
    }
}

/// Writes records as JSON Lines to a file or standard output.
pub struct ZiJsonSaver {
    writer: Box<dyn Write + Send>,
    written: usize,
}

impl ZiJsonSaver {
    /// Creates or truncates `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| ZiError::Io(format!("cannot create '{}': {e}", path.display())))?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    /// Opens `path` for appending, creating it if needed.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ZiError::Io(format!("cannot open '{}': {e}", path.display())))?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    pub fn stdout() -> Self {
        Self::from_writer(BufWriter::new(std::io::stdout()))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            written: 0,
        }
    }

    pub fn write_record(&mut self, record: &ZiRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Writes every leaf record of `data`, returning how many lines were written.
    pub fn write(&mut self, data: &ZiData) -> Result<usize> {
        let leaves = data.leaves();
        for record in &leaves {
            self.write_record(record)?;
        }
        Ok(leaves.len())
    }

    pub fn write_all<'a>(&mut self, items: impl IntoIterator<Item = &'a ZiData>) -> Result<usize> {
        let mut count = 0;
        for data in items {
            count += self.write(data)?;
        }
        Ok(count)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Lines written since the saver was opened.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl Drop for ZiJsonSaver {
    fn drop(&mut self) {
        if let Err(err) = self.writer.flush() {
            log::warn!("failed to flush JSON Lines output: {err}");
        }
    }
}
