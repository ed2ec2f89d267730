//! Shared fixtures for `nbmigrate-core` integration tests.
//!
//! [`FakeGenerator`] stands in for the text-generation service with scripted
//! replies; the notebook helpers build `.ipynb` files on a [`TempDir`].
//! [`LogCapture`] records `tracing` output for assertions on diagnostics.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use nbmigrate_core::GenerateError;
use nbmigrate_core::TextGenerator;
use serde_json::Value;
use serde_json::json;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use tempfile::TempDir;
use tracing::Level;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
}

/// A recorded `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub instruction: String,
    pub context: String,
}

/// Deterministic generator: returns scripted replies in order and records
/// every call. Running out of replies is a service error.
#[derive(Debug, Default)]
pub struct FakeGenerator {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replying<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fake = Self::new();
        for text in texts {
            fake.push(Reply::Text(text.into()));
        }
        fake
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, instruction: &str, context: &str) -> Result<String, GenerateError> {
        self.calls.lock().unwrap().push(Call {
            instruction: instruction.to_string(),
            context: context.to_string(),
        });
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(GenerateError::Other(message)),
            None => Err(GenerateError::EmptyResponse),
        }
    }
}

/// Notebook JSON with one cell per entry: `("code" | "markdown", source)`.
pub fn notebook_json(cells: &[(&str, &str)]) -> String {
    let cells: Vec<Value> = cells
        .iter()
        .map(|(kind, source)| {
            let mut cell = json!({
                "cell_type": kind,
                "metadata": {},
                "source": source,
            });
            if *kind == "code" {
                cell["execution_count"] = Value::Null;
                cell["outputs"] = json!([]);
            }
            cell
        })
        .collect();
    let document = json!({
        "cells": cells,
        "metadata": {"kernelspec": {"name": "python3", "language": "python"}},
        "nbformat": 4,
        "nbformat_minor": 5,
    });
    serde_json::to_string_pretty(&document).unwrap()
}

/// Write a notebook at `root/rel`, creating parent directories.
pub fn write_notebook(root: &Path, rel: &str, cells: &[(&str, &str)]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, notebook_json(cells)).unwrap();
    path
}

/// Sources of all cells, in order.
pub fn cell_sources(path: &Path) -> Vec<String> {
    let notebook = nbmigrate_core::Notebook::load(path).unwrap();
    notebook
        .cells()
        .iter()
        .map(|c| c.source().to_string())
        .collect()
}

pub fn repo() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// In-memory sink for formatted log lines.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Route `tracing` events on the current thread into a fresh capture
    /// until the guard is dropped. Pair with the current-thread runtime of
    /// `#[tokio::test]`.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }

    /// Lines at `level` (`"WARN"`, `"INFO"`, ...).
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.split_whitespace().any(|word| word == level))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
