use std::{path::Path, sync::Arc};

use rama::{
    error::{BoxError, ErrorContext as _},
    telemetry::tracing,
};

use super::{Record, RecordStream};

/// Ordered, non-empty set of records which is loaded once
/// and replayed in a cycle for as long as the consumer keeps pulling.
#[derive(Debug, Clone)]
pub struct Scenario {
    records: Arc<[Record]>,
}

impl Scenario {
    /// Load all records of the (optionally gzip compressed) file at the given path.
    pub async fn load(path: &Path) -> Result<Self, BoxError> {
        let mut stream = RecordStream::open(path)
            .await
            .context("open scenario file")?;

        let mut records = Vec::new();
        while let Some(result) = stream.next_record().await {
            records.push(result.context("read scenario file")?);
        }

        let scenario = Self::try_from_records(records)
            .context_debug_field("path", path.to_owned())?;
        tracing::info!(path = ?path, records = scenario.len(), "scenario loaded");
        Ok(scenario)
    }

    pub fn try_from_records(records: impl Into<Arc<[Record]>>) -> Result<Self, BoxError> {
        let records = records.into();
        if records.is_empty() {
            return Err(BoxError::from("scenario contains no records"));
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Cursor starting at the first record.
    pub fn cursor(&self) -> ScenarioCursor {
        ScenarioCursor {
            records: self.records.clone(),
            index: 0,
            cycle: 0,
        }
    }
}

/// Infinite, pull-based iterator over a [`Scenario`].
///
/// Record `i` is always followed by record `(i + 1) % len`.
/// There is no buffering: the consumer stops replay by not pulling anymore.
#[derive(Debug)]
pub struct ScenarioCursor {
    records: Arc<[Record]>,
    index: usize,
    cycle: u64,
}

impl ScenarioCursor {
    /// Amount of full cycles completed so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Index of the record returned by the next call to `next`.
    pub fn position(&self) -> usize {
        self.index
    }
}

impl Iterator for ScenarioCursor {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.get(self.index)?.clone();
        self.index += 1;
        if self.index == self.records.len() {
            self.index = 0;
            self.cycle += 1;
        }
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}
