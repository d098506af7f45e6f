use crate::sink::traits::{SinkError, SinkResult, TabularSink};
use crate::sink::HarvestRecord;
use serde_json::Value;
use std::collections::HashSet;

/// Append-only writer with a completion ledger
///
/// The ledger is the set of identifiers already present in the sink. It is
/// read once when the writer opens and grows with every successful write, so
/// an identifier enters it only after its rows are durable.
pub struct ResumableWriter<S: TabularSink> {
    sink: S,
    ledger: HashSet<String>,
    rows_written: u64,
}

impl<S: TabularSink> ResumableWriter<S> {
    /// Opens the writer over `sink`
    ///
    /// With `overwrite` the sink is truncated and the ledger starts empty.
    /// Otherwise the ledger is loaded from the sink's identifier column.
    pub fn open(mut sink: S, overwrite: bool) -> SinkResult<Self> {
        sink.create()?;

        let ledger = if overwrite {
            sink.truncate()?;
            HashSet::new()
        } else {
            sink.read_identifiers()?
        };

        tracing::debug!(
            "Opened sink '{}' ({} identifiers already done)",
            sink.name(),
            ledger.len()
        );

        Ok(Self {
            sink,
            ledger,
            rows_written: 0,
        })
    }

    /// Returns true if `identifier` was written in this or an earlier run
    pub fn already_done(&self, identifier: &str) -> bool {
        self.ledger.contains(identifier)
    }

    /// Appends one record; it is durable when this returns
    pub fn write(&mut self, record: HarvestRecord) -> SinkResult<()> {
        self.sink.append_row(&record)?;
        self.rows_written += 1;
        self.ledger.insert(record.identifier);
        Ok(())
    }

    /// Appends every row of one item in a single transaction
    ///
    /// An empty group writes a marker row so the item still counts as done.
    /// Returns the number of data rows written.
    pub fn write_group(
        &mut self,
        identifier: &str,
        records: Vec<HarvestRecord>,
    ) -> SinkResult<usize> {
        if let Some(stray) = records.iter().find(|r| r.identifier != identifier) {
            return Err(SinkError::GroupMismatch {
                group: identifier.to_string(),
                identifier: stray.identifier.clone(),
            });
        }

        let data_rows = records.len();
        let rows = if records.is_empty() {
            vec![HarvestRecord::marker(identifier)]
        } else {
            records
        };

        self.sink.append_rows(&rows)?;
        self.rows_written += rows.len() as u64;
        self.ledger.insert(identifier.to_string());
        Ok(data_rows)
    }

    /// Payloads previously stored for `identifier`
    pub fn stored_payloads(&self, identifier: &str) -> SinkResult<Vec<Value>> {
        self.sink.read_payloads(identifier)
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    /// Rows appended through this writer, markers included
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn name(&self) -> &str {
        self.sink.name()
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}
