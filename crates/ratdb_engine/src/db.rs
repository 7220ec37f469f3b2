//! The database: recovery, reads, writes, flush, compaction and file
//! management.
//!
//! Locking:
//! - `writer` serializes every mutation (writes, flushes, compactions) and
//!   guards the open log and manifest files.
//! - `state` guards the key index and table set; readers hold it shared only
//!   long enough to pick the versions they need, then read values unlocked.
//!
//! Lock order is `writer` before `state`.

use crate::batch::{BatchOp, WriteBatch};
use crate::comparator::Comparator;
use crate::config::{Config, FlushOptions, ReadOptions, WriteOptions};
use crate::dir::{self, file_name, DatabaseDir, FileKind};
use crate::error::{EngineError, EngineResult};
use crate::index::{KeyIndex, ValueRef, Version};
use crate::iter::EngineIterator;
use crate::manifest::{Manifest, ManifestLog, TableMeta};
use crate::properties::{self, PropertySource};
use crate::storage::FileBackend;
use crate::table::{TableBuilder, TableReader, ValueHandle};
use crate::types::{FileNumber, SequenceNumber};
use crate::wal::{BatchRecord, LogReader, LogWriter, LoggedOp, RecordType};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, info, warn};

static NEXT_DB_ID: AtomicU64 = AtomicU64::new(1);

/// A pinned read sequence handed out by [`Db::create_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotToken {
    db_id: u64,
    sequence: SequenceNumber,
}

impl SnapshotToken {
    /// Identity of the database that created the snapshot.
    #[must_use]
    pub fn db_id(&self) -> u64 {
        self.db_id
    }

    /// Sequence the snapshot reads at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    #[cfg(test)]
    pub(crate) fn for_tests(db_id: u64, sequence: u64) -> Self {
        Self {
            db_id,
            sequence: SequenceNumber::new(sequence),
        }
    }
}

/// Files needed to reconstruct the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFiles {
    /// Names relative to the database directory, each with a leading `/`.
    pub files: Vec<String>,
    /// Valid prefix length of `MANIFEST` at enumeration time.
    pub manifest_size: u64,
}

struct Writer {
    log: LogWriter,
    manifest_log: ManifestLog,
}

struct State {
    index: KeyIndex,
    tables: BTreeMap<FileNumber, Arc<TableReader>>,
    manifest: Manifest,
}

#[derive(Default)]
struct FileDeletions {
    disabled: u32,
    pending: Vec<String>,
}

/// An open database.
pub struct Db {
    id: u64,
    dir: DatabaseDir,
    config: Config,
    writer: Mutex<Writer>,
    state: RwLock<State>,
    last_sequence: AtomicU64,
    snapshots: Mutex<BTreeMap<SequenceNumber, usize>>,
    deletions: Mutex<FileDeletions>,
}

/// A version that survives compaction.
enum Planned {
    /// Left where it is.
    Kept(Version),
    /// Rewritten into the output table.
    Moved {
        sequence: SequenceNumber,
        handle: Option<ValueHandle>,
    },
}

impl Db {
    /// Opens a database, recovering tables and replaying logs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the database is missing (and may not be
    /// created), exists while `error_if_exists` is set, or was created with a
    /// different comparator. Returns `Corruption` when persisted state fails
    /// validation.
    pub fn open(path: &Path, config: Config) -> EngineResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing)?;
        let comparator_name = config.comparator.name().to_string();

        let mut manifest = match dir.load_manifest()? {
            None if !config.create_if_missing => {
                return Err(EngineError::invalid_argument(format!(
                    "{}: does not exist (create_if_missing is false)",
                    path.display()
                )))
            }
            None => {
                info!(path = %path.display(), "creating database");
                Manifest::new(comparator_name.clone())
            }
            Some(_) if config.error_if_exists => {
                return Err(EngineError::invalid_argument(format!(
                    "{}: exists (error_if_exists is true)",
                    path.display()
                )))
            }
            Some(existing) => existing,
        };

        if manifest.comparator != comparator_name {
            return Err(EngineError::invalid_argument(format!(
                "{} does not match existing comparator {}",
                comparator_name, manifest.comparator
            )));
        }

        let mut index = KeyIndex::new(Arc::clone(&config.comparator));
        let mut tables = BTreeMap::new();
        for meta in &manifest.tables {
            let reader = Self::load_table(&dir, meta, &mut index, config.paranoid_checks)?;
            tables.insert(meta.number, reader);
        }

        let mut last_sequence = manifest.last_sequence;
        let mut replayed_logs = Vec::new();
        for (kind, number) in dir.list_files()? {
            if kind != FileKind::Log || number < manifest.log_number {
                continue;
            }
            let replayed = Self::replay_log(&dir, number, manifest.last_sequence, &mut index)?;
            last_sequence = last_sequence.max(replayed);
            replayed_logs.push(number);
        }

        // Fold replayed writes into a table so the new log starts empty.
        let pending = index.pending();
        if !pending.is_empty() {
            let number = manifest.allocate_file_number();
            let (meta, reader, handles) = Self::write_level0(&dir, number, &pending)?;
            for (p, handle) in pending.iter().zip(handles) {
                index.relocate(
                    &p.key,
                    p.sequence,
                    number,
                    handle.map(|handle| ValueRef::Table {
                        table: Arc::clone(&reader),
                        handle,
                    }),
                );
            }
            info!(table = %number, versions = pending.len(), "recovered log into table");
            manifest.tables.push(meta);
            tables.insert(number, reader);
        }

        let log_number = manifest.allocate_file_number();
        let log = dir.create_log(log_number)?;
        manifest.log_number = log_number;
        manifest.last_sequence = last_sequence;
        let manifest_log = dir.rewrite_manifest(&manifest)?;

        let live: Vec<FileNumber> = manifest.tables.iter().map(|t| t.number).collect();
        let obsolete: Vec<String> = dir
            .list_files()?
            .into_iter()
            .filter(|(kind, number)| match kind {
                FileKind::Log => *number < log_number,
                FileKind::Table => !live.contains(number),
            })
            .map(|(kind, number)| file_name(kind, number))
            .collect();
        dir.delete_files(&obsolete);

        let id = NEXT_DB_ID.fetch_add(1, AtomicOrdering::Relaxed);
        info!(
            path = %path.display(),
            db_id = id,
            tables = manifest.tables.len(),
            logs_replayed = replayed_logs.len(),
            sequence = last_sequence.as_u64(),
            "opened database"
        );

        Ok(Self {
            id,
            dir,
            config,
            writer: Mutex::new(Writer { log, manifest_log }),
            state: RwLock::new(State {
                index,
                tables,
                manifest,
            }),
            last_sequence: AtomicU64::new(last_sequence.as_u64()),
            snapshots: Mutex::new(BTreeMap::new()),
            deletions: Mutex::new(FileDeletions::default()),
        })
    }

    fn load_table(
        dir: &DatabaseDir,
        meta: &TableMeta,
        index: &mut KeyIndex,
        paranoid: bool,
    ) -> EngineResult<Arc<TableReader>> {
        let path = dir.file_path(FileKind::Table, meta.number);
        let (reader, entries) = TableReader::open(&path, meta.number)?;
        let reader = Arc::new(reader);
        for entry in entries {
            if paranoid {
                if let Some(handle) = entry.handle {
                    reader.read_value(handle, true)?;
                }
            }
            index.insert(
                &entry.key,
                Version {
                    sequence: entry.sequence,
                    value: entry.handle.map(|handle| ValueRef::Table {
                        table: Arc::clone(&reader),
                        handle,
                    }),
                    table: Some(meta.number),
                },
            );
        }
        Ok(reader)
    }

    fn replay_log(
        dir: &DatabaseDir,
        number: FileNumber,
        persisted: SequenceNumber,
        index: &mut KeyIndex,
    ) -> EngineResult<SequenceNumber> {
        let backend = FileBackend::open_read_only(&dir.file_path(FileKind::Log, number))?;
        let mut last = persisted;
        let mut batches = 0usize;
        for record in LogReader::new(&backend)? {
            let (offset, record_type, payload) = record?;
            if record_type != RecordType::Batch {
                return Err(EngineError::corruption(format!(
                    "unexpected {record_type:?} record in log {number} at offset {offset}"
                )));
            }
            let batch = BatchRecord::decode(&payload)?;
            for (i, op) in batch.ops.into_iter().enumerate() {
                let sequence = SequenceNumber::new(batch.sequence.as_u64() + i as u64);
                if sequence <= persisted {
                    continue;
                }
                index.insert(
                    &op.key,
                    Version {
                        sequence,
                        value: op.value.map(|v| ValueRef::Inline(Arc::from(v))),
                        table: None,
                    },
                );
                last = last.max(sequence);
            }
            batches += 1;
        }
        debug!(log = %number, batches, "replayed log");
        Ok(last)
    }

    fn write_level0(
        dir: &DatabaseDir,
        number: FileNumber,
        pending: &[crate::index::PendingVersion],
    ) -> EngineResult<(TableMeta, Arc<TableReader>, Vec<Option<ValueHandle>>)> {
        let path = dir.file_path(FileKind::Table, number);
        let mut builder = TableBuilder::new(&path, number, 0)?;
        let mut handles = Vec::with_capacity(pending.len());
        for p in pending {
            handles.push(builder.add(&p.key, p.sequence, p.value.as_deref())?);
        }
        let meta = builder.finish()?;
        let (reader, _) = TableReader::open(&path, number)?;
        Ok((meta, Arc::new(reader), handles))
    }

    /// Directory the database lives in.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Process-unique identity of this open instance.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Key ordering this database was opened with.
    #[must_use]
    pub fn comparator(&self) -> &Arc<dyn Comparator> {
        &self.config.comparator
    }

    /// Sequence of the newest committed mutation.
    #[must_use]
    pub fn latest_sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.last_sequence.load(AtomicOrdering::Acquire))
    }

    fn read_sequence(&self, options: &ReadOptions) -> Result<SequenceNumber, String> {
        match options.snapshot {
            None => Ok(self.latest_sequence()),
            Some(snapshot) if snapshot.db_id != self.id => {
                Err("snapshot belongs to a different database".to_string())
            }
            Some(snapshot) => {
                if self.snapshots.lock().contains_key(&snapshot.sequence) {
                    Ok(snapshot.sequence)
                } else {
                    Err("snapshot has been released".to_string())
                }
            }
        }
    }

    /// Applies a single put.
    ///
    /// # Errors
    ///
    /// Returns an error if logging fails.
    pub fn put(&self, options: &WriteOptions, key: &[u8], value: &[u8]) -> EngineResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(options, &batch)
    }

    /// Applies a single deletion. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if logging fails.
    pub fn delete(&self, options: &WriteOptions, key: &[u8]) -> EngineResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(options, &batch)
    }

    /// Applies a single merge.
    ///
    /// # Errors
    ///
    /// Returns `NotSupported` without a merge operator, `Corruption` if the
    /// operator fails.
    pub fn merge(&self, options: &WriteOptions, key: &[u8], operand: &[u8]) -> EngineResult<()> {
        let mut batch = WriteBatch::new();
        batch.merge(key, operand);
        self.write(options, &batch)
    }

    /// Applies every operation of `batch` atomically.
    ///
    /// The batch is one log record and its versions become visible together.
    ///
    /// # Errors
    ///
    /// Returns an error if a merge cannot be resolved or logging fails; in
    /// that case nothing from the batch is visible.
    pub fn write(&self, options: &WriteOptions, batch: &WriteBatch) -> EngineResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut writer = self.writer.lock();
        let first = self.latest_sequence().next();
        let record = BatchRecord {
            sequence: first,
            ops: self.resolve(batch)?,
        };

        writer.log.append(RecordType::Batch, &record.encode())?;
        if options.sync {
            writer.log.sync()?;
        }

        let count = record.ops.len() as u64;
        let needs_flush = {
            let mut state = self.state.write();
            for (i, op) in record.ops.into_iter().enumerate() {
                state.index.insert(
                    &op.key,
                    Version {
                        sequence: SequenceNumber::new(first.as_u64() + i as u64),
                        value: op.value.map(|v| ValueRef::Inline(Arc::from(v))),
                        table: None,
                    },
                );
            }
            state.index.memtable_bytes() >= self.config.write_buffer_size
        };
        self.last_sequence
            .store(first.as_u64() + count - 1, AtomicOrdering::Release);

        if needs_flush {
            if let Err(e) = self.flush_memtable(&mut writer) {
                warn!(error = %e, "automatic flush failed; will retry on a later write");
            }
        }
        Ok(())
    }

    /// Turns batch operations into logged puts and deletions, resolving
    /// merges against the current value (including earlier operations of the
    /// same batch).
    fn resolve(&self, batch: &WriteBatch) -> EngineResult<Vec<LoggedOp>> {
        let mut resolved: Vec<LoggedOp> = Vec::with_capacity(batch.count());
        for op in batch.ops() {
            match op {
                BatchOp::Put { key, value } => resolved.push(LoggedOp::put(key.clone(), value.clone())),
                BatchOp::Delete { key } => resolved.push(LoggedOp::delete(key.clone())),
                BatchOp::Merge { key, operand } => {
                    let operator = self.config.merge_operator.as_ref().ok_or_else(|| {
                        EngineError::not_supported("merge requires a merge operator")
                    })?;

                    let existing = match resolved.iter().rev().find(|r| &r.key == key) {
                        Some(earlier) => earlier.value.clone(),
                        None => self.get(&ReadOptions::default(), key)?,
                    };

                    let merged = operator
                        .full_merge(key, existing.as_deref(), &[operand.as_slice()])
                        .ok_or_else(|| {
                            EngineError::corruption(format!(
                                "merge operator {} failed",
                                operator.name()
                            ))
                        })?;
                    resolved.push(LoggedOp::put(key.clone(), merged));
                }
            }
        }
        Ok(resolved)
    }

    /// Reads the value of `key`.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the value fails its checksum, or
    /// `InvalidArgument` for a foreign or released snapshot.
    pub fn get(&self, options: &ReadOptions, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let at = self
            .read_sequence(options)
            .map_err(EngineError::invalid_argument)?;
        let value = {
            let state = self.state.read();
            state.index.get(key, at).and_then(|v| v.value.clone())
        };
        value.map(|v| v.load(options.verify_checksums)).transpose()
    }

    /// Reads several keys at one sequence. Each key succeeds or fails on
    /// its own.
    pub fn multi_get(
        &self,
        options: &ReadOptions,
        keys: &[&[u8]],
    ) -> Vec<EngineResult<Option<Vec<u8>>>> {
        let at = match self.read_sequence(options) {
            Ok(at) => at,
            Err(message) => {
                return keys
                    .iter()
                    .map(|_| Err(EngineError::invalid_argument(message.clone())))
                    .collect()
            }
        };

        let refs: Vec<Option<ValueRef>> = {
            let state = self.state.read();
            keys.iter()
                .map(|key| state.index.get(key, at).and_then(|v| v.value.clone()))
                .collect()
        };

        refs.into_iter()
            .map(|r| r.map(|v| v.load(options.verify_checksums)).transpose())
            .collect()
    }

    /// Creates an iterator over the state at the read sequence.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a foreign or released snapshot.
    pub fn iterator(&self, options: &ReadOptions) -> EngineResult<EngineIterator> {
        let at = self
            .read_sequence(options)
            .map_err(EngineError::invalid_argument)?;
        let entries = self.state.read().index.visible(at);
        Ok(EngineIterator::new(
            entries,
            Arc::clone(&self.config.comparator),
            options.verify_checksums,
        ))
    }

    /// Pins the current sequence.
    pub fn create_snapshot(&self) -> SnapshotToken {
        let mut snapshots = self.snapshots.lock();
        let sequence = self.latest_sequence();
        *snapshots.entry(sequence).or_insert(0) += 1;
        SnapshotToken {
            db_id: self.id,
            sequence,
        }
    }

    /// Unpins a snapshot. Returns false (and changes nothing) if the token
    /// belongs to another database or is not pinned.
    pub fn release_snapshot(&self, token: SnapshotToken) -> bool {
        if token.db_id != self.id {
            warn!(db_id = self.id, owner = token.db_id, "snapshot released on wrong database");
            return false;
        }
        let mut snapshots = self.snapshots.lock();
        match snapshots.get_mut(&token.sequence) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                snapshots.remove(&token.sequence);
                true
            }
            None => {
                warn!(sequence = token.sequence.as_u64(), "snapshot released twice");
                false
            }
        }
    }

    /// Writes the memtable to a new level-0 table.
    ///
    /// Flushes always complete before returning; `wait` is accepted for
    /// interface compatibility.
    ///
    /// # Errors
    ///
    /// Returns an error if the table, log or manifest cannot be written.
    pub fn flush(&self, options: &FlushOptions) -> EngineResult<()> {
        let mut writer = self.writer.lock();
        debug!(wait = options.wait, "explicit flush");
        self.flush_memtable(&mut writer)
    }

    fn flush_memtable(&self, writer: &mut Writer) -> EngineResult<()> {
        let pending = self.state.read().index.pending();
        if pending.is_empty() {
            return Ok(());
        }

        let mut manifest = self.state.read().manifest.clone();
        let table_number = manifest.allocate_file_number();
        let log_number = manifest.allocate_file_number();

        let (meta, reader, handles) = Self::write_level0(&self.dir, table_number, &pending)?;
        let new_log = self.dir.create_log(log_number)?;

        manifest.tables.push(meta.clone());
        manifest.log_number = log_number;
        manifest.last_sequence = self.latest_sequence();
        writer.manifest_log.record(&manifest)?;

        let old_log = std::mem::replace(&mut writer.log, new_log);
        {
            let mut state = self.state.write();
            for (p, handle) in pending.iter().zip(handles) {
                state.index.relocate(
                    &p.key,
                    p.sequence,
                    table_number,
                    handle.map(|handle| ValueRef::Table {
                        table: Arc::clone(&reader),
                        handle,
                    }),
                );
            }
            state.tables.insert(table_number, reader);
            state.manifest = manifest;
        }

        info!(
            table = %table_number,
            versions = pending.len(),
            bytes = meta.file_size,
            "flushed memtable"
        );
        self.delete_obsolete(vec![file_name(FileKind::Log, old_log.number())]);
        Ok(())
    }

    /// Merges every table overlapping `[start, limit]` into one level-1
    /// table. Versions no read point can observe are dropped; everything a
    /// live snapshot or the latest state can read is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if reading inputs or writing the output fails.
    pub fn compact_range(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> EngineResult<()> {
        let mut writer = self.writer.lock();
        self.flush_memtable(&mut writer)?;

        let comparator = Arc::clone(&self.config.comparator);
        let mut manifest = self.state.read().manifest.clone();
        let selected: Vec<TableMeta> = manifest
            .tables
            .iter()
            .filter(|t| overlaps(comparator.as_ref(), t, start, limit))
            .cloned()
            .collect();
        if selected.is_empty() {
            debug!("compaction range overlaps no tables");
            return Ok(());
        }

        let selected_numbers: Vec<FileNumber> = selected.iter().map(|t| t.number).collect();
        let lowest = selected
            .iter()
            .map(|t| t.smallest.as_slice())
            .min_by(|a, b| comparator.compare(a, b))
            .unwrap_or_default()
            .to_vec();
        let highest = selected
            .iter()
            .map(|t| t.largest.as_slice())
            .max_by(|a, b| comparator.compare(a, b))
            .unwrap_or_default()
            .to_vec();

        let mut read_points: Vec<SequenceNumber> = self.snapshots.lock().keys().copied().collect();
        read_points.push(SequenceNumber::new(u64::MAX));

        let out_number = manifest.allocate_file_number();
        let out_path = self.dir.file_path(FileKind::Table, out_number);
        let mut builder = TableBuilder::new(&out_path, out_number, 1)?;
        let mut plan: Vec<(Vec<u8>, Vec<Planned>)> = Vec::new();
        let mut dropped = 0usize;

        {
            let state = self.state.read();
            for (key, versions) in state.index.range(Some(lowest.as_slice()), None) {
                if comparator.compare(key.bytes(), &highest) == Ordering::Greater {
                    break;
                }
                let in_selected = |v: &Version| v.table.is_some_and(|t| selected_numbers.contains(&t));
                if !versions.iter().any(in_selected) {
                    continue;
                }

                let keep = retained_versions(versions, &read_points, &in_selected);
                let mut planned = Vec::new();
                for (version, keep) in versions.iter().zip(&keep).rev() {
                    if !keep {
                        dropped += 1;
                    } else if in_selected(version) {
                        let value = version
                            .value
                            .as_ref()
                            .map(|v| v.load(true))
                            .transpose()?;
                        let handle = builder.add(key.bytes(), version.sequence, value.as_deref())?;
                        planned.push(Planned::Moved {
                            sequence: version.sequence,
                            handle,
                        });
                    } else {
                        planned.push(Planned::Kept(version.clone()));
                    }
                }
                planned.reverse();
                plan.push((key.bytes().to_vec(), planned));
            }
        }

        let output = if builder.is_empty() {
            drop(builder);
            self.dir.delete_files(&[file_name(FileKind::Table, out_number)]);
            None
        } else {
            let meta = builder.finish()?;
            let (reader, _) = TableReader::open(&out_path, out_number)?;
            Some((meta, Arc::new(reader)))
        };

        manifest.remove_tables(&selected_numbers);
        if let Some((meta, _)) = &output {
            manifest.tables.push(meta.clone());
        }
        writer.manifest_log.record(&manifest)?;

        {
            let mut state = self.state.write();
            for (key, planned) in plan {
                let versions = planned
                    .into_iter()
                    .map(|p| match p {
                        Planned::Kept(version) => version,
                        Planned::Moved { sequence, handle } => Version {
                            sequence,
                            value: handle.zip(output.as_ref()).map(|(handle, (_, reader))| {
                                ValueRef::Table {
                                    table: Arc::clone(reader),
                                    handle,
                                }
                            }),
                            table: Some(out_number),
                        },
                    })
                    .collect();
                state.index.replace_versions(&key, versions);
            }
            for number in &selected_numbers {
                state.tables.remove(number);
            }
            if let Some((_, reader)) = &output {
                state.tables.insert(out_number, Arc::clone(reader));
            }
            state.manifest = manifest;
        }

        info!(
            inputs = selected_numbers.len(),
            output = output.as_ref().map(|(meta, _)| meta.number.as_u64()),
            dropped_versions = dropped,
            "compacted range"
        );
        drop(writer);

        self.delete_obsolete(
            selected_numbers
                .iter()
                .map(|n| file_name(FileKind::Table, *n))
                .collect(),
        );
        Ok(())
    }

    /// Approximate on-disk bytes for each `[start, limit)` range.
    #[must_use]
    pub fn approximate_sizes(&self, ranges: &[(&[u8], &[u8])]) -> Vec<u64> {
        let state = self.state.read();
        ranges
            .iter()
            .map(|(start, limit)| state.index.approximate_size(Some(*start), Some(*limit)))
            .collect()
    }

    /// Value of a named property, `None` for unknown names.
    #[must_use]
    pub fn property_value(&self, name: &str) -> Option<String> {
        let source = {
            let state = self.state.read();
            PropertySource {
                sequence: self.latest_sequence(),
                tables: state.manifest.tables.clone(),
                memtable_bytes: state.index.memtable_bytes(),
                memtable_versions: state.index.memtable_versions(),
                estimated_keys: state.index.estimate_live_keys(),
                snapshots: self.snapshots.lock().values().sum(),
                deletions_disabled: self.deletions.lock().disabled,
            }
        };
        properties::render(&source, name)
    }

    /// Stops deleting obsolete files. Calls nest.
    pub fn disable_file_deletions(&self) {
        let mut deletions = self.deletions.lock();
        deletions.disabled += 1;
        debug!(depth = deletions.disabled, "file deletions disabled");
    }

    /// Undoes one [`Db::disable_file_deletions`], or all of them with
    /// `force`. Deferred deletions run once nothing disables them.
    pub fn enable_file_deletions(&self, force: bool) {
        let pending = {
            let mut deletions = self.deletions.lock();
            if force {
                deletions.disabled = 0;
            } else if deletions.disabled == 0 {
                warn!("file deletions enabled without a matching disable");
            } else {
                deletions.disabled -= 1;
            }
            debug!(depth = deletions.disabled, force, "file deletions enabled");
            if deletions.disabled == 0 {
                std::mem::take(&mut deletions.pending)
            } else {
                Vec::new()
            }
        };
        self.dir.delete_files(&pending);
    }

    fn delete_obsolete(&self, names: Vec<String>) {
        let mut deletions = self.deletions.lock();
        if deletions.disabled > 0 {
            debug!(files = names.len(), "deferring obsolete file deletion");
            deletions.pending.extend(names);
        } else {
            drop(deletions);
            self.dir.delete_files(&names);
        }
    }

    /// Lists the manifest and live tables, optionally flushing first so the
    /// list covers every committed write.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails or the manifest size cannot be
    /// read.
    pub fn live_files(&self, flush: bool) -> EngineResult<LiveFiles> {
        let mut writer = self.writer.lock();
        if flush {
            self.flush_memtable(&mut writer)?;
        }
        let manifest_size = writer.manifest_log.size()?;
        let mut files = vec!["/MANIFEST".to_string()];
        let state = self.state.read();
        let mut numbers: Vec<FileNumber> = state.manifest.tables.iter().map(|t| t.number).collect();
        numbers.sort();
        files.extend(
            numbers
                .into_iter()
                .map(|n| format!("/{}", file_name(FileKind::Table, n))),
        );
        Ok(LiveFiles {
            files,
            manifest_size,
        })
    }

    /// Removes the database at `path`. A missing directory is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is open or files cannot be removed.
    pub fn destroy(path: &Path) -> EngineResult<()> {
        dir::destroy(path)?;
        info!(path = %path.display(), "destroyed database");
        Ok(())
    }

    /// Path of a table file, for tests and tooling.
    #[must_use]
    pub fn table_path(&self, number: FileNumber) -> PathBuf {
        self.dir.file_path(FileKind::Table, number)
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        if let Err(e) = self.writer.get_mut().log.sync() {
            warn!(error = %e, "failed to sync log on close");
        }
        let outstanding: usize = self.snapshots.get_mut().values().sum();
        if outstanding > 0 {
            warn!(outstanding, "closing database with unreleased snapshots");
        }
        info!(path = %self.dir.path().display(), db_id = self.id, "closed database");
    }
}

fn overlaps(
    comparator: &dyn crate::comparator::Comparator,
    table: &TableMeta,
    start: Option<&[u8]>,
    limit: Option<&[u8]>,
) -> bool {
    let after_start = start.map_or(true, |s| comparator.compare(&table.largest, s) != Ordering::Less);
    let before_limit =
        limit.map_or(true, |l| comparator.compare(&table.smallest, l) != Ordering::Greater);
    after_start && before_limit
}

/// Decides which versions of one key survive compaction.
///
/// Versions outside the compaction input are always kept. An input version
/// is kept when it is the newest version visible at some read point. Input
/// tombstones left at the bottom of the history hide nothing and are dropped.
fn retained_versions(
    versions: &[Version],
    read_points: &[SequenceNumber],
    in_selected: &dyn Fn(&Version) -> bool,
) -> Vec<bool> {
    let mut keep: Vec<bool> = versions.iter().map(|v| !in_selected(v)).collect();
    for point in read_points {
        if let Some(i) = versions.iter().rposition(|v| v.sequence <= *point) {
            keep[i] = true;
        }
    }
    while let Some(i) = keep.iter().position(|k| *k) {
        if versions[i].value.is_none() && in_selected(&versions[i]) {
            keep[i] = false;
        } else {
            break;
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::testing::{ConcatMerge, FailingMerge};
    use tempfile::tempdir;

    fn config() -> Config {
        Config::new().create_if_missing(true)
    }

    fn read() -> ReadOptions {
        ReadOptions::default()
    }

    fn write() -> WriteOptions {
        WriteOptions::default()
    }

    #[test]
    fn open_missing_without_create_fails() {
        let dir = tempdir().unwrap();
        let err = Db::open(&dir.path().join("db"), Config::new()).err().unwrap();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn error_if_exists() {
        let dir = tempdir().unwrap();
        drop(Db::open(dir.path(), config()).unwrap());
        let err = Db::open(dir.path(), config().error_if_exists(true)).err().unwrap();
        assert!(err.to_string().starts_with("Invalid argument: "));
    }

    #[test]
    fn put_get_delete() {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path(), config()).unwrap();
        db.put(&write(), b"k", b"v").unwrap();
        db.put(&write(), b"empty", b"").unwrap();
        assert_eq!(db.get(&read(), b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(db.get(&read(), b"empty").unwrap(), Some(Vec::new()));
        assert_eq!(db.get(&read(), b"missing").unwrap(), None);

        db.delete(&write(), b"k").unwrap();
        db.delete(&write(), b"never-written").unwrap();
        assert_eq!(db.get(&read(), b"k").unwrap(), None);
    }

    #[test]
    fn batch_gets_consecutive_sequences() {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path(), config()).unwrap();
        let mut batch = WriteBatch::new();
        batch.put(b"k4", b"v4");
        batch.delete(b"k4");
        batch.put(b"k3", b"v3");
        db.write(&write(), &batch).unwrap();
        assert_eq!(db.latest_sequence(), SequenceNumber::new(3));
        assert_eq!(db.get(&read(), b"k4").unwrap(), None);

        db.write(&write(), &WriteBatch::new()).unwrap();
        assert_eq!(db.latest_sequence(), SequenceNumber::new(3));
    }

    #[test]
    fn reopen_replays_log() {
        let dir = tempdir().unwrap();
        {
            let db = Db::open(dir.path(), config()).unwrap();
            db.put(&write(), b"a", b"1").unwrap();
            db.put(&write(), b"b", b"2").unwrap();
            db.delete(&write(), b"a").unwrap();
        }
        let db = Db::open(dir.path(), Config::new()).unwrap();
        assert_eq!(db.get(&read(), b"a").unwrap(), None);
        assert_eq!(db.get(&read(), b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(db.latest_sequence(), SequenceNumber::new(3));
        assert_eq!(db.property_value("ratdb.num-files-at-level0").as_deref(), Some("1"));
    }

    #[test]
    fn snapshot_survives_flush_and_compaction() {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path(), config()).unwrap();
        db.put(&write(), b"k", b"old").unwrap();
        let snap = db.create_snapshot();
        db.put(&write(), b"k", b"new").unwrap();
        db.put(&write(), b"k2", b"v5").unwrap();

        db.flush(&FlushOptions::default()).unwrap();
        db.compact_range(None, None).unwrap();

        let mut at_snap = read();
        at_snap.snapshot = Some(crate::config::SnapshotRef {
            db_id: snap.db_id(),
            sequence: snap.sequence(),
        });
        assert_eq!(db.get(&at_snap, b"k").unwrap(), Some(b"old".to_vec()));
        assert_eq!(db.get(&at_snap, b"k2").unwrap(), None);
        assert_eq!(db.get(&read(), b"k").unwrap(), Some(b"new".to_vec()));

        assert!(db.release_snapshot(snap));
        assert!(!db.release_snapshot(snap));
        assert!(db.get(&at_snap, b"k").is_err());
    }

    #[test]
    fn compaction_drops_shadowed_versions_and_tombstones() {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path(), config()).unwrap();
        db.put(&write(), b"a", b"1").unwrap();
        db.flush(&FlushOptions::default()).unwrap();
        db.put(&write(), b"a", b"2").unwrap();
        db.put(&write(), b"b", b"x").unwrap();
        db.delete(&write(), b"b").unwrap();
        db.flush(&FlushOptions::default()).unwrap();
        assert_eq!(db.property_value("ratdb.num-files-at-level0").as_deref(), Some("2"));

        db.compact_range(None, None).unwrap();
        assert_eq!(db.property_value("ratdb.num-files-at-level0").as_deref(), Some("0"));
        assert_eq!(db.property_value("ratdb.num-files-at-level1").as_deref(), Some("1"));
        assert_eq!(db.get(&read(), b"a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(db.get(&read(), b"b").unwrap(), None);

        let state = db.state.read();
        assert_eq!(state.index.num_keys(), 1);
    }

    #[test]
    fn automatic_flush_on_write_buffer_size() {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path(), config().write_buffer_size(64)).unwrap();
        for i in 0..10u8 {
            db.put(&write(), &[b'k', i], &[i; 16]).unwrap();
        }
        let tables: usize = db
            .property_value("ratdb.num-files-at-level0")
            .unwrap()
            .parse()
            .unwrap();
        assert!(tables >= 2);
        assert_eq!(db.get(&read(), &[b'k', 3]).unwrap(), Some(vec![3; 16]));
    }

    #[test]
    fn merge_requires_operator() {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path(), config()).unwrap();
        let err = db.merge(&write(), b"k", b"x").unwrap_err();
        assert!(err.to_string().starts_with("Not supported: "));
    }

    #[test]
    fn merge_resolves_against_existing_and_batch() {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path(), config().merge_operator(Arc::new(ConcatMerge))).unwrap();
        db.put(&write(), b"k", b"a").unwrap();
        db.merge(&write(), b"k", b"b").unwrap();

        let mut batch = WriteBatch::new();
        batch.merge(b"k", b"c");
        batch.merge(b"k", b"d");
        batch.merge(b"fresh", b"z");
        db.write(&write(), &batch).unwrap();

        assert_eq!(db.get(&read(), b"k").unwrap(), Some(b"a,b,c,d".to_vec()));
        assert_eq!(db.get(&read(), b"fresh").unwrap(), Some(b"z".to_vec()));
    }

    #[test]
    fn failed_merge_leaves_batch_invisible() {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path(), config().merge_operator(Arc::new(FailingMerge))).unwrap();
        let mut batch = WriteBatch::new();
        batch.put(b"before", b"x");
        batch.merge(b"k", b"y");
        assert!(db.write(&write(), &batch).unwrap_err().is_corruption());
        assert_eq!(db.get(&read(), b"before").unwrap(), None);
    }

    #[test]
    fn live_files_and_deferred_deletion() {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path(), config()).unwrap();
        db.put(&write(), b"k1", b"v1").unwrap();

        db.disable_file_deletions();
        let before = db.live_files(true).unwrap();
        assert_eq!(before.files[0], "/MANIFEST");
        assert_eq!(before.files.len(), 2);

        db.disable_file_deletions();
        db.compact_range(None, None).unwrap();
        let compacted_away = dir.path().join(&before.files[1][1..]);
        assert!(compacted_away.exists());

        db.enable_file_deletions(false);
        assert!(compacted_away.exists());
        db.enable_file_deletions(false);
        assert!(!compacted_away.exists());

        db.delete(&write(), b"k1").unwrap();
        let after = db.live_files(true).unwrap();
        assert_ne!(before.manifest_size, after.manifest_size);
    }

    #[test]
    fn force_enable_resets_nesting() {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path(), config()).unwrap();
        db.disable_file_deletions();
        db.disable_file_deletions();
        assert_eq!(db.property_value("ratdb.is-file-deletions-enabled").as_deref(), Some("0"));
        db.enable_file_deletions(true);
        assert_eq!(db.property_value("ratdb.is-file-deletions-enabled").as_deref(), Some("1"));
    }

    #[test]
    fn snapshot_from_other_database_is_rejected() {
        let dir = tempdir().unwrap();
        let a = Db::open(&dir.path().join("a"), config()).unwrap();
        let b = Db::open(&dir.path().join("b"), config()).unwrap();
        let snap = a.create_snapshot();

        let mut options = read();
        options.snapshot = Some(crate::config::SnapshotRef {
            db_id: snap.db_id(),
            sequence: snap.sequence(),
        });
        assert!(b.get(&options, b"k").is_err());
        assert!(b.multi_get(&options, &[b"k", b"j"]).iter().all(Result::is_err));
        assert!(!b.release_snapshot(snap));
        assert!(a.release_snapshot(snap));
    }

    #[test]
    fn retention_keeps_snapshot_versions() {
        let v = |seq, value: Option<&[u8]>| Version {
            sequence: SequenceNumber::new(seq),
            value: value.map(|b| ValueRef::Inline(Arc::from(b))),
            table: Some(FileNumber::new(1)),
        };
        let versions = vec![v(1, Some(b"a")), v(2, None), v(3, Some(b"b")), v(4, Some(b"c"))];
        let all = |_: &Version| true;

        let latest_only = [SequenceNumber::new(u64::MAX)];
        assert_eq!(
            retained_versions(&versions, &latest_only, &all),
            vec![false, false, false, true]
        );

        let with_snapshot = [SequenceNumber::new(2), SequenceNumber::new(u64::MAX)];
        // The tombstone visible at seq 2 is at the bottom after version 1 is
        // dropped, so it is dropped too: the key reads as absent either way.
        assert_eq!(
            retained_versions(&versions, &with_snapshot, &all),
            vec![false, false, false, true]
        );

        let older_snapshot = [SequenceNumber::new(1), SequenceNumber::new(3), SequenceNumber::new(u64::MAX)];
        assert_eq!(
            retained_versions(&versions, &older_snapshot, &all),
            vec![true, false, true, true]
        );
    }
}
