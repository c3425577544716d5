use std::fmt;

use ringlog_storage::{OpenMode, Storage, StorageHandle};
use ringlog_types::{LineId, RingConfig, RingGeometry, MAX_LINE_WIDTH};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cursor::{Lines, ReadCursor};
use crate::error::{Result, RingLogError};
use crate::record::{self, Metadata, Record, DEFAULT_TAG};
use crate::sink::{DiagnosticSink, Diagnostics};
use crate::text;

/// Object name used when none is given.
pub const DEFAULT_NAME: &str = "/sysLog.dat";

/// Lifecycle of a [`RingLog`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No store has been formatted or opened yet, or it was removed.
    Unformatted,
    /// A store is open and accepts appends and reads.
    Open,
    /// The store was closed; `open` makes it usable again.
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unformatted => "unformatted",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Snapshot of a ring log's bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RingStatus {
    pub name: String,
    pub state: EngineState,
    pub capacity: u32,
    pub line_width: u32,
    pub record_length: u32,
    pub oldest_id: LineId,
    pub newest_id: LineId,
    pub debug_level: u8,
}

impl RingStatus {
    pub fn is_empty(&self) -> bool {
        self.newest_id < self.oldest_id
    }

    /// Number of line ids in the live range.
    pub fn len(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.newest_id - self.oldest_id + 1
        }
    }
}

impl fmt::Display for RingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ring log {}: {}", self.name, self.state)?;
        writeln!(
            f,
            "  capacity    : {} lines x {} bytes (record {} bytes)",
            self.capacity, self.line_width, self.record_length
        )?;
        writeln!(f, "  oldest line : {}", self.oldest_id)?;
        writeln!(f, "  newest line : {}", self.newest_id)?;
        write!(f, "  debug level : {}", self.debug_level)
    }
}

/// Classification of a data slot in a [`SlotDump`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotMarker {
    Newest,
    Oldest,
    Live,
    Empty,
    /// A data record outside the live range or in the wrong slot.
    Stale,
}

impl fmt::Display for SlotMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Live => "live",
            Self::Empty => "empty",
            Self::Stale => "stale",
        };
        f.pad(s)
    }
}

/// One data slot as found on storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlotDump {
    pub slot: u32,
    pub offset: u64,
    pub record: Record,
    pub marker: SlotMarker,
}

impl fmt::Display for SlotDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>5}] @{:>8} {:<6} {:07}|{:08};{}",
            self.slot,
            self.offset,
            self.marker,
            self.record.sequence_key,
            self.record.line_id,
            self.record.payload
        )
    }
}

/// Outcome of inspecting an existing store during `open`.
enum OpenVerdict {
    Reuse,
    Reformat(String),
}

/// A fixed-capacity circular log of fixed-width text records.
///
/// Line `n` always lives in data slot `n % capacity + 1`, so appends
/// overwrite the oldest line once the ring is full and recovery only needs
/// to find the highest intact line id. Every operation that touches storage
/// returns a `Result` and leaves the bookkeeping untouched on failure.
pub struct RingLog<S: Storage> {
    storage: S,
    name: String,
    tag: String,
    config: RingConfig,
    geometry: RingGeometry,
    handle: Option<S::Handle>,
    state: EngineState,
    oldest: LineId,
    newest: LineId,
    /// Reusable record buffer.
    buf: Vec<u8>,
    /// Cursor behind `start_reading` / `read_next_line`.
    cursor: ReadCursor,
    diagnostics: Diagnostics,
}

impl<S: Storage> RingLog<S> {
    /// Create an engine over `storage` using [`DEFAULT_NAME`]. Nothing is
    /// touched until [`open`](Self::open) or [`format`](Self::format).
    pub fn new(storage: S) -> Self {
        let config = RingConfig::default();
        Self {
            storage,
            name: DEFAULT_NAME.to_string(),
            tag: DEFAULT_TAG.to_string(),
            config,
            geometry: RingGeometry::from(config),
            handle: None,
            state: EngineState::Unformatted,
            oldest: 1,
            newest: 0,
            buf: Vec::with_capacity(record::record_length(MAX_LINE_WIDTH) + 1),
            cursor: ReadCursor::exhausted(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Use a different storage object name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Tag stamped into the metadata record of newly formatted stores.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = text::sanitize(&tag.into());
        self
    }

    /// Create (or truncate) the store and fill it with empty slots.
    ///
    /// Any previous content is lost as soon as the object is re-created;
    /// if writing the slots fails the engine is left unformatted.
    pub fn format(&mut self, capacity: u32, line_width: u32) -> Result<()> {
        let config = RingConfig::new(capacity, line_width);
        let geometry = RingGeometry::from(config);

        self.release_handle();
        self.state = EngineState::Unformatted;
        self.cursor = ReadCursor::exhausted();

        let mut handle = self
            .storage
            .open(&self.name, OpenMode::Create)
            .map_err(|source| RingLogError::StorageUnavailable {
                name: self.name.clone(),
                source,
            })?;

        Metadata::new(config, &self.tag).encode_into(&mut self.buf);
        write_record(&mut handle, 0, &self.buf)?;
        for index in 0..config.capacity {
            record::encode_empty_into(&mut self.buf, index, config.line_width);
            write_record(&mut handle, index + 1, &self.buf)?;
            self.storage.yield_now();
        }
        handle.flush()?;

        self.config = config;
        self.geometry = geometry;
        self.handle = Some(handle);
        self.state = EngineState::Open;
        self.oldest = 1;
        self.newest = 0;

        info!(
            name = %self.name,
            capacity = config.capacity,
            line_width = config.line_width,
            "formatted ring store"
        );
        let name = &self.name;
        self.diagnostics
            .trace(1, || format!("formatted {name}: {config}"));
        Ok(())
    }

    /// Open the store, formatting it if it does not exist or does not match
    /// the requested configuration, then recover the live range.
    ///
    /// Values are clamped into the supported range before they are
    /// compared with the stamped configuration, so opening with the same
    /// out-of-range request twice reuses the store.
    pub fn open(&mut self, capacity: u32, line_width: u32) -> Result<()> {
        let config = RingConfig::new(capacity, line_width);
        self.release_handle();

        if !self.storage.exists(&self.name)? {
            info!(name = %self.name, "no ring store found; formatting");
            return self.format(config.capacity, config.line_width);
        }

        let mut handle = self
            .storage
            .open(&self.name, OpenMode::ReadWrite)
            .map_err(|source| RingLogError::StorageUnavailable {
                name: self.name.clone(),
                source,
            })?;

        if let OpenVerdict::Reformat(reason) = self.check_existing(&mut handle, config)? {
            warn!(name = %self.name, %reason, "discarding ring store");
            self.diagnostics
                .trace(1, || format!("discarding store: {reason}"));
            if let Err(e) = handle.close() {
                warn!(error = %e, "failed to close storage handle");
            }
            drop(handle);
            self.storage.remove(&self.name)?;
            return self.format(config.capacity, config.line_width);
        }

        let geometry = RingGeometry::from(config);
        let newest = self.recover(&mut handle, &geometry)?;

        self.config = config;
        self.geometry = geometry;
        self.handle = Some(handle);
        self.state = EngineState::Open;
        self.newest = newest;
        self.oldest = oldest_for(newest, config.capacity);
        self.cursor = ReadCursor::exhausted();

        info!(
            name = %self.name,
            oldest = self.oldest,
            newest = self.newest,
            "opened ring store"
        );
        let (oldest, newest) = (self.oldest, self.newest);
        self.diagnostics
            .trace(1, || format!("opened, lines {oldest}..={newest}"));
        Ok(())
    }

    /// Discard any existing store and open a freshly formatted one.
    pub fn open_fresh(&mut self, capacity: u32, line_width: u32) -> Result<()> {
        self.release_handle();
        if self.storage.remove(&self.name)? {
            info!(name = %self.name, "removed ring store before formatting");
        }
        self.open(capacity, line_width)
    }

    /// Append one line and return its id.
    ///
    /// The payload is sanitized and cut to the line width. The line is
    /// durable once this returns `Ok`.
    pub fn append(&mut self, payload: &str) -> Result<LineId> {
        let handle = open_handle(self.state, &mut self.handle)?;
        let id = self
            .newest
            .checked_add(1)
            .ok_or(RingLogError::LineIdsExhausted { last: self.newest })?;
        let slot = self.geometry.slot_for(id);

        record::encode_into(
            &mut self.buf,
            id,
            i64::from(id),
            payload,
            self.config.line_width,
        );
        if let Err(e) = seek_slot(handle, &self.geometry, slot)
            .and_then(|()| write_record(handle, slot, &self.buf))
        {
            warn!(line_id = id, slot, error = %e, "append failed");
            return Err(e);
        }
        handle.flush()?;

        self.newest = id;
        self.oldest = oldest_for(id, self.config.capacity);

        debug!(line_id = id, slot, "appended line");
        self.diagnostics
            .trace(3, || format!("append #{id} -> slot {slot}"));
        Ok(id)
    }

    /// Format, sanitize and append a line.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<LineId> {
        let line = text::build_line(args);
        self.append(&line)
    }

    /// Append `message` prefixed with `tag`, cutting the message so the
    /// whole line fits the line width.
    pub fn append_tagged(&mut self, tag: &str, message: &str) -> Result<LineId> {
        let line = text::tagged_line(tag, message, self.config.line_width);
        self.append(&line)
    }

    pub fn status(&self) -> RingStatus {
        RingStatus {
            name: self.name.clone(),
            state: self.state,
            capacity: self.config.capacity,
            line_width: self.config.line_width,
            record_length: self.config.record_length(),
            oldest_id: self.oldest,
            newest_id: self.newest,
            debug_level: self.diagnostics.level(),
        }
    }

    /// Mirror the status to every diagnostic sink and return it.
    pub fn report_status(&mut self) -> RingStatus {
        let status = self.status();
        for line in status.to_string().lines() {
            self.diagnostics.report(line);
        }
        self.diagnostics.flush();
        status
    }

    /// Id of the newest line, `0` when the ring is empty.
    pub fn last_line_id(&self) -> LineId {
        self.newest
    }

    /// Resolve a read window against the current live range.
    /// See [`ReadCursor::window`].
    pub fn window(&self, start: i32, count: u32) -> ReadCursor {
        if self.state == EngineState::Open {
            ReadCursor::window(start, count, self.oldest, self.newest)
        } else {
            ReadCursor::exhausted()
        }
    }

    /// Return the next live line in `cursor`'s window.
    ///
    /// Slots that are empty or hold a different line (overwritten since the
    /// cursor was created, or corrupted) are skipped. An exhausted cursor
    /// yields `None` whatever the engine state. On error the cursor stays
    /// on the failing position.
    pub fn read_next(&mut self, cursor: &mut ReadCursor) -> Result<Option<String>> {
        if cursor.is_exhausted() {
            return Ok(None);
        }
        let handle = open_handle(self.state, &mut self.handle)?;
        while let Some(id) = cursor.peek() {
            let slot = self.geometry.slot_for(id);
            let record = read_slot(handle, &self.geometry, slot, &mut self.buf)?;
            cursor.advance();
            if record.live_id() == Some(id) {
                return Ok(Some(record.payload));
            }
            debug!(line_id = id, slot, found = record.line_id, "skipping slot");
            self.diagnostics
                .trace(4, || format!("slot {slot} does not hold line {id}"));
        }
        Ok(None)
    }

    /// Position the engine's own cursor. See [`ReadCursor::window`].
    pub fn start_reading(&mut self, start: i32, count: u32) -> ReadCursor {
        self.cursor = self.window(start, count);
        self.diagnostics
            .trace(2, || format!("read window {start}/{count}"));
        self.cursor
    }

    /// Next line from the window set by [`start_reading`](Self::start_reading).
    pub fn read_next_line(&mut self) -> Result<Option<String>> {
        let mut cursor = self.cursor;
        let line = self.read_next(&mut cursor);
        self.cursor = cursor;
        line
    }

    /// Iterate over the live lines of a window.
    pub fn lines(&mut self, start: i32, count: u32) -> Lines<'_, S> {
        let cursor = self.window(start, count);
        Lines::new(self, cursor)
    }

    /// Read and classify every data slot, mirroring each to the sinks.
    pub fn dump(&mut self) -> Result<Vec<SlotDump>> {
        let handle = open_handle(self.state, &mut self.handle)?;
        let mut dumps = Vec::with_capacity(self.geometry.capacity() as usize);
        for slot in self.geometry.data_slots() {
            let offset = self.geometry.byte_offset_for(slot);
            let record = read_slot(handle, &self.geometry, slot, &mut self.buf)?;
            let marker = classify(&record, slot, &self.geometry, self.oldest, self.newest);
            let dump = SlotDump {
                slot,
                offset,
                record,
                marker,
            };
            self.diagnostics.report(&dump.to_string());
            dumps.push(dump);
            self.storage.yield_now();
        }
        self.diagnostics.flush();
        Ok(dumps)
    }

    /// Erase every line, keeping the current configuration.
    pub fn reset(&mut self) -> Result<()> {
        let config = self.config;
        self.release_handle();
        self.storage.remove(&self.name)?;
        info!(name = %self.name, "ring store reset");
        self.format(config.capacity, config.line_width)
    }

    /// Close and delete the backing object. Returns `true` if it existed.
    pub fn remove(&mut self) -> Result<bool> {
        self.release_handle();
        self.state = EngineState::Unformatted;
        self.oldest = 1;
        self.newest = 0;
        self.cursor = ReadCursor::exhausted();
        let existed = self.storage.remove(&self.name)?;
        info!(name = %self.name, existed, "ring store removed");
        Ok(existed)
    }

    /// Flush and release the storage handle.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };
        if self.state == EngineState::Open {
            self.state = EngineState::Closed;
        }
        self.cursor = ReadCursor::exhausted();
        handle.flush()?;
        handle.close()?;
        debug!(name = %self.name, "ring store closed");
        Ok(())
    }

    /// Set the trace verbosity, `0..=9`. Out-of-range values select 1.
    pub fn set_debug_level(&mut self, level: u8) {
        self.diagnostics.set_level(level);
        let level = self.diagnostics.level();
        self.diagnostics
            .trace(1, || format!("debug level set to {level}"));
    }

    pub fn debug_level(&self) -> u8 {
        self.diagnostics.level()
    }

    /// Register a sink for traces, status reports and dumps.
    pub fn add_sink(&mut self, sink: impl DiagnosticSink + 'static) {
        self.diagnostics.add_sink(sink);
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> RingConfig {
        self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Decide whether an existing object can be reused for `config`.
    fn check_existing(
        &mut self,
        handle: &mut S::Handle,
        config: RingConfig,
    ) -> Result<OpenVerdict> {
        let size = self.storage.size(&self.name)?;
        if size == 0 {
            return Ok(OpenVerdict::Reformat("store is empty".into()));
        }

        let geometry = RingGeometry::from(config);
        seek_slot(handle, &geometry, 0)?;
        handle.read_until(b'\n', record::record_length(MAX_LINE_WIDTH) + 1, &mut self.buf)?;
        let Some(meta) = Metadata::decode(&self.buf) else {
            return Ok(OpenVerdict::Reformat("metadata record unreadable".into()));
        };

        let stamped = meta.config();
        if stamped != config {
            return Ok(OpenVerdict::Reformat(format!(
                "stamped {stamped}, requested {config}"
            )));
        }
        if size != geometry.store_size() {
            return Ok(OpenVerdict::Reformat(format!(
                "size {size} bytes, expected {}",
                geometry.store_size()
            )));
        }

        debug!(tag = %meta.tag, %stamped, "metadata matches");
        Ok(OpenVerdict::Reuse)
    }

    /// Scan every data slot and return the highest line id stored in its
    /// own slot.
    fn recover(&mut self, handle: &mut S::Handle, geometry: &RingGeometry) -> Result<LineId> {
        let mut newest: LineId = 0;
        let mut live = 0u32;
        let mut misplaced = 0u32;

        for slot in geometry.data_slots() {
            let record = read_slot(handle, geometry, slot, &mut self.buf)?;
            if let Some(id) = record.live_id() {
                if geometry.slot_for(id) == slot {
                    live += 1;
                    newest = newest.max(id);
                } else {
                    misplaced += 1;
                    warn!(slot, line_id = id, "line found in the wrong slot; ignoring");
                }
            }
            self.diagnostics.trace(4, || {
                format!("recover slot {slot}: line {}", record.line_id)
            });
            self.storage.yield_now();
        }

        debug!(live, misplaced, newest, "recovery scan complete");
        Ok(newest)
    }

    fn release_handle(&mut self) {
        if self.state == EngineState::Open {
            self.state = EngineState::Closed;
        }
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.close() {
                warn!(error = %e, "failed to close storage handle");
            }
        }
    }
}

impl<S: Storage> Drop for RingLog<S> {
    fn drop(&mut self) {
        self.release_handle();
    }
}

impl<S: Storage> fmt::Debug for RingLog<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingLog")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("config", &self.config)
            .field("oldest", &self.oldest)
            .field("newest", &self.newest)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

/// Oldest live id for a ring of `capacity` slots whose newest id is
/// `newest`. An empty ring has `oldest == 1`, `newest == 0`.
fn oldest_for(newest: LineId, capacity: u32) -> LineId {
    if newest < capacity {
        1
    } else {
        newest - capacity + 1
    }
}

fn open_handle<H>(state: EngineState, handle: &mut Option<H>) -> Result<&mut H> {
    match handle {
        Some(handle) if state == EngineState::Open => Ok(handle),
        _ => Err(RingLogError::NotOpen { state }),
    }
}

fn seek_slot<H: StorageHandle>(handle: &mut H, geometry: &RingGeometry, slot: u32) -> Result<()> {
    let offset = geometry.byte_offset_for(slot);
    handle
        .seek(offset)
        .map_err(|source| RingLogError::SeekFailed {
            slot,
            offset,
            source,
        })
}

fn read_slot<H: StorageHandle>(
    handle: &mut H,
    geometry: &RingGeometry,
    slot: u32,
    buf: &mut Vec<u8>,
) -> Result<Record> {
    seek_slot(handle, geometry, slot)?;
    handle.read_until(b'\n', geometry.record_length() as usize + 1, buf)?;
    Ok(record::decode(buf))
}

fn write_record<H: StorageHandle>(handle: &mut H, slot: u32, bytes: &[u8]) -> Result<()> {
    let written = handle.write_line(bytes)?;
    if written != bytes.len() {
        return Err(RingLogError::WriteLengthMismatch {
            slot,
            expected: bytes.len(),
            actual: written,
        });
    }
    Ok(())
}

fn classify(
    record: &Record,
    slot: u32,
    geometry: &RingGeometry,
    oldest: LineId,
    newest: LineId,
) -> SlotMarker {
    match record.live_id() {
        None => SlotMarker::Empty,
        Some(id) if geometry.slot_for(id) != slot || id < oldest || id > newest => {
            SlotMarker::Stale
        }
        Some(id) if id == newest => SlotMarker::Newest,
        Some(id) if id == oldest => SlotMarker::Oldest,
        Some(_) => SlotMarker::Live,
    }
}
