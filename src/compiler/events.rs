//! Unified event logging for the rewriting pipeline.
//!
//! This module provides an event logging system that captures the activity of a
//! transformation run - from individual inserted instructions to segment placement
//! decisions. Events can be inspected for debugging or safely ignored when not needed.
//! The `log` facade carries the same information as free text; the event log is the
//! structured, queryable record of it.
//!
//! # Architecture
//!
//! The system is built around three main types:
//!
//! - [`Event`] - A single recorded event (change, warning, info, etc.)
//! - [`EventLog`] - Collection of events with query and summary capabilities
//! - [`EventBuilder`] - Fluent API for creating events
//!
//! # Example
//!
//! ```rust,ignore
//! use mipsweave::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//!
//! log.record(EventKind::BranchRetargeted)
//!     .at("main", 0x400018)
//!     .message("0x00400020 -> 0x00400124");
//!
//! log.info("Relocation finished");
//!
//! println!("{}", log.summary());
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::Duration,
};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The transformation policy inserted instructions into a block.
    InstructionsInserted,
    /// A block's instructions were reordered by the list scheduler.
    BlockScheduled,
    /// Synthetic registers of a block or region were assigned physical registers.
    RegistersAllocated,
    /// A synthetic register was assigned a stack slot.
    RegisterSpilled,
    /// A segment grew into its trailing free space.
    SegmentGrown,
    /// A segment was moved to a different free address range.
    SegmentRelocated,
    /// A block received a new start address.
    BlockMoved,
    /// A branch or jump operand was rewritten.
    BranchRetargeted,
    /// A symbol value or size was rewritten.
    SymbolUpdated,
    /// A section's file offset was shifted.
    SectionShifted,

    /// Function processing started.
    FunctionProcessingStarted,
    /// Function processing completed.
    FunctionProcessingCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Transformations
            Self::InstructionsInserted => "instructions inserted",
            Self::BlockScheduled => "block scheduled",
            Self::RegistersAllocated => "registers allocated",
            Self::RegisterSpilled => "register spilled",
            Self::SegmentGrown => "segment grown",
            Self::SegmentRelocated => "segment relocated",
            Self::BlockMoved => "block moved",
            Self::BranchRetargeted => "branch retargeted",
            Self::SymbolUpdated => "symbol updated",
            Self::SectionShifted => "section shifted",
            // Engine
            Self::FunctionProcessingStarted => "function processing started",
            Self::FunctionProcessingCompleted => "function processing completed",
            // Diagnostic
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a change to the program or image.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::InstructionsInserted
                | Self::BlockScheduled
                | Self::RegistersAllocated
                | Self::RegisterSpilled
                | Self::SegmentGrown
                | Self::SegmentRelocated
                | Self::BlockMoved
                | Self::BranchRetargeted
                | Self::SymbolUpdated
                | Self::SectionShifted
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The function where the event occurred (if applicable).
    pub function: Option<String>,
    /// Address the event refers to (block start, instruction or segment base).
    pub address: Option<u64>,
    /// Human-readable description.
    pub message: String,
}

impl Event {
    /// Creates a new event with the given kind and message.
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            function: None,
            address: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Some(address) => write!(f, "[{}] 0x{:08x}: {}", self.kind, address, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is automatically added
/// to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    function: Option<String>,
    address: Option<u64>,
    message: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            address: None,
            message: None,
        }
    }

    /// Sets the function and address where the event occurred.
    pub fn at(mut self, function: impl Into<String>, address: u64) -> Self {
        self.function = Some(function.into());
        self.address = Some(address);
        self
    }

    /// Sets only the function (for function-level events without an address).
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Sets the address (for image-level events without a function).
    pub fn address(mut self, address: u64) -> Self {
        self.address = Some(address);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        let event = Event {
            kind: self.kind,
            function: self.function.take(),
            address: self.address.take(),
            message,
        };

        self.log.events.push(event);
    }
}

/// Collection of events from a transformation run.
///
/// Provides methods for recording events, querying them, and generating
/// summaries. Statistics are derived from the events rather than tracked
/// separately.
///
/// This type is thread-safe: events can be appended concurrently from
/// multiple threads using shared references (`&self`), which is what parallel
/// per-block processing relies on.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        for (_, event) in &self.events {
            new_log.events.push(event.clone());
        }
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is automatically added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends all events of another log.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.events
            .iter()
            .filter_map(move |(_, e)| if e.kind == kind { Some(e) } else { None })
    }

    /// Returns an iterator over events for a specific function.
    pub fn filter_function<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter_map(move |(_, e)| {
            if e.function.as_deref() == Some(function) {
                Some(e)
            } else {
                None
            }
        })
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().filter_map(|(_, e)| {
            if e.kind.is_transformation() {
                Some(e)
            } else {
                None
            }
        })
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of unique functions with transformation events.
    #[must_use]
    pub fn functions_affected(&self) -> usize {
        self.events
            .iter()
            .filter(|(_, e)| e.kind.is_transformation())
            .filter_map(|(_, e)| e.function.as_deref())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of all events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let counts = self.count_by_kind();

        // Only show transformation counts in summary
        let mut parts: Vec<String> = counts
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = Box<dyn Iterator<Item = &'a Event> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Statistics derived from an [`EventLog`].
///
/// All numbers are computed from events; nothing is tracked separately.
#[derive(Debug, Clone, Default)]
pub struct TransformStats {
    /// Number of functions that had any transformation.
    pub functions_transformed: usize,
    /// Number of blocks that received inserted instructions.
    pub blocks_expanded: usize,
    /// Number of blocks reordered by the scheduler.
    pub blocks_scheduled: usize,
    /// Number of allocation runs (regions or blocks).
    pub allocations: usize,
    /// Number of synthetic registers assigned a stack slot.
    pub spills: usize,
    /// Number of segments grown in place.
    pub segments_grown: usize,
    /// Number of segments moved.
    pub segments_relocated: usize,
    /// Number of blocks given a new start address.
    pub blocks_moved: usize,
    /// Number of rewritten branch or jump operands.
    pub branches_retargeted: usize,
    /// Number of rewritten symbols.
    pub symbols_updated: usize,
    /// Number of sections whose file offset moved.
    pub sections_shifted: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of errors.
    pub errors: usize,
    /// Processing time.
    pub total_time: Duration,
}

impl TransformStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            functions_transformed: log.functions_affected(),
            blocks_expanded: get(EventKind::InstructionsInserted),
            blocks_scheduled: get(EventKind::BlockScheduled),
            allocations: get(EventKind::RegistersAllocated),
            spills: get(EventKind::RegisterSpilled),
            segments_grown: get(EventKind::SegmentGrown),
            segments_relocated: get(EventKind::SegmentRelocated),
            blocks_moved: get(EventKind::BlockMoved),
            branches_retargeted: get(EventKind::BranchRetargeted),
            symbols_updated: get(EventKind::SymbolUpdated),
            sections_shifted: get(EventKind::SectionShifted),
            warnings: get(EventKind::Warning),
            errors: get(EventKind::Error),
            total_time: Duration::ZERO,
        }
    }

    /// Sets the total processing time.
    #[must_use]
    pub fn with_time(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Generates a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.functions_transformed > 0 {
            parts.push(format!("{} functions", self.functions_transformed));
        }

        // Code changes
        if self.blocks_expanded > 0 {
            parts.push(format!("{} blocks expanded", self.blocks_expanded));
        }
        if self.blocks_scheduled > 0 {
            parts.push(format!("{} blocks scheduled", self.blocks_scheduled));
        }
        if self.allocations > 0 {
            parts.push(format!("{} allocations", self.allocations));
        }
        if self.spills > 0 {
            parts.push(format!("{} spills", self.spills));
        }

        // Layout changes
        if self.segments_grown > 0 {
            parts.push(format!("{} segments grown", self.segments_grown));
        }
        if self.segments_relocated > 0 {
            parts.push(format!("{} segments relocated", self.segments_relocated));
        }
        if self.blocks_moved > 0 {
            parts.push(format!("{} blocks moved", self.blocks_moved));
        }
        if self.branches_retargeted > 0 {
            parts.push(format!("{} branches retargeted", self.branches_retargeted));
        }
        if self.symbols_updated > 0 {
            parts.push(format!("{} symbols updated", self.symbols_updated));
        }
        if self.sections_shifted > 0 {
            parts.push(format!("{} sections shifted", self.sections_shifted));
        }

        if self.errors > 0 {
            parts.push(format!("{} errors", self.errors));
        }
        if self.warnings > 0 {
            parts.push(format!("{} warnings", self.warnings));
        }

        let stats = if parts.is_empty() {
            "no transformations".to_string()
        } else {
            parts.join(", ")
        };

        if self.total_time.as_millis() > 0 {
            format!("{} in {:?}", stats, self.total_time)
        } else {
            stats
        }
    }
}

impl fmt::Display for TransformStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
