use super::cursor::Cursor;
use super::types::Footprint;
use crate::error::CaptureError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// A record plus the position the buffer assigned to it.
#[derive(Debug, Clone, Serialize)]
pub struct Stamped<T> {
    pub sequence: u64,
    #[serde(serialize_with = "serialize_nanos")]
    pub ingested_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: T,
}

fn serialize_nanos<S: serde::Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

impl<T> Stamped<T> {
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.ingested_at, self.sequence)
    }
}

/// Which side of a cursor a read wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorMode {
    /// Strictly newer than the cursor, oldest first.
    After(Cursor),
    /// Strictly older than the cursor, closest to it.
    Before(Cursor),
    /// The cursor's entry and everything newer.
    Since(Cursor),
}

impl CursorMode {
    fn cursor(&self) -> &Cursor {
        match self {
            Self::After(c) | Self::Before(c) | Self::Since(c) => c,
        }
    }

    fn admits(&self, sequence: u64) -> bool {
        match self {
            Self::After(c) => sequence > c.sequence,
            Self::Before(c) => sequence < c.sequence,
            Self::Since(c) => sequence >= c.sequence,
        }
    }
}

/// Pagination request for one buffer read.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub cursor: Option<CursorMode>,
    /// Maximum entries returned; zero means no limit.
    pub limit: usize,
    pub restart_on_eviction: bool,
}

impl PageRequest {
    pub fn newest(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Build from the raw string parameters tools and HTTP queries accept.
    /// `after` wins over `before`, which wins over `since`.
    pub fn from_params(
        after: Option<&str>,
        before: Option<&str>,
        since: Option<&str>,
        limit: usize,
        restart_on_eviction: bool,
    ) -> Result<Self, CaptureError> {
        fn non_empty(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }
        let cursor = if let Some(raw) = non_empty(after) {
            Some(CursorMode::After(raw.parse()?))
        } else if let Some(raw) = non_empty(before) {
            Some(CursorMode::Before(raw.parse()?))
        } else if let Some(raw) = non_empty(since) {
            Some(CursorMode::Since(raw.parse()?))
        } else {
            None
        };
        Ok(Self {
            cursor,
            limit,
            restart_on_eviction,
        })
    }
}

/// Pagination metadata returned alongside a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMeta {
    /// Entries currently retained by the buffer.
    pub total: usize,
    pub count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_timestamp: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cursor_restarted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub entries: Vec<Stamped<T>>,
    pub meta: PageMeta,
}

/// Bounded FIFO with a buffer-wide monotonic sequence.
///
/// Sequences start at 1 and never rewind, not even on `clear`, so a sequence
/// identifies at most one record for the life of the process.
#[derive(Debug)]
pub struct RingBuffer<T> {
    entries: VecDeque<Stamped<T>>,
    capacity: usize,
    next_seq: u64,
    first_seq: u64,
    bytes: usize,
}

impl<T: Footprint + Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            next_seq: 1,
            first_seq: 1,
            bytes: 0,
        }
    }

    /// Append records in order; they receive contiguous sequences.
    /// Returns the sequence of the last appended record.
    pub fn append_batch<I>(&mut self, records: I) -> u64
    where
        I: IntoIterator<Item = T>,
    {
        let now = Utc::now();
        for record in records {
            if self.entries.len() == self.capacity
                && let Some(evicted) = self.entries.pop_front()
            {
                self.bytes = self.bytes.saturating_sub(evicted.record.footprint());
            }
            self.bytes += record.footprint();
            self.entries.push_back(Stamped {
                sequence: self.next_seq,
                ingested_at: now,
                record,
            });
            self.next_seq += 1;
        }
        self.first_seq = self
            .entries
            .front()
            .map_or(self.next_seq, |oldest| oldest.sequence);
        self.tail_seq()
    }

    pub fn append(&mut self, record: T) -> u64 {
        self.append_batch(std::iter::once(record))
    }

    /// Drop all records. The watermark moves to the next unassigned sequence.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.first_seq = self.next_seq;
        self.bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Oldest retained sequence (equals `tail_seq + 1` when empty).
    pub fn first_seq(&self) -> u64 {
        self.first_seq
    }

    /// Sequence of the newest record ever appended (0 before the first append).
    pub fn tail_seq(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Stamped<T>> {
        self.entries.iter()
    }

    /// Count retained records newer than `sequence` that satisfy `pred`.
    pub fn count_since<F>(&self, sequence: u64, pred: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        self.entries
            .iter()
            .rev()
            .take_while(|e| e.sequence > sequence)
            .filter(|e| pred(&e.record))
            .count()
    }

    /// Resolve a page of records matching `filter`.
    pub fn read<F>(&self, request: &PageRequest, filter: F) -> Result<Page<T>, CaptureError>
    where
        F: Fn(&T) -> bool,
    {
        let mut meta = PageMeta {
            total: self.entries.len(),
            ..PageMeta::default()
        };

        let mut mode = request.cursor.clone();
        if let Some(cursor_mode) = &mode {
            let cursor = cursor_mode.cursor();
            if cursor.sequence > 0 && cursor.sequence < self.first_seq {
                if !request.restart_on_eviction {
                    return Err(CaptureError::CursorExpired {
                        requested: cursor.sequence,
                        oldest: self.first_seq,
                    });
                }
                meta.cursor_restarted = true;
                meta.original_cursor = Some(cursor.to_string());
                meta.warning = Some(format!(
                    "Cursor expired (buffer overflow). Restarted from oldest available entry. Lost entries: {} to {}",
                    cursor.sequence,
                    self.first_seq.saturating_sub(1)
                ));
                mode = None;
            }
        }

        let matched: Vec<&Stamped<T>> = self
            .entries
            .iter()
            .filter(|e| mode.as_ref().is_none_or(|m| m.admits(e.sequence)))
            .filter(|e| filter(&e.record))
            .collect();

        let limit = if request.limit == 0 {
            matched.len()
        } else {
            request.limit.min(matched.len())
        };
        let forward = meta.cursor_restarted
            || matches!(mode, Some(CursorMode::After(_) | CursorMode::Since(_)));
        let selected = if forward {
            &matched[..limit]
        } else {
            &matched[matched.len() - limit..]
        };

        meta.count = selected.len();
        meta.has_more = matched.len() > selected.len();
        if let (Some(first), Some(last)) = (selected.first(), selected.last()) {
            meta.prev_cursor = Some(first.cursor().to_string());
            meta.next_cursor = Some(last.cursor().to_string());
            meta.oldest_timestamp = Some(first.cursor().timestamp);
            meta.newest_timestamp = Some(last.cursor().timestamp);
        }

        Ok(Page {
            entries: selected.iter().map(|e| (*e).clone()).collect(),
            meta,
        })
    }
}
