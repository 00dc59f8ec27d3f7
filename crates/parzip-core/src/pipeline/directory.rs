use std::collections::HashSet;

use crossbeam_channel::Sender;

use crate::types::{EntryHeader, Result};
use crate::ZipError;

use super::types::{resolved_promise, EntryPromise};

/// Deduplicates synthesized directory entries.
///
/// Only the planner touches this, so membership checks stay serialized with
/// submission order.
pub(crate) struct DirectoryRecorder {
    created: HashSet<String>,
}

impl DirectoryRecorder {
    pub fn new() -> Self {
        Self {
            created: HashSet::new(),
        }
    }

    /// Ensures every ancestor directory of `name` has been submitted
    /// exactly once. Call before submitting the file itself.
    pub fn record_parents(&mut self, queue: &Sender<EntryPromise>, name: &str) -> Result<()> {
        match name.rfind('/') {
            Some(idx) => self.record(queue, &name[..idx + 1]),
            None => Ok(()),
        }
    }

    /// Submits `dir` and any missing ancestors as zero-payload entries,
    /// deepest first.
    pub fn record(&mut self, queue: &Sender<EntryPromise>, dir: &str) -> Result<()> {
        let mut dir = if dir.is_empty() || dir.ends_with('/') {
            dir.to_string()
        } else {
            format!("{dir}/")
        };

        while !dir.is_empty() && dir != "./" && !self.created.contains(&dir) {
            self.created.insert(dir.clone());
            let header = EntryHeader::directory(dir.clone());
            queue
                .send(resolved_promise(header, None))
                .map_err(|_| ZipError::ShuttingDown)?;

            dir = match dir[..dir.len() - 1].rfind('/') {
                Some(idx) => dir[..idx + 1].to_string(),
                None => String::new(),
            };
        }
        Ok(())
    }
}
