use std::collections::VecDeque;

use crate::{Envelope, MessageFilter, Payload};

/// Bounded log of sent envelopes, oldest first.
///
/// Pushing past `max` evicts from the front, so a query never sees more than
/// the `max` most recent entries.
pub(crate) struct History<P: Payload> {
    entries: VecDeque<Envelope<P>>,
    max: usize,
}

impl<P: Payload> History<P> {
    pub fn new(max: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max.min(1024)),
            max,
        }
    }

    pub fn push(&mut self, envelope: Envelope<P>) {
        self.entries.push_back(envelope);
        self.trim();
    }

    /// Evict the oldest entries above the cap, returning how many went.
    pub fn trim(&mut self) -> usize {
        let excess = self.entries.len().saturating_sub(self.max);
        self.entries.drain(..excess);
        excess
    }

    pub fn query(&self, filter: &MessageFilter) -> Vec<Envelope<P>> {
        self.entries
            .iter()
            .filter(|e| filter.matches(*e))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Write every entry as one JSON object per line.
    #[cfg(feature = "serde")]
    pub fn write_jsonl<W: std::io::Write>(&self, mut writer: W) -> crate::Result<usize>
    where
        P: serde::Serialize,
    {
        for envelope in &self.entries {
            serde_json::to_writer(&mut writer, envelope)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(self.entries.len())
    }
}
