use httpvfs_common::ChunkIndex;
use serde::Serialize;

/// One chunk access, see [PageReadLog].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRead {
    pub chunk_index: ChunkIndex,
    /// The chunk was already cached.
    pub was_cached: bool,
    /// Chunks fetched along with this one.
    pub prefetch: usize,
}

/// The trace of chunk accesses, for replay and analysis tools.
///
/// Consecutive accesses to the same chunk are recorded once.
#[derive(Debug, Default)]
pub struct PageReadLog {
    enabled: bool,
    last: Option<ChunkIndex>,
    entries: Vec<PageRead>,
}

impl PageReadLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool { self.enabled }

    pub fn record(&mut self, chunk_index: ChunkIndex, was_cached: bool, prefetch: usize) {
        if !self.enabled || self.last == Some(chunk_index) {
            return;
        }
        self.last = Some(chunk_index);
        self.entries.push(PageRead {
            chunk_index,
            was_cached,
            prefetch,
        });
    }

    pub fn entries(&self) -> &[PageRead] { &self.entries }

    /// Take all entries recorded so far.
    pub fn drain(&mut self) -> Vec<PageRead> { std::mem::take(&mut self.entries) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_chunk_logged_once() {
        let mut log = PageReadLog::new(true);
        log.record(1, false, 3);
        log.record(1, true, 0);
        log.record(2, true, 0);
        log.record(1, true, 0);
        let chunks: Vec<_> = log.entries().iter().map(|r| r.chunk_index).collect();
        assert_eq!(chunks, vec![1, 2, 1]);
        assert_eq!(log.entries()[0].prefetch, 3);

        assert_eq!(log.drain().len(), 3);
        assert!(log.entries().is_empty());
        // draining does not forget the last chunk
        log.record(1, true, 0);
        assert!(log.entries().is_empty());
    }

    #[test]
    fn disabled_records_nothing() {
        let mut log = PageReadLog::new(false);
        log.record(1, false, 0);
        assert!(log.entries().is_empty());
    }
}
