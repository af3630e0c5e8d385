use crate::shared::error::VideoError;
use crate::video::domain::frame_decoder::PacketInfo;

/// One row of the random-access table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub ordinal: u64,
    pub byte_offset: i64,
    pub pts: i64,
    pub is_key: bool,
}

/// Immutable ordinal -> stream position table for one file.
///
/// Built once from a demux-only packet scan, owned by the reader for its
/// whole lifetime. Ordinals are dense over `[0, frame_count)` and follow
/// pts (display) order; ordinal 0 is always a key frame.
#[derive(Debug)]
pub struct FrameIndex {
    entries: Vec<IndexEntry>,
    key_ordinals: Vec<u64>,
}

impl FrameIndex {
    /// Builds the table from a packet scan. Packets arrive in demux order
    /// and are reordered by pts before ordinals are assigned, so streams
    /// with bidirectional prediction still index in display order.
    pub fn build(mut packets: Vec<PacketInfo>) -> Result<Self, VideoError> {
        if packets.is_empty() {
            return Err(VideoError::Decode(
                "container has no video frames".to_string(),
            ));
        }

        packets.sort_by_key(|p| p.pts);

        let entries: Vec<IndexEntry> = packets
            .iter()
            .enumerate()
            .map(|(i, p)| IndexEntry {
                ordinal: i as u64,
                byte_offset: p.byte_offset,
                pts: p.pts,
                // decoding always starts at the stream head, so ordinal 0
                // anchors a segment even if the container omits the flag
                is_key: p.is_key || i == 0,
            })
            .collect();

        let key_ordinals = entries
            .iter()
            .filter(|e| e.is_key)
            .map(|e| e.ordinal)
            .collect();

        Ok(Self {
            entries,
            key_ordinals,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Ordered key-frame ordinals; always starts with 0.
    pub fn key_indices(&self) -> &[u64] {
        &self.key_ordinals
    }

    pub fn entry(&self, ordinal: u64) -> Option<&IndexEntry> {
        self.entries.get(ordinal as usize)
    }

    pub fn contains(&self, pos: i64) -> bool {
        pos >= 0 && (pos as u64) < self.frame_count()
    }

    /// Largest key-frame ordinal at or before `pos`. `pos` must be in
    /// range; ordinal 0 being a key frame makes the search total.
    pub fn key_at_or_before(&self, pos: u64) -> u64 {
        match self.key_ordinals.binary_search(&pos) {
            Ok(i) => self.key_ordinals[i],
            Err(i) => self.key_ordinals[i - 1],
        }
    }
}
