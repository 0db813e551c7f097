//! Fixed-width record reassembly over an arbitrarily chunked byte stream.
//!
//! Receives return whatever the kernel has ready, which rarely lines up
//! with record boundaries. The reassembler keeps the 0..=3 trailing bytes
//! of an incomplete record between feeds and logically prepends them to
//! the next chunk, so the record sequence is the same no matter how the
//! stream was split.
//!
//! Records are handed to a visitor as they complete. The first visitor
//! error stops the scan and discards the rest of the chunk.

use crate::protocols::echo::{Record, RECORD_LEN};

/// Incomplete trailing bytes of a record held between feeds.
#[derive(Debug, Default, Clone, Copy)]
struct Carry {
    bytes: [u8; RECORD_LEN],
    /// Always `< RECORD_LEN`.
    len: usize,
}

/// Record reassembler for one receive phase.
#[derive(Debug, Default)]
pub struct Reassembler {
    carry: Carry,
    /// Bytes of the phase already emitted as complete records.
    consumed: usize,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget carry-over and position, ready for a new phase.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of bytes held from an incomplete record.
    pub fn carry_len(&self) -> usize {
        self.carry.len
    }

    /// Byte offset of the next record within the phase.
    #[cfg(test)]
    pub fn position(&self) -> usize {
        self.consumed
    }

    /// Feed one received chunk.
    ///
    /// `visit` is called with each completed record and the phase byte
    /// offset where it began, in receipt order. If `visit` fails, the
    /// remaining bytes of the chunk and any carry-over are dropped and the
    /// error is returned.
    pub fn feed<E, F>(&mut self, chunk: &[u8], mut visit: F) -> Result<(), E>
    where
        F: FnMut(Record, usize) -> Result<(), E>,
    {
        let mut rest = chunk;

        // Complete a record started by an earlier chunk
        if self.carry.len > 0 {
            let need = RECORD_LEN - self.carry.len;
            if rest.len() < need {
                self.hold(rest);
                return Ok(());
            }
            let (head, tail) = rest.split_at(need);
            self.carry.bytes[self.carry.len..].copy_from_slice(head);
            let record = Record::from_wire(self.carry.bytes);
            self.carry.len = 0;
            self.emit(record, &mut visit)?;
            rest = tail;
        }

        let mut strides = rest.chunks_exact(RECORD_LEN);
        for stride in &mut strides {
            let mut bytes = [0u8; RECORD_LEN];
            bytes.copy_from_slice(stride);
            self.emit(Record::from_wire(bytes), &mut visit)?;
        }

        self.hold(strides.remainder());
        Ok(())
    }

    /// Feed a chunk and collect every completed record.
    #[cfg(test)]
    pub fn collect(&mut self, chunk: &[u8]) -> Vec<Record> {
        let mut records = Vec::with_capacity((self.carry.len + chunk.len()) / RECORD_LEN);
        let _ = self.feed(chunk, |record, _| {
            records.push(record);
            Ok::<(), ()>(())
        });
        records
    }

    fn emit<E, F>(&mut self, record: Record, visit: &mut F) -> Result<(), E>
    where
        F: FnMut(Record, usize) -> Result<(), E>,
    {
        let position = self.consumed;
        if let Err(e) = visit(record, position) {
            self.carry.len = 0;
            return Err(e);
        }
        self.consumed += RECORD_LEN;
        Ok(())
    }

    /// Append a tail shorter than one record to the carry-over.
    fn hold(&mut self, tail: &[u8]) {
        debug_assert!(self.carry.len + tail.len() < RECORD_LEN);
        let start = self.carry.len;
        self.carry.bytes[start..start + tail.len()].copy_from_slice(tail);
        self.carry.len += tail.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    fn records(values: &[u32]) -> Vec<Record> {
        values.iter().copied().map(Record).collect()
    }

    fn reassemble_in(bytes: &[u8], chunk: usize) -> Vec<Record> {
        let mut reassembler = Reassembler::new();
        let mut out = Vec::new();
        for piece in bytes.chunks(chunk) {
            out.extend(reassembler.collect(piece));
        }
        assert_eq!(reassembler.carry_len(), bytes.len() % RECORD_LEN);
        out
    }

    #[test]
    fn test_whole_chunk() {
        let values = [1, 2, 3, 0xdead_beef];
        let mut reassembler = Reassembler::new();
        assert_eq!(reassembler.collect(&stream(&values)), records(&values));
        assert_eq!(reassembler.carry_len(), 0);
        assert_eq!(reassembler.position(), 16);
    }

    #[test]
    fn test_chunking_does_not_change_records() {
        let values: Vec<u32> = (0..97).map(|i| 0x0102_0304u32.wrapping_mul(i + 1)).collect();
        let bytes = stream(&values);
        let expected = records(&values);

        for chunk in [1, 2, 3, 4, 5, 7, 13, 64, 1000, bytes.len()] {
            assert_eq!(reassemble_in(&bytes, chunk), expected, "chunk size {chunk}");
        }
    }

    #[test]
    fn test_split_record_every_way() {
        let bytes = 0xa1b2_c3d4u32.to_be_bytes();
        for split in 1..RECORD_LEN {
            let mut reassembler = Reassembler::new();
            assert!(reassembler.collect(&bytes[..split]).is_empty());
            assert_eq!(reassembler.carry_len(), split);
            assert_eq!(reassembler.collect(&bytes[split..]), vec![Record(0xa1b2_c3d4)]);
            assert_eq!(reassembler.carry_len(), 0);
        }
    }

    #[test]
    fn test_carry_grows_across_tiny_chunks() {
        let mut reassembler = Reassembler::new();
        assert!(reassembler.collect(&[0x11]).is_empty());
        assert!(reassembler.collect(&[0x22]).is_empty());
        assert_eq!(reassembler.carry_len(), 2);
        // Completes the held record and leaves one byte of the next
        let out = reassembler.collect(&[0x33, 0x44, 0x55]);
        assert_eq!(out, vec![Record(0x1122_3344)]);
        assert_eq!(reassembler.carry_len(), 1);
    }

    #[test]
    fn test_positions_are_phase_offsets() {
        let bytes = stream(&[7, 7, 7]);
        let mut reassembler = Reassembler::new();
        let mut positions = Vec::new();
        for piece in bytes.chunks(3) {
            reassembler
                .feed(piece, |_, pos| {
                    positions.push(pos);
                    Ok::<(), ()>(())
                })
                .unwrap();
        }
        assert_eq!(positions, vec![0, 4, 8]);
    }

    #[test]
    fn test_visitor_error_stops_scan() {
        let bytes = stream(&[5, 5, 9, 5, 5]);
        let mut reassembler = Reassembler::new();
        let mut seen = 0;
        let result = reassembler.feed(&bytes[..18], |record, pos| {
            seen += 1;
            if record.0 == 5 {
                Ok(())
            } else {
                Err(pos)
            }
        });
        assert_eq!(result, Err(8));
        assert_eq!(seen, 3);
        assert_eq!(reassembler.carry_len(), 0);
    }

    #[test]
    fn test_mismatch_in_record_completed_from_carry() {
        let bytes = stream(&[5, 5, 9, 5]);
        let mut reassembler = Reassembler::new();
        let check = |record: Record, pos: usize| {
            if record.0 == 5 {
                Ok(())
            } else {
                Err(pos)
            }
        };

        // Two good records plus the first half of the bad one
        assert_eq!(reassembler.feed(&bytes[..10], check), Ok(()));
        assert_eq!(reassembler.carry_len(), 2);

        assert_eq!(reassembler.feed(&bytes[10..], check), Err(8));
        assert_eq!(reassembler.carry_len(), 0);
        assert_eq!(reassembler.position(), 8);
    }

    #[test]
    fn test_reset() {
        let mut reassembler = Reassembler::new();
        reassembler.collect(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(reassembler.carry_len(), 2);
        reassembler.reset();
        assert_eq!(reassembler.carry_len(), 0);
        assert_eq!(reassembler.position(), 0);
    }
}
