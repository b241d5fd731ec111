//! Preprocessor states and condition states tracked per file.
//!
//! A preprocessor state is an opaque snapshot of macro and include-guard
//! context taken when a file was entered. The condition state records which
//! conditional blocks were dead under that state, or that the file is still
//! being parsed.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::storage::{RecordReader, RecordWriter, StorageResult};

/// Snapshot of the preprocessor context a file was parsed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocState {
    snapshot: Arc<[u8]>,
    valid: bool,
    compile_context: bool,
}

impl PreprocState {
    /// A state derived from an actual build command.
    pub fn compile_context(snapshot: impl Into<Arc<[u8]>>) -> Self {
        Self {
            snapshot: snapshot.into(),
            valid: true,
            compile_context: true,
        }
    }

    /// A heuristic state (header parsed without a known including unit).
    pub fn fallback(snapshot: impl Into<Arc<[u8]>>) -> Self {
        Self {
            snapshot: snapshot.into(),
            valid: true,
            compile_context: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_compile_context(&self) -> bool {
        self.compile_context
    }

    pub fn snapshot(&self) -> &[u8] {
        &self.snapshot
    }

    /// Same state marked invalid. The snapshot is shared, not copied.
    pub fn invalidated(&self) -> Self {
        Self {
            snapshot: self.snapshot.clone(),
            valid: false,
            compile_context: self.compile_context,
        }
    }

    pub fn write<W: Write>(&self, out: &mut RecordWriter<W>) -> StorageResult<()> {
        out.write_bool(self.valid)?;
        out.write_bool(self.compile_context)?;
        out.write_bytes(&self.snapshot)
    }

    pub fn read<R: Read>(input: &mut RecordReader<R>) -> StorageResult<Self> {
        let valid = input.read_bool("state.valid")?;
        let compile_context = input.read_bool("state.compile_context")?;
        let snapshot = input.read_bytes("state.snapshot")?;
        Ok(Self {
            snapshot: snapshot.into(),
            valid,
            compile_context,
        })
    }
}

/// Half-open byte range of a conditional block that was skipped.
pub type DeadBlock = (u32, u32);

/// Whether a state's conditional blocks are known yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionState {
    /// Still being computed by a parse in flight.
    Parsing,
    /// Parse finished; these blocks were dead under the paired state.
    Finalized(Arc<[DeadBlock]>),
}

impl ConditionState {
    pub fn finalized(dead_blocks: impl Into<Arc<[DeadBlock]>>) -> Self {
        ConditionState::Finalized(dead_blocks.into())
    }

    pub fn is_parsing(&self) -> bool {
        matches!(self, ConditionState::Parsing)
    }

    pub fn dead_blocks(&self) -> &[DeadBlock] {
        match self {
            ConditionState::Parsing => &[],
            ConditionState::Finalized(blocks) => blocks,
        }
    }

    fn write_blocks<W: Write>(blocks: &[DeadBlock], out: &mut RecordWriter<W>) -> StorageResult<()> {
        out.write_len(blocks.len())?;
        for &(start, end) in blocks {
            out.write_u32(start)?;
            out.write_u32(end)?;
        }
        Ok(())
    }

    fn read_blocks<R: Read>(input: &mut RecordReader<R>) -> StorageResult<Self> {
        let count = input.read_len("condition.count")?;
        let mut blocks = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let start = input.read_u32("condition.start")?;
            let end = input.read_u32("condition.end")?;
            blocks.push((start, end));
        }
        Ok(ConditionState::finalized(blocks))
    }
}

/// One parse context of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePair {
    pub state: Option<PreprocState>,
    pub condition: ConditionState,
}

impl StatePair {
    pub fn new(state: Option<PreprocState>, condition: ConditionState) -> Self {
        Self { state, condition }
    }

    pub fn parsing(state: PreprocState) -> Self {
        Self::new(Some(state), ConditionState::Parsing)
    }

    pub fn is_valid(&self) -> bool {
        self.state.as_ref().is_some_and(PreprocState::is_valid)
    }

    pub fn is_compile_context(&self) -> bool {
        self.state.as_ref().is_some_and(PreprocState::is_compile_context)
    }

    /// Valid state produced by a real build context.
    pub fn is_authoritative(&self) -> bool {
        self.is_valid() && self.is_compile_context()
    }

    /// Two presence flags, then the state blob and the condition blob.
    ///
    /// A `Parsing` condition is written as absent.
    pub fn write<W: Write>(&self, out: &mut RecordWriter<W>) -> StorageResult<()> {
        out.write_bool(self.state.is_some())?;
        let blocks = match &self.condition {
            ConditionState::Parsing => None,
            ConditionState::Finalized(blocks) => Some(blocks),
        };
        out.write_bool(blocks.is_some())?;
        if let Some(state) = &self.state {
            state.write(out)?;
        }
        if let Some(blocks) = blocks {
            ConditionState::write_blocks(blocks, out)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(input: &mut RecordReader<R>) -> StorageResult<Self> {
        let has_state = input.read_bool("pair.has_state")?;
        let has_condition = input.read_bool("pair.has_condition")?;
        let state = if has_state {
            Some(PreprocState::read(input)?)
        } else {
            None
        };
        let condition = if has_condition {
            ConditionState::read_blocks(input)?
        } else {
            ConditionState::Parsing
        };
        Ok(Self { state, condition })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidated_keeps_snapshot() {
        let state = PreprocState::compile_context(vec![1, 2, 3]);
        let invalid = state.invalidated();
        assert!(!invalid.is_valid());
        assert!(invalid.is_compile_context());
        assert_eq!(invalid.snapshot(), state.snapshot());
    }

    #[test]
    fn test_pair_flags() {
        let pair = StatePair::new(
            Some(PreprocState::compile_context(vec![0])),
            ConditionState::finalized(vec![(10, 20)]),
        );
        assert!(pair.is_authoritative());
        assert!(!pair.condition.is_parsing());
        assert_eq!(pair.condition.dead_blocks(), &[(10, 20)]);

        let empty = StatePair::new(None, ConditionState::Parsing);
        assert!(!empty.is_valid());
        assert!(!empty.is_compile_context());
    }

    #[test]
    fn test_pair_record_layout() {
        let pair = StatePair::new(None, ConditionState::Parsing);
        let mut w = RecordWriter::buffer();
        pair.write(&mut w).unwrap();
        // Two presence flags and nothing else
        assert_eq!(w.into_inner(), vec![0, 0]);
    }

    #[test]
    fn test_pair_decodes_what_it_encodes() {
        let pair = StatePair::new(
            Some(PreprocState::fallback(vec![7, 7])),
            ConditionState::finalized(vec![(1, 2), (5, 9)]),
        );
        let mut w = RecordWriter::buffer();
        pair.write(&mut w).unwrap();
        let bytes = w.into_inner();

        let mut r = RecordReader::new(bytes.as_slice());
        assert_eq!(StatePair::read(&mut r).unwrap(), pair);
    }
}
