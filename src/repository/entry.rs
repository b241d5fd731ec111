//! Per-file preprocessor-state history.
//!
//! A header included under several macro configurations keeps one
//! (preprocessor state, condition state) pair per configuration. Most files
//! only ever have one, so a single pair is stored without a vector.

use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::preproc::{ConditionState, PreprocState, StatePair};
use crate::storage::{RecordReader, RecordWriter, StorageResult};
use crate::types::{FileId, FileSystemId};

use super::{read_file_id, write_file_id};

/// Parse contexts recorded for a file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StateData {
    #[default]
    Absent,
    Single(StatePair),
    Multi(Vec<StatePair>),
}

impl StateData {
    fn pairs(&self) -> &[StatePair] {
        match self {
            StateData::Absent => &[],
            StateData::Single(pair) => std::slice::from_ref(pair),
            StateData::Multi(pairs) => pairs,
        }
    }

    fn pairs_mut(&mut self) -> &mut [StatePair] {
        match self {
            StateData::Absent => &mut [],
            StateData::Single(pair) => std::slice::from_mut(pair),
            StateData::Multi(pairs) => pairs,
        }
    }

    /// Collapse to the smallest representation.
    fn from_pairs(mut pairs: Vec<StatePair>) -> Self {
        match pairs.len() {
            0 => StateData::Absent,
            1 => StateData::Single(pairs.remove(0)),
            _ => StateData::Multi(pairs),
        }
    }
}

/// Mutable part of a [`FileEntry`], only reachable through its lock.
#[derive(Debug, Default)]
pub struct EntryState {
    data: StateData,
    mod_count: i32,
}

impl EntryState {
    fn new(data: StateData, mod_count: i32) -> Self {
        Self { data, mod_count }
    }

    pub fn data(&self) -> &StateData {
        &self.data
    }

    pub fn mod_count(&self) -> i32 {
        self.mod_count
    }

    pub fn state_pairs(&self) -> Vec<StatePair> {
        self.data.pairs().to_vec()
    }

    pub fn preproc_states(&self) -> Vec<PreprocState> {
        self.data
            .pairs()
            .iter()
            .filter_map(|p| p.state.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.data, StateData::Absent)
    }

    fn increment_mod_count(&mut self) {
        self.mod_count = if self.mod_count == i32::MAX {
            0
        } else {
            self.mod_count + 1
        };
    }

    fn has_authoritative_state(&self) -> bool {
        self.data.pairs().iter().any(StatePair::is_authoritative)
    }

    /// Replace all contexts with one pair.
    ///
    /// Refused (returns `false`, nothing changes) when the entry holds a valid
    /// compile-context state and the new state is not a compile context:
    /// background revalidation must not override a result obtained from a
    /// real build configuration.
    pub fn set_state(&mut self, state: Option<PreprocState>, condition: ConditionState) -> bool {
        let new_is_compile_context = state.as_ref().is_some_and(PreprocState::is_compile_context);
        if !new_is_compile_context && self.has_authoritative_state() {
            tracing::debug!("[files] keep compile-context state, refusing non-compile-context replacement");
            return false;
        }
        self.data = StateData::Single(StatePair::new(state, condition));
        self.increment_mod_count();
        true
    }

    /// Replace all contexts with `pairs` plus an optional extra pair.
    ///
    /// Duplicate pairs are dropped; a single remaining pair is stored as such.
    pub fn set_states(&mut self, pairs: Vec<StatePair>, extra: Option<StatePair>) {
        let mut unique: Vec<StatePair> = Vec::with_capacity(pairs.len() + 1);
        for pair in pairs.into_iter().chain(extra) {
            if !unique.contains(&pair) {
                unique.push(pair);
            }
        }
        self.data = StateData::from_pairs(unique);
        self.increment_mod_count();
        self.check_consistency();
    }

    /// Mark every context invalid, keeping snapshots and condition states.
    pub fn invalidate_states(&mut self) {
        for pair in self.data.pairs_mut() {
            pair.state = pair.state.as_ref().map(PreprocState::invalidated);
        }
        self.increment_mod_count();
    }

    /// Reset every condition state to `Parsing`, keeping the preprocessor states.
    pub fn mark_as_parsing(&mut self) {
        for pair in self.data.pairs_mut() {
            pair.condition = ConditionState::Parsing;
        }
        self.increment_mod_count();
    }

    /// Drop all contexts.
    pub fn clear(&mut self) {
        self.data = StateData::Absent;
        self.increment_mod_count();
    }

    /// Finalized pairs must agree on validity and compile-context.
    ///
    /// Divergence is logged only; a pair still being parsed suspends the check.
    fn check_consistency(&self) -> bool {
        if !crate::diagnostics::check_consistency() {
            return true;
        }
        let pairs = self.data.pairs();
        if pairs.len() < 2 || pairs.iter().any(|p| p.condition.is_parsing()) {
            return true;
        }
        let first = &pairs[0];
        let consistent = pairs.iter().all(|p| {
            p.is_valid() == first.is_valid() && p.is_compile_context() == first.is_compile_context()
        });
        if !consistent {
            tracing::warn!(
                "[files] inconsistent preprocessor states: {}",
                pairs
                    .iter()
                    .map(|p| format!("(valid={}, compile={})", p.is_valid(), p.is_compile_context()))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        consistent
    }
}

/// A tracked source or header file.
#[derive(Debug)]
pub struct FileEntry {
    file_id: FileId,
    file_system: FileSystemId,
    path: Arc<str>,
    canonical: Arc<str>,
    state: Mutex<EntryState>,
}

impl FileEntry {
    pub fn new(
        file_id: FileId,
        file_system: FileSystemId,
        path: Arc<str>,
        canonical: Arc<str>,
        initial: Option<PreprocState>,
    ) -> Self {
        let data = match initial {
            Some(state) => StateData::Single(StatePair::parsing(state)),
            None => StateData::Absent,
        };
        Self {
            file_id,
            file_system,
            path,
            canonical,
            state: Mutex::new(EntryState::new(data, 0)),
        }
    }

    /// Entry used to merge states from several sources; never registered.
    pub fn detached(file_system: FileSystemId, path: &str, file_id: FileId) -> Self {
        let path: Arc<str> = path.into();
        Self::new(file_id, file_system, path.clone(), path, None)
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn file_system(&self) -> &FileSystemId {
        &self.file_system
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn canonical_path(&self) -> &str {
        &self.canonical
    }

    /// Lock the entry for a compound read-decide-modify sequence.
    pub fn lock(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock()
    }

    pub fn mod_count(&self) -> i32 {
        self.lock().mod_count()
    }

    pub fn state_pairs(&self) -> Vec<StatePair> {
        self.lock().state_pairs()
    }

    pub fn preproc_states(&self) -> Vec<PreprocState> {
        self.lock().preproc_states()
    }

    pub fn set_state(&self, state: Option<PreprocState>, condition: ConditionState) -> bool {
        self.lock().set_state(state, condition)
    }

    pub fn set_states(&self, pairs: Vec<StatePair>, extra: Option<StatePair>) {
        self.lock().set_states(pairs, extra)
    }

    pub fn invalidate_states(&self) {
        self.lock().invalidate_states()
    }

    pub fn mark_as_parsing_preproc_states(&self) {
        self.lock().mark_as_parsing()
    }

    pub fn write<W: Write>(&self, out: &mut RecordWriter<W>) -> StorageResult<()> {
        write_file_id(out, self.file_id)?;
        out.write_str(self.file_system.as_str())?;
        out.write_str(&self.canonical)?;
        let state = self.lock();
        out.write_i32(state.mod_count)?;
        // Presence, then the shape flag: one pair, or a count and the pairs
        match &state.data {
            StateData::Absent => out.write_bool(false)?,
            StateData::Single(pair) => {
                out.write_bool(true)?;
                out.write_bool(false)?;
                pair.write(out)?;
            }
            StateData::Multi(pairs) => {
                out.write_bool(true)?;
                out.write_bool(true)?;
                out.write_len(pairs.len())?;
                for pair in pairs {
                    pair.write(out)?;
                }
            }
        }
        Ok(())
    }

    pub fn read<R: Read>(input: &mut RecordReader<R>, path: Arc<str>) -> StorageResult<Self> {
        let file_id = read_file_id(input)?;
        let file_system = FileSystemId::new(&input.read_string("entry.fs")?);
        let canonical: Arc<str> = input.read_string("entry.canonical")?.into();
        let mod_count = input.read_i32("entry.mod_count")?;
        let data = if !input.read_bool("entry.has_data")? {
            StateData::Absent
        } else if input.read_bool("entry.multi")? {
            let count = input.read_len("entry.pairs")?;
            let mut pairs = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                pairs.push(StatePair::read(input)?);
            }
            StateData::from_pairs(pairs)
        } else {
            StateData::Single(StatePair::read(input)?)
        };
        Ok(Self {
            file_id,
            file_system,
            path,
            canonical,
            state: Mutex::new(EntryState::new(data, mod_count)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> FileEntry {
        FileEntry::detached(FileSystemId::local(), "/a/b.h", FileId::new(1).unwrap())
    }

    fn finalized() -> ConditionState {
        ConditionState::finalized(vec![(0, 4)])
    }

    #[test]
    fn test_new_entry_with_state_is_parsing() {
        let entry = FileEntry::new(
            FileId::new(1).unwrap(),
            FileSystemId::local(),
            "/x.c".into(),
            "/x.c".into(),
            Some(PreprocState::compile_context(vec![1])),
        );
        let pairs = entry.state_pairs();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].condition.is_parsing());
        assert_eq!(entry.mod_count(), 0);
    }

    #[test]
    fn test_set_state_bumps_mod_count() {
        let entry = entry();
        assert!(entry.set_state(Some(PreprocState::fallback(vec![1])), finalized()));
        assert_eq!(entry.mod_count(), 1);
        assert!(entry.set_state(Some(PreprocState::compile_context(vec![2])), finalized()));
        assert_eq!(entry.mod_count(), 2);
        assert_eq!(entry.preproc_states(), vec![PreprocState::compile_context(vec![2])]);
    }

    #[test]
    fn test_set_state_refuses_downgrade_of_compile_context() {
        let entry = entry();
        let authoritative = PreprocState::compile_context(vec![1]);
        entry.set_state(Some(authoritative.clone()), finalized());
        let before = entry.mod_count();

        assert!(!entry.set_state(Some(PreprocState::fallback(vec![9])), ConditionState::Parsing));
        assert!(!entry.set_state(None, ConditionState::Parsing));
        assert_eq!(entry.preproc_states(), vec![authoritative]);
        assert_eq!(entry.mod_count(), before);
    }

    #[test]
    fn test_invalid_compile_context_can_be_replaced() {
        let entry = entry();
        entry.set_state(Some(PreprocState::compile_context(vec![1])), finalized());
        entry.invalidate_states();
        assert!(entry.set_state(Some(PreprocState::fallback(vec![2])), ConditionState::Parsing));
        assert_eq!(entry.preproc_states(), vec![PreprocState::fallback(vec![2])]);
    }

    #[test]
    fn test_set_states_collapses_duplicates() {
        let entry = entry();
        let pair = StatePair::new(Some(PreprocState::fallback(vec![1])), finalized());
        entry.set_states(vec![pair.clone(), pair.clone()], Some(pair.clone()));
        assert!(matches!(entry.lock().data(), StateData::Single(p) if *p == pair));

        let other = StatePair::new(Some(PreprocState::fallback(vec![2])), finalized());
        entry.set_states(vec![pair.clone()], Some(other));
        assert!(matches!(entry.lock().data(), StateData::Multi(p) if p.len() == 2));

        entry.set_states(Vec::new(), None);
        assert!(entry.lock().is_empty());
    }

    #[test]
    fn test_invalidate_states_is_idempotent() {
        let entry = entry();
        entry.set_states(
            vec![
                StatePair::new(Some(PreprocState::compile_context(vec![1])), finalized()),
                StatePair::new(Some(PreprocState::compile_context(vec![2])), ConditionState::Parsing),
            ],
            None,
        );
        let start = entry.mod_count();

        entry.invalidate_states();
        let once = entry.state_pairs();
        entry.invalidate_states();
        let twice = entry.state_pairs();

        assert_eq!(once, twice);
        assert!(twice.iter().all(|p| !p.is_valid()));
        // Condition states are preserved
        assert!(!twice[0].condition.is_parsing());
        assert!(twice[1].condition.is_parsing());
        assert_eq!(entry.mod_count(), start + 2);
    }

    #[test]
    fn test_mark_as_parsing_keeps_states() {
        let entry = entry();
        let state = PreprocState::compile_context(vec![5]);
        entry.set_state(Some(state.clone()), finalized());
        entry.mark_as_parsing_preproc_states();

        let pairs = entry.state_pairs();
        assert_eq!(pairs[0].state.as_ref(), Some(&state));
        assert!(pairs[0].condition.is_parsing());
    }

    #[test]
    fn test_mod_count_wraps_to_zero() {
        let mut state = EntryState::new(StateData::Absent, i32::MAX);
        state.invalidate_states();
        assert_eq!(state.mod_count(), 0);
    }

    #[test]
    fn test_inconsistent_states_are_tolerated() {
        crate::diagnostics::set_check_consistency(true);
        let entry = entry();
        entry.set_states(
            vec![
                StatePair::new(Some(PreprocState::compile_context(vec![1])), finalized()),
                StatePair::new(Some(PreprocState::fallback(vec![2])), finalized()),
            ],
            None,
        );
        assert!(!entry.lock().check_consistency());
        assert_eq!(entry.state_pairs().len(), 2);
    }

    #[test]
    fn test_single_pair_record_has_no_count() {
        let pair = StatePair::new(Some(PreprocState::compile_context(vec![3])), finalized());
        let single = entry();
        single.set_state(pair.state.clone(), pair.condition.clone());
        let absent = entry();
        absent.lock().clear();
        assert_eq!(single.mod_count(), absent.mod_count());

        let record = |e: &FileEntry| {
            let mut w = RecordWriter::buffer();
            e.write(&mut w).unwrap();
            w.into_inner()
        };
        let mut pair_bytes = RecordWriter::buffer();
        pair.write(&mut pair_bytes).unwrap();

        let mut expected = record(&absent);
        assert_eq!(expected.pop(), Some(0));
        expected.extend_from_slice(&[1, 0]);
        expected.extend(pair_bytes.into_inner());
        assert_eq!(record(&single), expected);

        let bytes = record(&single);
        let mut r = RecordReader::new(bytes.as_slice());
        let restored = FileEntry::read(&mut r, "/a/b.h".into()).unwrap();
        assert!(matches!(restored.lock().data(), StateData::Single(p) if *p == pair));
    }

    #[test]
    fn test_entry_record_decodes() {
        let entry = entry();
        entry.set_states(
            vec![
                StatePair::new(Some(PreprocState::compile_context(vec![1])), finalized()),
                StatePair::new(None, ConditionState::Parsing),
            ],
            None,
        );
        let mut w = RecordWriter::buffer();
        entry.write(&mut w).unwrap();
        let bytes = w.into_inner();

        let mut r = RecordReader::new(bytes.as_slice());
        let restored = FileEntry::read(&mut r, "/a/b.h".into()).unwrap();
        assert_eq!(restored.file_id(), entry.file_id());
        assert_eq!(restored.canonical_path(), "/a/b.h");
        assert_eq!(restored.mod_count(), entry.mod_count());
        assert_eq!(restored.state_pairs(), entry.state_pairs());
    }
}
