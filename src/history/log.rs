// Operation Log - ordered history with toggle and suffix truncation

use crate::history::record::{OperationRecord, RecordBody, RecordId};
use crate::history::{HistoryError, HistoryResult};

/// Records in strictly increasing `created_order`
///
/// Besides appending, the log only supports flipping `enabled` on content
/// records, removing a single content record, and truncating a suffix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationLog {
    records: Vec<OperationRecord>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from records, checking the ordering
    pub fn from_records(records: Vec<OperationRecord>) -> HistoryResult<Self> {
        let mut log = Self::new();
        for record in records {
            log.push(record)?;
        }
        Ok(log)
    }

    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&OperationRecord> {
        self.records.last()
    }

    /// Append a record; its `created_order` must exceed every existing one
    pub fn push(&mut self, record: OperationRecord) -> HistoryResult<()> {
        if let Some(last) = self.records.last()
            && record.created_order <= last.created_order
        {
            return Err(HistoryError::OutOfOrder {
                record: record.id,
                created_order: record.created_order,
                last: last.created_order,
            });
        }
        if self.contains(record.id) {
            return Err(HistoryError::DuplicateRecord(record.id));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: RecordId) -> Option<&OperationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn require(&self, id: RecordId) -> HistoryResult<&OperationRecord> {
        self.get(id).ok_or(HistoryError::UnknownRecord(id))
    }

    /// Flip `enabled` on a content record, returning the new value
    pub fn toggle(&mut self, id: RecordId) -> HistoryResult<bool> {
        let index = self.position(id).ok_or(HistoryError::UnknownRecord(id))?;
        match &mut self.records[index].body {
            RecordBody::Content { enabled, .. } => {
                *enabled = !*enabled;
                Ok(*enabled)
            }
            RecordBody::Structural { op, .. } => Err(HistoryError::NotToggleable {
                record: id,
                kind: op.kind(),
            }),
        }
    }

    /// Remove one content record; later records are untouched
    pub fn remove_content(&mut self, id: RecordId) -> HistoryResult<OperationRecord> {
        let index = self.position(id).ok_or(HistoryError::UnknownRecord(id))?;
        if self.records[index].is_structural() {
            return Err(HistoryError::CascadeNotConfirmed {
                record: id,
                removed: self.records.len() - index,
            });
        }
        Ok(self.records.remove(index))
    }

    /// Remove `id` and every record created after it
    pub fn truncate_from(&mut self, id: RecordId) -> HistoryResult<Vec<OperationRecord>> {
        let index = self.position(id).ok_or(HistoryError::UnknownRecord(id))?;
        Ok(self.records.split_off(index))
    }

    /// Records removed by `truncate_from(id)`, without removing them
    pub fn suffix_from(&self, id: RecordId) -> HistoryResult<&[OperationRecord]> {
        let index = self.position(id).ok_or(HistoryError::UnknownRecord(id))?;
        Ok(&self.records[index..])
    }

    pub fn clear(&mut self) -> Vec<OperationRecord> {
        std::mem::take(&mut self.records)
    }

    /// Index of the most recent structural record
    pub fn anchor_index(&self) -> Option<usize> {
        self.records.iter().rposition(OperationRecord::is_structural)
    }

    pub fn anchor(&self) -> Option<&OperationRecord> {
        self.anchor_index().map(|i| &self.records[i])
    }

    /// Most recent structural record with `created_order <= limit`
    pub fn anchor_at(&self, limit: u64) -> Option<&OperationRecord> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.created_order <= limit)
            .find(|r| r.is_structural())
    }

    /// Content records after the current anchor, enabled or not
    pub fn content_after_anchor(&self) -> &[OperationRecord] {
        match self.anchor_index() {
            Some(index) => &self.records[index + 1..],
            None => &self.records,
        }
    }

    /// Whether a content record is baked into a later structural snapshot
    pub fn is_frozen(&self, id: RecordId) -> bool {
        match (self.get(id), self.anchor()) {
            (Some(record), Some(anchor)) => {
                !record.is_structural() && record.created_order < anchor.created_order
            }
            _ => false,
        }
    }

    pub fn structural_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_structural()).count()
    }

    pub fn content_count(&self) -> usize {
        self.records.len() - self.structural_count()
    }

    pub fn max_record_id(&self) -> Option<RecordId> {
        self.records.iter().map(|r| r.id).max()
    }

    pub fn max_created_order(&self) -> Option<u64> {
        self.records.last().map(|r| r.created_order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::SampleBuffer;
    use crate::effect::EffectParams;
    use crate::history::record::{ContentOp, RecordMeta, StructuralOp};
    use crate::timeline::{ClipId, ClipIdAllocator, ClipRegion, TimelineState};
    use std::sync::Arc;

    fn content(id: u64) -> OperationRecord {
        OperationRecord {
            id: RecordId(id),
            created_order: id,
            body: RecordBody::Content {
                op: ContentOp::Effect {
                    effect_id: "volume".into(),
                    params: EffectParams::new(),
                    target: ClipRegion::new(ClipId(1), 0, 10),
                },
                enabled: true,
            },
            meta: RecordMeta::new("Apply Volume"),
        }
    }

    fn structural(id: u64) -> OperationRecord {
        let base = SampleBuffer::from_mono(vec![0.0; 10], 1000).unwrap();
        let state = TimelineState::from_base(base, &mut ClipIdAllocator::default());
        OperationRecord {
            id: RecordId(id),
            created_order: id,
            body: RecordBody::Structural {
                op: StructuralOp::ClipSplit {
                    clip: ClipId(1),
                    at: 5,
                },
                snapshot: Arc::new(state),
            },
            meta: RecordMeta::new("Split"),
        }
    }

    fn sample_log() -> OperationLog {
        OperationLog::from_records(vec![content(1), structural(2), content(3), content(4)]).unwrap()
    }

    #[test]
    fn test_push_requires_increasing_order() {
        let mut log = sample_log();
        let err = log.push(content(2)).unwrap_err();
        assert!(matches!(err, HistoryError::OutOfOrder { .. }));
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn test_toggle_content_only() {
        let mut log = sample_log();
        assert!(!log.toggle(RecordId(3)).unwrap());
        assert!(!log.get(RecordId(3)).unwrap().is_enabled());
        assert!(log.toggle(RecordId(3)).unwrap());
        assert!(matches!(
            log.toggle(RecordId(2)),
            Err(HistoryError::NotToggleable { .. })
        ));
        assert!(matches!(
            log.toggle(RecordId(99)),
            Err(HistoryError::UnknownRecord(_))
        ));
    }

    #[test]
    fn test_truncate_removes_exact_suffix() {
        let mut log = sample_log();
        let removed = log.truncate_from(RecordId(2)).unwrap();
        let removed_ids: Vec<u64> = removed.iter().map(|r| r.id.0).collect();
        assert_eq!(removed_ids, vec![2, 3, 4]);
        assert_eq!(log.len(), 1);
        assert!(log.contains(RecordId(1)));
    }

    #[test]
    fn test_remove_content_does_not_cascade() {
        let mut log = sample_log();
        log.remove_content(RecordId(3)).unwrap();
        assert_eq!(log.len(), 3);
        assert!(log.contains(RecordId(4)));
        assert!(matches!(
            log.remove_content(RecordId(2)),
            Err(HistoryError::CascadeNotConfirmed { removed: 2, .. })
        ));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_anchor_and_frozen() {
        let log = sample_log();
        assert_eq!(log.anchor().map(|r| r.id), Some(RecordId(2)));
        assert_eq!(log.content_after_anchor().len(), 2);
        assert!(log.is_frozen(RecordId(1)));
        assert!(!log.is_frozen(RecordId(3)));
        assert_eq!(log.anchor_at(1).map(|r| r.id), None);
        assert_eq!(log.anchor_at(3).map(|r| r.id), Some(RecordId(2)));
        assert_eq!(log.structural_count(), 1);
        assert_eq!(log.content_count(), 3);
    }
}
