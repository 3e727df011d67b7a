use crate::error::{ErrorCode, StorageError, StorageResult};

/// Page blob sequence number conditions of a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceNumberConditions {
    /// `x-ms-if-sequence-number-le`
    pub less_than_or_equal_to: Option<u64>,
    /// `x-ms-if-sequence-number-lt`
    pub less_than: Option<u64>,
    /// `x-ms-if-sequence-number-eq`
    pub equal_to: Option<u64>,
}

impl SequenceNumberConditions {
    pub fn validate(&self, sequence_number: u64) -> StorageResult<()> {
        let violated = self.less_than_or_equal_to.is_some_and(|le| sequence_number > le)
            || self.less_than.is_some_and(|lt| sequence_number >= lt)
            || self.equal_to.is_some_and(|eq| sequence_number != eq);

        if violated {
            return Err(StorageError::new(ErrorCode::SequenceNumberConditionNotMet));
        }
        Ok(())
    }
}
