use core::fmt;
use core::num::NonZeroU32;

/// Compact, stable identifier of a case within one batch.
///
/// - `u32` keeps per-case bookkeeping small
/// - `NonZero` enables `Option<CaseId>` to be niche-optimized
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaseId(NonZeroU32);

impl CaseId {
    /// Create a CaseId from a 0-based row index by storing index+1.
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index))
    }

    /// Recover the 0-based row index.
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Debug for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CaseId({})", self.index())
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trip_index() {
        for i in [0_u32, 1, 2, 42, 10_000] {
            let id = CaseId::from_index(i);
            assert_eq!(id.index(), i as usize);
        }
    }

    #[test]
    fn option_id_is_small() {
        assert_eq!(
            core::mem::size_of::<CaseId>(),
            core::mem::size_of::<Option<CaseId>>()
        );
    }

    #[test]
    fn ids_order_by_index() {
        assert!(CaseId::from_index(3) < CaseId::from_index(7));
    }
}
