/// Record severity, ordered so threshold comparisons (`severity >= threshold`)
/// work directly via derived `Ord`.
///
/// `Invalid` is the zero value: a freshly-mapped, never-written slot reads as
/// `Invalid`, which is how the delta calculator tells an uninitialized slot
/// apart from a genuinely low-severity one.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    #[default]
    Invalid = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Severity {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Invalid),
            1 => Some(Self::Debug),
            2 => Some(Self::Info),
            3 => Some(Self::Warn),
            4 => Some(Self::Error),
            5 => Some(Self::Fatal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_severity_scale() {
        assert!(Severity::Invalid < Severity::Debug);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn roundtrips_through_u8() {
        for v in 0u8..=5 {
            assert_eq!(Severity::from_u8(v).unwrap() as u8, v);
        }
        assert!(Severity::from_u8(6).is_none());
    }
}
