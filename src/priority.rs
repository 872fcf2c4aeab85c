use std::fmt;

/// Delivery priority of an envelope.
///
/// Lower numeric value means higher priority: mailboxes always hand out
/// `Critical` before `High`, `High` before `Normal`, and so on. The derived
/// `Ord` follows the discriminants, so `Priority::Critical < Priority::Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum Priority {
    Critical = 0,
    High = 1,
    #[default]
    Normal = 2,
    Low = 3,
    Background = 4,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
        Priority::Background,
    ];

    /// Numeric value, `0` being the most urgent.
    #[inline]
    pub fn value(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Background => "background",
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::ALL
            .get(value as usize)
            .copied()
            .ok_or(crate::Error::InvalidPriority(value))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_sorts_first() {
        let mut all = vec![Priority::Low, Priority::Critical, Priority::Normal];
        all.sort();
        assert_eq!(all, [Priority::Critical, Priority::Normal, Priority::Low]);

    }

    #[test]
    fn from_numeric_value() {
        assert_eq!(Priority::try_from(0).ok(), Some(Priority::Critical));
        assert_eq!(Priority::try_from(4).ok(), Some(Priority::Background));
        assert!(Priority::try_from(5).is_err());
        assert_eq!(Priority::High.value(), 1);
    }
}
