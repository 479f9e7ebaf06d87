//! Reflection policy flags
//!
//! Gates the forced-access operations with capability flags. The policy is
//! consulted before any override is taken: a withheld capability turns the
//! operation into `AccessDenied` with class metadata untouched.

/// Reflection capability flags (bitflags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReflectionPolicy(u8);

impl ReflectionPolicy {
    /// No forced access allowed
    pub const NONE: Self = Self(0x00);
    /// Read private fields
    pub const READ_PRIVATE: Self = Self(0x01);
    /// Write private fields
    pub const WRITE_PRIVATE: Self = Self(0x02);
    /// Invoke private methods and constructors
    pub const INVOKE_PRIVATE: Self = Self(0x04);
    /// Write final fields through the read-only bypass
    pub const WRITE_FINAL: Self = Self(0x08);
    /// Instantiate classes through forced constructor invocation
    pub const CREATE_INSTANCES: Self = Self(0x10);
    /// All capabilities
    pub const ALL: Self = Self(0x1F);

    /// Create from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check if the policy grants all flags in `other`
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of capabilities
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Difference (remove capabilities)
    pub const fn difference(&self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl Default for ReflectionPolicy {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let policy = ReflectionPolicy::READ_PRIVATE.union(ReflectionPolicy::WRITE_PRIVATE);
        assert!(policy.contains(ReflectionPolicy::READ_PRIVATE));
        assert!(policy.contains(ReflectionPolicy::WRITE_PRIVATE));
        assert!(!policy.contains(ReflectionPolicy::WRITE_FINAL));
        assert!(ReflectionPolicy::ALL.contains(policy));
    }

    #[test]
    fn test_difference() {
        let policy = ReflectionPolicy::ALL.difference(ReflectionPolicy::WRITE_FINAL);
        assert!(policy.contains(ReflectionPolicy::WRITE_PRIVATE));
        assert!(!policy.contains(ReflectionPolicy::WRITE_FINAL));
    }

    #[test]
    fn test_none_grants_nothing() {
        assert!(!ReflectionPolicy::NONE.contains(ReflectionPolicy::READ_PRIVATE));
        assert!(ReflectionPolicy::NONE.contains(ReflectionPolicy::NONE));
    }

    #[test]
    fn test_round_trip_bits() {
        let policy = ReflectionPolicy::from_bits(0x0B);
        assert_eq!(policy.bits(), 0x0B);
        assert!(policy.contains(ReflectionPolicy::READ_PRIVATE));
        assert!(policy.contains(ReflectionPolicy::WRITE_PRIVATE));
        assert!(policy.contains(ReflectionPolicy::WRITE_FINAL));
        assert!(!policy.contains(ReflectionPolicy::INVOKE_PRIVATE));
    }
}
