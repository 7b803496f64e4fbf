//! Capability bits and the roles that grant them.
//!
//! A role's authority is the bitwise union of the bits it grants. Checking
//! whether someone "can" do something is bit containment, never equality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

/// A set of capability bits.
///
/// # Examples
///
/// ```rust
/// use flasky::domain::Permission;
///
/// let writer = Permission::FOLLOW | Permission::COMMENT | Permission::WRITE_ARTICLE;
/// assert!(writer.contains(Permission::WRITE_ARTICLE));
/// assert!(!writer.contains(Permission::MODERATE_COMMENTS));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(i32);

impl Permission {
    pub const NONE: Self = Self(0);
    pub const FOLLOW: Self = Self(0x01);
    pub const COMMENT: Self = Self(0x02);
    pub const WRITE_ARTICLE: Self = Self(0x04);
    pub const MODERATE_COMMENTS: Self = Self(0x08);
    pub const ADMINISTER: Self = Self(0x80);
    pub const ALL: Self = Self(0xff);

    #[must_use]
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// True when every bit of `required` is granted.
    #[must_use]
    pub const fn contains(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for Permission {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitAnd for Permission {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// The capability-check contract shared by real and anonymous principals.
pub trait Capabilities {
    fn can(&self, permission: Permission) -> bool;

    fn is_admin(&self) -> bool {
        self.can(Permission::ADMINISTER)
    }
}

/// One row of the fixed role table applied by `insert_roles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSeed {
    pub name: &'static str,
    pub permissions: Permission,
    pub is_default: bool,
}

pub const ROLE_SEEDS: [RoleSeed; 3] = [
    RoleSeed {
        name: "User",
        permissions: Permission::FOLLOW
            .union(Permission::COMMENT)
            .union(Permission::WRITE_ARTICLE),
        is_default: true,
    },
    RoleSeed {
        name: "Moderator",
        permissions: Permission::FOLLOW
            .union(Permission::COMMENT)
            .union(Permission::WRITE_ARTICLE)
            .union(Permission::MODERATE_COMMENTS),
        is_default: false,
    },
    RoleSeed {
        name: "Administrator",
        permissions: Permission::ALL,
        is_default: false,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_disjoint() {
        let bits = [
            Permission::FOLLOW,
            Permission::COMMENT,
            Permission::WRITE_ARTICLE,
            Permission::MODERATE_COMMENTS,
            Permission::ADMINISTER,
        ];
        for (i, a) in bits.iter().enumerate() {
            for b in &bits[i + 1..] {
                assert_eq!((*a & *b), Permission::NONE);
            }
        }
    }

    #[test]
    fn test_containment_not_equality() {
        let user = ROLE_SEEDS[0].permissions;
        assert_eq!(user.bits(), 0x07);
        assert!(user.contains(Permission::WRITE_ARTICLE));
        assert!(user.contains(Permission::FOLLOW | Permission::COMMENT));
        assert!(!user.contains(Permission::MODERATE_COMMENTS));
        assert!(!user.contains(Permission::WRITE_ARTICLE | Permission::ADMINISTER));
    }

    #[test]
    fn test_administrator_has_everything() {
        let admin = ROLE_SEEDS[2].permissions;
        assert!(admin.contains(Permission::ADMINISTER));
        assert!(admin.contains(Permission::MODERATE_COMMENTS | Permission::FOLLOW));
    }

    #[test]
    fn test_single_default_role() {
        assert_eq!(ROLE_SEEDS.iter().filter(|r| r.is_default).count(), 1);
    }
}
