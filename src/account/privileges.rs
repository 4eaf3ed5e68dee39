//! Status and privilege flags.

use std::fmt;

use serde::{Deserialize, Serialize};

const ACTIVE: i32 = 1 << 0;
const STAFF: i32 = 1 << 1;
const SUPERUSER: i32 = 1 << 2;

/// One of the three account flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Active,
    Staff,
    Superuser,
}

impl Flag {
    /// Name of the flag as exposed on the entity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Active => "is_active",
            Flag::Staff => "is_staff",
            Flag::Superuser => "is_superuser",
        }
    }
}

impl Flag {
    /// Bit of the flag in the stored bitfield.
    pub fn bit(&self) -> i32 {
        match self {
            Flag::Active => ACTIVE,
            Flag::Staff => STAFF,
            Flag::Superuser => SUPERUSER,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent status flags of an account.
///
/// `is_superuser` does not imply `is_staff` here; the manager sets both when
/// it creates a privileged account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privileges {
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Default for Privileges {
    fn default() -> Self {
        Self {
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }
}

impl Privileges {
    /// Read a single flag.
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Active => self.is_active,
            Flag::Staff => self.is_staff,
            Flag::Superuser => self.is_superuser,
        }
    }

    /// Update a single flag.
    pub fn set(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::Active => self.is_active = value,
            Flag::Staff => self.is_staff = value,
            Flag::Superuser => self.is_superuser = value,
        }
    }

    /// Pack flags into the bitfield stored on database.
    pub fn bits(&self) -> i32 {
        let mut bits = 0;
        if self.is_active {
            bits |= ACTIVE;
        }
        if self.is_staff {
            bits |= STAFF;
        }
        if self.is_superuser {
            bits |= SUPERUSER;
        }
        bits
    }

    /// Unpack a database bitfield. Unknown bits are ignored.
    pub fn from_bits(bits: i32) -> Self {
        Self {
            is_active: bits & ACTIVE != 0,
            is_staff: bits & STAFF != 0,
            is_superuser: bits & SUPERUSER != 0,
        }
    }
}

/// Flags explicitly requested by a trusted caller at creation.
///
/// `None` keeps the manager's default for that flag.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlagOverrides {
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl FlagOverrides {
    /// Request every flag to be `value`.
    pub fn all(value: bool) -> Self {
        Self {
            is_active: Some(value),
            is_staff: Some(value),
            is_superuser: Some(value),
        }
    }

    /// Request `flag` to be `value`.
    pub fn with(mut self, flag: Flag, value: bool) -> Self {
        match flag {
            Flag::Active => self.is_active = Some(value),
            Flag::Staff => self.is_staff = Some(value),
            Flag::Superuser => self.is_superuser = Some(value),
        }
        self
    }

    /// Explicit value requested for `flag`, if any.
    pub fn get(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::Active => self.is_active,
            Flag::Staff => self.is_staff,
            Flag::Superuser => self.is_superuser,
        }
    }

    /// Apply overrides on top of `base`.
    pub fn apply(&self, base: Privileges) -> Privileges {
        Privileges {
            is_active: self.is_active.unwrap_or(base.is_active),
            is_staff: self.is_staff.unwrap_or(base.is_staff),
            is_superuser: self.is_superuser.unwrap_or(base.is_superuser),
        }
    }
}
