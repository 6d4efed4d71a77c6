//! Query and triangle feature flags.
//!
//! [`QueryFlags`] carries the caller's contact cap and the "unimportant
//! contacts" bit. ABI-stable callers exchange it as a packed word: the low
//! 16 bits are the cap, the top bit marks unimportant contacts, everything
//! else is reserved.
//!
//! [`TriFlags`] is the per-triangle byte that gates individual separating
//! axes in the capsule generator, used to suppress duplicate contacts on
//! edges and vertices shared between neighbouring triangles.

/// Mask of the packed word holding the contact cap.
const NUMC_MASK: u32 = 0xffff;

/// Packed-word bit for "contacts are unimportant" (early termination OK).
const CONTACTS_UNIMPORTANT: u32 = 0x8000_0000;

/// Per-query contact settings: cap and early-termination permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryFlags {
    /// Maximum number of contacts the caller has room for. At least 1.
    pub max_contacts: usize,
    /// When set, the query may stop the moment the cap is reached. When
    /// clear, generators keep scanning so deeper duplicates can replace
    /// already-emitted contacts.
    pub unimportant: bool,
}

impl QueryFlags {
    /// Create flags with a contact cap and full-scan semantics.
    #[must_use]
    pub fn new(max_contacts: usize) -> Self {
        debug_assert!(max_contacts >= 1, "contact cap must be at least 1");
        Self {
            max_contacts,
            unimportant: false,
        }
    }

    /// Permit early termination once the cap is reached.
    #[must_use]
    pub fn with_unimportant(mut self) -> Self {
        self.unimportant = true;
        self
    }

    /// Decode from the packed word form (low bits = cap, top bit =
    /// unimportant). A zero cap decodes as 1.
    #[must_use]
    pub fn from_word(word: u32) -> Self {
        Self {
            max_contacts: ((word & NUMC_MASK).max(1)) as usize,
            unimportant: word & CONTACTS_UNIMPORTANT != 0,
        }
    }

    /// Encode to the packed word form.
    #[must_use]
    pub fn to_word(self) -> u32 {
        let cap = u32::try_from(self.max_contacts).unwrap_or(NUMC_MASK) & NUMC_MASK;
        if self.unimportant {
            cap | CONTACTS_UNIMPORTANT
        } else {
            cap
        }
    }
}

impl Default for QueryFlags {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Per-triangle feature byte gating separating axes.
///
/// Edge and vertex bits enable the corresponding axis families; clearing a
/// bit suppresses contacts on that feature (used for edges/vertices shared
/// with a coplanar neighbour).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TriFlags(pub u8);

impl TriFlags {
    /// First edge (v0 -> v1).
    pub const EDGE0: Self = Self(1 << 0);
    /// Second edge (v1 -> v2).
    pub const EDGE1: Self = Self(1 << 1);
    /// Third edge (v2 -> v0).
    pub const EDGE2: Self = Self(1 << 2);
    /// First vertex.
    pub const VERT0: Self = Self(1 << 3);
    /// Second vertex.
    pub const VERT1: Self = Self(1 << 4);
    /// Third vertex.
    pub const VERT2: Self = Self(1 << 5);
    /// All features enabled.
    pub const ALL: Self = Self(0x3f);
    /// No features enabled (face axis only).
    pub const NONE: Self = Self(0);

    /// Check whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True when no feature bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for TriFlags {
    fn default() -> Self {
        Self::ALL
    }
}
