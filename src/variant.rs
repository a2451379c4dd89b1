//! Variant identity: SNV codes and canonical allele ordering.
//!
//! A biallelic variant is either one of the 12 single-nucleotide
//! substitutions or an indel. SNVs are stored as a 4-bit code so a
//! `variant` record needs no heap allocation; indels carry an offset into
//! an interned `"REF\tALT"` string table instead.

use std::cmp::Ordering;

/// The kind of a single allele: one of the 12 SNV substitutions, or an
/// indel whose `REF`/`ALT` text lives in the interned string table.
///
/// Codes mirror the reference C enum (`SNV_A_C = 1` .. `SNV_T_G = 12`,
/// `V_INDEL = 0`) so on-disk bytes round-trip without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum VariantKind {
    Indel = 0,
    AC = 1,
    AG = 2,
    AT = 3,
    CA = 4,
    CG = 5,
    CT = 6,
    GA = 7,
    GC = 8,
    GT = 9,
    TA = 10,
    TC = 11,
    TG = 12,
}

impl VariantKind {
    /// Reconstruct a `VariantKind` from its on-disk byte code.
    pub fn from_code(code: u8) -> Option<Self> {
        use VariantKind::*;
        Some(match code {
            0 => Indel,
            1 => AC,
            2 => AG,
            3 => AT,
            4 => CA,
            5 => CG,
            6 => CT,
            7 => GA,
            8 => GC,
            9 => GT,
            10 => TA,
            11 => TC,
            12 => TG,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_indel(self) -> bool {
        matches!(self, VariantKind::Indel)
    }

    /// The single-base `(ref, alt)` pair this code stands for, or `None`
    /// for `Indel` (whose text lives in the interned string table instead).
    pub fn ref_alt(self) -> Option<(u8, u8)> {
        use VariantKind::*;
        Some(match self {
            Indel => return None,
            AC => (b'A', b'C'),
            AG => (b'A', b'G'),
            AT => (b'A', b'T'),
            CA => (b'C', b'A'),
            CG => (b'C', b'G'),
            CT => (b'C', b'T'),
            GA => (b'G', b'A'),
            GC => (b'G', b'C'),
            GT => (b'G', b'T'),
            TA => (b'T', b'A'),
            TC => (b'T', b'C'),
            TG => (b'T', b'G'),
        })
    }
}

/// Classify a biallelic `ref`/`alt` pair into a [`VariantKind`].
///
/// Both `ref_allele` and `alt_allele` are single bytes for SNVs; anything
/// else (multi-base, insertion, deletion) is an indel.
pub fn snv_type(ref_allele: &str, alt_allele: &str) -> VariantKind {
    use VariantKind::*;
    if ref_allele.len() != 1 || alt_allele.len() != 1 {
        return Indel;
    }
    let r = ref_allele.as_bytes()[0].to_ascii_uppercase();
    let a = alt_allele.as_bytes()[0].to_ascii_uppercase();
    match (r, a) {
        (b'A', b'C') => AC,
        (b'A', b'G') => AG,
        (b'A', b'T') => AT,
        (b'C', b'A') => CA,
        (b'C', b'G') => CG,
        (b'C', b'T') => CT,
        (b'G', b'A') => GA,
        (b'G', b'C') => GC,
        (b'G', b'T') => GT,
        (b'T', b'A') => TA,
        (b'T', b'C') => TC,
        (b'T', b'G') => TG,
        _ => Indel,
    }
}

/// A single logical allele at a position, prior to catalog insertion:
/// carries the owned ref/alt text so it can be compared and interned.
#[derive(Debug, Clone)]
pub struct Allele {
    pub position: u32,
    pub reference: String,
    pub alternate: String,
}

impl Allele {
    pub fn new(position: u32, reference: impl Into<String>, alternate: impl Into<String>) -> Self {
        Self {
            position,
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }

    pub fn kind(&self) -> VariantKind {
        snv_type(&self.reference, &self.alternate)
    }
}

/// Canonical ordering: `(position, ref, alt)` ascending, matching
/// `allele_cmp` in the reference implementation.
impl PartialEq for Allele {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_key() == other.cmp_key()
    }
}
impl Eq for Allele {}

impl Allele {
    fn cmp_key(&self) -> (u32, &str, &str) {
        (self.position, &self.reference, &self.alternate)
    }
}

impl PartialOrd for Allele {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Allele {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_key().cmp(&other.cmp_key())
    }
}

/// An on-disk variant record: position plus either an SNV code or an
/// offset into the interned indel string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub position: u32,
    pub kind: VariantKind,
    /// Offset of the interned `"REF\tALT"` string; `None` for SNVs.
    pub allele_offset: Option<u64>,
}

impl Variant {
    pub fn snv(position: u32, kind: VariantKind) -> Self {
        debug_assert!(!kind.is_indel());
        Self {
            position,
            kind,
            allele_offset: None,
        }
    }

    pub fn indel(position: u32, allele_offset: u64) -> Self {
        Self {
            position,
            kind: VariantKind::Indel,
            allele_offset: Some(allele_offset),
        }
    }
}
