//! Word-aligned hybrid (WAH) compressed bitmaps.
//!
//! Each 64-bit word is either a *literal* (top bit set, low 63 bits are a
//! raw bitmap fragment) or a *fill* (top bit clear, low 63 bits hold a
//! run-length of all-zero 63-bit fragments). Genomic presence bitmaps are
//! overwhelmingly zero, so only zero-fills exist; there is no one-fill
//! encoding.
//!
//! Bitmaps are built strictly append-only: `set_bit` requires a
//! monotonically increasing index, matching how a k-way merge over sorted
//! variant positions produces them.

use crate::error::{Result, TdbError};

const GROUP_BITS: u32 = 63;
const LITERAL_MASK: u64 = (1u64 << 63) - 1;
const TAG_BIT: u64 = 1u64 << 63;

#[inline]
fn is_literal(word: u64) -> bool {
    word & TAG_BIT != 0
}

#[inline]
fn literal_bits(word: u64) -> u64 {
    word & LITERAL_MASK
}

#[inline]
fn fill_count(word: u64) -> u64 {
    word & LITERAL_MASK
}

#[inline]
fn make_literal(bits: u64) -> u64 {
    TAG_BIT | (bits & LITERAL_MASK)
}

#[inline]
fn make_fill(count: u64) -> u64 {
    count & LITERAL_MASK
}

/// An owned, growable WAH bitmap.
#[derive(Debug, Clone, Default)]
pub struct Bitmap {
    words: Vec<u64>,
    len: u64,
    pending: u64,
    pending_count: u32,
}

impl Bitmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits represented so far (the highest appended index + 1).
    pub fn bit_len(&self) -> u64 {
        self.len
    }

    /// Append a single bit at the end of the bitmap.
    pub fn append_bit(&mut self, bit: bool) {
        if bit {
            self.pending |= 1u64 << self.pending_count;
        }
        self.pending_count += 1;
        self.len += 1;
        if self.pending_count == GROUP_BITS {
            self.flush_group(self.pending);
        }
    }

    /// Set the bit at `index`, appending zero bits for any gap. `index`
    /// must be strictly greater than every index set before it.
    pub fn set_bit(&mut self, index: u64) -> Result<()> {
        if index < self.len {
            return Err(TdbError::BadAllelePosition(format!(
                "bit index {index} is not greater than current length {}",
                self.len
            )));
        }
        while self.len < index {
            self.append_bit(false);
        }
        self.append_bit(true);
        Ok(())
    }

    fn flush_group(&mut self, pattern: u64) {
        self.push_group(pattern);
        self.pending = 0;
        self.pending_count = 0;
    }

    fn push_group(&mut self, pattern: u64) {
        if pattern == 0 {
            if let Some(last) = self.words.last_mut() {
                if !is_literal(*last) {
                    *last = make_fill(fill_count(*last) + 1);
                    return;
                }
            }
            self.words.push(make_fill(1));
        } else {
            self.words.push(make_literal(pattern));
        }
    }

    /// Materialize the compressed words as if the current partial group
    /// had been flushed, without mutating internal state.
    fn effective_words(&self) -> Vec<u64> {
        let mut words = self.words.clone();
        if self.pending_count > 0 {
            words.push(make_literal(self.pending));
        }
        words
    }

    /// Number of set bits.
    pub fn weight(&self) -> u64 {
        self.effective_words()
            .iter()
            .filter(|w| is_literal(**w))
            .map(|w| literal_bits(*w).count_ones() as u64)
            .sum()
    }

    /// Read the bit at `index` (`false` beyond the end of the bitmap).
    pub fn get_bit(&self, index: u64) -> bool {
        if index >= self.len {
            return false;
        }
        let group = index / GROUP_BITS as u64;
        let offset = (index % GROUP_BITS as u64) as u32;
        let words = self.effective_words();
        let pattern = group_pattern_at(&words, group);
        pattern & (1u64 << offset) != 0
    }

    /// Indices of all set bits, in ascending order.
    pub fn set_indices(&self) -> Vec<u64> {
        let words = self.effective_words();
        let mut out = Vec::new();
        let mut group = 0u64;
        for &word in &words {
            if is_literal(word) {
                let bits = literal_bits(word);
                for offset in 0..GROUP_BITS {
                    if bits & (1u64 << offset) != 0 {
                        out.push(group * GROUP_BITS as u64 + offset as u64);
                    }
                }
                group += 1;
            } else {
                group += fill_count(word).max(1);
            }
        }
        out.retain(|&i| i < self.len);
        out
    }

    /// Drop any interior representation that no longer affects queries;
    /// a no-op here since fills already coalesce eagerly on append.
    pub fn shrinkwrap(&mut self) {
        self.words.shrink_to_fit();
    }

    pub fn view(&self, start: u64, end: u64) -> BitmapView<'_> {
        BitmapView::new(&self.words, self.pending_bits_as_extra(), self.len, start, end)
    }

    /// The flushed compressed words, for persistence. Includes a trailing
    /// literal for any not-yet-flushed partial group.
    pub fn words(&self) -> Vec<u64> {
        self.effective_words()
    }

    /// Rebuild a bitmap from previously persisted words and bit length.
    /// The result only supports reads; further `append_bit`/`set_bit`
    /// calls would start a fresh partial group past `len`, which is safe
    /// but unusual for a bitmap loaded back from storage.
    pub fn from_persisted(words: Vec<u64>, len: u64) -> Self {
        Self {
            words,
            len,
            pending: 0,
            pending_count: 0,
        }
    }

    fn pending_bits_as_extra(&self) -> Option<u64> {
        if self.pending_count > 0 {
            Some(self.pending)
        } else {
            None
        }
    }
}

/// Number of 63-bit groups needed to cover `bits` logical bits.
fn groups_for(bits: u64) -> u64 {
    if bits == 0 {
        0
    } else {
        (bits + GROUP_BITS as u64 - 1) / GROUP_BITS as u64
    }
}

/// One WAH-encoded run of logical groups, as surfaced by [`RunCursor`].
/// A zero-fill spanning many groups is always a single `Fill(n)`, never
/// `n` individual groups — this is what lets a combinator skip a shared
/// zero-fill run in O(1) regardless of how long it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run {
    Literal(u64),
    Fill(u64),
}

/// Walks a WAH word list's logical groups as a run sequence, starting at
/// an arbitrary group offset and masking the first/last group of a
/// sub-range in O(1). Owns its word list (already the compact compressed
/// form, cheap to clone) rather than borrowing, so it carries no lifetime.
pub struct RunCursor {
    words: Vec<u64>,
    word_idx: usize,
    fill_remaining: u64,
    groups_left: u64,
    position: u64,
    total_groups: u64,
    /// `(bits to clear below this offset in the first group, bits to keep
    /// in the last group)`; `None` for a whole, unmasked bitmap.
    mask: Option<(u32, u32)>,
}

impl RunCursor {
    fn new(words: Vec<u64>, start_group: u64, total_groups: u64, mask: Option<(u32, u32)>) -> Self {
        let mut cursor = Self {
            words,
            word_idx: 0,
            fill_remaining: 0,
            groups_left: 0,
            position: 0,
            total_groups,
            mask,
        };
        cursor.skip(start_group);
        cursor.groups_left = total_groups;
        cursor
    }

    fn empty() -> Self {
        Self::new(Vec::new(), 0, 0, None)
    }

    /// The run at the current word position, ignoring any group budget.
    fn raw_peek(&mut self) -> Option<Run> {
        while self.word_idx < self.words.len() {
            let w = self.words[self.word_idx];
            if is_literal(w) {
                return Some(Run::Literal(literal_bits(w)));
            }
            if self.fill_remaining == 0 {
                self.fill_remaining = fill_count(w).max(1);
            }
            if self.fill_remaining > 0 {
                return Some(Run::Fill(self.fill_remaining));
            }
            self.word_idx += 1;
        }
        None
    }

    /// Consume `n` groups from the word currently at `raw_peek()`.
    fn raw_advance(&mut self, n: u64) {
        if n == 0 || self.word_idx >= self.words.len() {
            return;
        }
        if is_literal(self.words[self.word_idx]) {
            debug_assert_eq!(n, 1);
            self.word_idx += 1;
        } else {
            self.fill_remaining -= n;
            if self.fill_remaining == 0 {
                self.word_idx += 1;
            }
        }
    }

    /// Advance past `n` groups in one step per encountered run, used once
    /// up front to reach a view's starting group.
    fn skip(&mut self, mut n: u64) {
        while n > 0 {
            match self.raw_peek() {
                Some(Run::Literal(_)) => {
                    self.raw_advance(1);
                    n -= 1;
                }
                Some(Run::Fill(available)) => {
                    let take = available.min(n);
                    self.raw_advance(take);
                    n -= take;
                }
                None => break,
            }
        }
    }

    /// Peek the run at the cursor's logical position, bounded and masked
    /// to this handle's own range. `None` once every group has been
    /// produced.
    fn peek(&mut self) -> Option<Run> {
        if self.groups_left == 0 {
            return None;
        }
        let run = match self.raw_peek() {
            Some(Run::Literal(bits)) => Run::Literal(bits),
            Some(Run::Fill(available)) => Run::Fill(available.min(self.groups_left)),
            None => Run::Fill(self.groups_left),
        };
        Some(self.apply_mask(run))
    }

    /// Consume `n` groups from the run just returned by `peek()`.
    fn advance(&mut self, n: u64) {
        self.raw_advance(n);
        self.groups_left -= n;
        self.position += n;
    }

    fn apply_mask(&self, run: Run) -> Run {
        let Run::Literal(bits) = run else { return run };
        let Some((start_offset, end_keep)) = self.mask else {
            return run;
        };
        let mut b = bits;
        if self.position == 0 && start_offset != 0 {
            b &= !0u64 << start_offset & LITERAL_MASK;
        }
        if self.position + 1 == self.total_groups && end_keep != GROUP_BITS {
            b &= (1u64 << end_keep) - 1;
        }
        Run::Literal(b)
    }
}

/// Walks two `RunCursor`s in lockstep. Each step reports `(a, b, n)`:
/// `n` groups were advanced together, and a side is `None` exactly when
/// its contribution for those `n` groups is an (explicit or implicit)
/// all-zero fill — which lets a run shared by both sides, however long,
/// advance in a single step.
struct RunZip<'c> {
    a: &'c mut RunCursor,
    b: &'c mut RunCursor,
    total_groups: u64,
    done: u64,
}

impl<'c> RunZip<'c> {
    fn new(a: &'c mut RunCursor, b: &'c mut RunCursor, total_groups: u64) -> Self {
        Self { a, b, total_groups, done: 0 }
    }

    fn next_step(&mut self) -> Option<(Option<u64>, Option<u64>, u64)> {
        if self.done >= self.total_groups {
            return None;
        }
        let remaining = self.total_groups - self.done;
        let ra = self.a.peek();
        let rb = self.b.peek();
        let (va, na) = match ra {
            Some(Run::Literal(p)) => (Some(p), 1),
            Some(Run::Fill(n)) => (None, n),
            None => (None, remaining),
        };
        let (vb, nb) = match rb {
            Some(Run::Literal(p)) => (Some(p), 1),
            Some(Run::Fill(n)) => (None, n),
            None => (None, remaining),
        };
        let n = if va.is_none() && vb.is_none() {
            na.min(nb).min(remaining)
        } else {
            1
        };
        if ra.is_some() {
            self.a.advance(n);
        }
        if rb.is_some() {
            self.b.advance(n);
        }
        self.done += n;
        Some((va, vb, n))
    }
}

/// Shared read-only behavior for owned bitmaps and borrowed region views.
pub trait BitmapLike {
    /// Number of logical bits this handle covers.
    fn bit_len(&self) -> u64;
    /// A run-length cursor over this handle's groups, rebased so group 0
    /// starts at its own bit 0.
    fn run_cursor(&self) -> RunCursor;

    fn weight(&self) -> u64 {
        let mut cur = self.run_cursor();
        let mut total = 0u64;
        while let Some(run) = cur.peek() {
            let n = match run {
                Run::Literal(bits) => {
                    total += bits.count_ones() as u64;
                    1
                }
                Run::Fill(n) => n,
            };
            cur.advance(n);
        }
        total
    }
}

impl BitmapLike for Bitmap {
    fn bit_len(&self) -> u64 {
        self.len
    }

    fn run_cursor(&self) -> RunCursor {
        RunCursor::new(self.effective_words(), 0, groups_for(self.len), None)
    }
}

/// A zero-copy view onto a sub-range of a bitmap's bits, sharing the same
/// group alignment as its parent (valid only when compared against other
/// handles over the same chromosome, where every bitmap has equal length).
pub struct BitmapView<'a> {
    words: &'a [u64],
    /// The parent's not-yet-flushed trailing partial group, if any.
    extra: Option<u64>,
    parent_len: u64,
    start: u64,
    end: u64,
}

impl<'a> BitmapView<'a> {
    fn new(words: &'a [u64], extra: Option<u64>, parent_len: u64, start: u64, end: u64) -> Self {
        let end = end.min(parent_len);
        let start = start.min(end);
        Self {
            words,
            extra,
            parent_len,
            start,
            end,
        }
    }

    fn full_words(&self) -> Vec<u64> {
        let mut v = self.words.to_vec();
        if let Some(extra) = self.extra {
            v.push(make_literal(extra));
        }
        v
    }
}

impl BitmapLike for BitmapView<'_> {
    fn bit_len(&self) -> u64 {
        self.end - self.start
    }

    fn run_cursor(&self) -> RunCursor {
        if self.start >= self.end {
            return RunCursor::empty();
        }
        let start_group = self.start / GROUP_BITS as u64;
        let end_group = (self.end - 1) / GROUP_BITS as u64;
        let total_groups = end_group - start_group + 1;
        let start_offset = (self.start % GROUP_BITS as u64) as u32;
        let last_bit_in_last_group = ((self.end - 1) % GROUP_BITS as u64) as u32;
        let end_keep = last_bit_in_last_group + 1;
        let _ = self.parent_len;
        RunCursor::new(self.full_words(), start_group, total_groups, Some((start_offset, end_keep)))
    }
}

fn group_pattern_at(words: &[u64], target_group: u64) -> u64 {
    let mut group = 0u64;
    for &word in words {
        if is_literal(word) {
            if group == target_group {
                return literal_bits(word);
            }
            group += 1;
        } else {
            let run = fill_count(word).max(1);
            if target_group < group + run {
                return 0;
            }
            group += run;
        }
    }
    0
}

/// Append `n` all-zero groups in one step, merging into a trailing fill
/// word instead of pushing `n` zero literals.
impl Bitmap {
    fn push_fill_groups(&mut self, n: u64) {
        if n == 0 {
            return;
        }
        if let Some(last) = self.words.last_mut() {
            if !is_literal(*last) {
                *last = make_fill(fill_count(*last) + n);
                return;
            }
        }
        self.words.push(make_fill(n));
    }
}

/// Combine two bitmaps group-by-group via `op`, walking both as run
/// sequences so a zero-fill shared by both sides — however many groups it
/// spans — costs one step, not one step per group.
fn combine<A: BitmapLike, B: BitmapLike>(a: &A, b: &B, op: impl Fn(u64, u64) -> u64) -> Bitmap {
    let mut ca = a.run_cursor();
    let mut cb = b.run_cursor();
    let total_bits = a.bit_len().max(b.bit_len());
    let mut zip = RunZip::new(&mut ca, &mut cb, groups_for(total_bits));
    let mut out = Bitmap::new();
    while let Some((va, vb, n)) = zip.next_step() {
        match (va, vb) {
            (None, None) => out.push_fill_groups(n),
            (Some(x), None) => out.push_group(op(x, 0) & LITERAL_MASK),
            (None, Some(y)) => out.push_group(op(0, y) & LITERAL_MASK),
            (Some(x), Some(y)) => out.push_group(op(x, y) & LITERAL_MASK),
        }
    }
    out.len = total_bits;
    out
}

/// Copy any `BitmapLike` into a freshly owned [`Bitmap`].
pub fn to_owned<B: BitmapLike>(b: &B) -> Bitmap {
    union(b, &Bitmap::new())
}

/// Bitwise union (A ∪ B).
pub fn union<A: BitmapLike, B: BitmapLike>(a: &A, b: &B) -> Bitmap {
    combine(a, b, |x, y| x | y)
}

/// Bitwise intersection (A ∩ B).
pub fn intersect<A: BitmapLike, B: BitmapLike>(a: &A, b: &B) -> Bitmap {
    combine(a, b, |x, y| x & y)
}

/// Set difference (A \ B).
pub fn difference<A: BitmapLike, B: BitmapLike>(a: &A, b: &B) -> Bitmap {
    combine(a, b, |x, y| x & !y)
}

/// Symmetric difference (A △ B).
pub fn symmetric_difference<A: BitmapLike, B: BitmapLike>(a: &A, b: &B) -> Bitmap {
    combine(a, b, |x, y| x ^ y)
}

/// Hamming distance: popcount of the symmetric difference, computed
/// without materializing the intermediate bitmap. A zero-fill shared by
/// both sides contributes nothing regardless of its length, so it is
/// skipped in one step rather than popcounted group by group.
pub fn hamming_distance<A: BitmapLike, B: BitmapLike>(a: &A, b: &B) -> u64 {
    let mut ca = a.run_cursor();
    let mut cb = b.run_cursor();
    let total_bits = a.bit_len().max(b.bit_len());
    let mut zip = RunZip::new(&mut ca, &mut cb, groups_for(total_bits));
    let mut total = 0u64;
    while let Some((va, vb, _n)) = zip.next_step() {
        total += (va.unwrap_or(0) ^ vb.unwrap_or(0)).count_ones() as u64;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_weight() {
        let mut b = Bitmap::new();
        for i in 0..200u64 {
            b.append_bit(i % 7 == 0);
        }
        let expected = (0..200u64).filter(|i| i % 7 == 0).count() as u64;
        assert_eq!(b.weight(), expected);
    }

    #[test]
    fn set_bit_requires_monotonic_index() {
        let mut b = Bitmap::new();
        b.set_bit(5).unwrap();
        b.set_bit(10).unwrap();
        assert!(b.set_bit(3).is_err());
        assert!(b.get_bit(5));
        assert!(b.get_bit(10));
        assert!(!b.get_bit(6));
    }

    #[test]
    fn long_zero_run_compresses_to_a_fill_word() {
        let mut b = Bitmap::new();
        b.set_bit(10_000).unwrap();
        assert!(b.words.len() < 20);
        assert_eq!(b.weight(), 1);
    }

    #[test]
    fn set_indices_round_trips() {
        let mut b = Bitmap::new();
        let idxs = [0u64, 5, 63, 64, 200, 201, 5000];
        for &i in &idxs {
            b.set_bit(i).unwrap();
        }
        assert_eq!(b.set_indices(), idxs);
    }

    #[test]
    fn union_intersect_difference() {
        let mut a = Bitmap::new();
        let mut b = Bitmap::new();
        for &i in &[1u64, 2, 3, 100] {
            a.set_bit(i).unwrap();
        }
        for &i in &[2u64, 3, 4, 100] {
            b.set_bit(i).unwrap();
        }
        assert_eq!(union(&a, &b).set_indices(), vec![1, 2, 3, 4, 100]);
        assert_eq!(intersect(&a, &b).set_indices(), vec![2, 3, 100]);
        assert_eq!(difference(&a, &b).set_indices(), vec![1]);
        assert_eq!(symmetric_difference(&a, &b).set_indices(), vec![1, 4]);
    }

    #[test]
    fn hamming_distance_matches_symmetric_difference_weight() {
        let mut a = Bitmap::new();
        let mut b = Bitmap::new();
        for &i in &[1u64, 70, 200] {
            a.set_bit(i).unwrap();
        }
        for &i in &[70u64, 201] {
            b.set_bit(i).unwrap();
        }
        assert_eq!(hamming_distance(&a, &b), symmetric_difference(&a, &b).weight());
    }

    #[test]
    fn combine_and_distance_cross_a_large_shared_fill_run() {
        let mut a = Bitmap::new();
        let mut b = Bitmap::new();
        a.set_bit(5).unwrap();
        b.set_bit(5).unwrap();
        a.set_bit(5_000_000).unwrap();
        b.set_bit(5_000_001).unwrap();
        assert_eq!(union(&a, &b).set_indices(), vec![5, 5_000_000, 5_000_001]);
        assert_eq!(intersect(&a, &b).set_indices(), vec![5]);
        assert_eq!(hamming_distance(&a, &b), 2);
    }

    #[test]
    fn view_masks_boundary_groups() {
        let mut a = Bitmap::new();
        for &i in &[0u64, 10, 62, 63, 64, 150] {
            a.set_bit(i).unwrap();
        }
        let view = a.view(10, 65);
        assert_eq!(view.bit_len(), 55);
        let mut full = Bitmap::new();
        for i in 10..65u64 {
            full.append_bit(a.get_bit(i));
        }
        assert_eq!(view.weight(), full.weight());
    }
}
