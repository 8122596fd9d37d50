use std::{
    borrow::Cow,
    fmt::Debug,
    hash::Hash,
    ops::{Index, IndexMut},
    slice::SliceIndex,
};

use crate::{Const, Trit, WireId};

/// A signal bit is either a constant or a reference to a single bit of a [`Wire`].
///
/// [`Wire`]: crate::Wire
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SigBit {
    Const(Trit),
    Wire(WireId, usize),
}

impl SigBit {
    pub const UNDEF: SigBit = SigBit::Const(Trit::Undef);
    pub const ZERO: SigBit = SigBit::Const(Trit::Zero);
    pub const ONE: SigBit = SigBit::Const(Trit::One);

    pub fn as_const(self) -> Option<Trit> {
        match self {
            SigBit::Const(trit) => Some(trit),
            SigBit::Wire(..) => None,
        }
    }

    pub fn as_wire(self) -> Option<(WireId, usize)> {
        match self {
            SigBit::Const(_) => None,
            SigBit::Wire(wire, offset) => Some((wire, offset)),
        }
    }

    pub fn wire(self) -> Option<WireId> {
        self.as_wire().map(|(wire, _)| wire)
    }

    pub fn is_const(self) -> bool {
        self.as_const().is_some()
    }

    pub fn repeat(self, count: usize) -> SigSpec {
        SigSpec::from_iter(std::iter::repeat_n(self, count))
    }

    /// Returns `true` if `next` is the bit immediately following `self` within the same chunk.
    fn continues_with(self, next: SigBit) -> bool {
        match (self, next) {
            (SigBit::Const(_), SigBit::Const(_)) => true,
            (SigBit::Wire(wire, offset), SigBit::Wire(next_wire, next_offset)) => {
                wire == next_wire && offset + 1 == next_offset
            }
            _ => false,
        }
    }
}

impl From<bool> for SigBit {
    fn from(value: bool) -> Self {
        SigBit::Const(value.into())
    }
}

impl From<Trit> for SigBit {
    fn from(value: Trit) -> Self {
        SigBit::Const(value)
    }
}

impl From<&SigBit> for SigBit {
    fn from(bit: &SigBit) -> Self {
        *bit
    }
}

impl TryFrom<SigSpec> for SigBit {
    type Error = ();

    fn try_from(sig: SigSpec) -> Result<Self, Self::Error> {
        sig.as_bit().ok_or(())
    }
}

impl Debug for SigBit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SigBit::Const(trit) => write!(f, "SigBit::Const({trit:?})"),
            SigBit::Wire(wire, offset) => write!(f, "SigBit::Wire({wire:?}, {offset})"),
        }
    }
}

#[derive(Clone)]
enum SigRepr {
    None,
    Some(SigBit),
    Many(Vec<SigBit>),
}

impl SigRepr {
    fn as_slice(&self) -> &[SigBit] {
        match self {
            SigRepr::None => &[],
            SigRepr::Some(bit) => std::slice::from_ref(bit),
            SigRepr::Many(bits) => bits.as_slice(),
        }
    }

    fn as_slice_mut(&mut self) -> &mut [SigBit] {
        match self {
            SigRepr::None => &mut [],
            SigRepr::Some(bit) => std::slice::from_mut(bit),
            SigRepr::Many(bits) => bits.as_mut_slice(),
        }
    }

    fn push(&mut self, new_bit: SigBit) {
        match self {
            SigRepr::None => *self = SigRepr::Some(new_bit),
            SigRepr::Some(bit) => *self = SigRepr::Many(vec![*bit, new_bit]),
            SigRepr::Many(bits) => {
                bits.push(new_bit);
            }
        }
    }
}

impl PartialEq for SigRepr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SigRepr::Some(lft), SigRepr::Some(rgt)) => lft.eq(rgt),
            _ => self.as_slice().eq(other.as_slice()),
        }
    }
}

impl Eq for SigRepr {}

impl PartialOrd for SigRepr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SigRepr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (SigRepr::Some(lft), SigRepr::Some(rgt)) => lft.cmp(rgt),
            _ => self.as_slice().cmp(other.as_slice()),
        }
    }
}

impl Hash for SigRepr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

/// A signal is a (possibly empty) sequence of [`SigBit`]s, least significant first.
///
/// Signals do not carry wire names; use [`Module::display_sig`] to print one.
///
/// [`Module::display_sig`]: crate::Module::display_sig
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SigSpec(SigRepr);

impl SigSpec {
    /// Creates an empty signal.
    pub fn new() -> Self {
        SigSpec(SigRepr::None)
    }

    /// Creates an all-`X` signal of given width.
    pub fn undef(width: usize) -> Self {
        SigBit::UNDEF.repeat(width)
    }

    /// Creates a reference to all `width` bits of `wire` in their natural order.
    pub fn from_wire(wire: WireId, width: usize) -> Self {
        SigSpec::from_iter((0..width).map(|offset| SigBit::Wire(wire, offset)))
    }

    pub fn len(&self) -> usize {
        self.0.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_slice().is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = SigBit> + ExactSizeIterator + '_ {
        self.0.as_slice().iter().copied()
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut SigBit> + ExactSizeIterator + '_ {
        self.0.as_slice_mut().iter_mut()
    }

    pub fn push(&mut self, new_bit: impl Into<SigBit>) {
        self.0.push(new_bit.into())
    }

    pub fn as_const(&self) -> Option<Const> {
        let bits = self.0.as_slice();
        if bits.iter().all(|bit| bit.is_const()) {
            Some(Const::from_iter(bits.iter().filter_map(|bit| bit.as_const())))
        } else {
            None
        }
    }

    pub fn as_bit(&self) -> Option<SigBit> {
        if self.len() == 1 { Some(self[0]) } else { None }
    }

    /// Returns the wire if this signal refers to every bit of it, in order.
    pub fn as_whole_wire(&self, width: usize) -> Option<WireId> {
        let wire = self.iter().next()?.wire()?;
        if *self == SigSpec::from_wire(wire, width) { Some(wire) } else { None }
    }

    pub fn concat<'a>(&self, other: impl Into<Cow<'a, SigSpec>>) -> Self {
        SigSpec::from_iter(self.iter().chain(other.into().iter()))
    }

    pub fn slice(&self, range: impl std::ops::RangeBounds<usize>) -> SigSpec {
        SigSpec::from(&self[(range.start_bound().cloned(), range.end_bound().cloned())])
    }

    /// Splits the signal into maximal runs of consecutive bits of one wire, or of constants.
    pub fn chunks(&self) -> Vec<SigSpec> {
        let mut chunks: Vec<SigSpec> = Vec::new();
        for bit in self.iter() {
            match chunks.last_mut() {
                Some(chunk) if chunk[chunk.len() - 1].continues_with(bit) => chunk.push(bit),
                _ => chunks.push(SigSpec::from(bit)),
            }
        }
        chunks
    }
}

impl Default for SigSpec {
    fn default() -> Self {
        SigSpec::new()
    }
}

impl Debug for SigSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "SigSpec::from_iter([")?;
        for (index, bit) in self.iter().enumerate() {
            if index != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{bit:?}")?;
        }
        write!(f, "])")?;
        Ok(())
    }
}

impl<I: SliceIndex<[SigBit]>> Index<I> for SigSpec {
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.0.as_slice()[index]
    }
}

impl<I: SliceIndex<[SigBit]>> IndexMut<I> for SigSpec {
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        &mut self.0.as_slice_mut()[index]
    }
}

impl Extend<SigBit> for SigSpec {
    fn extend<T: IntoIterator<Item = SigBit>>(&mut self, iter: T) {
        for bit in iter {
            self.push(bit);
        }
    }
}

impl From<&SigSpec> for SigSpec {
    fn from(sig: &SigSpec) -> Self {
        sig.clone()
    }
}

impl From<SigBit> for SigSpec {
    fn from(bit: SigBit) -> Self {
        SigSpec(SigRepr::Some(bit))
    }
}

impl From<&SigBit> for SigSpec {
    fn from(bit: &SigBit) -> Self {
        SigSpec::from(*bit)
    }
}

impl From<Trit> for SigSpec {
    fn from(trit: Trit) -> Self {
        SigSpec(SigRepr::Some(trit.into()))
    }
}

impl From<&[SigBit]> for SigSpec {
    fn from(bits: &[SigBit]) -> Self {
        SigSpec::from_iter(bits.iter().cloned())
    }
}

impl From<Vec<SigBit>> for SigSpec {
    fn from(bits: Vec<SigBit>) -> Self {
        SigSpec::from(&bits[..])
    }
}

impl From<&Const> for SigSpec {
    fn from(value: &Const) -> Self {
        SigSpec::from_iter(value.into_iter().map(SigBit::from))
    }
}

impl From<Const> for SigSpec {
    fn from(value: Const) -> Self {
        SigSpec::from(&value)
    }
}

impl From<SigSpec> for Cow<'_, SigSpec> {
    fn from(sig: SigSpec) -> Self {
        Cow::Owned(sig)
    }
}

impl From<SigBit> for Cow<'_, SigSpec> {
    fn from(bit: SigBit) -> Self {
        Cow::Owned(SigSpec::from(bit))
    }
}

impl<'a> From<&'a SigSpec> for Cow<'a, SigSpec> {
    fn from(sig: &'a SigSpec) -> Self {
        Cow::Borrowed(sig)
    }
}

impl FromIterator<SigBit> for SigSpec {
    fn from_iter<T: IntoIterator<Item = SigBit>>(iter: T) -> Self {
        let mut iter = iter.into_iter();
        match iter.size_hint() {
            (_, Some(0 | 1)) => {
                let mut sig = match iter.next() {
                    None => SigSpec::new(),
                    Some(bit) => SigSpec::from(bit),
                };
                for bit in iter {
                    sig.push(bit);
                }
                sig
            }
            _ => SigSpec(SigRepr::Many(iter.collect())),
        }
    }
}

impl<'a> IntoIterator for &'a SigSpec {
    type Item = SigBit;
    type IntoIter = std::iter::Cloned<std::slice::Iter<'a, SigBit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.as_slice().iter().cloned()
    }
}

pub struct SigSpecIntoIter {
    repr: SigRepr,
    index: usize,
}

impl Iterator for SigSpecIntoIter {
    type Item = SigBit;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.repr.as_slice().get(self.index).cloned();
        if item.is_some() {
            self.index += 1;
        }
        item
    }
}

impl IntoIterator for SigSpec {
    type Item = SigBit;
    type IntoIter = SigSpecIntoIter;

    fn into_iter(self) -> Self::IntoIter {
        SigSpecIntoIter { repr: self.0, index: 0 }
    }
}

#[cfg(test)]
mod test {
    use crate::{SigBit, SigSpec, Trit, WireId};

    #[test]
    fn test_from_trit() {
        assert_eq!(SigBit::from(Trit::Zero), SigBit::ZERO);
        assert_eq!(SigBit::from(true), SigBit::ONE);
        assert_eq!(SigSpec::undef(2).as_const().unwrap().to_string(), "xx");
    }

    #[test]
    fn test_chunks() {
        let a = WireId::from_index(0);
        let b = WireId::from_index(1);
        let sig = SigSpec::from_iter([
            SigBit::Wire(a, 0),
            SigBit::Wire(a, 1),
            SigBit::Wire(b, 0),
            SigBit::Wire(a, 3),
            SigBit::ZERO,
            SigBit::ONE,
        ]);
        let chunks = sig.chunks();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], SigSpec::from_wire(a, 2));
        assert_eq!(chunks[0].as_whole_wire(2), Some(a));
        assert_eq!(chunks[1], SigSpec::from(SigBit::Wire(b, 0)));
        assert_eq!(chunks[2].as_whole_wire(4), None);
        assert_eq!(chunks[3].as_const().unwrap().to_string(), "10");
        assert!(SigSpec::new().chunks().is_empty());
    }

    #[test]
    fn test_slice_concat() {
        let a = WireId::from_index(0);
        let sig = SigSpec::from_wire(a, 4);
        assert_eq!(sig.slice(1..3), SigSpec::from_iter([SigBit::Wire(a, 1), SigBit::Wire(a, 2)]));
        assert_eq!(sig.slice(..2).concat(sig.slice(2..)), sig);
        assert_eq!(sig.clone().into_iter().count(), 4);
    }
}
