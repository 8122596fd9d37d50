use std::{
    fmt::{Debug, Display},
    ops::Index,
    str::FromStr,
};

/// A single constant bit value. High impedance is folded into `Undef`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trit {
    Undef = -1,
    Zero = 0,
    One = 1,
}

impl Trit {
    pub fn from_char(chr: char) -> Result<Self, ()> {
        match chr {
            '0' => Ok(Trit::Zero),
            '1' => Ok(Trit::One),
            'x' | 'X' | 'z' | 'Z' | '-' | 'm' => Ok(Trit::Undef),
            _ => Err(()),
        }
    }
}

impl From<bool> for Trit {
    fn from(value: bool) -> Self {
        match value {
            false => Trit::Zero,
            true => Trit::One,
        }
    }
}

impl Debug for Trit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Trit::Undef => write!(f, "Trit::Undef"),
            Trit::Zero => write!(f, "Trit::Zero"),
            Trit::One => write!(f, "Trit::One"),
        }
    }
}

impl Display for Trit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Trit::Undef => write!(f, "x"),
            Trit::Zero => write!(f, "0"),
            Trit::One => write!(f, "1"),
        }
    }
}

/// A constant is a (possibly empty) sequence of [`Trit`]s, least significant first.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Const {
    trits: Vec<Trit>,
}

impl Const {
    pub fn new() -> Self {
        Const { trits: Vec::new() }
    }

    pub fn undef(width: usize) -> Self {
        Const { trits: vec![Trit::Undef; width] }
    }

    pub fn zero(width: usize) -> Self {
        Const { trits: vec![Trit::Zero; width] }
    }

    /// Creates a constant of given width from the low bits of `value`.
    pub fn from_uint(value: u64, width: usize) -> Self {
        Const::from_iter((0..width).map(|index| Trit::from(index < 64 && (value >> index) & 1 == 1)))
    }

    /// Encodes `value` as 8 bits per character, like RTLIL string constants.
    pub fn from_string(value: &str) -> Self {
        Const::from_iter(value.bytes().rev().flat_map(|byte| (0..8).map(move |index| Trit::from((byte >> index) & 1 == 1))))
    }

    pub fn len(&self) -> usize {
        self.trits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trits.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Trit> + ExactSizeIterator + '_ {
        self.trits.iter().copied()
    }

    pub fn push(&mut self, trit: impl Into<Trit>) {
        self.trits.push(trit.into())
    }

    /// Returns `true` if any bit is `1`.
    pub fn as_bool(&self) -> bool {
        self.iter().any(|trit| trit == Trit::One)
    }

    pub fn as_uint(&self) -> Option<u64> {
        let mut result = 0u64;
        for (index, trit) in self.iter().enumerate() {
            match trit {
                Trit::One if index >= 64 => return None,
                Trit::One => result |= 1 << index,
                Trit::Zero => (),
                Trit::Undef => return None,
            }
        }
        Some(result)
    }

    /// Decodes the constant as 8 bits per character, most significant character first.
    pub fn decode_string(&self) -> String {
        let mut bytes = Vec::new();
        for chunk in self.trits.chunks(8) {
            let mut byte = 0u8;
            for (index, trit) in chunk.iter().enumerate() {
                if *trit == Trit::One {
                    byte |= 1 << index;
                }
            }
            if byte != 0 {
                bytes.push(byte);
            }
        }
        bytes.reverse();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Index<usize> for Const {
    type Output = Trit;

    fn index(&self, index: usize) -> &Self::Output {
        &self.trits[index]
    }
}

impl From<Trit> for Const {
    fn from(trit: Trit) -> Self {
        Const { trits: vec![trit] }
    }
}

impl From<bool> for Const {
    fn from(value: bool) -> Self {
        Const::from(Trit::from(value))
    }
}

impl From<Vec<Trit>> for Const {
    fn from(trits: Vec<Trit>) -> Self {
        Const { trits }
    }
}

impl FromIterator<Trit> for Const {
    fn from_iter<T: IntoIterator<Item = Trit>>(iter: T) -> Self {
        Const { trits: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a Const {
    type Item = Trit;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Trit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.trits.iter().copied()
    }
}

/// Parses a string of `0`, `1`, `x` and `z` characters, most significant bit first.
impl FromStr for Const {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut trits = Vec::with_capacity(s.len());
        for chr in s.chars().rev() {
            trits.push(Trit::from_char(chr)?);
        }
        Ok(Const { trits })
    }
}

impl Debug for Const {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Const::from_str(\"{self}\")")
    }
}

/// Most significant bit first, without a width prefix.
impl Display for Const {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for trit in self.trits.iter().rev() {
            write!(f, "{trit}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Const, Trit};

    #[test]
    fn test_from_str() {
        let value: Const = "10x".parse().unwrap();
        assert_eq!(value.iter().collect::<Vec<_>>(), vec![Trit::Undef, Trit::Zero, Trit::One]);
        assert_eq!(value.to_string(), "10x");
        assert!("102".parse::<Const>().is_err());
    }

    #[test]
    fn test_uint() {
        assert_eq!(Const::from_uint(5, 4).to_string(), "0101");
        assert_eq!(Const::from_uint(5, 4).as_uint(), Some(5));
        assert_eq!(Const::undef(2).as_uint(), None);
        assert!(Const::from_uint(1, 32).as_bool());
        assert!(!Const::zero(32).as_bool());
    }

    #[test]
    fn test_string() {
        let value = Const::from_string("I");
        assert_eq!(value.len(), 8);
        assert_eq!(value.to_string(), "01001001");
        assert_eq!(value.decode_string(), "I");
        assert_eq!(Const::from_string("clk_in").decode_string(), "clk_in");
    }
}
