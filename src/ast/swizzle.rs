//! Vector swizzles (`.x`, `.zyx`, `.rgba` etc.), as lists of component indices.

use arrayvec::ArrayVec;
use std::fmt;

/// Component letters for each swizzle naming set, indexed by component.
static COMPONENT_SETS: [[u8; 4]; 3] = [*b"xyzw", *b"rgba", *b"stpq"];

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Swizzle {
    components: ArrayVec<u32, 4>,
}

impl Swizzle {
    /// Builds a swizzle from component indices (`1..=4` of them, each `< 4`).
    pub fn new(components: &[u32]) -> Option<Self> {
        if components.is_empty() || components.iter().any(|&c| c >= 4) {
            return None;
        }
        Some(Self { components: ArrayVec::try_from(components).ok()? })
    }

    /// Parses e.g. `"xy"` or `"bgr"` (mixing naming sets is not allowed).
    pub fn parse(s: &str) -> Option<Self> {
        let set = COMPONENT_SETS
            .iter()
            .find(|set| s.bytes().next().map_or(false, |b| set.contains(&b)))?;

        let components: Vec<u32> = s
            .bytes()
            .map(|b| set.iter().position(|&c| c == b).map(|i| i as u32))
            .collect::<Option<_>>()?;
        Self::new(&components)
    }

    pub fn components(&self) -> &[u32] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_single(&self) -> bool {
        self.components.len() == 1
    }

    /// Applies `self` on top of the result of `inner`, e.g. `v.zyx.xy` is
    /// `v.zy`.
    pub fn compose(&self, inner: &Swizzle) -> Option<Swizzle> {
        let components: Vec<u32> = self
            .components
            .iter()
            .map(|&c| inner.components.get(c as usize).copied())
            .collect::<Option<_>>()?;
        Self::new(&components)
    }

    /// `OpVectorShuffle` indices for writing a `self.len()`-component value
    /// (the second shuffle operand) into the lanes named by `self`, of a
    /// `size`-component vector (the first shuffle operand).
    pub fn write_mask_indices(&self, size: u32) -> ArrayVec<u32, 4> {
        let mut indices: ArrayVec<u32, 4> = (0..size.min(4)).collect();
        for (i, &c) in self.components.iter().enumerate() {
            if let Some(index) = indices.get_mut(c as usize) {
                *index = size + i as u32;
            }
        }
        indices
    }
}

impl fmt::Debug for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: String =
            self.components.iter().map(|&c| char::from(COMPONENT_SETS[0][c as usize])).collect();
        write!(f, ".{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_set_names_every_component() {
        for set in &COMPONENT_SETS {
            for (i, &c) in set.iter().enumerate() {
                let s = char::from(c).to_string();
                assert_eq!(Swizzle::parse(&s).unwrap().components(), [i as u32]);
            }
        }
    }

    #[test]
    fn parse_rejects_mixed_and_long() {
        assert!(Swizzle::parse("xg").is_none());
        assert!(Swizzle::parse("xyzwx").is_none());
        assert!(Swizzle::parse("").is_none());
        assert_eq!(Swizzle::parse("bgra").unwrap().components(), [2, 1, 0, 3]);
    }

    #[test]
    fn compose_and_write_mask() {
        let zyx = Swizzle::parse("zyx").unwrap();
        let xy = Swizzle::parse("xy").unwrap();
        assert_eq!(xy.compose(&zyx).unwrap().components(), [2, 1]);
        assert!(Swizzle::parse("w").unwrap().compose(&zyx).is_none());

        assert_eq!(&xy.write_mask_indices(4)[..], [4, 5, 2, 3]);
        assert_eq!(&Swizzle::parse("zx").unwrap().write_mask_indices(3)[..], [4, 1, 3]);
    }
}
