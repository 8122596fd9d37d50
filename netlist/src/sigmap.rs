use std::collections::HashMap;

use crate::{Module, SigBit, SigSpec};

/// Maps every [`SigBit`] of a module to the representative of its alias class.
///
/// Two bits are aliases when a chain of module connections joins them. If a class contains a
/// constant, the constant is its representative; otherwise the representative is the first bit
/// of the class that was added as the driving side of a connection.
///
/// The map is a snapshot: connections added to the module afterwards are not reflected.
#[derive(Debug, Clone, Default)]
pub struct SigMap {
    parent: HashMap<SigBit, SigBit>,
}

impl SigMap {
    pub fn new(module: &Module) -> Self {
        let mut sigmap = SigMap::default();
        for (lhs, rhs) in module.connections() {
            sigmap.add(lhs, rhs);
        }
        sigmap
    }

    fn find(&mut self, bit: SigBit) -> SigBit {
        let mut root = bit;
        while let Some(&parent) = self.parent.get(&root) {
            root = parent;
        }
        // path compression
        let mut bit = bit;
        while let Some(&parent) = self.parent.get(&bit) {
            if parent == root {
                break;
            }
            self.parent.insert(bit, root);
            bit = parent;
        }
        root
    }

    fn merge(&mut self, lhs: SigBit, rhs: SigBit) {
        let lhs_root = self.find(lhs);
        let rhs_root = self.find(rhs);
        if lhs_root == rhs_root {
            return;
        }
        match (lhs_root.is_const(), rhs_root.is_const()) {
            // two different constants are never merged into one class
            (true, true) => (),
            (true, false) => {
                self.parent.insert(rhs_root, lhs_root);
            }
            _ => {
                self.parent.insert(lhs_root, rhs_root);
            }
        }
    }

    /// Records that `lhs` and `rhs` are aliases of each other.
    pub fn add(&mut self, lhs: &SigSpec, rhs: &SigSpec) {
        assert_eq!(lhs.len(), rhs.len());
        for (lhs_bit, rhs_bit) in lhs.iter().zip(rhs.iter()) {
            self.merge(lhs_bit, rhs_bit);
        }
    }

    pub fn map_bit(&self, bit: SigBit) -> SigBit {
        let mut root = bit;
        while let Some(&parent) = self.parent.get(&root) {
            root = parent;
        }
        root
    }

    pub fn map(&self, sig: &SigSpec) -> SigSpec {
        SigSpec::from_iter(sig.iter().map(|bit| self.map_bit(bit)))
    }
}

#[cfg(test)]
mod test {
    use crate::{Module, SigBit, SigMap};

    #[test]
    fn test_alias_classes() {
        let mut module = Module::new("top");
        let a = module.add_wire("a", 2);
        let b = module.add_wire("b", 2);
        let c = module.add_wire("c", 1);
        let d = module.add_wire("d", 1);
        module.connect(module.wire_sig(b), module.wire_sig(a));
        module.connect(module.wire_sig(c), SigBit::Wire(b, 1));
        module.connect(module.wire_sig(d), SigBit::ONE);
        let sigmap = SigMap::new(&module);
        assert_eq!(sigmap.map_bit(SigBit::Wire(b, 0)), sigmap.map_bit(SigBit::Wire(a, 0)));
        assert_eq!(sigmap.map_bit(SigBit::Wire(c, 0)), sigmap.map_bit(SigBit::Wire(a, 1)));
        assert_ne!(sigmap.map_bit(SigBit::Wire(a, 0)), sigmap.map_bit(SigBit::Wire(a, 1)));
        assert_eq!(sigmap.map_bit(SigBit::Wire(d, 0)), SigBit::ONE);
        assert_eq!(sigmap.map_bit(SigBit::ONE), SigBit::ONE);
    }

    #[test]
    fn test_const_is_representative() {
        let mut module = Module::new("top");
        let a = module.add_wire("a", 1);
        let b = module.add_wire("b", 1);
        module.connect(module.wire_sig(a), module.wire_sig(b));
        module.connect(module.wire_sig(b), SigBit::ZERO);
        let sigmap = SigMap::new(&module);
        assert_eq!(sigmap.map_bit(SigBit::Wire(a, 0)), SigBit::ZERO);
    }
}
