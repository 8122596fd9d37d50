use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

use indexmap::IndexMap;

use crate::attr::{self, names};
use crate::{AttrValue, Attributes, SigBit, SigSpec};

macro_rules! arena_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            pub fn from_index(index: usize) -> Self {
                assert!(index < u32::MAX as usize);
                $name(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(WireId, "wire#");
arena_id!(CellId, "cell#");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PortDirection {
    Input,
    Output,
    Inout,
}

impl PortDirection {
    pub fn is_output(self) -> bool {
        matches!(self, PortDirection::Output | PortDirection::Inout)
    }

    pub fn is_input(self) -> bool {
        matches!(self, PortDirection::Input | PortDirection::Inout)
    }
}

/// A named bit vector in a [`Module`]; may be a port.
#[derive(Debug, Clone)]
pub struct Wire {
    name: String,
    pub width: usize,
    /// Index of bit 0 in source text.
    pub start_offset: i64,
    /// Source text indices run from the most significant bit upwards.
    pub upto: bool,
    pub is_signed: bool,
    pub port_input: bool,
    pub port_output: bool,
    /// Position in the port list, starting at 1; 0 for internal wires.
    pub port_id: usize,
    pub attributes: Attributes,
}

impl Wire {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_port(&self) -> bool {
        self.port_input || self.port_output
    }

    pub fn direction(&self) -> Option<PortDirection> {
        match (self.port_input, self.port_output) {
            (false, false) => None,
            (true, false) => Some(PortDirection::Input),
            (false, true) => Some(PortDirection::Output),
            (true, true) => Some(PortDirection::Inout),
        }
    }

    pub fn get_bool_attribute(&self, name: &str) -> bool {
        attr::get_bool(&self.attributes, name)
    }

    /// Returns the index that refers to bit `position` in source text.
    pub fn to_hdl_index(&self, position: usize) -> i64 {
        let position = position as i64;
        if self.upto { self.start_offset + self.width as i64 - 1 - position } else { self.start_offset + position }
    }

    /// Returns the bit position referred to by a source text index, if the wire has one.
    pub fn from_hdl_index(&self, index: i64) -> Option<usize> {
        let position =
            if self.upto { self.start_offset + self.width as i64 - 1 - index } else { index - self.start_offset };
        usize::try_from(position).ok().filter(|&position| position < self.width)
    }
}

/// An instance of a cell type, which is either a primitive or another module of the design.
#[derive(Debug, Clone)]
pub struct Cell {
    name: String,
    pub cell_type: String,
    pub parameters: BTreeMap<String, AttrValue>,
    pub attributes: Attributes,
    connections: IndexMap<String, SigSpec>,
    /// Port directions recorded alongside the instance, for types that are not modules of the design.
    pub port_directions: BTreeMap<String, PortDirection>,
}

impl Cell {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self, name: &str) -> Option<&SigSpec> {
        self.connections.get(name)
    }

    pub fn set_port(&mut self, name: impl Into<String>, sig: impl Into<SigSpec>) {
        self.connections.insert(name.into(), sig.into());
    }

    pub fn connections(&self) -> impl Iterator<Item = (&str, &SigSpec)> + '_ {
        self.connections.iter().map(|(name, sig)| (name.as_str(), sig))
    }

    pub fn port_direction(&self, name: &str) -> Option<PortDirection> {
        self.port_directions.get(name).copied()
    }
}

/// A module is a container of wires and cells, connected by [`SigSpec`]s that refer to wires.
///
/// Wires and cells live in arenas; their ids stay valid for the lifetime of the module,
/// including while new wires and cells are being added.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    pub attributes: Attributes,
    wires: Vec<Wire>,
    wire_names: IndexMap<String, WireId>,
    cells: Vec<Cell>,
    cell_names: IndexMap<String, CellId>,
    connections: Vec<(SigSpec, SigSpec)>,
    ports: Vec<WireId>,
    next_autoidx: usize,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            attributes: Attributes::new(),
            wires: Vec::new(),
            wire_names: IndexMap::new(),
            cells: Vec::new(),
            cell_names: IndexMap::new(),
            connections: Vec::new(),
            ports: Vec::new(),
            next_autoidx: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_bool_attribute(&self, name: &str) -> bool {
        attr::get_bool(&self.attributes, name)
    }

    pub fn is_blackbox(&self) -> bool {
        self.get_bool_attribute(names::BLACKBOX) || self.get_bool_attribute(names::WHITEBOX)
    }

    pub fn is_top(&self) -> bool {
        self.get_bool_attribute(names::TOP)
    }

    /// Returns a name that is not used by any wire or cell of this module.
    pub fn fresh_name(&mut self, prefix: &str) -> String {
        loop {
            let name = format!("{prefix}${}", self.next_autoidx);
            self.next_autoidx += 1;
            if !self.wire_names.contains_key(&name) && !self.cell_names.contains_key(&name) {
                return name;
            }
        }
    }

    pub fn add_wire(&mut self, name: impl Into<String>, width: usize) -> WireId {
        let name = name.into();
        assert!(!self.wire_names.contains_key(&name), "duplicate wire {name:?} in module {:?}", self.name);
        let id = WireId::from_index(self.wires.len());
        self.wire_names.insert(name.clone(), id);
        self.wires.push(Wire {
            name,
            width,
            start_offset: 0,
            upto: false,
            is_signed: false,
            port_input: false,
            port_output: false,
            port_id: 0,
            attributes: Attributes::new(),
        });
        id
    }

    /// Adds a wire with the shape, port role and attributes of `template`.
    pub fn add_wire_like(&mut self, name: impl Into<String>, template: WireId) -> WireId {
        let template = self.wires[template.index()].clone();
        let id = self.add_wire(name, template.width);
        let wire = &mut self.wires[id.index()];
        wire.start_offset = template.start_offset;
        wire.upto = template.upto;
        wire.is_signed = template.is_signed;
        wire.port_input = template.port_input;
        wire.port_output = template.port_output;
        wire.port_id = template.port_id;
        wire.attributes = template.attributes;
        id
    }

    pub fn wire(&self, id: WireId) -> &Wire {
        &self.wires[id.index()]
    }

    pub fn wire_mut(&mut self, id: WireId) -> &mut Wire {
        &mut self.wires[id.index()]
    }

    pub fn find_wire(&self, name: &str) -> Option<WireId> {
        self.wire_names.get(name).copied()
    }

    /// Returns a snapshot of the current wire ids, in creation order.
    pub fn wire_ids(&self) -> Vec<WireId> {
        (0..self.wires.len()).map(WireId::from_index).collect()
    }

    pub fn wires(&self) -> impl Iterator<Item = (WireId, &Wire)> + '_ {
        self.wires.iter().enumerate().map(|(index, wire)| (WireId::from_index(index), wire))
    }

    /// Returns all bits of a wire as a signal.
    pub fn wire_sig(&self, id: WireId) -> SigSpec {
        SigSpec::from_wire(id, self.wire(id).width)
    }

    pub fn add_cell(&mut self, name: impl Into<String>, cell_type: impl Into<String>) -> CellId {
        let name = name.into();
        assert!(!self.cell_names.contains_key(&name), "duplicate cell {name:?} in module {:?}", self.name);
        let id = CellId::from_index(self.cells.len());
        self.cell_names.insert(name.clone(), id);
        self.cells.push(Cell {
            name,
            cell_type: cell_type.into(),
            parameters: BTreeMap::new(),
            attributes: Attributes::new(),
            connections: IndexMap::new(),
            port_directions: BTreeMap::new(),
        });
        id
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.index()]
    }

    pub fn find_cell(&self, name: &str) -> Option<CellId> {
        self.cell_names.get(name).copied()
    }

    pub fn cell_ids(&self) -> Vec<CellId> {
        (0..self.cells.len()).map(CellId::from_index).collect()
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> + '_ {
        self.cells.iter().enumerate().map(|(index, cell)| (CellId::from_index(index), cell))
    }

    /// Connects `lhs` to be driven by `rhs`; the two signals become aliases of each other.
    pub fn connect(&mut self, lhs: impl Into<SigSpec>, rhs: impl Into<SigSpec>) {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        assert_eq!(lhs.len(), rhs.len(), "connection width mismatch in module {:?}", self.name);
        self.connections.push((lhs, rhs));
    }

    pub fn connections(&self) -> &[(SigSpec, SigSpec)] {
        &self.connections
    }

    /// Exchanges the names of two wires, leaving everything else in place.
    pub fn swap_names(&mut self, a: WireId, b: WireId) {
        if a == b {
            return;
        }
        let name_a = std::mem::take(&mut self.wires[a.index()].name);
        let name_b = std::mem::replace(&mut self.wires[b.index()].name, name_a.clone());
        self.wires[a.index()].name = name_b.clone();
        self.wire_names.insert(name_a, b);
        self.wire_names.insert(name_b, a);
    }

    /// Port wires, ordered by port position.
    pub fn ports(&self) -> &[WireId] {
        &self.ports
    }

    /// Recomputes the port list from the port flags of the wires.
    ///
    /// Ports keep their relative order; wires that became ports without a position are
    /// appended in name order. Positions are renumbered from 1.
    pub fn fixup_ports(&mut self) {
        let mut ports: Vec<WireId> = self.wire_ids().into_iter().filter(|&id| self.wire(id).is_port()).collect();
        ports.sort_by(|&a, &b| {
            let (wire_a, wire_b) = (self.wire(a), self.wire(b));
            let key_a = (wire_a.port_id == 0, wire_a.port_id, wire_a.name());
            let key_b = (wire_b.port_id == 0, wire_b.port_id, wire_b.name());
            key_a.cmp(&key_b)
        });
        for (index, &id) in ports.iter().enumerate() {
            self.wires[id.index()].port_id = index + 1;
        }
        for wire in self.wires.iter_mut().filter(|wire| !wire.is_port()) {
            wire.port_id = 0;
        }
        self.ports = ports;
    }

    pub fn display_bit(&self, bit: SigBit) -> SigDisplay<'_> {
        SigDisplay { module: self, sig: SigSpec::from(bit) }
    }

    pub fn display_sig(&self, sig: &SigSpec) -> SigDisplay<'_> {
        SigDisplay { module: self, sig: sig.clone() }
    }
}

/// Prints a signal in RTLIL syntax, resolving wire names through its module.
pub struct SigDisplay<'a> {
    module: &'a Module,
    sig: SigSpec,
}

impl Display for SigDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chunks = self.sig.chunks();
        if chunks.len() != 1 {
            write!(f, "{{")?;
            for chunk in chunks.iter().rev() {
                write!(f, " ")?;
                self.fmt_chunk(f, chunk)?;
            }
            return write!(f, " }}");
        }
        self.fmt_chunk(f, &chunks[0])
    }
}

impl SigDisplay<'_> {
    fn fmt_chunk(&self, f: &mut std::fmt::Formatter<'_>, chunk: &SigSpec) -> std::fmt::Result {
        match chunk[0] {
            SigBit::Const(_) => {
                let value = chunk.as_const().unwrap_or_default();
                write!(f, "{}'{value}", value.len())
            }
            SigBit::Wire(id, offset) => {
                let wire = self.module.wire(id);
                crate::print::write_id(f, wire.name())?;
                if chunk.len() == wire.width {
                    Ok(())
                } else if chunk.len() == 1 {
                    write!(f, " [{}]", wire.to_hdl_index(offset))
                } else {
                    write!(f, " [{}:{}]", wire.to_hdl_index(offset + chunk.len() - 1), wire.to_hdl_index(offset))
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{Module, SigBit, SigSpec};

    #[test]
    fn test_swap_names() {
        let mut module = Module::new("top");
        let a = module.add_wire("a", 1);
        let b = module.add_wire("b", 1);
        module.swap_names(a, b);
        assert_eq!(module.wire(a).name(), "b");
        assert_eq!(module.wire(b).name(), "a");
        assert_eq!(module.find_wire("a"), Some(b));
        assert_eq!(module.find_wire("b"), Some(a));
    }

    #[test]
    fn test_fixup_ports() {
        let mut module = Module::new("top");
        let y = module.add_wire("y", 1);
        let a = module.add_wire("a", 1);
        let z = module.add_wire("z", 1);
        module.wire_mut(a).port_input = true;
        module.wire_mut(a).port_id = 1;
        module.wire_mut(y).port_output = true;
        module.wire_mut(z).port_output = true;
        module.wire_mut(z).port_id = 2;
        module.fixup_ports();
        assert_eq!(module.ports(), &[a, z, y]);
        assert_eq!(module.wire(y).port_id, 3);
        module.wire_mut(a).port_input = false;
        module.fixup_ports();
        assert_eq!(module.ports(), &[z, y]);
        assert_eq!(module.wire(a).port_id, 0);
        assert_eq!(module.wire(z).port_id, 1);
    }

    #[test]
    fn test_fresh_name() {
        let mut module = Module::new("top");
        module.add_wire("$auto$1", 1);
        assert_eq!(module.fresh_name("$auto"), "$auto$2");
        assert_eq!(module.fresh_name("$auto"), "$auto$3");
    }

    #[test]
    fn test_display_sig() {
        let mut module = Module::new("top");
        let a = module.add_wire("a", 4);
        let b = module.add_wire("$b", 1);
        assert_eq!(module.display_sig(&module.wire_sig(a)).to_string(), "\\a");
        assert_eq!(module.display_bit(SigBit::Wire(a, 2)).to_string(), "\\a [2]");
        let sig = SigSpec::from_iter([SigBit::Wire(a, 0), SigBit::Wire(a, 1), SigBit::Wire(b, 0), SigBit::ONE]);
        assert_eq!(module.display_sig(&sig).to_string(), "{ 1'1 $b \\a [1:0] }");
    }

    #[test]
    fn test_hdl_index() {
        let mut module = Module::new("top");
        let a = module.add_wire("a", 4);
        module.wire_mut(a).start_offset = 8;
        assert_eq!(module.wire(a).to_hdl_index(0), 8);
        assert_eq!(module.wire(a).from_hdl_index(11), Some(3));
        assert_eq!(module.wire(a).from_hdl_index(12), None);
        assert_eq!(module.wire(a).from_hdl_index(7), None);
        assert_eq!(module.display_bit(SigBit::Wire(a, 1)).to_string(), "\\a [9]");

        let b = module.add_wire("b", 4);
        module.wire_mut(b).upto = true;
        assert_eq!(module.wire(b).to_hdl_index(0), 3);
        assert_eq!(module.wire(b).from_hdl_index(0), Some(3));
        let sig = SigSpec::from_iter([SigBit::Wire(b, 1), SigBit::Wire(b, 2)]);
        assert_eq!(module.display_sig(&sig).to_string(), "\\b [1:2]");

        let c = module.add_wire_like("c", b);
        assert!(module.wire(c).upto);
    }
}
