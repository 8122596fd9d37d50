use std::collections::{BTreeMap, BTreeSet};

use clkbuf_netlist::{Module, names};
use tracing::trace;

use super::BufferSpec;

/// A map keyed by (cell type, port name, bit index).
#[derive(Debug, Clone)]
pub(crate) struct PortBitMap<V> {
    cell_types: BTreeMap<String, BTreeMap<String, BTreeMap<usize, V>>>,
}

impl<V> Default for PortBitMap<V> {
    fn default() -> Self {
        PortBitMap { cell_types: BTreeMap::new() }
    }
}

impl<V> PortBitMap<V> {
    pub fn insert(&mut self, cell_type: &str, port: &str, bit: usize, value: V) {
        self.cell_types
            .entry(cell_type.to_owned())
            .or_default()
            .entry(port.to_owned())
            .or_default()
            .insert(bit, value);
    }

    pub fn get(&self, cell_type: &str, port: &str, bit: usize) -> Option<&V> {
        self.cell_types.get(cell_type)?.get(port)?.get(&bit)
    }

    pub fn contains(&self, cell_type: &str, port: &str, bit: usize) -> bool {
        self.get(cell_type, port, bit).is_some()
    }
}

pub(crate) type PortBitSet = PortBitMap<()>;

/// The other side of an inverter pair: a port name and bit index on the same cell.
pub(crate) type PortBit = (String, usize);

/// Classification of cell port bits, accumulated over one run of the pass.
///
/// Entries come from attributes on black-box module ports, from the configured buffer cell types,
/// and from concrete modules publishing the state of their own ports to their instantiators.
#[derive(Debug, Clone, Default)]
pub(crate) struct TagTables {
    pub sink_ports: PortBitSet,
    pub buffer_ports: PortBitSet,
    /// Inverter output bit to its input bit.
    pub inv_ports_out: PortBitMap<PortBit>,
    /// Inverter input bit to its output bit.
    pub inv_ports_in: PortBitMap<PortBit>,
    /// Cell types on a clock path in any module processed so far: types with a sink port
    /// connected, and inverters.
    pub cells_with_sink_ports: BTreeSet<String>,
}

impl TagTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_blackbox(&mut self, module: &Module) {
        for &port in module.ports() {
            let wire = module.wire(port);
            if wire.get_bool_attribute(names::CLKBUF_DRIVER) {
                for bit in 0..wire.width {
                    self.buffer_ports.insert(module.name(), wire.name(), bit, ());
                }
            }
            if wire.get_bool_attribute(names::CLKBUF_SINK) {
                for bit in 0..wire.width {
                    self.sink_ports.insert(module.name(), wire.name(), bit, ());
                }
            }
            if let Some(value) = wire.attributes.get(names::CLKBUF_INV) {
                let input = value.decode_string();
                for bit in 0..wire.width {
                    self.inv_ports_out.insert(module.name(), wire.name(), bit, (input.clone(), bit));
                    self.inv_ports_in.insert(module.name(), &input, bit, (wire.name().to_owned(), bit));
                }
                trace!(module = module.name(), output = wire.name(), input = %input, "inverter pair");
            }
        }
    }

    /// Marks the output of a buffer cell that the pass itself places as driven by a clock buffer.
    pub fn register_user_buffer_type(&mut self, buffer: &BufferSpec) {
        self.buffer_ports.insert(&buffer.cell_type, &buffer.output, 0, ());
    }

    /// Publishes a port bit of `module` that must be fed by a clock buffer at the call site.
    pub fn register_sink(&mut self, module: &str, port: &str, bit: usize) {
        trace!(module, port, bit, "sink port");
        self.sink_ports.insert(module, port, bit, ());
    }

    /// Publishes a port bit of `module` that is already driven by a clock buffer.
    pub fn register_buffered(&mut self, module: &str, port: &str, bit: usize) {
        self.buffer_ports.insert(module, port, bit, ());
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use clkbuf_netlist::Design;

    use super::TagTables;
    use crate::clkbufmap::BufferSpec;

    #[test]
    fn test_register_blackbox() {
        let design = Design::from_str(concat!(
            "attribute \\blackbox 1\n",
            "module \\CLKINV\n",
            "  attribute \\clkbuf_inv \"I\"\n",
            "  wire width 2 output 1 \\O\n",
            "  wire width 2 input 2 \\I\n",
            "end\n",
            "attribute \\blackbox 1\n",
            "module \\DFF\n",
            "  attribute \\clkbuf_sink 1\n",
            "  wire input 1 \\C\n",
            "  wire input 2 \\D\n",
            "  wire output 3 \\Q\n",
            "end\n",
        ))
        .unwrap();
        let mut tags = TagTables::new();
        for module in design.modules() {
            tags.register_blackbox(module);
        }
        assert!(tags.sink_ports.contains("DFF", "C", 0));
        assert!(!tags.sink_ports.contains("DFF", "D", 0));
        assert_eq!(tags.inv_ports_out.get("CLKINV", "O", 1), Some(&("I".to_owned(), 1)));
        assert_eq!(tags.inv_ports_in.get("CLKINV", "I", 0), Some(&("O".to_owned(), 0)));
        assert!(tags.inv_ports_in.get("CLKINV", "O", 0).is_none());
    }

    #[test]
    fn test_register_user_buffer_type() {
        let mut tags = TagTables::new();
        tags.register_user_buffer_type(&BufferSpec::parse("BUFG", "O:I").unwrap());
        assert!(tags.buffer_ports.contains("BUFG", "O", 0));
        assert!(!tags.buffer_ports.contains("BUFG", "I", 0));
        tags.register_sink("sub", "clk", 1);
        assert!(tags.sink_ports.contains("sub", "clk", 1));
        assert!(!tags.sink_ports.contains("sub", "clk", 0));
    }
}
