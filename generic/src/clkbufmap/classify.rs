use std::collections::HashSet;

use clkbuf_netlist::{Module, SigBit, SigMap};
use tracing::trace;

use super::tags::TagTables;

/// Canonical bits of a module that need a clock buffer, and bits that already have one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Classification {
    pub sinks: HashSet<SigBit>,
    pub buffered: HashSet<SigBit>,
}

pub(crate) fn classify(module: &Module, sigmap: &SigMap, tags: &mut TagTables) -> Classification {
    let mut classes = Classification::default();
    let mut inverters = Vec::new();
    for (_, cell) in module.cells() {
        for (port, sig) in cell.connections() {
            for (index, bit) in sig.iter().enumerate() {
                if tags.sink_ports.contains(&cell.cell_type, port, index) {
                    tags.cells_with_sink_ports.insert(cell.cell_type.clone());
                    classes.sinks.insert(sigmap.map_bit(bit));
                }
                if tags.buffer_ports.contains(&cell.cell_type, port, index) {
                    classes.buffered.insert(sigmap.map_bit(bit));
                }
                if let Some((input, input_index)) = tags.inv_ports_out.get(&cell.cell_type, port, index)
                    && let Some(input_bit) = cell.port(input).and_then(|sig| sig.iter().nth(*input_index))
                {
                    tags.cells_with_sink_ports.insert(cell.cell_type.clone());
                    inverters.push((sigmap.map_bit(bit), sigmap.map_bit(input_bit)));
                }
            }
        }
    }
    propagate_inverters(&mut classes, &inverters);
    classes
}

/// Moves buffering obligations through inverter pairs, given as (output, input) bits.
///
/// An inverter whose input is buffered has a buffered output. Otherwise an inverter output that
/// needs a buffer is treated as buffered, and its input needs one instead. Both sets only grow,
/// so the iteration ends once a sweep over all pairs changes nothing.
fn propagate_inverters(classes: &mut Classification, inverters: &[(SigBit, SigBit)]) {
    loop {
        let mut changed = false;
        for &(output, input) in inverters {
            if classes.buffered.contains(&input) && classes.buffered.insert(output) {
                changed = true;
            }
            if classes.sinks.contains(&output) && !classes.buffered.contains(&output) {
                trace!(?output, ?input, "moving sink through inverter");
                classes.buffered.insert(output);
                classes.sinks.insert(input);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use clkbuf_netlist::{Design, SigBit, SigMap};

    use super::classify;
    use crate::clkbufmap::tags::TagTables;

    const LIBRARY: &str = concat!(
        "attribute \\blackbox 1\n",
        "module \\DFF\n",
        "  attribute \\clkbuf_sink 1\n",
        "  wire input 1 \\C\n",
        "  wire input 2 \\D\n",
        "  wire output 3 \\Q\n",
        "end\n",
        "attribute \\blackbox 1\n",
        "module \\INV\n",
        "  attribute \\clkbuf_inv \"I\"\n",
        "  wire output 1 \\O\n",
        "  wire input 2 \\I\n",
        "end\n",
        "attribute \\blackbox 1\n",
        "module \\BUFG\n",
        "  attribute \\clkbuf_driver 1\n",
        "  wire output 1 \\O\n",
        "  wire input 2 \\I\n",
        "end\n",
    );

    fn tags(design: &Design) -> TagTables {
        let mut tags = TagTables::new();
        for module in design.modules().filter(|module| module.is_blackbox()) {
            tags.register_blackbox(module);
        }
        tags
    }

    #[test]
    fn test_inverter_moves_sink() {
        let design = Design::from_str(&format!(
            "{LIBRARY}{}",
            concat!(
                "module \\top\n",
                "  wire input 1 \\clk\n",
                "  wire \\clk_n\n",
                "  wire \\alias\n",
                "  cell \\INV \\inv\n",
                "    connect \\I \\clk\n",
                "    connect \\O \\clk_n\n",
                "  end\n",
                "  cell \\DFF \\ff\n",
                "    connect \\C \\alias\n",
                "  end\n",
                "  connect \\alias \\clk_n\n",
                "end\n",
            )
        ))
        .unwrap();
        let mut tags = tags(&design);
        let top = design.module("top").unwrap();
        let sigmap = SigMap::new(top);
        let classes = classify(top, &sigmap, &mut tags);
        let clk = sigmap.map_bit(SigBit::Wire(top.find_wire("clk").unwrap(), 0));
        let clk_n = sigmap.map_bit(SigBit::Wire(top.find_wire("clk_n").unwrap(), 0));
        assert!(classes.sinks.contains(&clk));
        assert!(classes.sinks.contains(&clk_n));
        assert!(classes.buffered.contains(&clk_n));
        assert!(!classes.buffered.contains(&clk));
        assert!(tags.cells_with_sink_ports.contains("DFF"));
        assert!(tags.cells_with_sink_ports.contains("INV"));
    }

    #[test]
    fn test_buffered_input_passes_through_inverter() {
        let design = Design::from_str(&format!(
            "{LIBRARY}{}",
            concat!(
                "module \\top\n",
                "  wire input 1 \\clk\n",
                "  wire \\clk_g\n",
                "  wire \\clk_n\n",
                "  cell \\BUFG \\buf\n",
                "    connect \\I \\clk\n",
                "    connect \\O \\clk_g\n",
                "  end\n",
                "  cell \\INV \\inv\n",
                "    connect \\I \\clk_g\n",
                "    connect \\O \\clk_n\n",
                "  end\n",
                "  cell \\DFF \\ff\n",
                "    connect \\C \\clk_n\n",
                "  end\n",
                "end\n",
            )
        ))
        .unwrap();
        let mut tags = tags(&design);
        let top = design.module("top").unwrap();
        let sigmap = SigMap::new(top);
        let classes = classify(top, &sigmap, &mut tags);
        let clk_g = SigBit::Wire(top.find_wire("clk_g").unwrap(), 0);
        let clk_n = SigBit::Wire(top.find_wire("clk_n").unwrap(), 0);
        assert!(classes.buffered.contains(&clk_g));
        assert!(classes.buffered.contains(&clk_n));
        assert!(!classes.sinks.contains(&clk_g));
    }

    #[test]
    fn test_idempotent() {
        let design = Design::from_str(&format!(
            "{LIBRARY}{}",
            concat!(
                "module \\top\n",
                "  wire input 1 \\clk\n",
                "  wire \\clk_n\n",
                "  cell \\INV \\inv\n",
                "    connect \\I \\clk\n",
                "    connect \\O \\clk_n\n",
                "  end\n",
                "  cell \\DFF \\ff\n",
                "    connect \\C \\clk_n\n",
                "  end\n",
                "end\n",
            )
        ))
        .unwrap();
        let mut tags = tags(&design);
        let top = design.module("top").unwrap();
        let sigmap = SigMap::new(top);
        let first = classify(top, &sigmap, &mut tags);
        let second = classify(top, &sigmap, &mut tags);
        assert_eq!(first, second);
    }
}
