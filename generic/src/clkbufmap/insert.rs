use std::collections::{HashMap, HashSet};

use clkbuf_netlist::{CellId, Module, PortDirection, SigBit, SigMap, Signatures, WireId, names};
use tracing::{info, warn};

use super::classify::Classification;
use super::tags::TagTables;
use super::{BufferSpec, ClkbufmapOptions, ClkbufmapStats};

pub(crate) struct Context<'a> {
    pub options: &'a ClkbufmapOptions,
    pub signatures: &'a Signatures,
    pub buffer_inputs: bool,
}

/// Cells and wires added to one module.
#[derive(Debug, Default)]
pub(crate) struct Insertion {
    /// Canonical clock bit to the cell now driving it and the wire feeding that cell,
    /// which the original driver is moved onto.
    pub buffered_bits: HashMap<SigBit, (CellId, WireId)>,
    /// Input ports to be replaced: the original wire and its clone.
    pub input_queue: Vec<(WireId, WireId)>,
}

/// Bits driven by an output port of a cell, as connected (not canonicalized).
fn driven_bits(module: &Module, context: &Context) -> HashSet<SigBit> {
    let mut driven = HashSet::new();
    for (_, cell) in module.cells() {
        if context.options.exempt_drivers.contains(&cell.cell_type) {
            continue;
        }
        for (port, sig) in cell.connections() {
            if context.signatures.is_output(cell, port) {
                driven.extend(sig.iter());
            }
        }
    }
    driven
}

fn generated_clock_bits(module: &Module, context: &Context, driven: &HashSet<SigBit>) -> HashSet<SigBit> {
    let mut generated = HashSet::new();
    let Some(rule) = &context.options.generated_clock else { return generated };
    let mut input_buffer_bits = HashSet::new();
    if let Some((cell_type, output)) = &rule.input_buffer {
        for (_, cell) in module.cells().filter(|(_, cell)| cell.cell_type == *cell_type) {
            if let Some(sig) = cell.port(output) {
                input_buffer_bits.extend(sig.iter());
            }
        }
    }
    for (_, cell) in module.cells().filter(|(_, cell)| cell.cell_type == rule.cell_type) {
        if !context.signatures.is_input(cell, &rule.clock_port) {
            continue;
        }
        let Some(sig) = cell.port(&rule.clock_port) else { continue };
        for bit in sig.iter() {
            if driven.contains(&bit) && !input_buffer_bits.contains(&bit) && generated.insert(bit) {
                warn!(module = module.name(), "{} is a generated clock", module.display_bit(bit));
            }
        }
    }
    generated
}

/// Adds a cell of `cell_type` with the ports of `spec`, driving `output` from a new wire.
fn add_buffer(module: &mut Module, cell_type: &str, spec: &BufferSpec, output: SigBit) -> (CellId, WireId) {
    let name = module.fresh_name("$clkbufmap");
    let cell_id = module.add_cell(name, cell_type);
    let name = module.fresh_name("$clkbufmap");
    let wire = module.add_wire(name, 1);
    let cell = module.cell_mut(cell_id);
    cell.set_port(&spec.output, output);
    cell.set_port(&spec.input, SigBit::Wire(wire, 0));
    cell.port_directions.insert(spec.output.clone(), PortDirection::Output);
    cell.port_directions.insert(spec.input.clone(), PortDirection::Input);
    (cell_id, wire)
}

pub(crate) fn insert_buffers(
    module: &mut Module,
    context: &Context,
    sigmap: &SigMap,
    classes: &Classification,
    tags: &mut TagTables,
    stats: &mut ClkbufmapStats,
) -> Insertion {
    let options = context.options;
    let driven = driven_bits(module, context);
    let generated = generated_clock_bits(module, context, &driven);
    stats.generated_clocks += generated.len();

    let is_top = module.is_top();
    let mut insertion = Insertion::default();
    // the wire list grows while buffers are inserted
    for wire_id in module.wire_ids() {
        let wire = module.wire(wire_id).clone();
        if wire.port_input && wire.port_output {
            continue;
        }
        let process = match &options.selection {
            Some(selection) => selection.selects_wire(module, &wire),
            None => !wire.get_bool_attribute(names::CLKBUF_INHIBIT),
        };
        if !process {
            // keep buffers higher up in the hierarchy off this output
            if wire.port_output {
                for index in 0..wire.width {
                    tags.register_buffered(module.name(), wire.name(), index);
                }
            }
            continue;
        }

        let mut input_bits = Vec::new();
        for index in 0..wire.width {
            let bit = SigBit::Wire(wire_id, index);
            let mapped = sigmap.map_bit(bit);
            if classes.buffered.contains(&mapped) {
                if wire.port_output {
                    tags.register_buffered(module.name(), wire.name(), index);
                }
            } else if !classes.sinks.contains(&mapped) {
                continue;
            } else if driven.contains(&bit) || (wire.port_input && is_top) {
                let is_pad = wire.port_input && is_top && options.inpad.is_some();
                let mut driver = None;
                if let Some(buffer) = &options.buffer
                    && (!is_pad || context.buffer_inputs)
                    && !wire.port_output
                {
                    let cell_type = match &options.generated_clock {
                        Some(rule) if generated.contains(&bit) => &rule.buffer_type,
                        _ => &buffer.cell_type,
                    };
                    info!("inserting {cell_type} on {}.{}[{index}]", module.name(), wire.name());
                    driver = Some(add_buffer(module, cell_type, buffer, mapped));
                    stats.buffers += 1;
                }
                if is_pad && let Some(inpad) = &options.inpad {
                    info!("inserting {} on {}.{}[{index}]", inpad.cell_type, module.name(), wire.name());
                    let output = match driver {
                        Some((_, buffer_input)) => SigBit::Wire(buffer_input, 0),
                        None => mapped,
                    };
                    let (pad, pad_input) = add_buffer(module, &inpad.cell_type, inpad, output);
                    driver = Some((driver.map_or(pad, |(buffer, _)| buffer), pad_input));
                    stats.pads += 1;
                }
                if let Some(driver) = driver {
                    insertion.buffered_bits.insert(mapped, driver);
                }
                if wire.port_input {
                    input_bits.push(index);
                }
            } else if wire.port_input {
                // resolved by the instantiating module
                tags.register_sink(module.name(), wire.name(), index);
            }
        }

        if !input_bits.is_empty() {
            let name = module.fresh_name("$clkbufmap");
            let new_wire = module.add_wire_like(name, wire_id);
            for index in 0..wire.width {
                let new_bit = SigBit::Wire(new_wire, index);
                match insertion.buffered_bits.get(&sigmap.map_bit(SigBit::Wire(wire_id, index))) {
                    Some(&(_, driver_input)) => module.connect(SigBit::Wire(driver_input, 0), new_bit),
                    None => module.connect(SigBit::Wire(wire_id, index), new_bit),
                }
            }
            insertion.input_queue.push((wire_id, new_wire));
        }
    }
    insertion
}
