use clkbuf_netlist::{Module, Selection, SigBit, SigMap, SigSpec, Signatures};
use tracing::debug;

use super::insert::{Context, Insertion};
use super::tags::TagTables;

/// Publishes output ports that are now driven by an inserted buffer.
pub(crate) fn retag_outputs(
    module: &Module,
    selection: Option<&Selection>,
    sigmap: &SigMap,
    insertion: &Insertion,
    tags: &mut TagTables,
) {
    for (wire_id, wire) in module.wires() {
        if wire.port_input || !wire.port_output {
            continue;
        }
        if selection.is_some_and(|selection| !selection.selects_wire(module, wire)) {
            continue;
        }
        for index in 0..wire.width {
            if insertion.buffered_bits.contains_key(&sigmap.map_bit(SigBit::Wire(wire_id, index))) {
                tags.register_buffered(module.name(), wire.name(), index);
            }
        }
    }
}

/// Moves the original drivers of buffered nets onto the inputs of the inserted cells.
pub(crate) fn rewire_drivers(module: &mut Module, signatures: &Signatures, sigmap: &SigMap, insertion: &Insertion) {
    for cell_id in module.cell_ids() {
        let cell = module.cell(cell_id);
        let mut updates = Vec::new();
        for (port, sig) in cell.connections() {
            if !signatures.is_output(cell, port) {
                continue;
            }
            let mut new_sig = sig.clone();
            let mut changed = false;
            for bit in new_sig.iter_mut() {
                let Some(&(driver, driver_input)) = insertion.buffered_bits.get(&sigmap.map_bit(*bit)) else {
                    continue;
                };
                // the inserted cell keeps driving the clock net
                if driver == cell_id {
                    continue;
                }
                *bit = SigBit::Wire(driver_input, 0);
                changed = true;
            }
            if changed {
                updates.push((port.to_owned(), new_sig));
            }
        }
        let cell = module.cell_mut(cell_id);
        for (port, sig) in updates {
            cell.set_port(port, sig);
        }
    }
}

/// Hands the names and port roles of replaced input ports over to their clones.
///
/// Must run after [`rewire_drivers`], which relies on the canonical bits computed before
/// the rename.
pub(crate) fn commit_renames(module: &mut Module, insertion: &Insertion) -> usize {
    for &(wire_id, new_wire_id) in &insertion.input_queue {
        module.swap_names(new_wire_id, wire_id);
        let wire = module.wire_mut(wire_id);
        wire.attributes.clear();
        wire.port_id = 0;
        wire.port_input = false;
        wire.port_output = false;
    }
    module.fixup_ports();
    insertion.input_queue.len()
}

/// Reconnects cells that do not take clocks to the renamed input ports directly, instead of
/// the buffered nets the original wires now carry.
///
/// Only connections whose chunk is exactly an original input wire are replaced. Returns the
/// number of cell ports changed.
pub(crate) fn restore_drivers(module: &mut Module, context: &Context, tags: &TagTables, insertion: &Insertion) -> usize {
    if tags.cells_with_sink_ports.is_empty() {
        return 0;
    }
    let replacements: Vec<(SigSpec, SigSpec)> = insertion
        .input_queue
        .iter()
        .map(|&(wire_id, new_wire_id)| (module.wire_sig(wire_id), module.wire_sig(new_wire_id)))
        .collect();
    let buffer_type = context.options.buffer.as_ref().map(|buffer| buffer.cell_type.as_str());
    let mut restored = 0;
    for cell_id in module.cell_ids() {
        let cell = module.cell(cell_id);
        if tags.cells_with_sink_ports.contains(&cell.cell_type) || Some(cell.cell_type.as_str()) == buffer_type {
            continue;
        }
        let mut updates = Vec::new();
        for (port, sig) in cell.connections() {
            if context.signatures.is_output(cell, port) {
                continue;
            }
            let mut new_sig = SigSpec::new();
            for chunk in sig.chunks() {
                match replacements.iter().find(|(original, _)| *original == chunk) {
                    Some((_, replacement)) => new_sig.extend(replacement.iter()),
                    None => new_sig.extend(chunk.iter()),
                }
            }
            if new_sig != *sig {
                debug!(cell = cell.name(), port, "restoring input driver");
                updates.push((port.to_owned(), new_sig));
            }
        }
        restored += updates.len();
        let cell = module.cell_mut(cell_id);
        for (port, sig) in updates {
            cell.set_port(port, sig);
        }
    }
    restored
}
