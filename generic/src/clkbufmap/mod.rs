//! Clock buffer insertion.
//!
//! Nets that feed clock sink ports (ports of black-box cells marked with `clkbuf_sink`) are routed
//! through a clock buffer cell, and clocks entering the top module through an input port can
//! additionally be routed through a pad cell. Ports of concrete modules that need a buffer but
//! are not driven inside the module are published as sinks, so that the buffer is inserted at
//! the call site instead.

use std::collections::BTreeSet;
use std::fmt::Display;

use clkbuf_netlist::{Design, Selection, SigMap, names};
use tracing::{debug, info_span};

mod tags;
mod schedule;
mod classify;
mod insert;
mod retag;

use tags::TagTables;

/// A cell type together with its output and input port names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSpec {
    pub cell_type: String,
    pub output: String,
    pub input: String,
}

impl BufferSpec {
    pub fn new(cell_type: impl Into<String>, output: impl Into<String>, input: impl Into<String>) -> Self {
        BufferSpec { cell_type: cell_type.into(), output: output.into(), input: input.into() }
    }

    /// Parses a port pair written as `<output>[:<input>]`. A single name is used for both ports.
    pub fn parse(cell_type: &str, ports: &str) -> Result<Self, ClkbufmapError> {
        let (output, input) = ports.split_once(':').unwrap_or((ports, ports));
        if cell_type.is_empty() || output.is_empty() || input.is_empty() {
            return Err(ClkbufmapError::InvalidBuffer(format!("{cell_type} {ports}")));
        }
        Ok(BufferSpec::new(cell_type, output, input))
    }
}

/// Detection of clocks generated by logic inside a module.
///
/// A clock port bit of `cell_type` that is driven by a cell, other than the output of
/// `input_buffer`, is a generated clock and is buffered with `buffer_type` instead of the
/// regular buffer cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedClockRule {
    pub cell_type: String,
    pub clock_port: String,
    /// Cell type and output port of the input buffer primitive.
    pub input_buffer: Option<(String, String)>,
    pub buffer_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClkbufmapOptions {
    pub buffer: Option<BufferSpec>,
    pub inpad: Option<BufferSpec>,
    /// Wires eligible for buffering. Without a selection, every wire lacking
    /// the `clkbuf_inhibit` attribute is eligible.
    pub selection: Option<Selection>,
    /// Cell types whose outputs are never considered to drive a clock net.
    pub exempt_drivers: BTreeSet<String>,
    pub generated_clock: Option<GeneratedClockRule>,
}

impl ClkbufmapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(mut self, buffer: BufferSpec) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn with_inpad(mut self, inpad: BufferSpec) -> Self {
        self.inpad = Some(inpad);
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_exempt_driver(mut self, cell_type: impl Into<String>) -> Self {
        self.exempt_drivers.insert(cell_type.into());
        self
    }

    pub fn with_generated_clock(mut self, rule: GeneratedClockRule) -> Self {
        self.generated_clock = Some(rule);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClkbufmapError {
    /// Neither a buffer nor a pad cell type was configured.
    NoCellType,
    InvalidBuffer(String),
}

impl Display for ClkbufmapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClkbufmapError::NoCellType => write!(f, "either a buffer or an input pad cell type is required"),
            ClkbufmapError::InvalidBuffer(spec) => write!(f, "invalid buffer cell specification `{spec}`"),
        }
    }
}

impl std::error::Error for ClkbufmapError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClkbufmapStats {
    /// Buffer cells inserted, including generated-clock buffers.
    pub buffers: usize,
    pub pads: usize,
    pub generated_clocks: usize,
    pub renamed_ports: usize,
    pub restored_ports: usize,
}

impl Display for ClkbufmapStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buffers, {} pads, {} generated clocks, {} renamed ports, {} restored ports",
            self.buffers, self.pads, self.generated_clocks, self.renamed_ports, self.restored_ports
        )
    }
}

/// Returns `false` if the pad cell drives a clock buffer by itself, in which case top-level clock
/// inputs get only the pad cell.
fn buffer_inputs(design: &Design, options: &ClkbufmapOptions) -> bool {
    let Some(inpad) = &options.inpad else { return true };
    let Some(module) = design.module(&inpad.cell_type) else { return true };
    !module.ports().iter().any(|&port| module.wire(port).get_bool_attribute(names::CLKBUF_DRIVER))
}

/// Inserts clock buffers into every selected module, submodules first.
///
/// Fails without touching the design if neither a buffer nor a pad cell type is configured.
pub fn clkbufmap(design: &mut Design, options: &ClkbufmapOptions) -> Result<ClkbufmapStats, ClkbufmapError> {
    if options.buffer.is_none() && options.inpad.is_none() {
        return Err(ClkbufmapError::NoCellType);
    }
    let _span = info_span!("clkbufmap").entered();

    let buffer_inputs = buffer_inputs(design, options);
    let mut tags = TagTables::new();
    if let Some(buffer) = &options.buffer {
        tags.register_user_buffer_type(buffer);
        if let Some(rule) = &options.generated_clock {
            tags.register_user_buffer_type(&BufferSpec { cell_type: rule.buffer_type.clone(), ..buffer.clone() });
        }
    }
    if let Some(inpad) = &options.inpad
        && (options.buffer.is_none() || !buffer_inputs)
    {
        tags.register_user_buffer_type(inpad);
    }

    let mut stats = ClkbufmapStats::default();
    for name in schedule::schedule(design, options.selection.as_ref()) {
        let signatures = design.signatures();
        let Some(module) = design.module_mut(&name) else { continue };
        if module.is_blackbox() {
            tags.register_blackbox(module);
            continue;
        }
        let _span = info_span!("module", name = %name).entered();
        let sigmap = SigMap::new(module);
        let classes = classify::classify(module, &sigmap, &mut tags);
        debug!(sinks = classes.sinks.len(), buffered = classes.buffered.len(), "classified");
        let context = insert::Context { options, signatures: &signatures, buffer_inputs };
        let insertion = insert::insert_buffers(module, &context, &sigmap, &classes, &mut tags, &mut stats);
        retag::retag_outputs(module, options.selection.as_ref(), &sigmap, &insertion, &mut tags);
        retag::rewire_drivers(module, &signatures, &sigmap, &insertion);
        stats.renamed_ports += retag::commit_renames(module, &insertion);
        stats.restored_ports += retag::restore_drivers(module, &context, &tags, &insertion);
    }
    debug!(%stats, "finished");
    Ok(stats)
}
