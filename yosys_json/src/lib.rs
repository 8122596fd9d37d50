//! Reading and writing designs in the JSON format produced by `yosys -p write_json`.

use std::collections::HashMap;
use std::fmt::Display;
use std::io;

use jzon::JsonValue;

use clkbuf_netlist::{
    AttrValue, Attributes, Const, Design, Module, PortDirection, SigBit, SigMap, SigSpec, Trit, Wire, WireId,
};

#[derive(Debug)]
pub enum ImportError {
    Io(io::Error),
    Json(jzon::Error),
    Format(String),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(error) => write!(f, "I/O error: {error}"),
            ImportError::Json(error) => write!(f, "JSON parse error: {error}"),
            ImportError::Format(message) => write!(f, "invalid netlist: {message}"),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<io::Error> for ImportError {
    fn from(error: io::Error) -> Self {
        ImportError::Io(error)
    }
}

impl From<jzon::Error> for ImportError {
    fn from(error: jzon::Error) -> Self {
        ImportError::Json(error)
    }
}

fn format_error<T>(message: impl Into<String>) -> Result<T, ImportError> {
    Err(ImportError::Format(message.into()))
}

fn is_bit_string(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|chr| matches!(chr, '0' | '1' | 'x' | 'z'))
}

fn import_value(json: &JsonValue) -> Result<AttrValue, ImportError> {
    if let Some(value) = json.as_str() {
        if is_bit_string(value) {
            return Ok(AttrValue::Const(value.parse().unwrap_or_default()));
        }
        // a trailing space marks a string that would otherwise read as a constant
        if let Some(stripped) = value.strip_suffix(' ')
            && (stripped.is_empty() || is_bit_string(stripped))
        {
            return Ok(AttrValue::String(stripped.to_owned()));
        }
        Ok(AttrValue::String(value.to_owned()))
    } else if let Some(value) = json.as_u64() {
        Ok(AttrValue::Const(Const::from_uint(value, 32)))
    } else if let Some(value) = json.as_i64() {
        // two's complement, truncated to 32 bits
        Ok(AttrValue::Const(Const::from_uint(value as u64, 32)))
    } else {
        format_error(format!("unsupported attribute value {json}"))
    }
}

fn import_attributes(json: &JsonValue) -> Result<Attributes, ImportError> {
    let mut attributes = Attributes::new();
    for (name, value) in json.entries() {
        attributes.insert(name.to_owned(), import_value(value)?);
    }
    Ok(attributes)
}

struct ModuleImporter<'a> {
    module: &'a mut Module,
    /// The first wire bit seen for every net number.
    nets: HashMap<usize, SigBit>,
}

impl ModuleImporter<'_> {
    fn const_bit(json: &JsonValue) -> Result<SigBit, ImportError> {
        match json.as_str() {
            Some("0") => Ok(SigBit::ZERO),
            Some("1") => Ok(SigBit::ONE),
            Some("x" | "z") => Ok(SigBit::Const(Trit::Undef)),
            _ => format_error(format!("invalid bit {json}")),
        }
    }

    /// Binds the bits of a named wire, connecting it to earlier wires sharing the same nets.
    fn bind_wire(&mut self, name: &str, bits: &JsonValue) -> Result<WireId, ImportError> {
        if self.module.find_wire(name).is_some() {
            return format_error(format!("duplicate net name {name:?} in module {:?}", self.module.name()));
        }
        let wire = self.module.add_wire(name, bits.len());
        for (offset, bit) in bits.members().enumerate() {
            let wire_bit = SigBit::Wire(wire, offset);
            match bit.as_usize() {
                Some(net) => match self.nets.get(&net) {
                    Some(&home) => self.module.connect(wire_bit, home),
                    None => {
                        self.nets.insert(net, wire_bit);
                    }
                },
                None => {
                    let value = Self::const_bit(bit)?;
                    self.module.connect(wire_bit, value);
                }
            }
        }
        Ok(wire)
    }

    fn sig(&mut self, bits: &JsonValue) -> Result<SigSpec, ImportError> {
        if !bits.is_array() {
            return format_error(format!("expected bit list, found {bits}"));
        }
        let mut sig = SigSpec::new();
        for bit in bits.members() {
            match bit.as_usize() {
                Some(net) => match self.nets.get(&net) {
                    Some(&home) => sig.push(home),
                    None => {
                        // net without a name; give it one
                        let name = self.module.fresh_name("$json");
                        let wire = self.module.add_wire(name, 1);
                        self.nets.insert(net, SigBit::Wire(wire, 0));
                        sig.push(SigBit::Wire(wire, 0));
                    }
                },
                None => sig.push(Self::const_bit(bit)?),
            }
        }
        Ok(sig)
    }
}

/// Reads the `offset`, `upto` and `signed` keys of a port or net name.
fn import_wire_shape(wire: &mut Wire, json: &JsonValue) -> Result<(), ImportError> {
    if !json["offset"].is_null() {
        match json["offset"].as_i64() {
            Some(offset) => wire.start_offset = offset,
            None => return format_error(format!("invalid offset {} of {:?}", json["offset"], wire.name())),
        }
    }
    wire.upto |= json["upto"].as_u64().is_some_and(|value| value != 0);
    wire.is_signed |= json["signed"].as_u64().is_some_and(|value| value != 0);
    Ok(())
}

fn import_direction(json: &JsonValue) -> Result<PortDirection, ImportError> {
    match json.as_str() {
        Some("input") => Ok(PortDirection::Input),
        Some("output") => Ok(PortDirection::Output),
        Some("inout") => Ok(PortDirection::Inout),
        _ => format_error(format!("invalid port direction {json}")),
    }
}

fn import_module(design: &mut Design, name: &str, json: &JsonValue) -> Result<(), ImportError> {
    if design.module(name).is_some() {
        return format_error(format!("duplicate module {name:?}"));
    }
    let module = design.add_module(name);
    module.attributes = import_attributes(&json["attributes"])?;
    let mut importer = ModuleImporter { module, nets: HashMap::new() };

    let mut ports = HashMap::new();
    for (index, (port_name, port)) in json["ports"].entries().enumerate() {
        ports.insert(port_name.to_owned(), (index + 1, import_direction(&port["direction"])?));
    }
    for (net_name, netname) in json["netnames"].entries() {
        let wire = importer.bind_wire(net_name, &netname["bits"])?;
        let wire = importer.module.wire_mut(wire);
        wire.attributes = import_attributes(&netname["attributes"])?;
        import_wire_shape(wire, netname)?;
    }
    for (port_name, port) in json["ports"].entries() {
        let wire = match importer.module.find_wire(port_name) {
            Some(wire) => wire,
            None => importer.bind_wire(port_name, &port["bits"])?,
        };
        let (port_id, direction) = ports[port_name];
        let wire = importer.module.wire_mut(wire);
        import_wire_shape(wire, port)?;
        wire.port_id = port_id;
        wire.port_input = direction.is_input();
        wire.port_output = direction.is_output();
    }

    for (cell_name, cell_json) in json["cells"].entries() {
        let Some(cell_type) = cell_json["type"].as_str() else {
            return format_error(format!("cell {cell_name:?} has no type"));
        };
        if importer.module.find_cell(cell_name).is_some() {
            return format_error(format!("duplicate cell {cell_name:?}"));
        }
        let mut connections = Vec::new();
        for (port, bits) in cell_json["connections"].entries() {
            connections.push((port.to_owned(), importer.sig(bits)?));
        }
        let cell = importer.module.add_cell(cell_name, cell_type);
        let cell = importer.module.cell_mut(cell);
        cell.parameters = import_attributes(&cell_json["parameters"])?;
        cell.attributes = import_attributes(&cell_json["attributes"])?;
        for (port, direction) in cell_json["port_directions"].entries() {
            cell.port_directions.insert(port.to_owned(), import_direction(direction)?);
        }
        for (port, sig) in connections {
            cell.set_port(port, sig);
        }
    }
    importer.module.fixup_ports();
    Ok(())
}

/// Reads a design. Wires that share net numbers are connected to each other.
pub fn import(reader: &mut impl io::Read) -> Result<Design, ImportError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let json = jzon::parse(&text)?;
    let modules = &json["modules"];
    if !modules.is_object() {
        return format_error("missing \"modules\" object");
    }
    let mut design = Design::new();
    for (name, module) in modules.entries() {
        import_module(&mut design, name, module)?;
    }
    Ok(design)
}

fn export_value(value: &AttrValue) -> JsonValue {
    match value {
        AttrValue::Const(value) => value.to_string().into(),
        AttrValue::String(value) if value.is_empty() || !is_bit_string(value) => value.as_str().into(),
        AttrValue::String(value) => format!("{value} ").into(),
    }
}

fn export_attributes(attributes: &Attributes) -> JsonValue {
    let mut json = JsonValue::new_object();
    for (name, value) in attributes {
        json[name.as_str()] = export_value(value);
    }
    json
}

fn export_wire_shape(json: &mut JsonValue, wire: &Wire) {
    if wire.start_offset != 0 {
        json["offset"] = wire.start_offset.into();
    }
    if wire.upto {
        json["upto"] = 1.into();
    }
    if wire.is_signed {
        json["signed"] = 1.into();
    }
}

fn export_direction(direction: PortDirection) -> JsonValue {
    match direction {
        PortDirection::Input => "input".into(),
        PortDirection::Output => "output".into(),
        PortDirection::Inout => "inout".into(),
    }
}

struct NetNumbering {
    sigmap: SigMap,
    numbers: HashMap<SigBit, usize>,
}

impl NetNumbering {
    fn bit(&mut self, bit: SigBit) -> JsonValue {
        match self.sigmap.map_bit(bit) {
            SigBit::Const(trit) => trit.to_string().into(),
            bit => {
                // 0 and 1 are reserved for constants
                let next = self.numbers.len() + 2;
                (*self.numbers.entry(bit).or_insert(next)).into()
            }
        }
    }

    fn sig(&mut self, sig: &SigSpec) -> JsonValue {
        JsonValue::Array(sig.iter().map(|bit| self.bit(bit)).collect())
    }
}

fn hide_name(name: &str) -> JsonValue {
    usize::from(name.starts_with('$')).into()
}

/// Writes a design. Aliased wire bits are written with a shared net number.
pub fn export(writer: &mut impl io::Write, design: &Design) -> io::Result<()> {
    let signatures = design.signatures();
    let mut modules = JsonValue::new_object();
    for module in design.modules() {
        let mut nets = NetNumbering { sigmap: SigMap::new(module), numbers: HashMap::new() };
        let mut json = JsonValue::new_object();
        json["attributes"] = export_attributes(&module.attributes);

        let mut ports = JsonValue::new_object();
        for &port in module.ports() {
            let wire = module.wire(port);
            let Some(direction) = wire.direction() else { continue };
            let mut port_json = JsonValue::new_object();
            port_json["direction"] = export_direction(direction);
            port_json["bits"] = nets.sig(&module.wire_sig(port));
            export_wire_shape(&mut port_json, wire);
            ports[wire.name()] = port_json;
        }
        json["ports"] = ports;

        let mut cells = JsonValue::new_object();
        for (_, cell) in module.cells() {
            let mut cell_json = JsonValue::new_object();
            cell_json["hide_name"] = hide_name(cell.name());
            cell_json["type"] = cell.cell_type.as_str().into();
            let mut parameters = JsonValue::new_object();
            for (name, value) in &cell.parameters {
                parameters[name.as_str()] = export_value(value);
            }
            cell_json["parameters"] = parameters;
            cell_json["attributes"] = export_attributes(&cell.attributes);
            let mut directions = JsonValue::new_object();
            let mut connections = JsonValue::new_object();
            for (port, sig) in cell.connections() {
                if let Some(direction) = signatures.port_direction(cell, port) {
                    directions[port] = export_direction(direction);
                }
                connections[port] = nets.sig(sig);
            }
            cell_json["port_directions"] = directions;
            cell_json["connections"] = connections;
            cells[cell.name()] = cell_json;
        }
        json["cells"] = cells;

        let mut netnames = JsonValue::new_object();
        for (id, wire) in module.wires() {
            let mut netname = JsonValue::new_object();
            netname["hide_name"] = hide_name(wire.name());
            netname["bits"] = nets.sig(&module.wire_sig(id));
            export_wire_shape(&mut netname, wire);
            netname["attributes"] = export_attributes(&wire.attributes);
            netnames[wire.name()] = netname;
        }
        json["netnames"] = netnames;
        modules[module.name()] = json;
    }

    let mut root = JsonValue::new_object();
    root["creator"] = concat!("clkbufmap ", env!("CARGO_PKG_VERSION")).into();
    root["modules"] = modules;
    writer.write_all(root.pretty(2).as_bytes())?;
    writeln!(writer)
}
