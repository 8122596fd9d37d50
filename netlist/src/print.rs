use std::fmt::{Formatter, Result, Write};

use crate::{Attributes, Design, Module};

/// Writes a name as an RTLIL identifier; public names get a `\` prefix.
pub(crate) fn write_id(f: &mut impl Write, name: &str) -> Result {
    if name.starts_with('$') { write!(f, "{name}") } else { write!(f, "\\{name}") }
}

pub(crate) fn write_string(f: &mut impl Write, value: &str) -> Result {
    write!(f, "\"")?;
    for chr in value.chars() {
        match chr {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            _ if chr.is_ascii_control() => write!(f, "\\{:03o}", chr as u32)?,
            _ => write!(f, "{chr}")?,
        }
    }
    write!(f, "\"")
}

fn write_attributes(f: &mut Formatter, indent: &str, attributes: &Attributes) -> Result {
    for (name, value) in attributes {
        write!(f, "{indent}attribute ")?;
        write_id(f, name)?;
        writeln!(f, " {value}")?;
    }
    Ok(())
}

fn write_module(f: &mut Formatter, module: &Module) -> Result {
    write_attributes(f, "", &module.attributes)?;
    write!(f, "module ")?;
    write_id(f, module.name())?;
    writeln!(f)?;
    for (_, wire) in module.wires() {
        write_attributes(f, "  ", &wire.attributes)?;
        write!(f, "  wire ")?;
        if wire.width != 1 {
            write!(f, "width {} ", wire.width)?;
        }
        if wire.upto {
            write!(f, "upto ")?;
        }
        if wire.start_offset != 0 {
            write!(f, "offset {} ", wire.start_offset)?;
        }
        match (wire.port_input, wire.port_output) {
            (true, true) => write!(f, "inout {} ", wire.port_id)?,
            (true, false) => write!(f, "input {} ", wire.port_id)?,
            (false, true) => write!(f, "output {} ", wire.port_id)?,
            (false, false) => (),
        }
        if wire.is_signed {
            write!(f, "signed ")?;
        }
        write_id(f, wire.name())?;
        writeln!(f)?;
    }
    for (_, cell) in module.cells() {
        write_attributes(f, "  ", &cell.attributes)?;
        write!(f, "  cell ")?;
        write_id(f, &cell.cell_type)?;
        write!(f, " ")?;
        write_id(f, cell.name())?;
        writeln!(f)?;
        for (name, value) in &cell.parameters {
            write!(f, "    parameter ")?;
            write_id(f, name)?;
            writeln!(f, " {value}")?;
        }
        for (port, sig) in cell.connections() {
            write!(f, "    connect ")?;
            write_id(f, port)?;
            writeln!(f, " {}", module.display_sig(sig))?;
        }
        writeln!(f, "  end")?;
    }
    for (lhs, rhs) in module.connections() {
        writeln!(f, "  connect {} {}", module.display_sig(lhs), module.display_sig(rhs))?;
    }
    writeln!(f, "end")
}

pub(crate) fn write_design(f: &mut Formatter, design: &Design) -> Result {
    for (index, module) in design.modules().enumerate() {
        if index != 0 {
            writeln!(f)?;
        }
        write_module(f, module)?;
    }
    Ok(())
}
