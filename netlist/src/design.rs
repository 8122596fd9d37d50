use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::{Cell, Module, ParseError, PortDirection};

/// A design is an ordered collection of [`Module`]s, keyed by name.
///
/// Cells refer to other modules of the same design by using the module name as their type.
#[derive(Debug, Clone, Default)]
pub struct Design {
    modules: IndexMap<String, Module>,
}

impl Design {
    pub fn new() -> Design {
        Design { modules: IndexMap::new() }
    }

    pub fn add_module(&mut self, name: impl Into<String>) -> &mut Module {
        let name = name.into();
        assert!(!self.modules.contains_key(&name), "duplicate module {name:?}");
        self.modules.entry(name.clone()).or_insert(Module::new(name))
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn module_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.get_mut(name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> + '_ {
        self.modules.values()
    }

    /// Returns the module marked with the `top` attribute, if any.
    pub fn find_top(&self) -> Option<&Module> {
        self.modules.values().find(|module| module.is_top())
    }

    /// Takes a snapshot of the port directions of every module.
    pub fn signatures(&self) -> Signatures {
        let mut modules = BTreeMap::new();
        for module in self.modules.values() {
            let mut ports = BTreeMap::new();
            for &port in module.ports() {
                let wire = module.wire(port);
                if let Some(direction) = wire.direction() {
                    ports.insert(wire.name().to_owned(), direction);
                }
            }
            modules.insert(module.name().to_owned(), ports);
        }
        Signatures { modules }
    }
}

/// Port directions of the modules of a design, detached from the design so that modules can be
/// mutated while cell port directions are being queried.
#[derive(Debug, Clone, Default)]
pub struct Signatures {
    modules: BTreeMap<String, BTreeMap<String, PortDirection>>,
}

impl Signatures {
    /// Returns the direction of a cell port. Types that are modules of the design are resolved
    /// through the module ports; other types through the directions recorded on the cell.
    pub fn port_direction(&self, cell: &Cell, port: &str) -> Option<PortDirection> {
        match self.modules.get(&cell.cell_type) {
            Some(ports) => ports.get(port).copied(),
            None => cell.port_direction(port),
        }
    }

    /// Unknown ports are neither inputs nor outputs.
    pub fn is_output(&self, cell: &Cell, port: &str) -> bool {
        self.port_direction(cell, port).is_some_and(PortDirection::is_output)
    }

    pub fn is_input(&self, cell: &Cell, port: &str) -> bool {
        self.port_direction(cell, port).is_some_and(PortDirection::is_input)
    }
}

impl FromStr for Design {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parse(s)
    }
}

impl Display for Design {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        crate::print::write_design(f, self)
    }
}
