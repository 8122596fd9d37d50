//! This library provides the in-memory form of a hierarchical, bit-level netlist.
//!
//! A [`Design`] is a set of [`Module`]s keyed by name. A module owns [`Wire`]s and [`Cell`]s in
//! arenas addressed by [`WireId`] and [`CellId`], and a list of direct connections between
//! [`SigSpec`]s. Cells refer to other modules of the design by using the module name as their
//! type; any other type is a primitive.
//!
//! Connections make several [`SigBit`]s aliases of the same net. Analyses must compare bits only
//! after mapping them through a [`SigMap`].

mod logic;
mod attr;
mod sig;
mod module;
mod design;
mod sigmap;
mod selection;
mod print;
mod parse;

pub use logic::{Trit, Const};
pub use attr::{AttrValue, Attributes, names};
pub use sig::{SigBit, SigSpec};
pub use module::{Wire, WireId, Cell, CellId, Module, PortDirection, SigDisplay};
pub use design::{Design, Signatures};
pub use sigmap::SigMap;
pub use selection::{Selection, SelectionError, glob_match};
pub use parse::{parse, ParseError};
