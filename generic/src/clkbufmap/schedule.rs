use std::collections::HashSet;

use clkbuf_netlist::{Design, Selection};
use tracing::debug;

/// Orders modules so that every module comes after the modules it instantiates.
///
/// Traversal starts at the selected concrete modules; black boxes are only reached by being
/// instantiated. A module instantiated while it is being visited is treated as already
/// scheduled, so a cyclic hierarchy does not loop.
pub(crate) fn schedule(design: &Design, selection: Option<&Selection>) -> Vec<String> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    for module in design.modules() {
        if module.is_blackbox() || selection.is_some_and(|selection| !selection.selects_module(module)) {
            continue;
        }
        visit(design, module.name(), &mut visited, &mut order);
    }
    debug!(?order, "module order");
    order
}

fn visit<'a>(design: &'a Design, name: &'a str, visited: &mut HashSet<&'a str>, order: &mut Vec<String>) {
    if !visited.insert(name) {
        return;
    }
    let Some(module) = design.module(name) else { return };
    for (_, cell) in module.cells() {
        if design.module(&cell.cell_type).is_some() {
            visit(design, &cell.cell_type, visited, order);
        }
    }
    order.push(name.to_owned());
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use clkbuf_netlist::{Design, Selection};

    use super::schedule;

    fn design() -> Design {
        Design::from_str(concat!(
            "attribute \\top 1\n",
            "module \\top\n",
            "  cell \\mid \\u_mid\n",
            "  end\n",
            "  cell \\leaf \\u_leaf\n",
            "  end\n",
            "  cell \\DFF \\ff\n",
            "  end\n",
            "end\n",
            "module \\mid\n",
            "  wire \\x\n",
            "  cell \\leaf \\u_leaf\n",
            "  end\n",
            "end\n",
            "module \\leaf\n",
            "  wire \\y\n",
            "  cell \\BOX \\u_box\n",
            "  end\n",
            "end\n",
            "attribute \\blackbox 1\n",
            "module \\BOX\n",
            "end\n",
            "attribute \\blackbox 1\n",
            "module \\UNUSED\n",
            "end\n",
        ))
        .unwrap()
    }

    #[test]
    fn test_post_order() {
        let design = design();
        assert_eq!(schedule(&design, None), vec!["BOX", "leaf", "mid", "top"]);
    }

    #[test]
    fn test_selection_roots() {
        let design = design();
        let selection = Selection::parse("mid").unwrap();
        assert_eq!(schedule(&design, Some(&selection)), vec!["BOX", "leaf", "mid"]);
    }

    #[test]
    fn test_cycle() {
        let design = Design::from_str(concat!(
            "module \\a\n",
            "  cell \\b \\u_b\n",
            "  end\n",
            "end\n",
            "module \\b\n",
            "  cell \\a \\u_a\n",
            "  end\n",
            "end\n",
        ))
        .unwrap();
        assert_eq!(schedule(&design, None), vec!["b", "a"]);
    }
}
