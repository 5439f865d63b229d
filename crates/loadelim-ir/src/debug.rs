use core::fmt::Display;

use crate::{Graph, Node};

impl Display for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.op)
    }
}

impl Display for Graph {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for id in self.node_indices() {
            let node = self.node(id);
            write!(f, "#{}: {}(", id.index(), node.op)?;
            let inputs = node
                .inputs
                .iter()
                .map(|input| format!("#{}", input.index()))
                .collect::<Vec<_>>();
            write!(f, "{})", inputs.join(", "))?;
            if node.op.value_output_count() > 0 {
                write!(f, " : {}", node.ty)?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{AccessBuilder, Graph, Type};
    use pretty_assertions::assert_eq;

    #[test]
    fn graph_prints_one_node_per_line() {
        let mut graph = Graph::new();
        let start = graph.start();
        let object = graph.parameter(0, Type::ANY);
        graph.load_field(AccessBuilder::for_fixed_array_length(), object, start, start);

        let expected = "#0: Start()\n\
             #1: Parameter[0](#0) : Any\n\
             #2: LoadField[tagged, 8, length, Unsigned30, tagged_signed|int32, no_write_barrier](#1, #0, #0) : Unsigned30\n";
        assert_eq!(graph.to_string(), expected);
    }
}
