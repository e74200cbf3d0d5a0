//! Typed filter graph.
//!
//! Nodes are kept as explicit `(inputs, filters, outputs)` records and the
//! label wiring is checked before anything is serialized for FFmpeg.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

/// Label-closure violations. These are builder defects, never user errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("input #{index} does not exist ({input_count} inputs)")]
    UnknownInput { index: usize, input_count: usize },

    #[error("label [{0}] is consumed before it is produced")]
    UndefinedLabel(String),

    #[error("label [{0}] is produced more than once")]
    DuplicateLabel(String),

    #[error("label [{0}] is consumed more than once")]
    LabelConsumedTwice(String),

    #[error("label [{0}] is produced but never consumed")]
    UnconsumedLabel(String),

    #[error("output label [{0}] is not produced by the graph")]
    MissingOutput(String),

    #[error("node has no filters")]
    EmptyNode,
}

/// Stream type selected from an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn specifier(self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
        }
    }
}

/// A pad a filter node reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pad {
    /// A stream of the `index`-th `-i` input, e.g. `[0:v]`.
    Input { index: usize, kind: StreamKind },
    /// The output of an earlier node.
    Label(String),
}

impl Pad {
    pub fn video(index: usize) -> Self {
        Pad::Input {
            index,
            kind: StreamKind::Video,
        }
    }

    pub fn audio(index: usize) -> Self {
        Pad::Input {
            index,
            kind: StreamKind::Audio,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Pad::Label(name.into())
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pad::Input { index, kind } => write!(f, "[{}:{}]", index, kind.specifier()),
            Pad::Label(name) => write!(f, "[{}]", name),
        }
    }
}

/// One `;`-separated chain of the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    pub inputs: Vec<Pad>,
    pub filters: Vec<String>,
    pub outputs: Vec<String>,
}

impl FilterNode {
    pub fn new(inputs: Vec<Pad>, filters: Vec<String>, outputs: Vec<String>) -> Self {
        Self {
            inputs,
            filters,
            outputs,
        }
    }

    /// Single-input, single-output chain.
    pub fn chain(input: Pad, filters: Vec<String>, output: impl Into<String>) -> Self {
        Self::new(vec![input], filters, vec![output.into()])
    }

    /// Whether any filter in this node starts with `name=` (or is exactly `name`).
    pub fn uses_filter(&self, name: &str) -> bool {
        self.filters.iter().any(|f| filter_name(f) == name)
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "{}", pad)?;
        }
        write!(f, "{}", self.filters.join(","))?;
        for label in &self.outputs {
            write!(f, "[{}]", label)?;
        }
        Ok(())
    }
}

fn filter_name(filter: &str) -> &str {
    filter.split_once('=').map_or(filter, |(name, _)| name)
}

/// Ordered list of filter nodes over a fixed number of inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    input_count: usize,
    nodes: Vec<FilterNode>,
}

impl FilterGraph {
    pub fn new(input_count: usize) -> Self {
        Self {
            input_count,
            nodes: Vec::new(),
        }
    }

    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: FilterNode) {
        self.nodes.push(node);
    }

    /// Rename the label produced by some node. Returns false when no node
    /// produces `from`.
    pub fn relabel_output(&mut self, from: &str, to: &str) -> bool {
        for node in self.nodes.iter_mut().rev() {
            if let Some(label) = node.outputs.iter_mut().find(|l| l.as_str() == from) {
                *label = to.to_string();
                return true;
            }
        }
        false
    }

    /// Number of nodes using the named filter anywhere in their chain.
    pub fn count_filter(&self, name: &str) -> usize {
        self.nodes.iter().filter(|n| n.uses_filter(name)).count()
    }

    /// Check label closure.
    ///
    /// Every consumed label must have been produced by an earlier node and
    /// is consumed exactly once. Every produced label is either consumed or
    /// listed in `terminals`, and every terminal must be produced and left
    /// unconsumed.
    pub fn validate(&self, terminals: &[&str]) -> Result<(), GraphError> {
        let mut produced: HashSet<&str> = HashSet::new();
        let mut consumed: HashSet<&str> = HashSet::new();

        for node in &self.nodes {
            if node.filters.is_empty() {
                return Err(GraphError::EmptyNode);
            }
            for pad in &node.inputs {
                match pad {
                    Pad::Input { index, .. } => {
                        if *index >= self.input_count {
                            return Err(GraphError::UnknownInput {
                                index: *index,
                                input_count: self.input_count,
                            });
                        }
                    }
                    Pad::Label(name) => {
                        if !produced.contains(name.as_str()) {
                            return Err(GraphError::UndefinedLabel(name.clone()));
                        }
                        if !consumed.insert(name.as_str()) {
                            return Err(GraphError::LabelConsumedTwice(name.clone()));
                        }
                    }
                }
            }
            for label in &node.outputs {
                if !produced.insert(label.as_str()) {
                    return Err(GraphError::DuplicateLabel(label.clone()));
                }
            }
        }

        for terminal in terminals {
            if !produced.contains(terminal) || consumed.contains(terminal) {
                return Err(GraphError::MissingOutput((*terminal).to_string()));
            }
        }

        // Report the first dangling label in production order.
        for node in &self.nodes {
            for label in &node.outputs {
                let label = label.as_str();
                if !consumed.contains(label) && !terminals.contains(&label) {
                    return Err(GraphError::UnconsumedLabel(label.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Validate and render the `-filter_complex` argument.
    pub fn serialize(&self, terminals: &[&str]) -> Result<String, GraphError> {
        self.validate(terminals)?;
        Ok(self
            .nodes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(input: Pad, filter: &str, output: &str) -> FilterNode {
        FilterNode::chain(input, vec![filter.to_string()], output)
    }

    #[test]
    fn test_pad_display() {
        assert_eq!(Pad::video(0).to_string(), "[0:v]");
        assert_eq!(Pad::audio(3).to_string(), "[3:a]");
        assert_eq!(Pad::label("vcat").to_string(), "[vcat]");
    }

    #[test]
    fn test_serialize_joins_nodes() {
        let mut graph = FilterGraph::new(1);
        graph.push(FilterNode::chain(
            Pad::video(0),
            vec!["scale=1920:1080".to_string(), "fps=30".to_string()],
            "vnorm",
        ));
        graph.push(chain(Pad::label("vnorm"), "null", "vout"));

        assert_eq!(
            graph.serialize(&["vout"]).unwrap(),
            "[0:v]scale=1920:1080,fps=30[vnorm];[vnorm]null[vout]"
        );
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let mut graph = FilterGraph::new(1);
        graph.push(chain(Pad::label("later"), "null", "vout"));
        graph.push(chain(Pad::video(0), "null", "later"));

        assert_eq!(
            graph.validate(&["vout"]),
            Err(GraphError::UndefinedLabel("later".to_string()))
        );
    }

    #[test]
    fn test_unknown_input_is_rejected() {
        let mut graph = FilterGraph::new(1);
        graph.push(chain(Pad::audio(1), "anull", "aout"));

        assert_eq!(
            graph.validate(&["aout"]),
            Err(GraphError::UnknownInput {
                index: 1,
                input_count: 1
            })
        );
    }

    #[test]
    fn test_duplicate_and_double_consumption() {
        let mut graph = FilterGraph::new(1);
        graph.push(chain(Pad::video(0), "null", "a"));
        graph.push(chain(Pad::video(0), "null", "a"));
        assert_eq!(
            graph.validate(&[]),
            Err(GraphError::DuplicateLabel("a".to_string()))
        );

        let mut graph = FilterGraph::new(1);
        graph.push(chain(Pad::video(0), "null", "a"));
        graph.push(chain(Pad::label("a"), "null", "b"));
        graph.push(chain(Pad::label("a"), "null", "c"));
        assert_eq!(
            graph.validate(&["b", "c"]),
            Err(GraphError::LabelConsumedTwice("a".to_string()))
        );
    }

    #[test]
    fn test_dangling_and_missing_outputs() {
        let mut graph = FilterGraph::new(1);
        graph.push(chain(Pad::video(0), "null", "stray"));
        graph.push(chain(Pad::video(0), "null", "vout"));
        assert_eq!(
            graph.validate(&["vout"]),
            Err(GraphError::UnconsumedLabel("stray".to_string()))
        );

        let mut graph = FilterGraph::new(1);
        graph.push(chain(Pad::video(0), "null", "vout"));
        assert_eq!(
            graph.validate(&["vout", "aout"]),
            Err(GraphError::MissingOutput("aout".to_string()))
        );
    }

    #[test]
    fn test_relabel_output() {
        let mut graph = FilterGraph::new(1);
        graph.push(chain(Pad::video(0), "null", "vnorm"));
        assert!(graph.relabel_output("vnorm", "vout"));
        assert!(!graph.relabel_output("missing", "x"));
        assert_eq!(graph.serialize(&["vout"]).unwrap(), "[0:v]null[vout]");
    }

    #[test]
    fn test_count_filter() {
        let mut graph = FilterGraph::new(1);
        graph.push(FilterNode::chain(
            Pad::video(0),
            vec!["trim=start=0:end=5".to_string(), "setpts=PTS-STARTPTS".to_string()],
            "seg0v",
        ));
        graph.push(chain(Pad::label("seg0v"), "concat=n=1:v=1:a=0", "vout"));
        assert_eq!(graph.count_filter("trim"), 1);
        assert_eq!(graph.count_filter("concat"), 1);
        assert_eq!(graph.count_filter("atrim"), 0);
    }
}
