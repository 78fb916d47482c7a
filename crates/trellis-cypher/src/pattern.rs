//! Node, relationship and path patterns

use crate::ident::check;
use trellis_core::Direction;

/// `(var:Label {field: $param})`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePattern {
    var: Option<String>,
    labels: Vec<String>,
    props: Vec<(String, String)>,
}

impl NodePattern {
    pub fn new(var: impl Into<String>) -> Self {
        Self {
            var: Some(var.into()),
            ..Default::default()
        }
    }

    /// `()`
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Match a property against a parameter
    pub fn prop(mut self, field: impl Into<String>, param: impl Into<String>) -> Self {
        self.props.push((field.into(), param.into()));
        self
    }

    pub(crate) fn render(&self) -> Result<String, String> {
        let mut out = String::from("(");
        if let Some(var) = &self.var {
            check("variable", var)?;
            out.push_str(var);
        }
        for label in &self.labels {
            check("label", label)?;
            out.push(':');
            out.push_str(label);
        }
        if !self.props.is_empty() {
            if self.var.is_some() || !self.labels.is_empty() {
                out.push(' ');
            }
            out.push_str(&render_props(&self.props)?);
        }
        out.push(')');
        Ok(out)
    }
}

/// `-[var:TYPE*min..max {field: $param}]->`
#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    var: Option<String>,
    rel_type: Option<String>,
    direction: Direction,
    hops: Option<(u32, u32)>,
    props: Vec<(String, String)>,
}

impl Default for RelPattern {
    fn default() -> Self {
        Self {
            var: None,
            rel_type: None,
            direction: Direction::Undirected,
            hops: None,
            props: Vec::new(),
        }
    }
}

impl RelPattern {
    /// Untyped, undirected relationship
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var(mut self, var: impl Into<String>) -> Self {
        self.var = Some(var.into());
        self
    }

    pub fn rel_type(mut self, rel_type: impl Into<String>) -> Self {
        self.rel_type = Some(rel_type.into());
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Variable-length hop range, inclusive on both ends
    pub fn hops(mut self, min: u32, max: u32) -> Self {
        self.hops = Some((min, max));
        self
    }

    pub fn prop(mut self, field: impl Into<String>, param: impl Into<String>) -> Self {
        self.props.push((field.into(), param.into()));
        self
    }

    pub(crate) fn render(&self) -> Result<String, String> {
        let mut body = String::new();
        if let Some(var) = &self.var {
            check("variable", var)?;
            body.push_str(var);
        }
        if let Some(rel_type) = &self.rel_type {
            check("relationship type", rel_type)?;
            body.push(':');
            body.push_str(rel_type);
        }
        if let Some((min, max)) = self.hops {
            if min > max {
                return Err(format!("invalid hop range {}..{}", min, max));
            }
            body.push_str(&format!("*{}..{}", min, max));
        }
        if !self.props.is_empty() {
            if !body.is_empty() {
                body.push(' ');
            }
            body.push_str(&render_props(&self.props)?);
        }

        let body = if body.is_empty() {
            String::new()
        } else {
            format!("[{}]", body)
        };
        Ok(match self.direction {
            Direction::Outgoing => format!("-{}->", body),
            Direction::Incoming => format!("<-{}-", body),
            Direction::Both | Direction::Undirected => format!("-{}-", body),
        })
    }
}

/// A chain of nodes joined by relationships, optionally bound to a path
/// variable
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    path_var: Option<String>,
    start: NodePattern,
    steps: Vec<(RelPattern, NodePattern)>,
}

impl Pattern {
    pub fn node(start: NodePattern) -> Self {
        Self {
            path_var: None,
            start,
            steps: Vec::new(),
        }
    }

    /// Bind the whole pattern to `var`, as in `p=(n)-->()`
    pub fn path(mut self, var: impl Into<String>) -> Self {
        self.path_var = Some(var.into());
        self
    }

    pub fn to(mut self, rel: RelPattern, node: NodePattern) -> Self {
        self.steps.push((rel, node));
        self
    }

    pub(crate) fn render(&self) -> Result<String, String> {
        let mut out = String::new();
        if let Some(var) = &self.path_var {
            check("path variable", var)?;
            out.push_str(var);
            out.push('=');
        }
        out.push_str(&self.start.render()?);
        for (rel, node) in &self.steps {
            out.push_str(&rel.render()?);
            out.push_str(&node.render()?);
        }
        Ok(out)
    }
}

impl From<NodePattern> for Pattern {
    fn from(node: NodePattern) -> Self {
        Self::node(node)
    }
}

fn render_props(props: &[(String, String)]) -> Result<String, String> {
    let mut parts = Vec::with_capacity(props.len());
    for (field, param) in props {
        check("property", field)?;
        check("parameter", param)?;
        parts.push(format!("{}: ${}", field, param));
    }
    Ok(format!("{{{}}}", parts.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_rendering() {
        let node = NodePattern::new("n").label("Teacher").prop("uuid", "key");
        assert_eq!(node.render().unwrap(), "(n:Teacher {uuid: $key})");
        assert_eq!(NodePattern::anonymous().render().unwrap(), "()");
        assert_eq!(
            NodePattern::anonymous()
                .label("Course")
                .prop("title", "title")
                .render()
                .unwrap(),
            "(:Course {title: $title})"
        );
    }

    #[test]
    fn test_relationship_rendering() {
        let rel = RelPattern::new()
            .var("r")
            .rel_type("ENROLLED_IN")
            .direction(Direction::Outgoing)
            .prop("uuid", "edge");
        assert_eq!(rel.render().unwrap(), "-[r:ENROLLED_IN {uuid: $edge}]->");
        assert_eq!(
            RelPattern::new()
                .direction(Direction::Incoming)
                .render()
                .unwrap(),
            "<--"
        );
        assert_eq!(RelPattern::new().hops(0, 3).render().unwrap(), "-[*0..3]-");
        assert!(RelPattern::new().hops(3, 1).render().is_err());
    }

    #[test]
    fn test_path_rendering() {
        let pattern = Pattern::node(NodePattern::new("n").label("Course"))
            .to(RelPattern::new().hops(0, 2), NodePattern::anonymous())
            .path("p");
        assert_eq!(pattern.render().unwrap(), "p=(n:Course)-[*0..2]-()");
    }

    #[test]
    fn test_rejects_injected_names() {
        let node = NodePattern::new("n").label("Teacher) DETACH DELETE (x");
        assert!(node.render().is_err());
    }
}
