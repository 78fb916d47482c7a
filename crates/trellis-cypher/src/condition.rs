//! WHERE conditions

use crate::ident::check;
use crate::pattern::Pattern;
use serde::{Deserialize, Serialize};

/// Operator comparing a property with a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    StartsWith,
    EndsWith,
    In,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Contains => "CONTAINS",
            Self::StartsWith => "STARTS WITH",
            Self::EndsWith => "ENDS WITH",
            Self::In => "IN",
        }
    }
}

/// A boolean expression over pattern variables.
///
/// Values never appear in the rendered text; comparisons always refer to a
/// named parameter that is bound separately.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        var: String,
        field: String,
        op: Comparison,
        param: String,
    },
    IsNull {
        var: String,
        field: String,
        negated: bool,
    },
    /// Pattern predicate, true when the pattern has at least one match
    Exists(Pattern),
    /// Caller-supplied fragment, rendered verbatim
    Raw(String),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn compare(
        var: impl Into<String>,
        field: impl Into<String>,
        op: Comparison,
        param: impl Into<String>,
    ) -> Self {
        Self::Compare {
            var: var.into(),
            field: field.into(),
            op,
            param: param.into(),
        }
    }

    /// `var.field = $param`
    pub fn eq(var: impl Into<String>, field: impl Into<String>, param: impl Into<String>) -> Self {
        Self::compare(var, field, Comparison::Eq, param)
    }

    pub fn is_null(var: impl Into<String>, field: impl Into<String>) -> Self {
        Self::IsNull {
            var: var.into(),
            field: field.into(),
            negated: false,
        }
    }

    pub fn is_not_null(var: impl Into<String>, field: impl Into<String>) -> Self {
        Self::IsNull {
            var: var.into(),
            field: field.into(),
            negated: true,
        }
    }

    pub fn exists(pattern: Pattern) -> Self {
        Self::Exists(pattern)
    }

    pub fn raw(fragment: impl Into<String>) -> Self {
        Self::Raw(fragment.into())
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub(crate) fn render(&self) -> Result<String, String> {
        match self {
            Self::Compare {
                var,
                field,
                op,
                param,
            } => {
                check("variable", var)?;
                check("property", field)?;
                check("parameter", param)?;
                Ok(format!("{}.{} {} ${}", var, field, op.as_str(), param))
            }
            Self::IsNull {
                var,
                field,
                negated,
            } => {
                check("variable", var)?;
                check("property", field)?;
                let not = if *negated { "NOT " } else { "" };
                Ok(format!("{}.{} IS {}NULL", var, field, not))
            }
            Self::Exists(pattern) => pattern.render(),
            Self::Raw(fragment) => {
                let fragment = fragment.trim();
                if fragment.is_empty() {
                    Err("condition fragment can not be empty".to_string())
                } else {
                    Ok(fragment.to_string())
                }
            }
            Self::And(all) => join(all, " AND "),
            Self::Or(any) => join(any, " OR "),
            Self::Not(inner) => Ok(format!("NOT ({})", inner.render()?)),
        }
    }
}

fn join(parts: &[Condition], sep: &str) -> Result<String, String> {
    if parts.is_empty() {
        return Err("condition group can not be empty".to_string());
    }
    let mut rendered = Vec::with_capacity(parts.len());
    for part in parts {
        let text = part.render()?;
        let grouped = matches!(part, Condition::And(_) | Condition::Or(_) | Condition::Raw(_));
        rendered.push(if grouped && parts.len() > 1 {
            format!("({})", text)
        } else {
            text
        });
    }
    Ok(rendered.join(sep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{NodePattern, RelPattern};

    #[test]
    fn test_conjunction_is_flat() {
        let cond = Condition::eq("n", "uuid", "uuid")
            .and(Condition::is_not_null("n", "name"))
            .and(Condition::compare("n", "year", Comparison::Ge, "year"));
        assert_eq!(
            cond.render().unwrap(),
            "n.uuid = $uuid AND n.name IS NOT NULL AND n.year >= $year"
        );
    }

    #[test]
    fn test_nested_groups_are_parenthesized() {
        let cond = Condition::eq("n", "a", "a")
            .or(Condition::eq("n", "b", "b"))
            .and(Condition::eq("n", "c", "c"))
            .not();
        assert_eq!(
            cond.render().unwrap(),
            "NOT ((n.a = $a OR n.b = $b) AND n.c = $c)"
        );
    }

    #[test]
    fn test_pattern_predicate() {
        let cond = Condition::exists(Pattern::node(NodePattern::new("n")).to(
            RelPattern::new().hops(1, 2),
            NodePattern::anonymous().label("Course").prop("title", "title"),
        ));
        assert_eq!(
            cond.render().unwrap(),
            "(n)-[*1..2]-(:Course {title: $title})"
        );
    }

    #[test]
    fn test_invalid_parts() {
        assert!(Condition::raw("  ").render().is_err());
        assert!(Condition::And(vec![]).render().is_err());
        assert!(Condition::eq("n", "bad field", "p").render().is_err());
    }
}
