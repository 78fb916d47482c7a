//! Items of SET, REMOVE, ORDER BY, RETURN/WITH and UNWIND clauses

use crate::ident::check;

#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    /// `var.field = $param`
    Property {
        var: String,
        field: String,
        param: String,
    },
    /// `var += $param`
    Merge { var: String, param: String },
    /// `var = $param`
    Replace { var: String, param: String },
    /// `var:Label`
    Label { var: String, label: String },
}

impl SetItem {
    pub fn property(
        var: impl Into<String>,
        field: impl Into<String>,
        param: impl Into<String>,
    ) -> Self {
        Self::Property {
            var: var.into(),
            field: field.into(),
            param: param.into(),
        }
    }

    pub fn merge(var: impl Into<String>, param: impl Into<String>) -> Self {
        Self::Merge {
            var: var.into(),
            param: param.into(),
        }
    }

    pub fn replace(var: impl Into<String>, param: impl Into<String>) -> Self {
        Self::Replace {
            var: var.into(),
            param: param.into(),
        }
    }

    pub fn label(var: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Label {
            var: var.into(),
            label: label.into(),
        }
    }

    pub(crate) fn render(&self) -> Result<String, String> {
        match self {
            Self::Property { var, field, param } => {
                check("variable", var)?;
                check("property", field)?;
                check("parameter", param)?;
                Ok(format!("{}.{} = ${}", var, field, param))
            }
            Self::Merge { var, param } => {
                check("variable", var)?;
                check("parameter", param)?;
                Ok(format!("{} += ${}", var, param))
            }
            Self::Replace { var, param } => {
                check("variable", var)?;
                check("parameter", param)?;
                Ok(format!("{} = ${}", var, param))
            }
            Self::Label { var, label } => {
                check("variable", var)?;
                check("label", label)?;
                Ok(format!("{}:{}", var, label))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoveItem {
    Property { var: String, field: String },
    Label { var: String, label: String },
}

impl RemoveItem {
    pub fn property(var: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Property {
            var: var.into(),
            field: field.into(),
        }
    }

    pub fn label(var: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Label {
            var: var.into(),
            label: label.into(),
        }
    }

    pub(crate) fn render(&self) -> Result<String, String> {
        match self {
            Self::Property { var, field } => {
                check("variable", var)?;
                check("property", field)?;
                Ok(format!("{}.{}", var, field))
            }
            Self::Label { var, label } => {
                check("variable", var)?;
                check("label", label)?;
                Ok(format!("{}:{}", var, label))
            }
        }
    }
}

/// `var.field [DESC]`
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub var: String,
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(var: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(var: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            descending: true,
            ..Self::asc(var, field)
        }
    }

    pub(crate) fn render(&self) -> Result<String, String> {
        check("variable", &self.var)?;
        check("property", &self.field)?;
        let suffix = if self.descending { " DESC" } else { "" };
        Ok(format!("{}.{}{}", self.var, self.field, suffix))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Var(String),
    Property(String, String),
    Count(String),
    Raw(String),
}

/// One projected expression of RETURN or WITH
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    expr: Expr,
    alias: Option<String>,
}

impl ReturnItem {
    pub fn var(var: impl Into<String>) -> Self {
        Self {
            expr: Expr::Var(var.into()),
            alias: None,
        }
    }

    pub fn property(var: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            expr: Expr::Property(var.into(), field.into()),
            alias: None,
        }
    }

    /// `count(var)`
    pub fn count(var: impl Into<String>) -> Self {
        Self {
            expr: Expr::Count(var.into()),
            alias: None,
        }
    }

    pub fn raw(expr: impl Into<String>) -> Self {
        Self {
            expr: Expr::Raw(expr.into()),
            alias: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub(crate) fn render(&self) -> Result<String, String> {
        let mut out = match &self.expr {
            Expr::Var(var) => {
                check("variable", var)?;
                var.clone()
            }
            Expr::Property(var, field) => {
                check("variable", var)?;
                check("property", field)?;
                format!("{}.{}", var, field)
            }
            Expr::Count(var) => {
                check("variable", var)?;
                format!("count({})", var)
            }
            Expr::Raw(expr) if expr.trim().is_empty() => {
                return Err("return expression can not be empty".to_string())
            }
            Expr::Raw(expr) => expr.trim().to_string(),
        };
        if let Some(alias) = &self.alias {
            check("alias", alias)?;
            out.push_str(" AS ");
            out.push_str(alias);
        }
        Ok(out)
    }
}

/// `UNWIND $param AS alias`
#[derive(Debug, Clone, PartialEq)]
pub struct Unwind {
    pub param: String,
    pub alias: String,
}

impl Unwind {
    pub fn new(param: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            alias: alias.into(),
        }
    }

    pub(crate) fn render(&self) -> Result<String, String> {
        check("parameter", &self.param)?;
        check("alias", &self.alias)?;
        Ok(format!("${} AS {}", self.param, self.alias))
    }
}

/// Render a comma separated list, failing on the first bad item
pub(crate) fn render_list<T>(
    items: &[T],
    what: &str,
    render: impl Fn(&T) -> Result<String, String>,
) -> Result<String, String> {
    if items.is_empty() {
        return Err(format!("{} can not be empty", what));
    }
    let parts: Result<Vec<_>, _> = items.iter().map(render).collect();
    Ok(parts?.join(", "))
}
