use crate::check::{
    check_number, check_number_range, check_string, Bounds, ConfigurationError, Rel,
};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// One parsed attribute value as handed over by the graph front-end.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttrKind {
    Bool,
    Int,
    Float,
    Str,
    IntList,
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Bool(_) => AttrKind::Bool,
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::Float(_) => AttrKind::Float,
            AttrValue::Str(_) => AttrKind::Str,
            AttrValue::IntList(_) => AttrKind::IntList,
        }
    }
}

impl AttrKind {
    pub fn name(&self) -> &'static str {
        match self {
            AttrKind::Bool => "bool",
            AttrKind::Int => "int",
            AttrKind::Float => "float",
            AttrKind::Str => "string",
            AttrKind::IntList => "list of int",
        }
    }
}

impl Display for AttrKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> AttrValue {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> AttrValue {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> AttrValue {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> AttrValue {
        AttrValue::Str(v.to_string())
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> AttrValue {
        AttrValue::IntList(v)
    }
}

/// Attribute values for one graph node, keyed by attribute name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attrs {
    values: BTreeMap<String, AttrValue>,
}

impl Attrs {
    pub fn new() -> Attrs {
        Attrs::default()
    }

    pub fn set<V>(mut self, name: &str, value: V) -> Attrs
    where
        V: Into<AttrValue>,
    {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.values.get(name)
    }
}

/// Value constraint evaluated when an attribute is resolved.
#[derive(Clone, Debug)]
pub enum Constraint {
    /// Numeric relation against a fixed bound, e.g. `delta != 0`.
    Number { bound: f64, rel: Rel },
    /// Bounded numeric range with configurable inclusivity.
    Range { low: f64, high: f64, bounds: Bounds },
    /// Membership in a string enumeration, optionally case-folded.
    OneOf {
        choices: &'static [&'static str],
        fold_case: bool,
    },
}

/// Declarative schema for one operator attribute. Immutable once built;
/// resolution against supplied values is all-or-nothing per operator.
#[derive(Clone, Debug)]
pub struct AttributeSpec {
    name: &'static str,
    kind: AttrKind,
    required: bool,
    default: Option<AttrValue>,
    constraint: Option<Constraint>,
}

impl AttributeSpec {
    pub fn required(name: &'static str, kind: AttrKind) -> AttributeSpec {
        AttributeSpec {
            name,
            kind,
            required: true,
            default: None,
            constraint: None,
        }
    }

    pub fn optional(
        name: &'static str,
        kind: AttrKind,
        default: Option<AttrValue>,
    ) -> AttributeSpec {
        AttributeSpec {
            name,
            kind,
            required: false,
            default,
            constraint: None,
        }
    }

    pub fn constrain(mut self, constraint: Constraint) -> AttributeSpec {
        self.constraint = Some(constraint);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> AttrKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Resolve this attribute from the supplied values: fall back to the
    /// default, check the declared kind, then the constraint. `Ok(None)`
    /// means the attribute is optional, absent and has no default.
    pub fn resolve(&self, op: &str, attrs: &Attrs) -> Result<Option<AttrValue>, ConfigurationError> {
        let value = match attrs.get(self.name) {
            Some(value) => value.clone(),
            None => match &self.default {
                Some(default) => default.clone(),
                None if self.required => {
                    return Err(ConfigurationError::Missing {
                        op: op.to_string(),
                        param: self.name.to_string(),
                    });
                }
                None => return Ok(None),
            },
        };

        if value.kind() != self.kind {
            return Err(ConfigurationError::WrongType {
                op: op.to_string(),
                param: self.name.to_string(),
                expected: self.kind.name(),
                actual: value.kind().name(),
            });
        }

        let value = match &self.constraint {
            None => value,
            Some(Constraint::Number { bound, rel }) => {
                check_number(op, self.name, numeric(&value), *bound, *rel)?;
                value
            }
            Some(Constraint::Range { low, high, bounds }) => {
                check_number_range(op, self.name, numeric(&value), *low, *high, *bounds)?;
                value
            }
            Some(Constraint::OneOf { choices, fold_case }) => match &value {
                AttrValue::Str(s) => {
                    let canonical = check_string(op, self.name, s, choices, *fold_case)?;
                    AttrValue::Str(canonical.to_string())
                }
                _ => value,
            },
        };

        Ok(Some(value))
    }

    pub fn boolean(&self, op: &str, attrs: &Attrs) -> Result<bool, ConfigurationError> {
        match self.resolve(op, attrs)? {
            Some(AttrValue::Bool(v)) => Ok(v),
            other => Err(self.type_error(op, &other)),
        }
    }

    pub fn int(&self, op: &str, attrs: &Attrs) -> Result<i64, ConfigurationError> {
        match self.resolve(op, attrs)? {
            Some(AttrValue::Int(v)) => Ok(v),
            other => Err(self.type_error(op, &other)),
        }
    }

    pub fn float(&self, op: &str, attrs: &Attrs) -> Result<f64, ConfigurationError> {
        match self.resolve(op, attrs)? {
            Some(AttrValue::Float(v)) => Ok(v),
            other => Err(self.type_error(op, &other)),
        }
    }

    pub fn float_opt(&self, op: &str, attrs: &Attrs) -> Result<Option<f64>, ConfigurationError> {
        match self.resolve(op, attrs)? {
            Some(AttrValue::Float(v)) => Ok(Some(v)),
            None => Ok(None),
            other => Err(self.type_error(op, &other)),
        }
    }

    pub fn string(&self, op: &str, attrs: &Attrs) -> Result<String, ConfigurationError> {
        match self.resolve(op, attrs)? {
            Some(AttrValue::Str(v)) => Ok(v),
            other => Err(self.type_error(op, &other)),
        }
    }

    pub fn int_list(&self, op: &str, attrs: &Attrs) -> Result<Vec<i64>, ConfigurationError> {
        match self.resolve(op, attrs)? {
            Some(AttrValue::IntList(v)) => Ok(v),
            other => Err(self.type_error(op, &other)),
        }
    }

    fn type_error(&self, op: &str, got: &Option<AttrValue>) -> ConfigurationError {
        match got {
            Some(value) => ConfigurationError::WrongType {
                op: op.to_string(),
                param: self.name.to_string(),
                expected: self.kind.name(),
                actual: value.kind().name(),
            },
            None => ConfigurationError::Missing {
                op: op.to_string(),
                param: self.name.to_string(),
            },
        }
    }
}

fn numeric(value: &AttrValue) -> f64 {
    match value {
        AttrValue::Int(v) => *v as f64,
        AttrValue::Float(v) => *v,
        // Non-numeric kinds never reach a numeric constraint; the kind
        // check above has already rejected them.
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use crate::attrs::{AttrKind, AttrValue, AttributeSpec, Attrs, Constraint};
    use crate::check::{ConfigurationError, Rel};

    #[test]
    fn test_required_missing() {
        let spec = AttributeSpec::required("scale", AttrKind::Float);
        let err = spec.float("Quant", &Attrs::new()).expect_err("");
        assert_eq!(
            err,
            ConfigurationError::Missing {
                op: "Quant".to_string(),
                param: "scale".to_string(),
            }
        );
    }

    #[test]
    fn test_default_applies() {
        let spec = AttributeSpec::optional("delta", AttrKind::Float, Some(AttrValue::Float(1.0)));
        assert_eq!(spec.float("Range", &Attrs::new()).unwrap(), 1.0);
        let attrs = Attrs::new().set("delta", 2.0);
        assert_eq!(spec.float("Range", &attrs).unwrap(), 2.0);
    }

    #[test]
    fn test_wrong_type() {
        let spec = AttributeSpec::required("scale", AttrKind::Float);
        let attrs = Attrs::new().set("scale", "fast");
        let err = spec.float("Quant", &attrs).expect_err("");
        assert_eq!(
            err.to_string(),
            "Quant: attribute scale should be of type float, but got string"
        );
    }

    #[test]
    fn test_number_constraint() {
        let spec = AttributeSpec::optional("delta", AttrKind::Float, Some(AttrValue::Float(1.0)))
            .constrain(Constraint::Number {
                bound: 0.0,
                rel: Rel::Ne,
            });
        assert!(spec.float("Range", &Attrs::new().set("delta", 0.0)).is_err());
        assert_eq!(spec.float("Range", &Attrs::new().set("delta", -2.0)).unwrap(), -2.0);
    }

    #[test]
    fn test_one_of_canonicalizes() {
        let spec = AttributeSpec::optional("padding", AttrKind::Str, Some(AttrValue::Str("valid".to_string())))
            .constrain(Constraint::OneOf {
                choices: &["VALID", "SAME"],
                fold_case: true,
            });
        assert_eq!(spec.string("Op", &Attrs::new()).unwrap(), "VALID");
        assert_eq!(
            spec.string("Op", &Attrs::new().set("padding", "Same")).unwrap(),
            "SAME"
        );
        assert!(spec.string("Op", &Attrs::new().set("padding", "full")).is_err());
    }

    #[test]
    fn test_optional_absent() {
        let spec = AttributeSpec::optional("limit", AttrKind::Float, None);
        assert_eq!(spec.float_opt("Range", &Attrs::new()).unwrap(), None);
        assert_eq!(
            spec.float_opt("Range", &Attrs::new().set("limit", 8.0)).unwrap(),
            Some(8.0)
        );
    }
}
