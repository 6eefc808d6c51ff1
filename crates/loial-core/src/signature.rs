//! Declared parameter lists.

use crate::types::TypeHint;
use crate::value::Value;

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub hint: Option<TypeHint>,
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            hint: None,
            default: None,
        }
    }

    /// Attach a type hint.
    pub fn hint(mut self, hint: impl Into<TypeHint>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a default value, making the parameter optional.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Parameter names, hints and defaults of a host function, plus its return
/// hint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredSignature {
    params: Vec<Param>,
    return_hint: Option<TypeHint>,
}

impl DeclaredSignature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Append an unhinted, required parameter.
    pub fn arg(self, name: impl Into<String>) -> Self {
        self.param(Param::new(name))
    }

    /// Append a hinted, required parameter.
    pub fn typed(self, name: impl Into<String>, hint: impl Into<TypeHint>) -> Self {
        self.param(Param::new(name).hint(hint))
    }

    /// Set the return hint.
    pub fn returns(mut self, hint: impl Into<TypeHint>) -> Self {
        self.return_hint = Some(hint.into());
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn return_hint(&self) -> Option<&TypeHint> {
        self.return_hint.as_ref()
    }

    /// Position and declaration of the parameter called `name`.
    pub fn find(&self, name: &str) -> Option<(usize, &Param)> {
        self.params.iter().enumerate().find(|(_, p)| p.name == name)
    }
}
