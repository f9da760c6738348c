//! Search spaces and the values picked from them.

use std::{
    collections::HashSet,
    fmt::{self, Display},
};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
};

use crate::{Result, TunerErr};

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Returns the kind of value, with its article.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "a bool",
            Value::Int(_) => "an int",
            Value::Float(_) => "a float",
            Value::String(_) => "a string",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// A named hyperparameter and the values the grid takes for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParameter {
    pub name: String,
    pub values: Vec<Value>,
}

/// The hyperparameters to search over, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<HyperParameter>", into = "Vec<HyperParameter>")]
pub struct SearchSpace {
    params: Vec<HyperParameter>,
}

impl SearchSpace {
    /// Creates an empty `SearchSpace`, its grid has a single point with no values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a hyperparameter that takes each of `values`.
    ///
    /// # Returns
    /// An error if the name was already declared or there are no values.
    pub fn choice<N, I, V>(&mut self, name: N, values: I) -> Result<&mut Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let name = name.into();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();

        if values.is_empty() {
            return Err(TunerErr::InvalidSpace(format!("{name} has no values")));
        }

        if self.params.iter().any(|p| p.name == name) {
            return Err(TunerErr::InvalidSpace(format!("{name} is declared twice")));
        }

        self.params.push(HyperParameter { name, values });
        Ok(self)
    }

    /// Declares a hyperparameter with a single value.
    pub fn fixed<N, V>(&mut self, name: N, value: V) -> Result<&mut Self>
    where
        N: Into<String>,
        V: Into<Value>,
    {
        self.choice(name, [value])
    }

    pub fn params(&self) -> &[HyperParameter] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the amount of points in the grid.
    pub fn grid_size(&self) -> usize {
        self.params
            .iter()
            .fold(1, |size, p| size.saturating_mul(p.values.len()))
    }

    /// Returns the `k`-th point of the grid, the last declared hyperparameter varies the fastest.
    ///
    /// # Returns
    /// `None` if `k` is past the end of the grid.
    pub fn combination(&self, mut k: usize) -> Option<HyperValues> {
        if k >= self.grid_size() {
            return None;
        }

        let mut picked = Vec::with_capacity(self.params.len());

        for p in self.params.iter().rev() {
            let n = p.values.len();
            picked.push((p.name.clone(), p.values[k % n].clone()));
            k /= n;
        }

        picked.reverse();
        Some(HyperValues(picked))
    }
}

impl TryFrom<Vec<HyperParameter>> for SearchSpace {
    type Error = TunerErr;

    fn try_from(params: Vec<HyperParameter>) -> Result<Self> {
        let mut space = Self::new();

        for HyperParameter { name, values } in params {
            space.choice(name, values)?;
        }

        Ok(space)
    }
}

impl From<SearchSpace> for Vec<HyperParameter> {
    fn from(space: SearchSpace) -> Self {
        space.params
    }
}

/// The values of a single grid point, keyed by hyperparameter name.
///
/// Serialized as a JSON object that keeps the declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HyperValues(Vec<(String, Value)>);

impl HyperValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing its previous value if it had one.
    pub fn insert<N: Into<String>, V: Into<Value>>(&mut self, name: N, value: V) {
        let (name, value) = (name.into(), value.into());

        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns the value of `name` or an error if it's missing.
    pub fn value(&self, name: &str) -> Result<&Value> {
        self.get(name)
            .ok_or_else(|| TunerErr::MissingHyperParameter(name.to_string()))
    }

    /// Returns `name` as a float, ints are converted.
    pub fn float(&self, name: &str) -> Result<f64> {
        match self.value(name)? {
            Value::Float(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            other => Err(wrong_type(name, "a float", other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.value(name)? {
            Value::Int(i) => Ok(*i),
            other => Err(wrong_type(name, "an int", other)),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.value(name)? {
            Value::Bool(b) => Ok(*b),
            other => Err(wrong_type(name, "a bool", other)),
        }
    }

    pub fn string(&self, name: &str) -> Result<&str> {
        match self.value(name)? {
            Value::String(s) => Ok(s),
            other => Err(wrong_type(name, "a string", other)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn wrong_type(name: &str, expected: &'static str, found: &Value) -> TunerErr {
    TunerErr::WrongType {
        name: name.to_string(),
        expected,
        found: found.type_name(),
    }
}

impl Display for HyperValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }

            write!(f, "{name}={value}")?;
        }

        Ok(())
    }
}

impl Serialize for HyperValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(n, v)| (n, v)))
    }
}

impl<'de> Deserialize<'de> for HyperValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HyperValuesVisitor;

        impl<'de> Visitor<'de> for HyperValuesVisitor {
            type Value = HyperValues;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a map of hyperparameter names to values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<HyperValues, A::Error> {
                let mut seen = HashSet::new();
                let mut values = Vec::with_capacity(map.size_hint().unwrap_or_default());

                while let Some((name, value)) = map.next_entry::<String, Value>()? {
                    if !seen.insert(name.clone()) {
                        return Err(serde::de::Error::custom(format!("duplicate key {name}")));
                    }

                    values.push((name, value));
                }

                Ok(HyperValues(values))
            }
        }

        deserializer.deserialize_map(HyperValuesVisitor)
    }
}
