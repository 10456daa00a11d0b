use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single parameter value, kept in the textual form handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scalar(String);

impl Scalar {
    pub fn new(value: impl Into<String>) -> Self {
        Scalar(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::new(value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = match RawScalar::deserialize(deserializer)? {
            RawScalar::Bool(b) => b.to_string(),
            RawScalar::Int(i) => i.to_string(),
            RawScalar::Float(x) => format_float(x),
            RawScalar::Text(s) => s,
        };
        Ok(Scalar(text))
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// One position of the generator's argument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Slot {
    /// Candidate values swept in order.
    Sweep(Vec<Scalar>),
    Fixed(Scalar),
}

impl Slot {
    pub fn values(&self) -> &[Scalar] {
        match self {
            Slot::Sweep(values) => values,
            Slot::Fixed(value) => std::slice::from_ref(value),
        }
    }
}

/// Ordered slots; the leftmost slot is the outermost loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterGrid {
    pub slots: Vec<Slot>,
}

impl ParameterGrid {
    pub fn new(slots: Vec<Slot>) -> Self {
        ParameterGrid { slots }
    }

    /// Number of leaves; fixed slots do not multiply the product.
    pub fn leaf_count(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Sweep(values) => values.len(),
                Slot::Fixed(_) => 1,
            })
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_slots_distinguish_fixed_and_swept_values() {
        let grid: ParameterGrid =
            serde_yaml::from_str(r#"["-i", [10, 20, 30], 0.4, 0.0, 3, true]"#).expect("grid");
        assert_eq!(grid.slots.len(), 6);
        assert_eq!(grid.slots[0], Slot::Fixed(Scalar::new("-i")));
        assert_eq!(
            grid.slots[1],
            Slot::Sweep(vec![Scalar::new("10"), Scalar::new("20"), Scalar::new("30")])
        );
        assert_eq!(grid.slots[2].values()[0].as_str(), "0.4");
        assert_eq!(grid.slots[3].values()[0].as_str(), "0.0");
        assert_eq!(grid.slots[4].values()[0].as_str(), "3");
        assert_eq!(grid.slots[5].values()[0].as_str(), "true");
    }

    #[test]
    fn leaf_count_ignores_fixed_slots() {
        let grid = ParameterGrid::new(vec![
            Slot::Fixed("-soft".into()),
            Slot::Sweep(vec!["a1".into(), "a2".into()]),
            Slot::Fixed("0.4".into()),
            Slot::Sweep(vec!["b1".into(), "b2".into(), "b3".into()]),
        ]);
        assert_eq!(grid.leaf_count(), 6);
        assert_eq!(ParameterGrid::default().leaf_count(), 1);
    }
}
