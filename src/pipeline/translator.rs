//! String translation for property values.
//!
//! Every property converts to and from a string so it can be set from a
//! pipeline file and listed for introspection. Plain values go through
//! [`PropertyValue`]; enumerations use a single [`EnumTable`] that maps each
//! enumerant to exactly one name.

use crate::pipeline::error::{PipelineError, PipelineResult};

/// Bidirectional string mapping for a property value of type `T`.
pub trait Translator<T>: Send + Sync + 'static {
    fn to_str(&self, value: &T) -> String;

    fn from_str(&self, name: &str, s: &str) -> PipelineResult<T>;
}

/// Value types that can back a property with the default translator.
pub trait PropertyValue: Clone + Send + Sync + 'static {
    fn parse_value(s: &str) -> Result<Self, String>;

    fn format_value(&self) -> String;
}

macro_rules! impl_property_value_via_parse {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PropertyValue for $ty {
                fn parse_value(s: &str) -> Result<Self, String> {
                    s.trim().parse::<$ty>().map_err(|e| e.to_string())
                }

                fn format_value(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_property_value_via_parse!(i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl PropertyValue for bool {
    fn parse_value(s: &str) -> Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(format!("'{}' is not a boolean", other)),
        }
    }

    fn format_value(&self) -> String {
        self.to_string()
    }
}

impl PropertyValue for String {
    fn parse_value(s: &str) -> Result<Self, String> {
        Ok(s.to_string())
    }

    fn format_value(&self) -> String {
        self.clone()
    }
}

/// Translator backed by [`PropertyValue`]. Parse failures are configuration errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueTranslator;

impl<T: PropertyValue> Translator<T> for ValueTranslator {
    fn to_str(&self, value: &T) -> String {
        value.format_value()
    }

    fn from_str(&self, name: &str, s: &str) -> PipelineResult<T> {
        T::parse_value(s).map_err(|message| PipelineError::InvalidValue {
            name: name.to_string(),
            value: s.to_string(),
            message,
        })
    }
}

/// Bidirectional lookup table for an enumeration.
///
/// Unrecognized names translate to `default` instead of failing, so a typo
/// in a pipeline file degrades to the documented default.
#[derive(Debug)]
pub struct EnumTable<T: 'static> {
    entries: &'static [(T, &'static str)],
    default: T,
}

impl<T: Copy + PartialEq + 'static> EnumTable<T> {
    pub const fn new(entries: &'static [(T, &'static str)], default: T) -> Self {
        Self { entries, default }
    }

    pub fn default_value(&self) -> T {
        self.default
    }

    pub fn name_of(&self, value: T) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, name)| *name)
    }

    pub fn lookup(&self, name: &str) -> Option<T> {
        self.entries
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(v, _)| *v)
    }

    /// Name-to-value translation with the table's fallback applied.
    pub fn parse(&self, name: &str) -> T {
        self.lookup(name.trim()).unwrap_or(self.default)
    }

    pub fn values(&self) -> impl Iterator<Item = T> + '_ {
        self.entries.iter().map(|(v, _)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(_, n)| *n)
    }

    /// Checks that names and values are unique and the default is present.
    pub fn validate(&self) -> Result<(), String> {
        for (i, (value, name)) in self.entries.iter().enumerate() {
            for (other_value, other_name) in &self.entries[i + 1..] {
                if name == other_name {
                    return Err(format!("name '{}' appears twice", name));
                }
                if value == other_value {
                    return Err(format!("'{}' and '{}' map to the same value", name, other_name));
                }
            }
        }
        if self.name_of(self.default).is_none() {
            return Err("default value has no name".to_string());
        }
        Ok(())
    }
}

impl<T: Copy + PartialEq + Send + Sync + 'static> Translator<T> for &'static EnumTable<T> {
    fn to_str(&self, value: &T) -> String {
        self.name_of(*value)
            .or_else(|| self.name_of(self.default))
            .unwrap_or_default()
            .to_string()
    }

    fn from_str(&self, name: &str, s: &str) -> PipelineResult<T> {
        match self.lookup(s.trim()) {
            Some(value) => Ok(value),
            None => {
                tracing::warn!(
                    "Property '{}': unknown value '{}', using '{}'",
                    name,
                    s,
                    self.to_str(&self.default)
                );
                Ok(self.default)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Binary,
        BinaryInv,
        Trunc,
    }

    static MODES: EnumTable<Mode> = EnumTable::new(
        &[
            (Mode::Binary, "BINARY"),
            (Mode::BinaryInv, "BINARY_INV"),
            (Mode::Trunc, "TRUNC"),
        ],
        Mode::Binary,
    );

    #[test]
    fn test_three_state_mode_table() {
        let t = &MODES;
        assert_eq!(t.from_str("type", "BINARY_INV").unwrap(), Mode::BinaryInv);
        assert_eq!(t.to_str(&Mode::BinaryInv), "BINARY_INV");
        assert!(MODES.validate().is_ok());
    }

    #[test]
    fn test_unknown_name_falls_back_to_default() {
        let t = &MODES;
        assert_eq!(t.from_str("type", "OTSU").unwrap(), Mode::Binary);
        assert_eq!(MODES.parse("nonsense"), Mode::Binary);
    }

    #[test]
    fn test_enum_round_trip_for_every_value() {
        let t = &MODES;
        for v in MODES.values() {
            assert_eq!(t.from_str("type", &t.to_str(&v)).unwrap(), v);
        }
    }

    #[test]
    fn test_validate_detects_duplicate_names() {
        static BROKEN: EnumTable<u8> = EnumTable::new(&[(0, "A"), (1, "A")], 0);
        assert!(BROKEN.validate().is_err());
    }

    #[test]
    fn test_bool_values() {
        assert_eq!(bool::parse_value("1"), Ok(true));
        assert_eq!(bool::parse_value("Off"), Ok(false));
        assert!(bool::parse_value("maybe").is_err());
    }

    #[test]
    fn test_value_translator_rejects_garbage() {
        let err = Translator::<f64>::from_str(&ValueTranslator, "thresh", "abc").unwrap_err();
        assert!(err.is_configuration());
    }

    proptest! {
        #[test]
        fn test_int_round_trip(v in any::<i64>()) {
            let s = Translator::<i64>::to_str(&ValueTranslator, &v);
            prop_assert_eq!(Translator::<i64>::from_str(&ValueTranslator, "n", &s).unwrap(), v);
        }

        #[test]
        fn test_string_round_trip(v in ".*") {
            let s = Translator::<String>::to_str(&ValueTranslator, &v);
            prop_assert_eq!(Translator::<String>::from_str(&ValueTranslator, "s", &s).unwrap(), v);
        }
    }
}
