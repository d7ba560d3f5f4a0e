//! Partial isomorphisms between raw URL text and typed values.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

type Apply<T> = dyn Fn(&str) -> Option<T> + Send + Sync;
type Unapply<T> = dyn Fn(&T) -> Option<String> + Send + Sync;

/// A pair of fallible conversions `&str -> T` and `&T -> String`.
///
/// The name shows up in templates as `:Name`, or verbatim for a literal.
pub struct PartialIso<T> {
    apply: Arc<Apply<T>>,
    unapply: Arc<Unapply<T>>,
    name: Cow<'static, str>,
    literal: bool,
}

impl<T> Clone for PartialIso<T> {
    fn clone(&self) -> Self {
        Self {
            apply: Arc::clone(&self.apply),
            unapply: Arc::clone(&self.unapply),
            name: self.name.clone(),
            literal: self.literal,
        }
    }
}

impl<T> fmt::Debug for PartialIso<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PartialIso").field(&self.name).finish()
    }
}

impl<T: 'static> PartialIso<T> {
    pub fn new<F, G>(name: impl Into<Cow<'static, str>>, apply: F, unapply: G) -> Self
    where
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
        G: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            apply: Arc::new(apply),
            unapply: Arc::new(unapply),
            name: name.into(),
            literal: false,
        }
    }

    pub fn apply(&self, raw: &str) -> Option<T> {
        (self.apply)(raw)
    }

    pub fn unapply(&self, value: &T) -> Option<String> {
        (self.unapply)(value)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text rendered in a template: `:Name`, or the raw value of a literal.
    pub fn placeholder(&self) -> String {
        if self.literal {
            self.name.to_string()
        } else {
            format!(":{}", self.name)
        }
    }
}

impl<T: FromStr + ToString + 'static> PartialIso<T> {
    /// Coerce through `FromStr` and print through `ToString`.
    pub fn parsed(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, |raw| raw.parse().ok(), |value| Some(value.to_string()))
    }
}

impl PartialIso<String> {
    /// Any non-empty text.
    pub fn string() -> Self {
        Self::new(
            "String",
            |raw| (!raw.is_empty()).then(|| raw.to_string()),
            |value: &String| (!value.is_empty()).then(|| value.clone()),
        )
    }
}

impl PartialIso<i64> {
    pub fn int() -> Self {
        Self::parsed("Int")
    }
}

impl PartialIso<()> {
    /// Matches exactly `expected` and captures nothing.
    pub fn exactly(expected: impl Into<String>) -> Self {
        let expected: Arc<str> = expected.into().into();
        let printed = Arc::clone(&expected);
        let name = expected.to_string();
        Self {
            literal: true,
            ..Self::new(
                name,
                move |raw| (raw == &*expected).then_some(()),
                move |_| Some(printed.to_string()),
            )
        }
    }
}
