//! Bidirectional URL formats.
//!
//! A [`Format<A>`] parses URL components into a typed value `A`, prints a value back into
//! components, and renders a placeholder template such as `/users/:Int`.
//!
//! # Data Flow
//! ```text
//! request target "/users/42?page=2"
//!     → components.rs (segments ["users", "42"], query [page=2])
//!     → Format::parse (literal "users", int segment, int query)
//!     → captured value (42, 2)
//!
//! value (42, 2)
//!     → Format::print → components → "/users/42?page=2"
//! ```
//!
//! # Design Decisions
//! - Parsing is total: mismatch is `None`, never a panic or an error
//! - Path segments are consumed left to right, query lookups never consume
//! - Captures accumulate into flat tuples through [`Append`], literals add nothing
//! - Formats are immutable and cheap to clone (shared closures)
//!
//! ```
//! use stubserve::format::{root, Format};
//!
//! let user: Format<(i64,)> = root().path("users").int().end();
//! assert_eq!(user.render(&(42,)).as_deref(), Some("/users/42"));
//! assert_eq!(user.template_string(), "/users/:Int");
//! ```

mod components;
mod iso;
pub mod template;

use std::fmt;
use std::sync::Arc;

pub use components::{QueryItem, UrlComponents, UrlSlice};
pub use iso::PartialIso;
pub use template::{compile, Param, TemplateError};

type ParseFn<A> = dyn for<'a> Fn(UrlSlice<'a>) -> Option<(UrlSlice<'a>, A)> + Send + Sync;
type PrintFn<A> = dyn Fn(&A) -> Option<UrlComponents> + Send + Sync;
type TemplateFn = dyn Fn() -> UrlComponents + Send + Sync;

/// A parser/printer pair over URL components.
pub struct Format<A> {
    parse: Arc<ParseFn<A>>,
    print: Arc<PrintFn<A>>,
    template: Arc<TemplateFn>,
}

impl<A> Clone for Format<A> {
    fn clone(&self) -> Self {
        Self {
            parse: Arc::clone(&self.parse),
            print: Arc::clone(&self.print),
            template: Arc::clone(&self.template),
        }
    }
}

impl<A> fmt::Debug for Format<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Format").field(&(self.template)().render()).finish()
    }
}

impl<A: 'static> Format<A> {
    pub fn new<P, R, T>(parse: P, print: R, template: T) -> Self
    where
        P: for<'a> Fn(UrlSlice<'a>) -> Option<(UrlSlice<'a>, A)> + Send + Sync + 'static,
        R: Fn(&A) -> Option<UrlComponents> + Send + Sync + 'static,
        T: Fn() -> UrlComponents + Send + Sync + 'static,
    {
        Self {
            parse: Arc::new(parse),
            print: Arc::new(print),
            template: Arc::new(template),
        }
    }

    /// Parse a prefix of `url`, returning what is left and the captured value.
    pub fn parse(&self, url: &UrlComponents) -> Option<(UrlComponents, A)> {
        self.parse_slice(url.as_slice())
            .map(|(rest, value)| (rest.to_components(), value))
    }

    pub fn parse_slice<'a>(&self, input: UrlSlice<'a>) -> Option<(UrlSlice<'a>, A)> {
        (self.parse)(input)
    }

    /// Parse `url` and require every path segment to be consumed.
    pub fn match_url(&self, url: &UrlComponents) -> Option<A> {
        self.parse_slice(url.as_slice())
            .and_then(|(rest, value)| rest.is_empty().then_some(value))
    }

    pub fn print(&self, value: &A) -> Option<UrlComponents> {
        (self.print)(value)
    }

    /// Print and render as an origin-form target.
    pub fn render(&self, value: &A) -> Option<String> {
        self.print(value).map(|url| url.render())
    }

    pub fn template(&self) -> UrlComponents {
        (self.template)()
    }

    pub fn template_string(&self) -> String {
        self.template().render()
    }

    /// Run `self` then `rhs`, capturing both values as a pair.
    pub fn zip<B: 'static>(self, rhs: Format<B>) -> Format<(A, B)> {
        let (lhs_parse, rhs_parse) = (self.parse, rhs.parse);
        let (lhs_print, rhs_print) = (self.print, rhs.print);
        let (lhs_template, rhs_template) = (self.template, rhs.template);
        Format::new(
            move |input| {
                let (input, a) = lhs_parse(input)?;
                let (input, b) = rhs_parse(input)?;
                Some((input, (a, b)))
            },
            move |value: &(A, B)| Some(lhs_print(&value.0)?.append(rhs_print(&value.1)?)),
            move || lhs_template().append(rhs_template()),
        )
    }

    /// Run `self` then a unit format, keeping the left capture.
    pub fn skip(self, rhs: Format<()>) -> Format<A> {
        let (lhs_parse, rhs_parse) = (self.parse, rhs.parse);
        let (lhs_print, rhs_print) = (self.print, rhs.print);
        let (lhs_template, rhs_template) = (self.template, rhs.template);
        Format::new(
            move |input| {
                let (input, a) = lhs_parse(input)?;
                let (input, ()) = rhs_parse(input)?;
                Some((input, a))
            },
            move |value| Some(lhs_print(value)?.append(rhs_print(&())?)),
            move || lhs_template().append(rhs_template()),
        )
    }

    /// Run `self` then `rhs`, appending its capture to the flat tuple.
    pub fn capture<T: 'static>(self, rhs: Format<T>) -> Format<A::Output>
    where
        A: Append<T>,
        A::Output: 'static,
    {
        let (lhs_parse, rhs_parse) = (self.parse, rhs.parse);
        let (lhs_print, rhs_print) = (self.print, rhs.print);
        let (lhs_template, rhs_template) = (self.template, rhs.template);
        Format::new(
            move |input| {
                let (input, a) = lhs_parse(input)?;
                let (input, t) = rhs_parse(input)?;
                Some((input, a.append(t)))
            },
            move |value: &A::Output| {
                let (a, t) = A::split(value);
                Some(lhs_print(&a)?.append(rhs_print(&t)?))
            },
            move || lhs_template().append(rhs_template()),
        )
    }

    /// Transform the captured value through a partial isomorphism.
    pub fn map<B, F, G>(self, forward: F, backward: G) -> Format<B>
    where
        B: 'static,
        F: Fn(A) -> Option<B> + Send + Sync + 'static,
        G: Fn(&B) -> Option<A> + Send + Sync + 'static,
    {
        let (parse, print, template) = (self.parse, self.print, self.template);
        Format::new(
            move |input| {
                let (input, a) = parse(input)?;
                Some((input, forward(a)?))
            },
            move |value: &B| print(&backward(value)?),
            move || template(),
        )
    }

    /// Append a literal segment.
    pub fn path(self, literal: impl Into<String>) -> Format<A> {
        self.skip(path(literal))
    }

    /// Require the path to be exhausted.
    pub fn end(self) -> Format<A> {
        self.skip(end())
    }

    /// Require a query item with exactly this value.
    pub fn query_eq(self, name: impl Into<String>, value: impl Into<String>) -> Format<A> {
        self.skip(query(name, PartialIso::exactly(value)))
    }

    pub fn segment<T: 'static>(self, iso: PartialIso<T>) -> Format<A::Output>
    where
        A: Append<T>,
        A::Output: 'static,
    {
        self.capture(segment(iso))
    }

    pub fn int(self) -> Format<A::Output>
    where
        A: Append<i64>,
        A::Output: 'static,
    {
        self.capture(int())
    }

    pub fn string(self) -> Format<A::Output>
    where
        A: Append<String>,
        A::Output: 'static,
    {
        self.capture(string())
    }

    pub fn query<T: 'static>(self, name: impl Into<String>, iso: PartialIso<T>) -> Format<A::Output>
    where
        A: Append<T>,
        A::Output: 'static,
    {
        self.capture(query(name, iso))
    }

    pub fn query_int(self, name: impl Into<String>) -> Format<A::Output>
    where
        A: Append<i64>,
        A::Output: 'static,
    {
        self.query(name, PartialIso::int())
    }

    pub fn query_string(self, name: impl Into<String>) -> Format<A::Output>
    where
        A: Append<String>,
        A::Output: 'static,
    {
        self.query(name, PartialIso::string())
    }
}

impl Format<()> {
    /// Run a unit format then `rhs`, keeping the right capture.
    pub fn then<B: 'static>(self, rhs: Format<B>) -> Format<B> {
        let (lhs_parse, rhs_parse) = (self.parse, rhs.parse);
        let (lhs_print, rhs_print) = (self.print, rhs.print);
        let (lhs_template, rhs_template) = (self.template, rhs.template);
        Format::new(
            move |input| {
                let (input, ()) = lhs_parse(input)?;
                rhs_parse(input)
            },
            move |value| Some(lhs_print(&())?.append(rhs_print(value)?)),
            move || lhs_template().append(rhs_template()),
        )
    }
}

impl<T: Clone + 'static> Format<Vec<T>> {
    /// A format that matches anything and captures an empty list.
    pub fn list() -> Self {
        Format::new(
            |input| Some((input, Vec::new())),
            |value: &Vec<T>| value.is_empty().then(UrlComponents::new),
            UrlComponents::new,
        )
    }

    /// Run `self` then `rhs`, pushing its capture onto the list.
    pub fn push(self, rhs: Format<T>) -> Self {
        let (lhs_parse, rhs_parse) = (self.parse, rhs.parse);
        let (lhs_print, rhs_print) = (self.print, rhs.print);
        let (lhs_template, rhs_template) = (self.template, rhs.template);
        Format::new(
            move |input| {
                let (input, mut values) = lhs_parse(input)?;
                let (input, value) = rhs_parse(input)?;
                values.push(value);
                Some((input, values))
            },
            move |values: &Vec<T>| {
                let (last, init) = values.split_last()?;
                Some(lhs_print(&init.to_vec())?.append(rhs_print(last)?))
            },
            move || lhs_template().append(rhs_template()),
        )
    }
}

impl From<&str> for Format<()> {
    fn from(literal: &str) -> Self {
        path(literal)
    }
}

/// The identity format: matches anything, consumes nothing.
pub fn root() -> Format<()> {
    Format::new(
        |input| Some((input, ())),
        |_| Some(UrlComponents::new()),
        UrlComponents::new,
    )
}

/// Match one segment equal to `literal`.
pub fn path(literal: impl Into<String>) -> Format<()> {
    let literal: Arc<str> = literal.into().into();
    let printed = Arc::clone(&literal);
    let templated = Arc::clone(&literal);
    Format::new(
        move |input| {
            let (head, rest) = input.split_first()?;
            (head == &*literal).then_some((rest, ()))
        },
        move |_| Some(UrlComponents::new().with_segment(printed.to_string())),
        move || UrlComponents::new().with_segment(templated.to_string()),
    )
}

/// Match one segment coerced through `iso`.
pub fn segment<T: 'static>(iso: PartialIso<T>) -> Format<T> {
    let printer = iso.clone();
    let placeholder = iso.placeholder();
    Format::new(
        move |input| {
            let (head, rest) = input.split_first()?;
            Some((rest, iso.apply(head)?))
        },
        move |value| Some(UrlComponents::new().with_segment(printer.unapply(value)?)),
        move || UrlComponents::new().with_segment(placeholder.clone()),
    )
}

pub fn int() -> Format<i64> {
    segment(PartialIso::int())
}

pub fn string() -> Format<String> {
    segment(PartialIso::string())
}

/// Look up the first query item named `name` and coerce its value.
pub fn query<T: 'static>(name: impl Into<String>, iso: PartialIso<T>) -> Format<T> {
    let name: Arc<str> = name.into().into();
    let (print_name, template_name) = (Arc::clone(&name), Arc::clone(&name));
    let printer = iso.clone();
    let placeholder = iso.placeholder();
    Format::new(
        move |input| {
            let raw = input.query_value(&name).flatten()?;
            Some((input, iso.apply(raw)?))
        },
        move |value| {
            let raw = printer.unapply(value)?;
            Some(UrlComponents::new().with_query(print_name.to_string(), raw))
        },
        move || UrlComponents::new().with_query(template_name.to_string(), placeholder.clone()),
    )
}

/// Match only when no path segments remain.
pub fn end() -> Format<()> {
    Format::new(
        |input| input.is_empty().then_some((input, ())),
        |_| Some(UrlComponents::new()),
        UrlComponents::new,
    )
}

/// Flat-tuple accumulation of captured values.
///
/// `()` + `T` is `(T,)`, `(T1,)` + `T` is `(T1, T)`, and so on up to ten elements.
pub trait Append<T>: Sized {
    type Output;

    fn append(self, value: T) -> Self::Output;

    /// Inverse of [`append`](Append::append), used when printing.
    fn split(output: &Self::Output) -> (Self, T);
}

macro_rules! impl_append {
    ($($t:ident)*) => {
        impl<$($t: Clone,)* T: Clone> Append<T> for ($($t,)*) {
            type Output = ($($t,)* T,);

            #[allow(non_snake_case)]
            fn append(self, value: T) -> Self::Output {
                let ($($t,)*) = self;
                ($($t,)* value,)
            }

            #[allow(non_snake_case)]
            fn split(output: &Self::Output) -> (Self, T) {
                let ($($t,)* value,) = output;
                (($($t.clone(),)*), value.clone())
            }
        }
    };
}

impl_append!();
impl_append!(T1);
impl_append!(T1 T2);
impl_append!(T1 T2 T3);
impl_append!(T1 T2 T3 T4);
impl_append!(T1 T2 T3 T4 T5);
impl_append!(T1 T2 T3 T4 T5 T6);
impl_append!(T1 T2 T3 T4 T5 T6 T7);
impl_append!(T1 T2 T3 T4 T5 T6 T7 T8);
impl_append!(T1 T2 T3 T4 T5 T6 T7 T8 T9);
