//! Filter translation: user rules and filter documents into `Predicate`s.
//!
//! Pure functions, no I/O.

pub mod coerce;
pub mod normalize;
pub mod translator;

pub use self::normalize::parse_document;
pub use self::translator::translate;
