//! Resource drivers (C5): list/get orchestration per entity set, built on
//! the shared reshape/envelope helpers and the batched `$expand` resolver.

pub mod envelope;
pub mod expand;
pub mod member;
pub mod office;
pub mod property;

pub use member::MemberDriver;
pub use office::OfficeDriver;
pub use property::PropertyDriver;
