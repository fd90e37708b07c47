//! Declaration model
//!
//! Immutable records describing keys, binding declarations, modules and
//! components. They are produced by an external declaration extraction
//! step (or deserialized from a document) and never mutated by resolution.

pub mod binding;
pub mod component;
pub mod key;
pub mod module;
pub mod request;

pub use binding::{Binding, BindingElement, BindingKind};
pub use component::{
    BoundInstance, ComponentDependency, ComponentDescriptor, EntryPoint, ProvisionMethod,
};
pub use key::{Annotation, BindingKey, ContributionId, Key, Qualifier, Scope, TypeName};
pub use module::{
    ModuleDescriptor, MultibindingDeclaration, MultibindingKind, OptionalDeclaration,
};
pub use request::{DependencyRequest, RequestKind};
