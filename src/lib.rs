#![doc = include_str!("../README.md")]

pub mod container;
pub mod logger;

pub mod prelude {
    pub use crate::container::{
        via, via_type, Condition, Container, ContainerError, ContainerResult, Registrar,
        Registration, Registry, RegistryExt, Selection, Selector,
    };
}
