#![forbid(unsafe_code)]

//! Key material for sigill: the [`Key`] container and loaders for every
//! supported [`KeyDataFormat`].

pub mod key;
pub mod loader;

pub use key::{Key, KeyData};
pub use loader::{
    load_from_file, load_from_file_with_password, load_from_memory,
    load_from_memory_with_password, KeyDataFormat,
};
