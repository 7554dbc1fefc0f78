//! Mini-languages embedded in configuration document values.
//!
//! Each grammar has its own small codec; they share only the error type.

pub mod chardev;
pub mod disk;
pub mod vfb;
pub mod vif;

pub use chardev::{format_chardev, parse_chardev};
pub use disk::{decode_disk, encode_disk};
pub use vfb::{decode_vfb, encode_vfb};
pub use vif::{decode_vif, encode_vif};
