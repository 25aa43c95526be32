//! Small generic helpers shared by services built on this crate

pub mod collections;
pub mod set;

pub use collections::{
    contains, filter, first_in_list, from_json_bytes, list_to_map, map, read_file_to_string,
    true_or_none,
};
pub use set::Set;
