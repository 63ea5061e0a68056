//! Range index for the Keep client.
//!
//! A range index is an ordered list of [`Range`] entries that together cover
//! a contiguous byte address space `[0, total_size)`. Each entry maps a slice
//! of that space onto a locator: a block locator for a stream's block list,
//! or a stream offset for a file's segment list.
//!
//! # Operations
//!
//! - [`first_block`] -- binary search for the entry containing an offset
//! - [`locators_and_ranges`] -- resolve a byte range into clipped entries
//! - [`replace_range`] -- splice a new locator over a byte range in place
//!
//! # Invariants
//!
//! 1. Entries are sorted by `range_start`.
//! 2. `entry[i].range_start + entry[i].range_size == entry[i + 1].range_start`.
//! 3. The total size is the end of the last entry (zero when empty).
//! 4. Lookups outside the covered space return no data, never an error.

pub mod error;
pub mod lookup;
pub mod range;
pub mod splice;

pub use error::{RangeError, RangeResult};
pub use lookup::{first_block, locators_and_ranges};
pub use range::{total_size, LocatorAndRange, Range};
pub use splice::replace_range;
