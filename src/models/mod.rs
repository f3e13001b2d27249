//! Size data model: symbols, snapshots and diffs

pub mod delta;
pub mod size_info;
pub mod symbol;

pub use delta::{DeltaSymbol, DeltaSymbolGroup, DiffStatus, StatusCounts};
pub use size_info::{DeltaSizeInfo, Metadata, SizeInfo};
pub use symbol::{Symbol, SymbolFlags, SymbolGroup};
