pub mod args;
pub mod coerce;
pub mod config;
pub mod date;
pub mod fetch;
pub mod history;
pub mod naming;
pub mod normalize;
pub mod provider;
pub mod record;
pub mod size;
pub mod table;
pub mod units;

pub use coerce::{try_int, RawValue};
pub use normalize::{ColumnMap, MinSeedPolicy, NormalizeOptions, Normalizer};
pub use record::{RawRow, ResultRecord, SearchMode, UNKNOWN};
pub use size::{convert_size, format_size, SizeOptions, SizeParser};
pub use table::{column_index, ColumnNotFound, Table};
pub use units::{Base, UnitTable};
