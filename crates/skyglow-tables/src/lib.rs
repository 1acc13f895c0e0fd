pub mod encode;
pub mod error;
pub mod format;
pub mod load;
pub mod slice;

pub use encode::{encode_table_2d, encode_table_4d};
pub use error::TableLoadError;
pub use format::{Header2d, Header4d};
pub use load::{load_table_2d, load_table_4d, Table2d, Table4d};
pub use slice::AltitudeSlice;
