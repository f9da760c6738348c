mod projection;
mod table;

pub use projection::Projection;
pub use table::LatentTable;
