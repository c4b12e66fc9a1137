//! Data ingestion, normalization, and storage

pub mod normalize;
pub mod provider;
pub mod store;
pub mod synthetic;
pub mod universe;
pub mod watermark;
pub mod yahoo;

pub use normalize::{normalize, CleanedPoint, NormalizeError};
pub use provider::{BarProvider, DataError, DataSource, FetchResult, RawBar};
pub use store::{SeriesMeta, SeriesStore, StoreError};
pub use synthetic::SyntheticProvider;
pub use universe::{normalize_symbol, Universe, UniverseError};
pub use watermark::{reference_now, Stage, WatermarkError, WatermarkStore};
pub use yahoo::YahooProvider;
