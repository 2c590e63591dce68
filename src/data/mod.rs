/// Data layer: catalog tables, loading, normalisation, filtering and
/// star-system aggregation.
///
/// Architecture:
/// ```text
///  .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → PlanetTable
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ normalize  │  resolve canonical columns from aliases
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  query parameters → FilterSpec → matching row indices
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ aggregate  │  group by star, seeded sample, coords → StarSystemSummary
///   └───────────┘
/// ```

pub mod aggregate;
pub mod coords;
pub mod filter;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod sample;
