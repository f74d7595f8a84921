pub mod method;
pub mod range;
pub mod series;
pub mod symbol;

pub use method::{DataMethod, MethodCategory};
pub use range::DateRange;
pub use series::PriceSeries;
pub use symbol::{Symbol, SymbolKind};
