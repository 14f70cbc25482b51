mod series;
mod symbol;
mod timestamp;

pub use series::{parse_trading_date, DailyBar, Series};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
