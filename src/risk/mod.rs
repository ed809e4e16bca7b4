pub mod breakeven;
pub mod budget;

pub use breakeven::{find_breakeven_leveraged, find_breakeven_option, Breakeven};
pub use budget::{affordable_contracts, contracts_within_capital, BudgetAllocation, BudgetAllocator};
