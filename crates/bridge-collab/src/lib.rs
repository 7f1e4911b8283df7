pub mod directory;
pub mod escrow;
pub mod executor;
pub mod mocks;

pub use directory::{DirectoryClient, HttpDirectoryClient};
pub use escrow::{EscrowClient, HttpEscrowClient, NullEscrowClient, ValidateOutcome};
pub use executor::{truncate_output, ExecutionResult, Executor, SubprocessExecutor};
