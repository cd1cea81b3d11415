pub mod create;
pub mod detach;
pub mod run_bypassed;
