pub mod interrupt;
pub(crate) mod scope_guard;
pub mod thread;

pub use interrupt::InterruptHandle;
