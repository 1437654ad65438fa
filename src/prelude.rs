pub use crate::config::{PoolConfig, PoolConfigBuilder};
pub use crate::dispatch::{Dispatcher, HomeContext, HomeLoop};
pub use crate::error::{BoxError, Error};
pub use crate::executor::{Executor, Job, SerialExecutor, ThreadPool};
pub use crate::task::{AsyncWork, Status, Task, WorkContext};
