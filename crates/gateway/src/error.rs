pub use doorman_common::{Error, Result};

doorman_common::impl_context!();
