//! Small prelude that is wildcard imported by every other module, so that the
//! handful of symbols used all over the place are always in scope.

pub use anyhow::{anyhow, bail, Context as _, Result};
pub use log::{error, warn, info, debug, trace};
