use std::sync::Arc;

use mockable::{Clock, DefaultClock};

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

pub fn system() -> SharedClock {
    Arc::new(DefaultClock)
}
