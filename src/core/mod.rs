// Domain-layer modules and shared errors/models
pub mod retrieval {
    pub use crate::retrieval::*;
}

pub mod search {
    pub use crate::search::*;
}

pub mod extractors {
    pub use crate::extractors::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
