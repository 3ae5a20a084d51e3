//! Page registry, history seam and router

pub mod history;
pub mod registry;
pub mod router;

pub use history::{HistoryDriver, MemoryHistory, RouteHistoryEntry};
pub use registry::{PageName, PageRegistry};
pub use router::{
    parse_fragment, NavigationObserver, NavigationOutcome, NavigationRequest,
    NavigationSource, Router, RouterState,
};
