//! Process-wide UI behavior: device classes, active menu entry, mobile menu
//! and swipe navigation

pub mod active_nav;
pub mod device;
pub mod mobile_menu;
pub mod swipe;

pub use active_nav::{ActiveNav, NavLink};
pub use device::{DeviceDetection, DeviceInfo, DeviceType};
pub use mobile_menu::MobileMenu;
pub use swipe::{classify_swipe, SwipeDirection, SwipeNavigation};
