//! Device classification from the user agent
//!
//! Tablet patterns win over phone patterns, so an Android user agent without
//! `mobi` counts as a tablet.

use crate::dom::{ClassList, ListenerRegistry};
use crate::error::Result;
use crate::modules::GlobalModule;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::info;

static MOBILE_UA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Android|webOS|iPhone|iPod|BlackBerry|IEMobile|Opera Mini")
        .expect("valid mobile regex")
});

static TABLET_UA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)tablet|ipad|playbook|silk").expect("valid tablet regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

/// Landscape only when strictly wider than tall
pub fn orientation(width: u32, height: u32) -> Orientation {
    if width > height {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    }
}

/// What kind of device the site is running on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_touch: bool,
}

impl DeviceInfo {
    pub fn detect(user_agent: &str, is_touch: bool) -> Self {
        let is_mobile = MOBILE_UA.is_match(user_agent);
        let is_tablet = TABLET_UA.is_match(user_agent) || is_android_tablet(user_agent);

        let device_type = if is_tablet {
            DeviceType::Tablet
        } else if is_mobile {
            DeviceType::Mobile
        } else {
            DeviceType::Desktop
        };

        Self {
            device_type,
            is_mobile,
            is_tablet,
            is_touch,
        }
    }

    pub fn is_desktop(&self) -> bool {
        self.device_type == DeviceType::Desktop
    }

    /// Body classes for this device
    pub fn body_classes(&self) -> Vec<String> {
        let mut classes = vec![format!("device-{}", self.device_type)];
        classes.push(if self.is_touch { "touch-device" } else { "no-touch" }.to_string());
        if self.is_mobile || self.is_tablet {
            classes.push("mobile-device".to_string());
        }
        classes
    }
}

/// `android` with no `mobi` anywhere after it
fn is_android_tablet(user_agent: &str) -> bool {
    let lower = user_agent.to_ascii_lowercase();
    lower
        .match_indices("android")
        .any(|(at, _)| !lower[at..].contains("mobi"))
}

/// Applies device classes to the body at startup
pub struct DeviceDetection {
    info: DeviceInfo,
    body: Arc<ClassList>,
}

impl DeviceDetection {
    pub fn new(info: DeviceInfo, body: Arc<ClassList>) -> Self {
        Self { info, body }
    }

    pub fn info(&self) -> DeviceInfo {
        self.info
    }
}

impl GlobalModule for DeviceDetection {
    fn name(&self) -> &'static str {
        "device-detection"
    }

    fn init(&self, _listeners: &ListenerRegistry) -> Result<()> {
        for class in self.info.body_classes() {
            self.body.add(&class);
        }
        info!(device = %self.info.device_type, "Device detected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148";
    const ANDROID_PHONE: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) Mobile Safari/537.36";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X710) Safari/537.36";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_0 like Mac OS X)";
    const DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

    #[test]
    fn test_classification() {
        assert_eq!(DeviceInfo::detect(IPHONE, true).device_type, DeviceType::Mobile);
        assert_eq!(DeviceInfo::detect(ANDROID_PHONE, true).device_type, DeviceType::Mobile);
        assert_eq!(DeviceInfo::detect(ANDROID_TABLET, true).device_type, DeviceType::Tablet);
        assert_eq!(DeviceInfo::detect(IPAD, true).device_type, DeviceType::Tablet);
        assert!(DeviceInfo::detect(DESKTOP, false).is_desktop());
    }

    #[test]
    fn test_android_tablet_is_also_mobile() {
        let info = DeviceInfo::detect(ANDROID_TABLET, true);
        assert!(info.is_mobile);
        assert!(info.is_tablet);
    }

    #[test]
    fn test_body_classes() {
        let body = Arc::new(ClassList::new());
        let module = DeviceDetection::new(DeviceInfo::detect(IPAD, true), body.clone());
        module.init(&ListenerRegistry::new()).unwrap();
        assert_eq!(
            body.snapshot(),
            vec!["device-tablet", "mobile-device", "touch-device"]
        );

        let desktop = DeviceInfo::detect(DESKTOP, false);
        assert_eq!(desktop.body_classes(), vec!["device-desktop", "no-touch"]);
    }

    #[test]
    fn test_orientation() {
        assert_eq!(orientation(1280, 720), Orientation::Landscape);
        assert_eq!(orientation(720, 720), Orientation::Portrait);
    }
}
