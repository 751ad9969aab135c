use std::fmt;

/// Describes a device a backend can open.
///
/// Returned by [`Backend::devices`](crate::backend::Backend::devices) and used
/// by front-ends to list devices or let the user pick one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    /// The identifier passed to [`Session::open`](crate::session::Session::open).
    pub name: String,
    /// Manufacturer, as reported by the device.
    pub vendor: String,
    /// Model name, as reported by the device.
    pub model: String,
    /// Device class (e.g. "flatbed scanner", "virtual device").
    pub kind: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<15} {} {} [{}]",
            self.name, self.vendor, self.model, self.kind
        )
    }
}
