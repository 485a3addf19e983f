use bitflags::bitflags;

/// Open options for [`crate::Dataset`]
#[derive(Debug, Default)]
pub struct DatasetOptions<'a> {
    pub open_flags: OpenFlags,
    /// Restrict identification to these driver short names.
    pub allowed_drivers: Option<&'a [&'a str]>,
}

bitflags! {
    /// Open flags used by [`crate::Dataset::open_ex`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open in read-only mode (default).
        const READONLY = 0x00;
        /// Open in update mode.
        const UPDATE = 0x01;
        /// Allow raster drivers to be used.
        const RASTER = 0x02;
        /// Allow vector drivers to be used.
        const VECTOR = 0x04;
    }
}

impl Default for OpenFlags {
    fn default() -> OpenFlags {
        OpenFlags::READONLY
    }
}

/// Access mode of an opened dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    Update,
}

impl From<OpenFlags> for Access {
    fn from(flags: OpenFlags) -> Access {
        if flags.contains(OpenFlags::UPDATE) {
            Access::Update
        } else {
            Access::ReadOnly
        }
    }
}

/// Parses `KEY=VALUE` option strings, as accepted by creation and metadata
/// options.
pub(crate) fn parse_key_values(
    option: &'static str,
    items: &[String],
) -> crate::errors::Result<Vec<(String, String)>> {
    items
        .iter()
        .map(|item| match item.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(crate::errors::GeoError::InvalidOption {
                option,
                msg: format!("'{item}' is not of the form KEY=VALUE"),
            }),
        })
        .collect()
}
