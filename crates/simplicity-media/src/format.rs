use simplicity_core::{SimplicityError, SimplicityResult, join_path};

/// Container encoding of a stored variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// Opaque bytes with no implied encoding.
    Data,
    Jpeg,
    Png,
}

impl Container {
    pub fn ext(&self) -> &'static str {
        match self {
            Container::Data => "data",
            Container::Jpeg => "jpeg",
            Container::Png => "png",
        }
    }
}

/// A named presentation format. A zero width means the image keeps the
/// dimensions it was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Format {
    pub name: &'static str,
    pub container: Container,
    pub width: u32,
    pub height: u32,
}

impl Format {
    /// Unnamed format describing an uploaded file before it is normalized.
    pub const fn inbound(container: Container) -> Self {
        Self {
            name: "",
            container,
            width: 0,
            height: 0,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.container.ext())
    }

    pub fn has_size(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn is_source(&self) -> bool {
        *self == SOURCE
    }
}

pub const SOURCE: Format = Format {
    name: "source",
    container: Container::Data,
    width: 0,
    height: 0,
};

/// Lossless normalized copy every derived variant is computed from.
pub const CANONICAL: Format = Format {
    name: "canonical",
    container: Container::Png,
    width: 0,
    height: 0,
};

/// 3:2 display size.
pub const WEB_STD: Format = Format {
    name: "web-std",
    container: Container::Jpeg,
    width: 1280,
    height: 853,
};

pub const WEB_THUMB_SQ: Format = Format {
    name: "web-thumb-sq",
    container: Container::Jpeg,
    width: 400,
    height: 400,
};

pub static FORMATS: [Format; 4] = [SOURCE, CANONICAL, WEB_STD, WEB_THUMB_SQ];

pub fn resolve_format(name: &str) -> SimplicityResult<&'static Format> {
    FORMATS
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| SimplicityError::UnknownFormat(name.to_string()))
}

/// Map a file extension onto a decodable container.
pub fn resolve_container(ext: &str) -> SimplicityResult<Container> {
    match ext.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => Ok(Container::Jpeg),
        "png" => Ok(Container::Png),
        _ => Err(SimplicityError::UnsupportedEncoding(ext.to_string())),
    }
}

pub fn resolve_mime(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Storage key of one variant of a logical id: `{id}/{name}.{ext}`.
pub fn storage_path(id: &str, format: &Format) -> String {
    join_path(id, &format.file_name())
}
