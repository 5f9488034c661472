use crate::error::{Error, Result};

/// One hop of a device location path. `Pci` carries the enumerator's 4-hex
/// byte pair positionally; the field names follow the firmware dialect's
/// `Pci(device,function)` convention without reinterpreting the values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    PciRoot { root: u32 },
    Pci { device: u8, function: u8 },
    AcpiName { name: String },
}

/// Target dialect for `DevicePath::convert`. The ACPI name path is
/// emit-only; there is no parser for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notation {
    Enumerator,
    Firmware,
    AcpiNames,
}

/// Homogeneous sequence of path segments: either all PCI-family
/// (`PciRoot`/`Pci`) or all ACPI names. Mixed paths are rejected at parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevicePath {
    segments: Vec<PathSegment>,
}

fn syntax(text: &str, reason: &str) -> Error {
    Error::UnrecognizedPathSyntax { text: text.to_string(), reason: reason.to_string() }
}

fn tag_body<'a>(part: &'a str, tag: &str) -> Option<&'a str> {
    part.strip_prefix(tag)?.strip_prefix('(')?.strip_suffix(')')
}

impl DevicePath {
    fn new(segments: Vec<PathSegment>) -> Result<Self> {
        let has_pci = segments
            .iter()
            .any(|s| matches!(s, PathSegment::PciRoot { .. } | PathSegment::Pci { .. }));
        let has_acpi = segments.iter().any(|s| matches!(s, PathSegment::AcpiName { .. }));
        if has_pci && has_acpi {
            return Err(Error::UnsupportedSegment(
                "path mixes PCI and ACPI name segments".to_string(),
            ));
        }
        Ok(DevicePath { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Parses the enumerator (Windows location path) dialect:
    /// `PCIROOT(0)#PCI(0100)#PCI(0000)` or `ACPI(_SB_)#ACPI(PCI0)#ACPI(GFX0)`.
    pub fn parse_enumerator(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(syntax(text, "empty path"));
        }
        let mut segments = Vec::new();
        for part in text.split('#') {
            let seg = if let Some(body) = tag_body(part, "PCIROOT") {
                let root = body
                    .parse::<u32>()
                    .map_err(|_| syntax(part, "PCIROOT index must be decimal"))?;
                PathSegment::PciRoot { root }
            } else if let Some(body) = tag_body(part, "ACPI") {
                if body.is_empty() {
                    return Err(syntax(part, "empty ACPI name"));
                }
                PathSegment::AcpiName { name: body.to_string() }
            } else if let Some(body) = tag_body(part, "PCI") {
                if body.len() != 4 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(syntax(part, "PCI segment needs exactly 4 hex digits"));
                }
                let device = u8::from_str_radix(&body[..2], 16)
                    .map_err(|_| syntax(part, "bad hex in PCI segment"))?;
                let function = u8::from_str_radix(&body[2..], 16)
                    .map_err(|_| syntax(part, "bad hex in PCI segment"))?;
                PathSegment::Pci { device, function }
            } else {
                return Err(syntax(part, "unknown segment tag"));
            };
            segments.push(seg);
        }
        Self::new(segments)
    }

    /// Parses the firmware device-path dialect:
    /// `PciRoot(0x0)/Pci(0x1,0x0)/Pci(0x0,0x0)`.
    pub fn parse_firmware(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(syntax(text, "empty path"));
        }
        let mut segments = Vec::new();
        for part in text.split('/') {
            let seg = if let Some(body) = tag_body(part, "PciRoot") {
                let hex = body
                    .strip_prefix("0x")
                    .ok_or_else(|| syntax(part, "PciRoot index must be 0x-prefixed hex"))?;
                let root = u32::from_str_radix(hex, 16)
                    .map_err(|_| syntax(part, "bad hex in PciRoot segment"))?;
                PathSegment::PciRoot { root }
            } else if let Some(body) = tag_body(part, "Pci") {
                let (a, b) = body
                    .split_once(',')
                    .ok_or_else(|| syntax(part, "Pci segment needs two comma-separated values"))?;
                let device = parse_hex_byte(a).ok_or_else(|| syntax(part, "bad hex in Pci segment"))?;
                let function = parse_hex_byte(b).ok_or_else(|| syntax(part, "bad hex in Pci segment"))?;
                PathSegment::Pci { device, function }
            } else {
                return Err(syntax(part, "unknown segment tag"));
            };
            segments.push(seg);
        }
        Self::new(segments)
    }

    /// Dialect sniff by prefix; accepts either parseable notation.
    pub fn parse_auto(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.starts_with("PCIROOT") || trimmed.starts_with("ACPI") {
            Self::parse_enumerator(trimmed)
        } else if trimmed.starts_with("PciRoot") {
            Self::parse_firmware(trimmed)
        } else {
            Err(syntax(trimmed, "unrecognized path dialect"))
        }
    }

    pub fn to_enumerator(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                PathSegment::PciRoot { root } => format!("PCIROOT({})", root),
                PathSegment::Pci { device, function } => format!("PCI({:02X}{:02X})", device, function),
                PathSegment::AcpiName { name } => format!("ACPI({})", name),
            })
            .collect::<Vec<_>>()
            .join("#")
    }

    pub fn to_firmware(&self) -> Result<String> {
        let mut parts = Vec::new();
        for s in &self.segments {
            match s {
                PathSegment::PciRoot { root } => parts.push(format!("PciRoot(0x{:X})", root)),
                PathSegment::Pci { device, function } => {
                    parts.push(format!("Pci(0x{:X},0x{:X})", device, function));
                }
                PathSegment::AcpiName { name } => {
                    return Err(Error::UnsupportedSegment(format!(
                        "ACPI name segment '{}' has no firmware device-path form",
                        name
                    )));
                }
            }
        }
        Ok(parts.join("/"))
    }

    /// ACPI name path (`SB.PCI0.GFX0`): names with leading/trailing
    /// underscores stripped, joined by dots. One-directional; PCI segments
    /// have no name-path form.
    pub fn to_acpi_names(&self) -> Result<String> {
        let mut parts = Vec::new();
        for s in &self.segments {
            match s {
                PathSegment::AcpiName { name } => parts.push(name.trim_matches('_').to_string()),
                other => {
                    return Err(Error::UnsupportedSegment(format!(
                        "PCI segment {:?} has no ACPI name-path form",
                        other
                    )));
                }
            }
        }
        Ok(parts.join("."))
    }

    pub fn convert(&self, target: Notation) -> Result<String> {
        match target {
            Notation::Enumerator => Ok(self.to_enumerator()),
            Notation::Firmware => self.to_firmware(),
            Notation::AcpiNames => self.to_acpi_names(),
        }
    }

    /// Truncates the path just before the rightmost ACPI segment whose
    /// underscore-stripped name starts with `marker` (the spoof template
    /// wants the GPU's parent bridge, i.e. everything before `PEGP`).
    /// Returns the path unchanged when the marker is absent.
    pub fn trim_before_marker(&self, marker: &str) -> DevicePath {
        let idx = self.segments.iter().rposition(|s| match s {
            PathSegment::AcpiName { name } => name.trim_matches('_').starts_with(marker),
            _ => false,
        });
        match idx {
            Some(i) => DevicePath { segments: self.segments[..i].to_vec() },
            None => self.clone(),
        }
    }
}

fn parse_hex_byte(s: &str) -> Option<u8> {
    let hex = s.trim().strip_prefix("0x")?;
    u8::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerator_to_firmware_round_trip() {
        let original = "PCIROOT(0)#PCI(0100)#PCI(0000)";
        let path = DevicePath::parse_enumerator(original).unwrap();
        let fw = path.to_firmware().unwrap();
        assert_eq!(fw, "PciRoot(0x0)/Pci(0x1,0x0)/Pci(0x0,0x0)");
        let back = DevicePath::parse_firmware(&fw).unwrap();
        assert_eq!(back.to_enumerator(), original);
    }

    #[test]
    fn round_trip_keeps_wide_values() {
        let original = "PCIROOT(10)#PCI(1C04)#PCI(00FF)";
        let path = DevicePath::parse_enumerator(original).unwrap();
        let fw = path.to_firmware().unwrap();
        assert_eq!(fw, "PciRoot(0xA)/Pci(0x1C,0x4)/Pci(0x0,0xFF)");
        let back = DevicePath::parse_firmware(&fw).unwrap();
        assert_eq!(back.to_enumerator(), original);
    }

    #[test]
    fn acpi_names_strip_underscores() {
        let path = DevicePath::parse_enumerator("ACPI(_SB_)#ACPI(PCI0)#ACPI(GFX0)").unwrap();
        assert_eq!(path.to_acpi_names().unwrap(), "SB.PCI0.GFX0");
    }

    #[test]
    fn acpi_path_round_trips_through_enumerator() {
        let original = "ACPI(_SB_)#ACPI(PCI0)#ACPI(GFX0)";
        let path = DevicePath::parse_enumerator(original).unwrap();
        assert_eq!(path.to_enumerator(), original);
    }

    #[test]
    fn mixed_segments_are_rejected() {
        let err = DevicePath::parse_enumerator("PCIROOT(0)#ACPI(_SB_)").unwrap_err();
        assert!(matches!(err, Error::UnsupportedSegment(_)));
    }

    #[test]
    fn acpi_path_cannot_become_pci_notation() {
        let path = DevicePath::parse_enumerator("ACPI(_SB_)#ACPI(PCI0)").unwrap();
        assert!(matches!(path.to_firmware(), Err(Error::UnsupportedSegment(_))));
    }

    #[test]
    fn pci_path_cannot_become_name_path() {
        let path = DevicePath::parse_enumerator("PCIROOT(0)#PCI(0100)").unwrap();
        assert!(matches!(path.to_acpi_names(), Err(Error::UnsupportedSegment(_))));
    }

    #[test]
    fn parse_rejects_malformed_segments() {
        assert!(DevicePath::parse_enumerator("PCIROOT(x)#PCI(0100)").is_err());
        assert!(DevicePath::parse_enumerator("PCIROOT(0)#PCI(010)").is_err());
        assert!(DevicePath::parse_enumerator("PCIROOT(0)#USB(0100)").is_err());
        assert!(DevicePath::parse_enumerator("").is_err());
        assert!(DevicePath::parse_firmware("PciRoot(0)/Pci(0x1,0x0)").is_err());
        assert!(DevicePath::parse_firmware("PciRoot(0x0)/Pci(0x1)").is_err());
    }

    #[test]
    fn auto_detects_dialect() {
        assert!(DevicePath::parse_auto("PCIROOT(0)#PCI(0100)").is_ok());
        assert!(DevicePath::parse_auto("PciRoot(0x0)/Pci(0x1,0x0)").is_ok());
        assert!(DevicePath::parse_auto("ACPI(_SB_)#ACPI(PCI0)").is_ok());
        assert!(matches!(
            DevicePath::parse_auto("SB.PCI0.GFX0"),
            Err(Error::UnrecognizedPathSyntax { .. })
        ));
    }

    #[test]
    fn trim_stops_before_rightmost_marker() {
        let path =
            DevicePath::parse_enumerator("ACPI(_SB_)#ACPI(PCI0)#ACPI(PEGP)#ACPI(GFX0)").unwrap();
        let trimmed = path.trim_before_marker("PEGP");
        assert_eq!(trimmed.to_acpi_names().unwrap(), "SB.PCI0");
    }

    #[test]
    fn trim_without_marker_returns_path_unchanged() {
        let path = DevicePath::parse_enumerator("ACPI(_SB_)#ACPI(PCI0)#ACPI(GFX0)").unwrap();
        let trimmed = path.trim_before_marker("PEGP");
        assert_eq!(trimmed, path);
    }
}
