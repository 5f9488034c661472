use std::fmt;
use std::sync::OnceLock;
use regex::Regex;

use crate::error::{Error, Result};

/// Canonical hardware identity: PCI vendor and device IDs, rendered `VVVV&DDDD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HardwareIdentifier {
    pub vendor: u16,
    pub device: u16,
}

impl fmt::Display for HardwareIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}&{:04X}", self.vendor, self.device)
    }
}

fn ven_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)VEN_([0-9A-F]{4})").unwrap())
}

fn dev_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)DEV_([0-9A-F]{4})").unwrap())
}

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-Fa-f]{4}&[0-9A-Fa-f]{4}$").unwrap())
}

/// Pulls `VEN_xxxx`/`DEV_xxxx` tokens out of a raw enumerator descriptor
/// (e.g. `PCI\VEN_1002&DEV_67DF&SUBSYS_...`). Both tokens must be present.
pub fn extract(raw: &str) -> Option<HardwareIdentifier> {
    let ven = ven_regex().captures(raw)?.get(1)?.as_str();
    let dev = dev_regex().captures(raw)?.get(1)?.as_str();
    let vendor = u16::from_str_radix(ven, 16).ok()?;
    let device = u16::from_str_radix(dev, 16).ok()?;
    Some(HardwareIdentifier { vendor, device })
}

/// True iff `text` already has the canonical `VVVV&DDDD` shape (any case).
pub fn is_valid_text(text: &str) -> bool {
    id_regex().is_match(text)
}

pub fn parse(text: &str) -> Result<HardwareIdentifier> {
    let text = text.trim();
    if !is_valid_text(text) {
        return Err(Error::MalformedIdentifier(text.to_string()));
    }
    let (ven, dev) = text.split_once('&').ok_or_else(|| Error::MalformedIdentifier(text.to_string()))?;
    let vendor = u16::from_str_radix(ven, 16).map_err(|_| Error::MalformedIdentifier(text.to_string()))?;
    let device = u16::from_str_radix(dev, 16).map_err(|_| Error::MalformedIdentifier(text.to_string()))?;
    Ok(HardwareIdentifier { vendor, device })
}

/// Splits a 4-hex-digit device ID into the two byte literals the spoof
/// template substitutes, in little-endian order: the second digit pair is the
/// high-byte literal, the first pair the low-byte literal.
/// `67DF` -> (`0xDF`, `0x67`).
pub fn split_bytes_for_splice(device_hex: &str) -> Result<(String, String)> {
    let device_hex = device_hex.trim();
    if device_hex.len() != 4 || !device_hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::MalformedIdentifier(device_hex.to_string()));
    }
    let up = device_hex.to_ascii_uppercase();
    Ok((format!("0x{}", &up[2..4]), format!("0x{}", &up[0..2])))
}
