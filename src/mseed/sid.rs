//! FDSN Source Identifier (SID).
//!
//! Format: `FDSN:NET_STA_LOC_BAND_SOURCE_SUBSOURCE`. The SEED channel code
//! (e.g. "BHZ") is split into band ("B"), source ("H"), and subsource
//! ("Z").

use std::fmt;

use super::{MseedError, Result};

const PREFIX: &str = "FDSN:";

/// FDSN Source Identifier.
///
/// ```
/// use waveserver::mseed::SourceId;
///
/// let sid = SourceId::from_nslc("IU", "ANMO", "00", "BHZ");
/// assert_eq!(sid.as_str(), "FDSN:IU_ANMO_00_B_H_Z");
/// let (net, sta, loc, cha) = sid.to_nslc().unwrap();
/// assert_eq!((net.as_str(), sta.as_str(), loc.as_str(), cha.as_str()), ("IU", "ANMO", "00", "BHZ"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceId {
    raw: String,
}

impl SourceId {
    /// Wrap an identifier exactly as it appears in a record.
    pub fn parse(s: &str) -> Self {
        Self { raw: s.to_string() }
    }

    /// Build an identifier from SEED codes. A 3-character channel code is
    /// split into band, source, and subsource.
    pub fn from_nslc(network: &str, station: &str, location: &str, channel: &str) -> Self {
        let channel_parts: Vec<String> = if channel.chars().count() == 3 {
            channel.chars().map(String::from).collect()
        } else {
            vec![channel.to_string()]
        };
        Self {
            raw: format!(
                "{PREFIX}{network}_{station}_{location}_{}",
                channel_parts.join("_")
            ),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Split into (network, station, location, channel).
    ///
    /// Single-character band/source/subsource codes collapse into a SEED
    /// channel code; longer extended codes keep their `_` separators.
    /// Fails when the prefix is missing, fewer than four fields are
    /// present, or network/station is empty.
    pub fn to_nslc(&self) -> Result<(String, String, String, String)> {
        let invalid = || MseedError::InvalidSourceId(self.raw.clone());
        let body = self.raw.strip_prefix(PREFIX).ok_or_else(invalid)?;
        let fields: Vec<&str> = body.split('_').collect();
        if fields.len() < 4 || fields[0].is_empty() || fields[1].is_empty() {
            return Err(invalid());
        }
        let channel_fields = &fields[3..];
        let channel = if channel_fields.iter().all(|f| f.chars().count() == 1) {
            channel_fields.concat()
        } else {
            channel_fields.join("_")
        };
        Ok((
            fields[0].to_string(),
            fields[1].to_string(),
            fields[2].to_string(),
            channel,
        ))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_nslc() {
        let sid = SourceId::from_nslc("IU", "ANMO", "00", "BHZ");
        assert_eq!(sid.as_str(), "FDSN:IU_ANMO_00_B_H_Z");
    }

    #[test]
    fn test_to_nslc() {
        let sid = SourceId::parse("FDSN:GE_DAV_10_H_H_E");
        let (net, sta, loc, cha) = sid.to_nslc().unwrap();
        assert_eq!(net, "GE");
        assert_eq!(sta, "DAV");
        assert_eq!(loc, "10");
        assert_eq!(cha, "HHE");
    }

    #[test]
    fn test_empty_location() {
        let sid = SourceId::from_nslc("JP", "TSK", "", "LHN");
        assert_eq!(sid.as_str(), "FDSN:JP_TSK__L_H_N");
        let (_, _, loc, cha) = sid.to_nslc().unwrap();
        assert_eq!(loc, "");
        assert_eq!(cha, "LHN");
    }

    #[test]
    fn test_extended_channel_kept_separated() {
        let sid = SourceId::parse("FDSN:XX_TEST__VM_ABC_1");
        let (_, _, _, cha) = sid.to_nslc().unwrap();
        assert_eq!(cha, "VM_ABC_1");
    }

    #[test]
    fn test_malformed_identifiers_rejected() {
        for raw in ["IU_ANMO_00_B_H_Z", "FDSN:IU_ANMO", "FDSN:_ANMO_00_B_H_Z"] {
            assert!(
                matches!(SourceId::parse(raw).to_nslc(), Err(MseedError::InvalidSourceId(_))),
                "{raw} should be rejected"
            );
        }
    }
}
