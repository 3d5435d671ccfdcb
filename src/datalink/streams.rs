//! Stream names: request keys and the server's `INFO STREAMS` document.

use std::collections::BTreeSet;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::request::Request;
use crate::waveform::BLANK_LOCATION_CODE;
use crate::{Result, WaveError};

const STREAM_LIST: &[u8] = b"StreamList";

/// `NET_STA_LOC_CHAN/MSEED`, with a blank location left empty.
pub fn stream_key(request: &Request) -> String {
    let location = match request.location_code() {
        Some(code) if code != BLANK_LOCATION_CODE => code,
        _ => "",
    };
    format!(
        "{}_{}_{}_{}/MSEED",
        request.network(),
        request.station(),
        location,
        request.channel()
    )
}

/// Collect the `Name` attribute of every direct child of `StreamList`.
///
/// A document without a `StreamList` yields an empty set.
pub fn parse_stream_list(document: &[u8]) -> Result<BTreeSet<String>> {
    let mut reader = Reader::from_reader(document);
    let mut buf = Vec::new();
    let mut names = BTreeSet::new();
    let mut found = false;
    // Element depth below StreamList while inside it.
    let mut depth: Option<usize> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => {
                depth = match depth {
                    Some(d) => {
                        if d == 0 {
                            collect_name(&element, &mut names)?;
                        }
                        Some(d + 1)
                    }
                    None if element.name().as_ref() == STREAM_LIST => {
                        found = true;
                        Some(0)
                    }
                    None => None,
                };
            }
            Ok(Event::Empty(element)) => match depth {
                Some(0) => collect_name(&element, &mut names)?,
                None if element.name().as_ref() == STREAM_LIST => found = true,
                _ => {}
            },
            Ok(Event::End(_)) => {
                depth = match depth {
                    Some(0) | None => None,
                    Some(d) => Some(d - 1),
                };
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(WaveError::Protocol(format!("stream list is not XML: {e}")));
            }
        }
        buf.clear();
    }

    if !found {
        log::warn!("could not find stream list");
    }
    Ok(names)
}

fn collect_name(element: &BytesStart<'_>, names: &mut BTreeSet<String>) -> Result<()> {
    let attribute = element
        .try_get_attribute("Name")
        .map_err(|e| WaveError::Protocol(format!("bad stream attribute: {e}")))?;
    if let Some(attribute) = attribute {
        let name = attribute
            .unescape_value()
            .map_err(|e| WaveError::Protocol(format!("bad stream name: {e}")))?;
        names.insert(name.into_owned());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<?xml version="1.0"?>
<DataLink Version="2018.078" ServerID="Test Ring">
  <Status StartTime="2024-01-01 00:00:00" RingVersion="1" />
  <StreamList TotalStreams="3" SelectedStreams="3">
    <Stream Name="UU_FORK_01_HHZ/MSEED" EarliestPacketID="1" />
    <Stream Name="UU_CTU__EHZ/MSEED" EarliestPacketID="2">
      <Detail Name="not-a-stream" />
    </Stream>
    <Stream Name="UU_FORK_01_HHZ/MSEED" />
    <Stream EarliestPacketID="9" />
  </StreamList>
  <Stream Name="outside/MSEED" />
</DataLink>"#;

    #[test]
    fn test_parse_stream_list() {
        let names = parse_stream_list(DOCUMENT.as_bytes()).unwrap();
        let names: Vec<_> = names.iter().map(String::as_str).collect();
        assert_eq!(names, ["UU_CTU__EHZ/MSEED", "UU_FORK_01_HHZ/MSEED"]);
    }

    #[test]
    fn test_missing_or_empty_stream_list() {
        assert!(parse_stream_list(b"<DataLink><Status/></DataLink>").unwrap().is_empty());
        assert!(parse_stream_list(b"<DataLink><StreamList/></DataLink>").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_document() {
        assert!(parse_stream_list(b"<DataLink><StreamList></DataLink>").is_err());
    }

    #[test]
    fn test_stream_key() {
        let request = Request::new("uu", "fork", "hhz", 0, 1).unwrap();
        assert_eq!(stream_key(&request), "UU_FORK__HHZ/MSEED");
        let request = request.with_location_code("--").unwrap();
        assert_eq!(stream_key(&request), "UU_FORK__HHZ/MSEED");
        let request = request.with_location_code("01").unwrap();
        assert_eq!(stream_key(&request), "UU_FORK_01_HHZ/MSEED");
    }
}
