//! Interval consumption documents (SDAT validated metered data).
//!
//! Only local element names are matched; namespace prefixes such as `rsm:`
//! are ignored. Entry timestamps are not on the wire: the n-th observation
//! starts at `start + n * resolution`.

use super::parse_instant;
use crate::error::{AppError, Result};
use crate::models::{ConsumptionDocument, ConsumptionEntry, IntervalResolution, ResolutionUnit};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

#[derive(Default)]
struct Fields {
    header_id: Option<String>,
    fallback_id: Option<String>,
    start: Option<String>,
    end: Option<String>,
    resolution: Option<String>,
    unit: Option<String>,
    observations: Vec<Option<String>>,
}

pub fn parse_consumption_document(xml: &str) -> Result<ConsumptionDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut fields = Fields::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "Observation" {
                    fields.observations.push(None);
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"Observation" {
                    fields.observations.push(None);
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                capture(&stack, &text, &mut fields);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                capture(&stack, text.trim(), &mut fields);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    build(fields)
}

fn capture(stack: &[String], text: &str, fields: &mut Fields) {
    let Some((top, ancestors)) = stack.split_last() else {
        return;
    };
    let parent = ancestors.last().map(String::as_str);

    match (top.as_str(), parent) {
        ("DocumentID", _) => {
            let in_header = ancestors.iter().any(|a| a.ends_with("HeaderInformation"));
            let slot = if in_header {
                &mut fields.header_id
            } else {
                &mut fields.fallback_id
            };
            if slot.is_none() {
                *slot = Some(text.to_string());
            }
        }
        ("StartDateTime", Some("Interval")) => fields.start = Some(text.to_string()),
        ("EndDateTime", Some("Interval")) => fields.end = Some(text.to_string()),
        ("Resolution", Some("Resolution")) => fields.resolution = Some(text.to_string()),
        ("Unit", Some("Resolution")) => fields.unit = Some(text.to_string()),
        ("Volume", Some("Observation")) => {
            if let Some(last) = fields.observations.last_mut() {
                *last = Some(text.to_string());
            }
        }
        _ => {}
    }
}

fn build(fields: Fields) -> Result<ConsumptionDocument> {
    let document_id = fields
        .header_id
        .or(fields.fallback_id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Parse("missing DocumentID".into()))?;

    let start = required_instant(fields.start, "Interval/StartDateTime")?;
    let end = required_instant(fields.end, "Interval/EndDateTime")?;

    let value: u32 = fields
        .resolution
        .ok_or_else(|| AppError::Parse("missing Resolution".into()))?
        .trim()
        .parse()
        .map_err(|e| AppError::Parse(format!("invalid Resolution value: {e}")))?;
    if value == 0 {
        return Err(AppError::Parse("Resolution must be positive".into()));
    }
    let resolution = IntervalResolution {
        value,
        unit: fields
            .unit
            .as_deref()
            .map(ResolutionUnit::from_code)
            .unwrap_or(ResolutionUnit::Minutes),
    };

    let mut entries = Vec::with_capacity(fields.observations.len());
    for (index, volume) in fields.observations.into_iter().enumerate() {
        // The step is taken even when the volume is absent.
        let Some(raw) = volume else { continue };
        let volume: f64 = raw.trim().parse().map_err(|e| {
            AppError::Parse(format!("invalid Volume '{}' at observation {}: {}", raw, index + 1, e))
        })?;
        if !volume.is_finite() {
            return Err(AppError::Parse(format!(
                "non-finite Volume '{}' at observation {}",
                raw,
                index + 1
            )));
        }
        let timestamp = resolution.nth_step(start, index).ok_or_else(|| {
            AppError::Parse(format!("observation {} overflows the calendar", index + 1))
        })?;
        entries.push(ConsumptionEntry::new(timestamp, volume));
    }

    Ok(ConsumptionDocument {
        document_id,
        start,
        end,
        entries,
    })
}

fn required_instant(raw: Option<String>, what: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    let raw = raw.ok_or_else(|| AppError::Parse(format!("missing {}", what)))?;
    parse_instant(&raw).map_err(|e| AppError::Parse(format!("{}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn sdat(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rsm:ValidatedMeteredData_12 xmlns:rsm="http://www.strom.ch">
  <rsm:ValidatedMeteredData_HeaderInformation>
    <rsm:InstanceDocument>
      <rsm:DictionaryAgencyID>CH</rsm:DictionaryAgencyID>
      <rsm:DocumentID>eslevu121963_BR2294_ID742</rsm:DocumentID>
    </rsm:InstanceDocument>
  </rsm:ValidatedMeteredData_HeaderInformation>
  <rsm:MeteringData>
    <rsm:DocumentID>ID742</rsm:DocumentID>
    {body}
  </rsm:MeteringData>
</rsm:ValidatedMeteredData_12>"#
        )
    }

    const INTERVAL: &str = r#"
    <rsm:Interval>
      <rsm:StartDateTime>2024-01-01T00:00:00Z</rsm:StartDateTime>
      <rsm:EndDateTime>2024-01-01T01:00:00Z</rsm:EndDateTime>
    </rsm:Interval>"#;

    fn observation(seq: u32, volume: Option<&str>) -> String {
        let volume = volume
            .map(|v| format!("<rsm:Volume>{v}</rsm:Volume>"))
            .unwrap_or_default();
        format!(
            "<rsm:Observation><rsm:Position><rsm:Sequence>{seq}</rsm:Sequence></rsm:Position>{volume}</rsm:Observation>"
        )
    }

    #[test]
    fn test_timestamps_reconstructed_from_resolution() {
        let obs: String = (1..=4)
            .map(|i| observation(i, Some(&format!("{}.0", i))))
            .collect();
        let xml = sdat(&format!(
            "{INTERVAL}<rsm:Resolution><rsm:Resolution>15</rsm:Resolution><rsm:Unit>MIN</rsm:Unit></rsm:Resolution>{obs}"
        ));

        let doc = parse_consumption_document(&xml).unwrap();
        assert_eq!(doc.document_id, "eslevu121963_BR2294_ID742");
        assert_eq!(doc.sensor_id(), "ID742");
        assert_eq!(doc.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let stamps: Vec<_> = doc.entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(
            stamps,
            vec![
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 15, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 45, 0).unwrap(),
            ]
        );
        let volumes: Vec<f64> = doc.entries.iter().map(|e| e.volume).collect();
        assert_eq!(volumes, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_missing_volume_skipped_but_clock_advances() {
        let obs = format!(
            "{}{}{}",
            observation(1, Some("1.5")),
            observation(2, None),
            observation(3, Some("2.5"))
        );
        let xml = sdat(&format!(
            "{INTERVAL}<rsm:Resolution><rsm:Resolution>1</rsm:Resolution><rsm:Unit>H</rsm:Unit></rsm:Resolution>{obs}"
        ));

        let doc = parse_consumption_document(&xml).unwrap();
        assert_eq!(doc.entries.len(), 2);
        assert_eq!(
            doc.entries[1],
            ConsumptionEntry::new(Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap(), 2.5)
        );
    }

    #[test]
    fn test_unknown_unit_reads_as_minutes() {
        let obs = format!("{}{}", observation(1, Some("1")), observation(2, Some("1")));
        let xml = sdat(&format!(
            "{INTERVAL}<rsm:Resolution><rsm:Resolution>5</rsm:Resolution><rsm:Unit>XYZ</rsm:Unit></rsm:Resolution>{obs}"
        ));

        let doc = parse_consumption_document(&xml).unwrap();
        assert_eq!(
            doc.entries[1].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap()
        );
    }

    #[test]
    fn test_metering_document_id_used_without_header() {
        let xml = format!(
            r#"<Root><MeteringData><DocumentID>ID735</DocumentID>{INTERVAL}<Resolution><Resolution>15</Resolution></Resolution></MeteringData></Root>"#
        );
        let doc = parse_consumption_document(&xml).unwrap();
        assert_eq!(doc.document_id, "ID735");
        assert!(doc.entries.is_empty());
    }

    #[test]
    fn test_missing_required_elements_fail() {
        let no_resolution = sdat(&format!("{INTERVAL}{}", observation(1, Some("1"))));
        assert!(matches!(
            parse_consumption_document(&no_resolution),
            Err(AppError::Parse(_))
        ));

        let no_interval = sdat(
            "<rsm:Resolution><rsm:Resolution>15</rsm:Resolution><rsm:Unit>MIN</rsm:Unit></rsm:Resolution>",
        );
        assert!(matches!(
            parse_consumption_document(&no_interval),
            Err(AppError::Parse(_))
        ));

        let no_id = format!(
            "<Root>{INTERVAL}<Resolution><Resolution>15</Resolution></Resolution></Root>"
        );
        assert!(matches!(
            parse_consumption_document(&no_id),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_bad_volume_and_zero_resolution_fail() {
        let bad_volume = sdat(&format!(
            "{INTERVAL}<rsm:Resolution><rsm:Resolution>15</rsm:Resolution></rsm:Resolution>{}",
            observation(1, Some("n/a"))
        ));
        assert!(matches!(
            parse_consumption_document(&bad_volume),
            Err(AppError::Parse(_))
        ));

        let zero = sdat(&format!(
            "{INTERVAL}<rsm:Resolution><rsm:Resolution>0</rsm:Resolution></rsm:Resolution>"
        ));
        assert!(matches!(
            parse_consumption_document(&zero),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_non_finite_volume_fails() {
        for raw in ["NaN", "inf", "-inf"] {
            let xml = sdat(&format!(
                "{INTERVAL}<rsm:Resolution><rsm:Resolution>15</rsm:Resolution></rsm:Resolution>{}",
                observation(1, Some(raw))
            ));
            match parse_consumption_document(&xml) {
                Err(AppError::Parse(msg)) => assert!(msg.contains("non-finite"), "{msg}"),
                other => panic!("expected parse error for {raw}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_resolution_beyond_calendar_fails() {
        let xml = sdat(&format!(
            "{INTERVAL}<rsm:Resolution><rsm:Resolution>4000000000</rsm:Resolution><rsm:Unit>H</rsm:Unit></rsm:Resolution>{}{}",
            observation(1, Some("1.0")),
            observation(2, Some("2.0"))
        ));
        match parse_consumption_document(&xml) {
            Err(AppError::Parse(msg)) => assert!(msg.contains("observation 2 overflows"), "{msg}"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        assert!(matches!(
            parse_consumption_document("<Root><DocumentID>x</Wrong></Root>"),
            Err(AppError::Parse(_))
        ));
    }
}
