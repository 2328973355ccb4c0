use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::types::WhoisFields;

/// Turns raw port-43 WHOIS text into camelCase keyed fields.
pub struct WhoisParser;

impl WhoisParser {
    pub fn parse(data: &str) -> WhoisFields {
        let mut fields = WhoisFields::new();

        for line in data.lines() {
            let line = line.trim();
            if line.is_empty()
                || line.starts_with('%')
                || line.starts_with('#')
                || line.starts_with(">>>")
            {
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }

                let key = Self::camel_case_key(key);
                if key.is_empty() {
                    continue;
                }

                fields.append(key, value);
            }
        }

        debug!("Parsed {} WHOIS fields", fields.len());
        fields
    }

    /// `Registrar IANA ID` -> `registrarIanaId`, `Registrant State/Province` -> `registrantStateProvince`.
    pub fn camel_case_key(key: &str) -> String {
        let mut out = String::with_capacity(key.len());
        for (i, word) in key
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .enumerate()
        {
            let lower = word.to_ascii_lowercase();
            if i == 0 {
                out.push_str(&lower);
            } else {
                let mut chars = lower.chars();
                if let Some(first) = chars.next() {
                    out.push(first.to_ascii_uppercase());
                    out.push_str(chars.as_str());
                }
            }
        }
        out
    }
}

/// Parse the date formats commonly found in WHOIS data.
pub fn parse_whois_date(date_str: &str) -> Option<DateTime<Utc>> {
    let date_str = date_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt.with_timezone(&Utc));
    }

    let zoned_formats = [
        "%Y-%m-%dT%H:%M:%S%z",             // 2025-05-18T13:36:06+0000
        "%Y-%m-%dT%H:%M:%S%.f%z",
    ];
    for format in &zoned_formats {
        if let Ok(dt) = DateTime::parse_from_str(date_str, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive_formats = [
        "%Y-%m-%dT%H:%M:%S%.fZ",           // 2025-05-18T13:36:06.0Z
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S",               // 2025-05-18 13:36:06
        "%Y-%m-%d %H:%M:%S UTC",           // normalized WhoisXML dates
    ];
    for format in &naive_formats {
        if let Ok(naive_dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
        }
    }

    let date_only_formats = [
        "%Y-%m-%d",
        "%d-%b-%Y",                        // 18-May-2025
        "%d %b %Y",
        "%Y/%m/%d",
        "%m/%d/%Y",
        "%d.%m.%Y",
    ];
    for format in &date_only_formats {
        if let Ok(naive_date) = chrono::NaiveDate::parse_from_str(date_str, format) {
            if let Some(naive_dt) = naive_date.and_hms_opt(0, 0, 0) {
                return Some(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
            }
        }
    }

    debug!("Failed to parse date: {}", date_str);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const SAMPLE: &str = "\
   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Registrar WHOIS Server: whois.iana.org
   Registrar URL: http://res-dom.iana.org
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar: RESERVED-Internet Assigned Numbers Authority
   Registrar IANA ID: 376
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited
   Registrant State/Province: CA
   Name Server: A.IANA-SERVERS.NET
   DNSSEC: signedDelegation
% comment line
>>> Last update of whois database: 2024-09-01T00:00:00Z <<<
";

    #[test]
    fn test_camel_case_key() {
        assert_eq!(WhoisParser::camel_case_key("Registrar IANA ID"), "registrarIanaId");
        assert_eq!(WhoisParser::camel_case_key("Domain Name"), "domainName");
        assert_eq!(WhoisParser::camel_case_key("DNSSEC"), "dnssec");
        assert_eq!(
            WhoisParser::camel_case_key("Registrant State/Province"),
            "registrantStateProvince"
        );
        assert_eq!(
            WhoisParser::camel_case_key("Registrar Abuse Contact Email"),
            "registrarAbuseContactEmail"
        );
    }

    #[test]
    fn test_parse_sample() {
        let fields = WhoisParser::parse(SAMPLE);
        assert_eq!(fields.get("domainName"), Some("EXAMPLE.COM"));
        assert_eq!(fields.get("registrarIanaId"), Some("376"));
        assert_eq!(fields.get("registryDomainId"), Some("2336799_DOMAIN_COM-VRSN"));
        assert_eq!(fields.get("registrantStateProvince"), Some("CA"));
        assert_eq!(fields.get("dnssec"), Some("signedDelegation"));
        assert_eq!(fields.get("updatedDate"), Some("2024-08-14T07:01:34Z"));
        // Repeated keys are joined
        let status = fields.get("domainStatus").unwrap();
        assert!(status.contains("clientDeleteProhibited"));
        assert!(status.contains("clientTransferProhibited"));
        // Comment and banner lines are skipped
        assert!(fields.get("lastUpdateOfWhoisDatabase").is_none());
    }

    #[test]
    fn test_parse_empty_response() {
        assert!(WhoisParser::parse("").is_empty());
        assert!(WhoisParser::parse("% No match for domain\n\n").is_empty());
    }

    #[test]
    fn test_parse_whois_date_formats() {
        let dt = parse_whois_date("2025-08-13T04:00:00Z").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2025, 8, 13));

        let dt = parse_whois_date("2025-05-18T13:36:06.0Z").unwrap();
        assert_eq!(dt.day(), 18);

        let dt = parse_whois_date("2026-01-02 03:04:05 UTC").unwrap();
        assert_eq!(dt.year(), 2026);

        let dt = parse_whois_date("18-May-2025").unwrap();
        assert_eq!(dt.month(), 5);

        assert!(parse_whois_date("Unknown").is_none());
    }
}
