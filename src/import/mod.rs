//! Bulk CSV import and export for leads.
//!
//! Import is all-or-nothing at the batch level: every data row is validated
//! independently and rejections are collected as `{row, message}` pairs, but
//! a single bad row means nothing is persisted. The fixed 14-column header
//! set must be present (any order); extra columns are ignored.
//!
//! The CSV dialect is deliberately simple, matching the form the frontend
//! produces: comma-separated, double quotes stripped from values, the tags
//! cell holding a comma-joined sub-list. Incoming bytes are not assumed to
//! be UTF-8; encoding is sniffed and decoded before parsing.

use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{ImportError, ImportResult, RowError};
use crate::models::Lead;
use crate::validation::{split_tags, validate_lead, RawLead, ValidatedLead};

/// The full expected header set, also the export column order.
pub const EXPECTED_HEADERS: [&str; 14] = [
    "fullName",
    "email",
    "phone",
    "city",
    "propertyType",
    "bhk",
    "purpose",
    "budgetMin",
    "budgetMax",
    "timeline",
    "source",
    "notes",
    "tags",
    "status",
];

/// Validated-row cap per batch.
pub const MAX_ROWS: usize = 200;

/// Payload cap, enforced before any parsing.
pub const MAX_BYTES: usize = 1024 * 1024;

// =============================================================================
// Encoding detection
// =============================================================================

/// Sniff the charset of raw upload bytes.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _, _) = chardet::detect(bytes);
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode upload bytes using the sniffed charset, falling back to lossy
/// UTF-8 for anything unrecognized.
fn decode_bytes(bytes: &[u8]) -> String {
    match detect_encoding(bytes).as_str() {
        "iso-8859-1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

// =============================================================================
// Import parsing
// =============================================================================

/// Parse and validate an uploaded CSV into creation-ready leads.
///
/// Errors are batch-terminal: size cap, structural problems (missing
/// headers, no data), the row cap, or the collected per-row rejections.
/// On success every returned row passed the field validator.
pub fn parse_leads(bytes: &[u8]) -> ImportResult<Vec<ValidatedLead>> {
    if bytes.len() > MAX_BYTES {
        return Err(ImportError::TooLarge);
    }
    let content = decode_bytes(bytes);
    parse_content(&content)
}

fn parse_content(content: &str) -> ImportResult<Vec<ValidatedLead>> {
    let lines: Vec<&str> = content.trim().lines().collect();
    if lines.len() < 2 {
        return Err(ImportError::Empty);
    }

    let headers: Vec<String> = lines[0].split(',').map(clean_cell).collect();
    let missing: Vec<String> = EXPECTED_HEADERS
        .iter()
        .filter(|expected| !headers.iter().any(|h| h == *expected))
        .map(|h| h.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingHeaders(missing));
    }

    log_info(format!("Importing CSV: {} line(s)", lines.len() - 1));

    let mut validated = Vec::new();
    let mut row_errors = Vec::new();
    let mut row = 0usize;

    for line in &lines[1..] {
        if line.trim().is_empty() {
            continue;
        }
        row += 1;

        let values: Vec<String> = line.split(',').map(clean_cell).collect();
        if values.len() != headers.len() {
            row_errors.push(RowError {
                row,
                message: format!("expected {} columns, got {}", headers.len(), values.len()),
            });
            continue;
        }

        let raw = raw_from_row(&headers, &values);
        match validate_lead(&raw) {
            Ok(lead) => validated.push(lead),
            Err(errors) => row_errors.push(RowError { row, message: errors.summary() }),
        }
    }

    if !row_errors.is_empty() {
        log_warning(format!("{} row(s) rejected, nothing imported", row_errors.len()));
        return Err(ImportError::Rows(row_errors));
    }
    if validated.len() > MAX_ROWS {
        return Err(ImportError::TooManyRows { max: MAX_ROWS, got: validated.len() });
    }
    if validated.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    log_success(format!("All {} row(s) valid", validated.len()));
    Ok(validated)
}

/// Trim whitespace and strip every double quote, the way the form layer
/// writes cells.
fn clean_cell(cell: &str) -> String {
    cell.trim().replace('"', "")
}

fn raw_from_row(headers: &[String], values: &[String]) -> RawLead {
    let field = |name: &str| -> Option<String> {
        headers
            .iter()
            .position(|h| h == name)
            .map(|i| values[i].clone())
            .filter(|v| !v.is_empty())
    };

    RawLead {
        full_name: field("fullName"),
        email: field("email"),
        phone: field("phone"),
        city: field("city"),
        property_type: field("propertyType"),
        bhk: field("bhk"),
        purpose: field("purpose"),
        budget_min: field("budgetMin"),
        budget_max: field("budgetMax"),
        timeline: field("timeline"),
        source: field("source"),
        status: field("status"),
        notes: field("notes"),
        tags: field("tags").map(|t| split_tags(&t)),
    }
}

// =============================================================================
// Export
// =============================================================================

/// Serialize leads onto the same 14-column surface the importer accepts.
/// Absent optionals become empty cells; tags are comma-joined.
pub fn leads_to_csv(leads: &[Lead]) -> csv::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPECTED_HEADERS)?;

    for lead in leads {
        writer.write_record(&[
            lead.full_name.clone(),
            lead.email.clone().unwrap_or_default(),
            lead.phone.clone(),
            lead.city.as_str().to_string(),
            lead.property_type.as_str().to_string(),
            lead.bhk.map(|b| b.as_str().to_string()).unwrap_or_default(),
            lead.purpose.as_str().to_string(),
            lead.budget_min.map(|b| b.to_string()).unwrap_or_default(),
            lead.budget_max.map(|b| b.to_string()).unwrap_or_default(),
            lead.timeline.as_str().to_string(),
            lead.source.as_str().to_string(),
            lead.notes.clone().unwrap_or_default(),
            lead.tags.join(","),
            lead.status.as_str().to_string(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bhk, City, PropertyType, Purpose, Source, Status, Timeline};
    use chrono::Utc;
    use uuid::Uuid;

    const HEADER: &str =
        "fullName,email,phone,city,propertyType,bhk,purpose,budgetMin,budgetMax,timeline,source,notes,tags,status";

    fn row(name: &str, phone: &str) -> String {
        format!("{},,{},Chandigarh,Plot,,Buy,,,0-3m,Website,,,", name, phone)
    }

    #[test]
    fn test_valid_csv_parses_all_rows() {
        let csv = format!("{}\n{}\n{}", HEADER, row("Asha Verma", "9876543210"), row("Ram Singh", "9876543211"));
        let leads = parse_leads(csv.as_bytes()).unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].full_name, "Asha Verma");
        assert_eq!(leads[0].status, None, "blank status left for the create default");
    }

    #[test]
    fn test_header_order_insensitive() {
        let csv = "phone,fullName,city,propertyType,bhk,purpose,budgetMin,budgetMax,timeline,source,notes,tags,status,email\n\
                   9876543210,Asha Verma,Chandigarh,Apartment,2,Buy,,,0-3m,Website,,,New,";
        let leads = parse_leads(csv.as_bytes()).unwrap();
        assert_eq!(leads[0].phone, "9876543210");
        assert_eq!(leads[0].bhk, Some(Bhk::Two));
        assert_eq!(leads[0].status, Some(Status::New));
    }

    #[test]
    fn test_missing_headers_is_single_structural_error() {
        let csv = "fullName,email,phone\nAsha,,9876543210";
        match parse_leads(csv.as_bytes()) {
            Err(ImportError::MissingHeaders(missing)) => {
                assert!(missing.contains(&"city".to_string()));
                assert!(missing.contains(&"status".to_string()));
                assert_eq!(missing.len(), 11);
            }
            other => panic!("expected MissingHeaders, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_header_only_is_empty_error() {
        assert!(matches!(parse_leads(HEADER.as_bytes()), Err(ImportError::Empty)));
        assert!(matches!(parse_leads(b""), Err(ImportError::Empty)));
    }

    #[test]
    fn test_bad_row_fails_whole_batch_with_row_number() {
        // Five data rows; only the third is invalid.
        let csv = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            HEADER,
            row("Lead One", "9876543210"),
            row("Lead Two", "9876543211"),
            row("Lead Three", "123"), // phone too short
            row("Lead Four", "9876543213"),
            row("Lead Five", "9876543214"),
        );
        match parse_leads(csv.as_bytes()) {
            Err(ImportError::Rows(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].row, 3);
                assert!(errors[0].message.contains("phone"));
            }
            other => panic!("expected Rows, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_wrong_column_count_is_row_error() {
        let csv = format!("{}\nAsha,too,few", HEADER);
        match parse_leads(csv.as_bytes()) {
            Err(ImportError::Rows(errors)) => {
                assert_eq!(errors[0].row, 1);
                assert!(errors[0].message.contains("expected 14 columns, got 3"));
            }
            other => panic!("expected Rows, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_blank_lines_skipped() {
        let csv = format!("{}\n{}\n\n{}\n", HEADER, row("Asha", "9876543210"), row("Ram", "9876543211"));
        assert_eq!(parse_leads(csv.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn test_quotes_stripped_from_cells() {
        let csv = format!("{}\n\"Asha Verma\",,\"9876543210\",Chandigarh,Plot,,Buy,,,0-3m,Website,\"call evenings\",,", HEADER);
        let leads = parse_leads(csv.as_bytes()).unwrap();
        assert_eq!(leads[0].full_name, "Asha Verma");
        assert_eq!(leads[0].notes.as_deref(), Some("call evenings"));
    }

    #[test]
    fn test_row_cap() {
        let mut csv = String::from(HEADER);
        for i in 0..(MAX_ROWS + 1) {
            csv.push('\n');
            csv.push_str(&row(&format!("Lead {}", i), "9876543210"));
        }
        assert!(matches!(
            parse_leads(csv.as_bytes()),
            Err(ImportError::TooManyRows { max: MAX_ROWS, got }) if got == MAX_ROWS + 1
        ));
    }

    #[test]
    fn test_size_cap_checked_before_parsing() {
        // Garbage payload past the cap never reaches the parser.
        let bytes = vec![b'x'; MAX_BYTES + 1];
        assert!(matches!(parse_leads(&bytes), Err(ImportError::TooLarge)));
    }

    #[test]
    fn test_trailing_blank_lines_leave_header_only() {
        // Trailing whitespace is trimmed before line counting, so a header
        // followed only by blank lines reads as having no data rows at all.
        let csv = format!("{}\n\n   \n", HEADER);
        assert!(matches!(parse_leads(csv.as_bytes()), Err(ImportError::Empty)));
    }

    #[test]
    fn test_latin1_bytes_decode() {
        // "Société" in ISO-8859-1 within a fullName cell.
        let mut csv = Vec::new();
        csv.extend_from_slice(HEADER.as_bytes());
        csv.extend_from_slice(b"\nSoci\xE9t\xE9 Realty,,9876543210,Mohali,Office,,Rent,,,>6m,Referral,,,");
        let leads = parse_leads(&csv).unwrap();
        assert!(leads[0].full_name.starts_with("Soci"));
        assert!(leads[0].full_name.ends_with("Realty"));
    }

    #[test]
    fn test_export_roundtrips_through_import() {
        let lead = Lead {
            id: Uuid::new_v4(),
            full_name: "Asha Verma".into(),
            email: Some("asha@example.com".into()),
            phone: "9876543210".into(),
            city: City::Mohali,
            property_type: PropertyType::Apartment,
            bhk: Some(Bhk::Two),
            purpose: Purpose::Buy,
            budget_min: Some(1_000_000),
            budget_max: Some(2_000_000),
            timeline: Timeline::OverSixMonths,
            source: Source::WalkIn,
            status: Status::Qualified,
            notes: Some("prefers corner unit".into()),
            tags: vec!["hot".into()],
            owner_id: "u1".into(),
            updated_at: Utc::now(),
        };

        let csv = leads_to_csv(std::slice::from_ref(&lead)).unwrap();
        assert!(csv.starts_with("fullName,"));

        let reimported = parse_leads(csv.as_bytes()).unwrap();
        assert_eq!(reimported.len(), 1);
        assert_eq!(reimported[0].full_name, lead.full_name);
        assert_eq!(reimported[0].bhk, lead.bhk);
        assert_eq!(reimported[0].status, Some(Status::Qualified));
        assert_eq!(reimported[0].tags, lead.tags);
    }
}
