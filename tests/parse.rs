//! Binary-level parsing and validation failures.

use anyhow::Result;
use weft::Error;

const PREFIX: &[u8] = b"\0asm\x01\0\0\0";

// Builds a section: id, LEB128 size, payload. Payloads in these tests stay
// under 128 bytes so the size always encodes as a single byte.
fn section(id: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() < 0x80);
    let mut out = vec![id, payload.len() as u8];
    out.extend_from_slice(payload);
    out
}

fn module(sections: &[Vec<u8>]) -> Vec<u8> {
    let mut out = PREFIX.to_vec();
    for section in sections {
        out.extend_from_slice(section);
    }
    out
}

#[test]
fn empty_module_parses() {
    assert!(weft::parse(PREFIX).is_ok());
    assert!(weft::validate(PREFIX).is_ok());
}

#[test]
fn bad_prefix_is_malformed() {
    assert!(matches!(
        weft::parse(b"\0wasm\x01\0\0\0"),
        Err(Error::Malformed(_))
    ));
    assert!(matches!(weft::parse(b"\0asm"), Err(Error::Malformed(_))));
    // Wrong version.
    assert!(matches!(
        weft::parse(b"\0asm\x02\0\0\0"),
        Err(Error::Malformed(_))
    ));
}

#[test]
fn unknown_section_id_is_malformed() {
    let bytes = module(&[section(12, &[])]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn out_of_order_sections_are_malformed() {
    // A function section followed by a type section.
    let bytes = module(&[section(3, &[0x00]), section(1, &[0x00])]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Malformed(_))));

    // The same section id twice.
    let bytes = module(&[section(1, &[0x00]), section(1, &[0x00])]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn section_size_beyond_input_is_malformed() {
    let mut bytes = PREFIX.to_vec();
    bytes.extend_from_slice(&[0x01, 0x05, 0x00]); // type section claiming 5 bytes
    assert!(matches!(weft::parse(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn section_with_trailing_garbage_is_malformed() {
    // A type section with count 0 but one extra byte of payload.
    let bytes = module(&[section(1, &[0x00, 0xff])]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn custom_sections_are_skipped_anywhere() {
    // custom, type, custom: name "a" plus arbitrary bytes.
    let bytes = module(&[
        section(0, &[0x01, b'a', 0xde, 0xad]),
        section(1, &[0x00]),
        section(0, &[0x01, b'b']),
    ]);
    assert!(weft::parse(&bytes).is_ok());
}

#[test]
fn custom_section_name_must_be_utf8() {
    let bytes = module(&[section(0, &[0x01, 0xff])]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn functype_needs_its_tag_byte() {
    // Type section with one entry not starting with 0x60.
    let bytes = module(&[section(1, &[0x01, 0x5f, 0x00, 0x00])]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn multiple_results_are_invalid() {
    // (func (result i32 i32))
    let bytes = module(&[section(1, &[0x01, 0x60, 0x00, 0x02, 0x7f, 0x7f])]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Validation(_))));
}

#[test]
fn limits_flag_must_be_zero_or_one() {
    // Memory section with limits flag 2.
    let bytes = module(&[section(5, &[0x01, 0x02, 0x01])]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn limits_min_above_max_is_invalid() {
    // (memory 2 1)
    let bytes = module(&[section(5, &[0x01, 0x01, 0x02, 0x01])]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Validation(_))));
}

#[test]
fn memory_size_over_four_gigabytes_is_invalid() {
    // min = 65537 pages (LEB128 81 80 04).
    let bytes = module(&[section(5, &[0x01, 0x00, 0x81, 0x80, 0x04])]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Validation(_))));
}

#[test]
fn duplicate_export_names_are_invalid() {
    // Two exports both named "f" for the same function.
    let bytes = module(&[
        section(1, &[0x01, 0x60, 0x00, 0x00]),
        section(3, &[0x01, 0x00]),
        section(
            7,
            &[0x02, 0x01, b'f', 0x00, 0x00, 0x01, b'f', 0x00, 0x00],
        ),
        section(10, &[0x01, 0x02, 0x00, 0x0b]),
    ]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Validation(_))));
}

#[test]
fn function_and_code_counts_must_match() {
    // One declared function, empty code section.
    let bytes = module(&[
        section(1, &[0x01, 0x60, 0x00, 0x00]),
        section(3, &[0x01, 0x00]),
        section(10, &[0x00]),
    ]);
    assert!(matches!(weft::parse(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn parse_and_validate_agree() -> Result<()> {
    let good = wat::parse_str(r#"(module (func (export "f") (result i32) i32.const 3))"#)?;
    assert!(weft::parse(&good).is_ok());
    assert!(weft::validate(&good).is_ok());

    // Type error in the body: parse and validate must both reject.
    let bad = wat::parse_str(r#"(module (func (result i32) i64.const 3))"#)?;
    assert!(weft::parse(&bad).is_err());
    assert!(weft::validate(&bad).is_err());
    Ok(())
}
