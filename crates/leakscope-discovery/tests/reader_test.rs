use leakscope_core::{AppConfig, Credential, MAX_CREDENTIAL_SPAN};
use leakscope_discovery::{open_source, Content, ReaderLimits, Scanner};
use lopdf::content::{Content as PdfContent, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use sevenz_rust::{SevenZArchiveEntry, SevenZWriter};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const CORRUPT_MARKER: &[u8] = b"CORRUPTED-PAYLOAD-DATA";

fn scanner() -> Scanner {
    let mut config = AppConfig::default();
    config.scope.target_domain = "example.org".to_string();
    Scanner::from_config(&config)
}

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(data).expect("write entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

fn planted() -> Vec<(String, String)> {
    vec![("planted@example.org".to_string(), "Hunter22".to_string())]
}

/// One-page PDF showing `text` in a standard font.
fn build_pdf(path: &Path, text: &str) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = PdfContent {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn cred_keys(path: &Path) -> Vec<(String, String)> {
    scanner()
        .scan_path(path)
        .expect("scan")
        .creds()
        .map(Credential::key)
        .collect()
}

#[test]
fn test_corrupt_zip_entry_does_not_abort_scan() {
    let mut bytes = build_zip(&[
        ("broken.txt", CORRUPT_MARKER),
        ("valid.txt", b"dump\nplanted@example.org:Hunter22\n"),
    ]);

    // Stored entries keep their data verbatim; flipping a byte breaks the CRC
    let offset = bytes
        .windows(CORRUPT_MARKER.len())
        .position(|w| w == CORRUPT_MARKER)
        .expect("marker present");
    bytes[offset] ^= 0xFF;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("leak.zip");
    std::fs::write(&path, bytes).unwrap();

    assert_eq!(
        cred_keys(&path),
        vec![("planted@example.org".to_string(), "Hunter22".to_string())]
    );
}

#[test]
fn test_corrupt_7z_entry_keeps_earlier_entries() {
    let dir = TempDir::new().unwrap();
    let valid = dir.path().join("valid.txt");
    std::fs::write(&valid, "dump\nplanted@example.org:Hunter22\n").unwrap();
    let broken = dir.path().join("broken.txt");
    std::fs::write(&broken, CORRUPT_MARKER).unwrap();

    let path = dir.path().join("leak.7z");
    let mut writer = SevenZWriter::create(&path).unwrap();
    for (src, name) in [(&valid, "valid.txt"), (&broken, "broken.txt")] {
        writer
            .push_archive_entry(
                SevenZArchiveEntry::from_path(src, name.to_string()),
                Some(File::open(src).unwrap()),
            )
            .unwrap();
    }
    writer.finish().unwrap();

    // Input too short to compress is packed as a raw LZMA2 chunk
    let mut bytes = std::fs::read(&path).unwrap();
    let offset = bytes
        .windows(CORRUPT_MARKER.len())
        .position(|w| w == CORRUPT_MARKER)
        .expect("marker present");
    bytes[offset] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    assert_eq!(cred_keys(&path), planted());
}

#[test]
fn test_7z_entries_are_extracted() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("dump.txt");
    std::fs::write(&src, "a@example.org:first\nplanted@example.org:Hunter22\n").unwrap();

    let path = dir.path().join("combo.7z");
    let mut writer = SevenZWriter::create(&path).unwrap();
    writer
        .push_archive_entry(
            SevenZArchiveEntry::from_path(&src, "dump.txt".to_string()),
            Some(File::open(&src).unwrap()),
        )
        .unwrap();
    writer.finish().unwrap();

    let mut creds = cred_keys(&path);
    creds.sort();
    assert_eq!(
        creds,
        vec![
            ("a@example.org".to_string(), "first".to_string()),
            ("planted@example.org".to_string(), "Hunter22".to_string()),
        ]
    );
}

/// `leak.rar` holds two stored entries: `valid.txt` with a credential, then
/// `broken.txt` whose recorded checksum does not match its data.
#[test]
fn test_rar_entries_before_a_bad_entry_are_kept() {
    let path = fixture("leak.rar");

    let content = open_source(&path, &ReaderLimits::default()).unwrap();
    let Content::Whole(buf) = content else {
        panic!("archives are read whole");
    };
    assert_eq!(buf, b"dump\nplanted@example.org:Hunter22\n\n".to_vec());
    assert_eq!(cred_keys(&path), planted());
}

#[test]
fn test_pdf_text_is_extracted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.pdf");
    build_pdf(&path, "planted@example.org:Hunter22");

    assert_eq!(cred_keys(&path), planted());
}

#[test]
fn test_zip_entries_are_concatenated() {
    let bytes = build_zip(&[
        ("one.txt", b"a@example.org:first"),
        ("two.csv", b"b@example.org,second"),
    ]);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("combo.zip");
    std::fs::write(&path, bytes).unwrap();

    let content = open_source(&path, &ReaderLimits::default()).unwrap();
    let Content::Whole(buf) = content else {
        panic!("archives are read whole");
    };
    assert_eq!(buf, b"a@example.org:first\nb@example.org,second\n".to_vec());
    assert_eq!(cred_keys(&path).len(), 2);
}

#[test]
fn test_unparseable_zip_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fake.zip");
    std::fs::write(&path, b"this is not a zip archive").unwrap();

    assert!(scanner().scan_path(&path).is_err());
}

#[test]
fn test_corrupt_pdf_yields_empty_result() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"%PDF-1.4 admin@example.org:NotReally garbage").unwrap();

    let result = scanner().scan_path(&path).expect("PDF failures are not errors");
    assert!(result.is_empty());
}

#[test]
fn test_large_file_is_streamed_without_losing_credentials() {
    let mut config = AppConfig::default();
    config.scope.target_domain = "example.org".to_string();
    config.input.chunk_size = 2048;
    config.input.chunk_threshold = 4096;
    config.input.chunk_overlap = MAX_CREDENTIAL_SPAN;
    let scanner = Scanner::from_config(&config);

    let mut data = String::new();
    for i in 0..500 {
        data.push_str(&format!("filler line {i} with no secrets\nuser{i}@example.org:pass{i}\n"));
    }
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.log");
    std::fs::write(&path, &data).unwrap();

    assert!(config.validate().is_ok());
    let content = open_source(&path, scanner.limits()).unwrap();
    assert!(matches!(content, Content::Chunked(_)));

    let result = scanner.scan_path(&path).unwrap();
    assert_eq!(result.cred_count(), 500);
    assert!(result.contains_email("user0@example.org"));
    assert!(result.contains_email("user499@example.org"));
}

#[test]
fn test_read_limit_bounds_plain_files() {
    let mut config = AppConfig::default();
    config.scope.target_domain = "example.org".to_string();
    config.input.max_read_bytes = 32;
    let scanner = Scanner::from_config(&config);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dump.txt");
    std::fs::write(&path, "early@example.org:inside\n................late@example.org:outside\n")
        .unwrap();

    let result = scanner.scan_path(&path).unwrap();
    assert!(result.contains_email("early@example.org"));
    assert!(!result.contains_email("late@example.org"));
}
