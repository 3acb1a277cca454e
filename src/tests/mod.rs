
use std::{cell::Cell, fs, io, rc::Rc};

use rstest::rstest;

use crate::{
    open, source::testing::Trickle, ByteSource, EncodedStream, EncodedText, EncodingId, Error,
    LineOptions, Registry, StreamConfig,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn generate_file(content: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    io::Write::write_all(&mut file, content).unwrap();
    file
}

#[test]
fn ex_readme_examples() -> crate::Result<()> {
    let src: &[u8] = b"\xc6\xfc\xcb\xdc\n\xc5\xec\xb5\xfe\n";
    let mut stream = EncodedStream::from_mode(src, "r:EUC-JP:UTF-8")?;
    let lines = stream.readlines()?;
    assert_eq!(
        lines,
        [EncodedText::from("日本\n"), EncodedText::from("東京\n")]
    );

    let mut stream = EncodedStream::from_mode(src, "r:EUC-JP")?;
    let c = stream.get_char()?.unwrap();
    assert_eq!(c, EncodedText::new(*b"\xc6\xfc", EncodingId::EUC_JP));
    let b = stream.read_raw_byte()?.unwrap();
    assert_eq!(b, EncodedText::binary(*b"\xcb"));
    Ok(())
}

#[test]
fn terminator_conversion() {
    init_logger();
    let file = generate_file(b"before \xff after");
    let sep = EncodedText::new(*b"\xff", EncodingId::ISO_8859_1);

    let s = open(file.path(), "r:iso-8859-1", |f| {
        f.gets_with(&LineOptions::new().separator(sep.clone()))
    })
    .unwrap();
    assert_eq!(
        s,
        Some(EncodedText::new(*b"before \xff", EncodingId::ISO_8859_1))
    );

    // with conversion the line comes out in the internal encoding
    let s = open(file.path(), "r:iso-8859-1:utf-8", |f| {
        f.gets_with(&LineOptions::new().separator(sep.clone()))
    })
    .unwrap();
    assert_eq!(s, Some(EncodedText::from("before \u{ff}")));

    // and a separator given in the internal encoding means the same character
    let s = open(file.path(), "r:iso-8859-1:utf-8", |f| {
        f.gets_with(&LineOptions::new().separator("\u{ff}"))
    })
    .unwrap();
    assert_eq!(s, Some(EncodedText::from("before \u{ff}")));
}

#[rstest]
#[case(EncodingId::BINARY)]
#[case(EncodingId::EUC_JP)]
#[case(EncodingId::SHIFT_JIS)]
#[case(EncodingId::UTF_8)]
#[case(EncodingId::ISO_8859_1)]
fn open_ascii(#[case] enc: EncodingId) {
    let file = generate_file(b"abc\n");
    let s = open(file.path(), &format!("r:{}", enc), |f| f.gets())
        .unwrap()
        .unwrap();
    assert_eq!(s.encoding(), enc);
    assert_eq!(s, EncodedText::new(*b"abc\n", enc));
}

#[rstest]
#[case(EncodingId::BINARY)]
#[case(EncodingId::EUC_JP)]
#[case(EncodingId::SHIFT_JIS)]
#[case(EncodingId::UTF_8)]
fn open_nonascii(#[case] enc: EncodingId) {
    let src = b"\xc2\xa1\n";
    let file = generate_file(src);
    let s = open(file.path(), &format!("r:{}", enc), |f| f.gets())
        .unwrap()
        .unwrap();
    assert_eq!(s, EncodedText::new(*src, enc));
}

/// Every read granularity on a fresh stream over `C2 A1 0A`.
#[rstest]
#[case(EncodingId::BINARY, b"\xc2")]
#[case(EncodingId::EUC_JP, b"\xc2\xa1")]
#[case(EncodingId::SHIFT_JIS, b"\xc2")]
#[case(EncodingId::UTF_8, b"\xc2\xa1")]
fn bytes(#[case] enc: EncodingId, #[case] first_char: &[u8]) {
    init_logger();
    let src: &[u8] = b"\xc2\xa1\n";
    let file = generate_file(src);
    let mode = format!("r:{}", enc);
    let whole = EncodedText::new(src, enc);
    let first_byte = EncodedText::binary(*b"\xc2");

    let s = open(file.path(), &mode, |f| f.get_char()).unwrap();
    assert_eq!(s, Some(EncodedText::new(first_char, enc)));

    let s = open(file.path(), &mode, |f| f.read_char()).unwrap();
    assert_eq!(s, EncodedText::new(first_char, enc));

    let s = open(file.path(), &mode, |f| f.read_raw_byte()).unwrap();
    assert_eq!(s, Some(first_byte.clone()));

    let s = open(file.path(), &mode, |f| f.gets()).unwrap();
    assert_eq!(s, Some(whole.clone()));

    let s = open(file.path(), &mode, |f| f.readline()).unwrap();
    assert_eq!(s, whole);

    let lines = open(file.path(), &mode, |f| f.readlines()).unwrap();
    assert_eq!(lines, [whole.clone()]);

    let count = open(file.path(), &mode, |f| {
        let mut count = 0;
        for s in f.each_line() {
            assert_eq!(s?, whole);
            count += 1;
        }
        Ok(count)
    })
    .unwrap();
    assert_eq!(count, 1);

    let s = open(file.path(), &mode, |f| f.read()).unwrap();
    assert_eq!(s, whole);

    let s = open(file.path(), &mode, |f| f.read_bytes(1)).unwrap();
    assert_eq!(s, Some(first_byte.clone()));

    let s = open(file.path(), &mode, |f| f.readpartial(1)).unwrap();
    assert_eq!(s, Some(first_byte.clone()));

    let s = open(file.path(), &mode, |f| f.sysread(1)).unwrap();
    assert_eq!(s, Some(first_byte));
}

#[rstest]
#[case("r:UTF-8")]
#[case("r:EUC-JP:UTF-8")]
#[case("rb")]
fn empty_source(#[case] mode: &str) {
    let mut s = EncodedStream::from_mode(&b""[..], mode).unwrap();
    assert!(s.eof().unwrap());
    assert!(s.readlines().unwrap().is_empty());
    assert_eq!(s.gets().unwrap(), None);
    assert_eq!(s.get_char().unwrap(), None);
    assert_eq!(s.read_raw_byte().unwrap(), None);
    assert_eq!(s.read_bytes(1).unwrap(), None);
    assert_eq!(s.read_bytes(0).unwrap(), Some(EncodedText::binary(Vec::new())));
    assert_eq!(s.readpartial(1).unwrap(), None);
    assert_eq!(s.sysread(1).unwrap(), None);
    assert!(matches!(s.readline(), Err(Error::EndOfFile)));
    assert!(matches!(s.read_char(), Err(Error::EndOfFile)));
    let all = s.read().unwrap();
    assert!(all.is_empty());
    assert_eq!(Some(all.encoding()), s.internal_encoding().or(Some(s.external_encoding())));
}

/// Mixes every buffered read granularity on one stream and checks that the returned bytes add
/// up to the source exactly.
#[rstest]
#[case("UTF-8", 1)]
#[case("EUC-JP", 2)]
#[case("Shift_JIS", 3)]
#[case("ISO-8859-1", 5)]
#[case("ASCII-8BIT", 7)]
fn byte_conservation(#[case] mode: &str, #[case] step: usize) {
    init_logger();
    let src: Vec<u8> = (0..600u32)
        .map(|i| match i % 11 {
            0 => b'\n',
            1 | 2 => 0xa4,
            3 => 0xc2,
            4 => 0x5c,
            _ => (i.wrapping_mul(2654435761) >> 24) as u8,
        })
        .collect();
    let mut stream = EncodedStream::with_capacity(
        16,
        Trickle::new(&src, step),
        &StreamConfig::parse(mode, Registry::builtin()).unwrap(),
        Registry::builtin(),
    )
    .unwrap();

    let mut out = Vec::new();
    let mut state = 12345u32;
    loop {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        let unit = match (state >> 16) % 7 {
            0 => stream.get_char().unwrap(),
            1 => stream.read_raw_byte().unwrap(),
            2 => stream.gets().unwrap(),
            3 => stream.read_bytes(((state >> 8) % 5) as usize).unwrap(),
            4 => stream.readpartial(3).unwrap(),
            5 => stream
                .gets_with(&LineOptions::new().separator(EncodedText::binary(*b"\\")).limit(9))
                .unwrap(),
            _ => stream
                .get_byte()
                .unwrap()
                .map(|b| EncodedText::binary(vec![b])),
        };
        match unit {
            Some(unit) => out.extend_from_slice(unit.as_bytes()),
            None if stream.eof().unwrap() => break,
            None => {}
        }
    }
    assert_eq!(out, src);
    assert_eq!(stream.pos(), src.len() as u64);
}

#[test]
fn tagging() {
    let src: &[u8] = b"\xa4\xa2\xa4\xa4\nxyz";
    for (mode, text_tag) in [
        ("EUC-JP", EncodingId::EUC_JP),
        ("EUC-JP:UTF-8", EncodingId::UTF_8),
        ("EUC-JP:Shift_JIS", EncodingId::SHIFT_JIS),
    ] {
        let mut s = EncodedStream::from_mode(src, mode).unwrap();
        assert_eq!(s.get_char().unwrap().unwrap().encoding(), text_tag);
        assert_eq!(s.read_raw_byte().unwrap().unwrap().encoding(), EncodingId::BINARY);
        // both halves of the second character go out raw
        assert_eq!(s.read_bytes(1).unwrap().unwrap().encoding(), EncodingId::BINARY);
        assert_eq!(s.gets().unwrap().unwrap().encoding(), text_tag);
        assert_eq!(s.readpartial(1).unwrap().unwrap().encoding(), EncodingId::BINARY);
        assert_eq!(s.read().unwrap().encoding(), text_tag);
    }
}

#[test]
fn idempotent_redecode() {
    let registry = Registry::builtin();
    let src: &[u8] = b"\x93\xfa\x96\x7b\x8c\xea\n";
    let read = || {
        EncodedStream::from_mode(src, "Shift_JIS:EUC-JP")
            .unwrap()
            .read()
            .unwrap()
    };
    assert_eq!(read(), read());

    let text = EncodedText::new(src, EncodingId::SHIFT_JIS);
    assert_eq!(
        registry.convert(&text, EncodingId::UTF_8).unwrap(),
        registry.convert(&text, EncodingId::UTF_8).unwrap()
    );
    assert_eq!(
        registry.convert(&text, EncodingId::UTF_8).unwrap(),
        EncodedText::from("日本語\n")
    );
}

#[test]
fn invalid_units_round_trip_without_conversion() {
    // every byte sequence comes back intact and tagged, whatever the declared encoding
    let src: Vec<u8> = (0..=255u8).rev().collect();
    for name in Registry::builtin().names() {
        let mut s = EncodedStream::from_mode(&src[..], name).unwrap();
        let chars: Vec<_> = s.each_char().map(Result::unwrap).collect();
        assert!(chars.iter().all(|c| c.encoding().name() == name));
        assert_eq!(chars.concat_bytes(), src, "{}", name);
    }
}

trait ConcatBytes {
    fn concat_bytes(&self) -> Vec<u8>;
}

impl ConcatBytes for Vec<EncodedText> {
    fn concat_bytes(&self) -> Vec<u8> {
        self.iter().flat_map(|t| t.as_bytes()).copied().collect()
    }
}

#[test]
fn open_reports_mode_before_touching_the_file() {
    assert!(matches!(
        EncodedStream::open("/nonexistent/encoded_io", "w:UTF-8"),
        Err(Error::InvalidMode(_))
    ));
    assert!(matches!(
        EncodedStream::open("/nonexistent/encoded_io", "r:KLINGON"),
        Err(Error::UnknownEncoding(_))
    ));
    assert!(matches!(
        EncodedStream::open("/nonexistent/encoded_io", "r:UTF-8"),
        Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound
    ));
}

#[test]
fn scoped_open_propagates_errors() {
    let file = generate_file(b"");
    let ret = open(file.path(), "r:UTF-8", |f| f.readline());
    assert!(matches!(ret, Err(Error::EndOfFile)));

    let ret: crate::Result<()> = open(file.path(), "r:UTF-8", |f| {
        f.read()?;
        Err(Error::UnknownEncoding("early".into()))
    });
    assert!(matches!(ret, Err(Error::UnknownEncoding(e)) if e == "early"));

    // the file is still there and readable
    assert_eq!(fs::read(file.path()).unwrap(), b"");
}

/// A source that is not a reader and records whether it was closed.
struct Tracked {
    data: Vec<u8>,
    closed: Rc<Cell<bool>>,
}

impl ByteSource for Tracked {
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data.drain(..n);
        Ok(n)
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.set(true);
        Ok(())
    }
}

#[test]
fn close_releases_the_source() {
    let closed = Rc::new(Cell::new(false));
    let source = Tracked {
        data: b"abc\n".to_vec(),
        closed: closed.clone(),
    };
    let mut s = EncodedStream::new(
        source,
        &StreamConfig::new(EncodingId::US_ASCII, None),
        Registry::builtin(),
    )
    .unwrap();
    assert_eq!(s.gets().unwrap().unwrap(), *b"abc\n");
    assert!(!closed.get());
    s.close().unwrap();
    assert!(closed.get());
}

#[test]
fn unknown_encoding_in_registry() {
    let registry = Registry::new();
    let ret = EncodedStream::new(&b""[..], &StreamConfig::binary(), &registry);
    assert!(matches!(ret, Err(Error::UnknownEncoding(name)) if name == "ASCII-8BIT"));
}
